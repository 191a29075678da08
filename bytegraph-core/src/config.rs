//! Extractor configuration.

use std::path::PathBuf;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Call-graph oracle selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallGraphAlg {
    /// Disable call-graph construction entirely.
    None,
    /// Class-hierarchy analysis over the loaded IR (built in).
    #[default]
    Cha,
    /// Points-to oracle supplied by the embedder.
    Spark,
}

impl std::str::FromStr for CallGraphAlg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CallGraphAlg::None),
            "cha" => Ok(CallGraphAlg::Cha),
            "spark" => Ok(CallGraphAlg::Spark),
            other => Err(format!("unknown call-graph algorithm '{other}'")),
        }
    }
}

/// Options recognised by the extractor pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub call_graph_alg: CallGraphAlg,
    /// Opaque option bag forwarded to an external points-to oracle.
    pub spark_opts: FxHashMap<String, String>,
    /// Number of classes above which per-class lowering runs in parallel.
    pub parallel_threshold: usize,
    /// Scratch directory handed to a registered source compiler.
    pub compile_dir: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            call_graph_alg: CallGraphAlg::default(),
            spark_opts: FxHashMap::default(),
            parallel_threshold: 100_000,
            compile_dir: std::env::temp_dir().join("bytegraph-classes"),
        }
    }
}

impl ExtractorConfig {
    pub fn with_call_graph(mut self, alg: CallGraphAlg) -> Self {
        self.call_graph_alg = alg;
        self
    }

    pub fn with_spark_opt(mut self, key: &str, value: &str) -> Self {
        self.spark_opts.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_compile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.compile_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert_eq!(config.call_graph_alg, CallGraphAlg::Cha);
        assert_eq!(config.parallel_threshold, 100_000);
    }

    #[test]
    fn test_alg_parsing() {
        assert_eq!("CHA".parse::<CallGraphAlg>().unwrap(), CallGraphAlg::Cha);
        assert_eq!("none".parse::<CallGraphAlg>().unwrap(), CallGraphAlg::None);
        assert!("rta".parse::<CallGraphAlg>().is_err());
    }
}
