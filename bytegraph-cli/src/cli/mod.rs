//! CLI command definitions and handlers

mod clear;
mod extract;
mod inspect;
mod status;

use std::path::PathBuf;

use anyhow::Result;
use bytegraph_core::CallGraphAlg;
use clap::{Parser, Subcommand};

/// bytegraph - code property graphs from JVM bytecode
///
/// Everything runs locally against an embedded store; no services, no
/// accounts.
#[derive(Parser, Debug)]
#[command(name = "bytegraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path of the graph store
    #[arg(long, global = true, default_value = ".bytegraph/graph.redb")]
    pub db: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project IR bundles (or sources, given a compiler) into the store
    Extract {
        /// An IR bundle, or a directory of bundles
        path: PathBuf,

        /// Call-graph algorithm: none, cha, spark
        #[arg(long, default_value = "cha")]
        call_graph: CallGraphAlg,

        /// Clear the store first instead of updating incrementally
        #[arg(long)]
        no_incremental: bool,
    },

    /// Show node and edge counts by kind
    Status,

    /// List the program structure (files and namespaces)
    Structure,

    /// Dump one method's sub-graph
    Method {
        /// Fully qualified method name, e.g. Conditional1.main
        full_name: String,

        /// Signature, e.g. 'void(java.lang.String[])'
        signature: String,

        /// Only the method head
        #[arg(long)]
        no_body: bool,
    },

    /// Empty the store
    Clear,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            ref path,
            call_graph,
            no_incremental,
        } => extract::run(&cli.db, path, call_graph, no_incremental),
        Commands::Status => status::run(&cli.db),
        Commands::Structure => inspect::structure(&cli.db),
        Commands::Method {
            ref full_name,
            ref signature,
            no_body,
        } => inspect::method(&cli.db, full_name, signature, !no_body),
        Commands::Clear => clear::run(&cli.db),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_defaults() {
        let cli = Cli::parse_from(["bytegraph", "extract", "ir/"]);
        match cli.command {
            Commands::Extract {
                call_graph,
                no_incremental,
                ..
            } => {
                assert_eq!(call_graph, CallGraphAlg::Cha);
                assert!(!no_incremental);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.db, PathBuf::from(".bytegraph/graph.redb"));
    }
}
