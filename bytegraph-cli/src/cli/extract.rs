//! Extract command implementation

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;

use bytegraph_core::{CallGraphAlg, DiskDriver, Driver, Extractor, ExtractorConfig};

pub fn run(
    db: &Path,
    input: &Path,
    call_graph: CallGraphAlg,
    no_incremental: bool,
) -> Result<()> {
    let start = Instant::now();
    let driver = DiskDriver::open(db)
        .with_context(|| format!("failed to open graph store at {}", db.display()))?;
    if no_incremental {
        driver.clear().context("failed to clear the store")?;
    }

    let config = ExtractorConfig::default().with_call_graph(call_graph);
    let mut extractor = Extractor::new(driver).with_config(config);
    extractor
        .load(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let stats = extractor.project().context("projection failed")?;

    println!(
        "{} {} in {:.2}s",
        style("✓").green().bold(),
        stats.summary(),
        start.elapsed().as_secs_f64()
    );
    if stats.schema_failures > 0 {
        eprintln!(
            "{} {} method(s) were discarded after schema violations; see the log",
            style("!").yellow().bold(),
            stats.schema_failures
        );
    }
    Ok(())
}
