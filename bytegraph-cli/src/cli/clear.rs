//! Clear command implementation

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use bytegraph_core::{DiskDriver, Driver};

pub fn run(db: &Path) -> Result<()> {
    let driver = DiskDriver::open(db)
        .with_context(|| format!("failed to open graph store at {}", db.display()))?;
    driver.clear().context("failed to clear the store")?;
    println!("{} store cleared ({})", style("✓").green().bold(), db.display());
    Ok(())
}
