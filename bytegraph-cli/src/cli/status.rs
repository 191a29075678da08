//! Status command implementation

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use bytegraph_core::{DiskDriver, Driver};

pub fn run(db: &Path) -> Result<()> {
    let driver = DiskDriver::open(db)
        .with_context(|| format!("failed to open graph store at {}", db.display()))?;
    let graph = driver.get_whole_graph().context("failed to read the store")?;

    if graph.is_empty() {
        println!("store is empty ({})", db.display());
        return Ok(());
    }

    let mut node_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for node in graph.nodes() {
        *node_counts.entry(node.kind.label()).or_default() += 1;
    }
    let mut edge_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for edge in graph.edges() {
        *edge_counts.entry(edge.kind.label()).or_default() += 1;
    }

    println!(
        "{} ({} nodes, {} edges)",
        style(db.display()).bold(),
        graph.node_count(),
        graph.edge_count()
    );
    println!("\n{}", style("Nodes").underlined());
    for (label, count) in node_counts {
        println!("  {label:<22} {count:>8}");
    }
    println!("\n{}", style("Edges").underlined());
    for (label, count) in edge_counts {
        println!("  {label:<22} {count:>8}");
    }
    Ok(())
}
