//! Structure and method inspection commands

use std::path::Path;

use anyhow::{bail, Context, Result};
use console::style;

use bytegraph_core::{DiskDriver, Driver, EdgeKind, NodeKind};

pub fn structure(db: &Path) -> Result<()> {
    let driver = DiskDriver::open(db)
        .with_context(|| format!("failed to open graph store at {}", db.display()))?;
    let structure = driver
        .get_program_structure()
        .context("failed to read the program structure")?;

    if structure.is_empty() {
        println!("no program structure in the store yet");
        return Ok(());
    }

    for file in structure.nodes_of_kind(NodeKind::File) {
        let name = file.name().unwrap_or("<unnamed>");
        match file.hash() {
            Some(hash) => println!("{} {}", style(name).bold(), style(&hash[..12]).dim()),
            None => println!("{}", style(name).bold()),
        }
        let mut frontier = structure.out_neighbours(file.id, EdgeKind::Ast);
        let mut depth = 1;
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for block in frontier {
                println!(
                    "{}{}",
                    "  ".repeat(depth),
                    block.full_name().unwrap_or("<unnamed>")
                );
                next.extend(structure.out_neighbours(block.id, EdgeKind::Ast));
            }
            frontier = next;
            depth += 1;
        }
    }
    Ok(())
}

pub fn method(db: &Path, full_name: &str, signature: &str, include_body: bool) -> Result<()> {
    let driver = DiskDriver::open(db)
        .with_context(|| format!("failed to open graph store at {}", db.display()))?;
    let graph = driver
        .get_method(full_name, signature, include_body)
        .context("failed to read the method")?;

    if graph.is_empty() {
        bail!("no method {full_name}:{signature} in the store");
    }

    println!(
        "{} {} ({} nodes, {} edges)",
        style(full_name).bold(),
        signature,
        graph.node_count(),
        graph.edge_count()
    );
    let mut nodes: Vec<_> = graph.nodes().collect();
    nodes.sort_by_key(|n| (n.order(), n.id));
    for node in nodes {
        let code = node.code().unwrap_or("");
        println!(
            "  [{:>4}] {:<20} {}",
            node.id,
            node.kind.label(),
            style(code).dim()
        );
    }
    Ok(())
}
