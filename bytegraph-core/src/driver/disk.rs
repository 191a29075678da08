//! redb-backed persistent driver.
//!
//! Keeps a full in-memory mirror for queries and writes every mutation
//! through to redb in its own transaction, so each driver call is atomic
//! with respect to its own effect. No C++ dependencies, builds everywhere.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::graph::{CpgNode, Subgraph, SubgraphEdge};
use crate::schema::EdgeKind;

use super::{Driver, MemoryDriver};

const NODES_TABLE: redb::TableDefinition<i64, &[u8]> = redb::TableDefinition::new("nodes");
const EDGES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("edges");

/// Disk-spilling driver: an in-memory mirror plus a write-through redb log
/// of `(id, label, properties)` node records and `(src, dst, label)` edge
/// records.
pub struct DiskDriver {
    mirror: MemoryDriver,
    db: redb::Database,
}

fn edge_key(src: i64, kind: EdgeKind, dst: i64) -> String {
    format!("{src}:{}:{dst}", kind.label())
}

impl DiskDriver {
    /// Create or open a store at `path` (a file; parent directories are
    /// created as needed) and replay its records into the mirror.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = redb::Database::create(path)?;
        let driver = Self {
            mirror: MemoryDriver::new(),
            db,
        };
        driver.load()?;
        Ok(driver)
    }

    fn load(&self) -> Result<()> {
        let read_txn = self.db.begin_read()?;

        let nodes_table = match read_txn.open_table(NODES_TABLE) {
            Ok(t) => t,
            // Fresh database, nothing to replay.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0usize;
        for item in nodes_table.range::<i64>(..)? {
            let (_, value) = item?;
            let node: CpgNode = serde_json::from_slice(value.value())?;
            self.mirror.insert_raw(node);
            count += 1;
        }

        let edges_table = match read_txn.open_table(EDGES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for item in edges_table.range::<&str>(..)? {
            let (_, value) = item?;
            let edge: SubgraphEdge = serde_json::from_slice(value.value())?;
            // Stale dangling records (deleted call targets) are skipped.
            if self.mirror.node_by_id(edge.src).is_some()
                && self.mirror.node_by_id(edge.dst).is_some()
            {
                self.mirror.insert_edge_raw(edge.src, edge.kind, edge.dst);
            }
        }
        debug!(nodes = count, "loaded persisted graph");
        Ok(())
    }

    fn persist_node(table: &mut redb::Table<'_, i64, &[u8]>, node: &CpgNode) -> Result<()> {
        let record = serde_json::to_vec(node)?;
        table.insert(node.id, record.as_slice())?;
        Ok(())
    }

    fn remove_vertex_records(
        &self,
        id: i64,
        incident: &[(i64, EdgeKind, i64)],
    ) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut nodes = write_txn.open_table(NODES_TABLE)?;
            nodes.remove(id)?;
            let mut edges = write_txn.open_table(EDGES_TABLE)?;
            for &(src, kind, dst) in incident {
                // Inbound CALL records stay: the dangling reference is
                // tolerated until the target is re-created.
                if kind == EdgeKind::Call && dst == id {
                    continue;
                }
                edges.remove(edge_key(src, kind, dst).as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl Driver for DiskDriver {
    fn add_vertex(&self, node: &mut CpgNode) -> Result<i64> {
        let id = self.mirror.add_vertex(node)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut nodes = write_txn.open_table(NODES_TABLE)?;
            Self::persist_node(&mut nodes, node)?;
        }
        write_txn.commit()?;
        Ok(id)
    }

    fn exists(&self, node: &CpgNode) -> Result<bool> {
        self.mirror.exists(node)
    }

    fn edge_exists(&self, src: &CpgNode, dst: &CpgNode, kind: EdgeKind) -> Result<bool> {
        self.mirror.edge_exists(src, dst, kind)
    }

    fn add_edge(&self, src: &mut CpgNode, dst: &mut CpgNode, kind: EdgeKind) -> Result<()> {
        // Schema check and endpoint auto-insert happen in the mirror; the
        // write transaction below only runs once the edge is legal.
        self.mirror.add_edge(src, dst, kind)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut nodes = write_txn.open_table(NODES_TABLE)?;
            Self::persist_node(&mut nodes, src)?;
            Self::persist_node(&mut nodes, dst)?;
            let mut edges = write_txn.open_table(EDGES_TABLE)?;
            let record = serde_json::to_vec(&SubgraphEdge {
                src: src.id,
                kind,
                dst: dst.id,
            })?;
            edges.insert(edge_key(src.id, kind, dst.id).as_str(), record.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_vertex(&self, node: &CpgNode) -> Result<()> {
        if !self.mirror.exists(node)? {
            return Ok(());
        }
        let incident = self.mirror.incident_edges(node.id);
        self.mirror.delete_vertex(node)?;
        self.remove_vertex_records(node.id, &incident)
    }

    fn delete_method(&self, full_name: &str, signature: &str) -> Result<()> {
        let closure = self.mirror.method_closure(full_name, signature);
        let incident: Vec<(i64, Vec<(i64, EdgeKind, i64)>)> = closure
            .iter()
            .map(|&id| (id, self.mirror.incident_edges(id)))
            .collect();
        self.mirror.delete_method(full_name, signature)?;
        for (id, edges) in incident {
            self.remove_vertex_records(id, &edges)?;
        }
        Ok(())
    }

    fn get_method(
        &self,
        full_name: &str,
        signature: &str,
        include_body: bool,
    ) -> Result<Subgraph> {
        self.mirror.get_method(full_name, signature, include_body)
    }

    fn get_program_structure(&self) -> Result<Subgraph> {
        self.mirror.get_program_structure()
    }

    fn get_neighbours(&self, node: &CpgNode) -> Result<Subgraph> {
        self.mirror.get_neighbours(node)
    }

    fn get_whole_graph(&self) -> Result<Subgraph> {
        self.mirror.get_whole_graph()
    }

    fn get_vertex_ids(&self, lo: i64, hi: i64) -> Result<BTreeSet<i64>> {
        self.mirror.get_vertex_ids(lo, hi)
    }

    fn clear(&self) -> Result<()> {
        self.mirror.clear()?;
        let write_txn = self.db.begin_write()?;
        let _ = write_txn.delete_table(NODES_TABLE);
        let _ = write_txn.delete_table(EDGES_TABLE);
        write_txn.commit()?;
        Ok(())
    }
}
