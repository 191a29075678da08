//! The storage-driver boundary.
//!
//! One small synchronous contract over heterogeneous graph stores. The
//! extractor is single-writer; back-ends owe no concurrent-writer safety,
//! but every call may block (remote stores).

mod disk;
mod memory;

pub use disk::DiskDriver;
pub use memory::MemoryDriver;

use std::collections::BTreeSet;

use crate::error::Result;
use crate::graph::{CpgNode, Subgraph};
use crate::schema::EdgeKind;

/// Common interface for CPG stores.
///
/// Every operation is atomic with respect to its own effect, and every
/// failure is explicit. A schema violation is raised before any mutation
/// becomes visible.
pub trait Driver: Send + Sync {
    /// Persist `node`. On first insert the driver allocates an id and
    /// rewrites the builder's handle; re-inserting a persisted builder
    /// updates its properties in place (idempotent for equal builders).
    fn add_vertex(&self, node: &mut CpgNode) -> Result<i64>;

    /// Whether this builder's node is in the store.
    fn exists(&self, node: &CpgNode) -> Result<bool>;

    /// Whether an edge of `kind` exists between the two persisted nodes.
    fn edge_exists(&self, src: &CpgNode, dst: &CpgNode, kind: EdgeKind) -> Result<bool>;

    /// Add an edge, auto-inserting either endpoint that is missing.
    /// Fails closed on a schema violation: nothing is persisted.
    fn add_edge(&self, src: &mut CpgNode, dst: &mut CpgNode, kind: EdgeKind) -> Result<()>;

    /// Remove a node and its incident edges. Idempotent; absent nodes are
    /// not an error. Inbound CALL edges are left dangling in their
    /// sources' adjacency (tolerated until the target is re-created).
    fn delete_vertex(&self, node: &CpgNode) -> Result<()>;

    /// Remove a method's AST closure (head and body). Inbound CALL edges
    /// are preserved as dangling references.
    fn delete_method(&self, full_name: &str, signature: &str) -> Result<()>;

    /// The method head and, when `include_body`, the transitive closure
    /// along AST/REF/CFG/ARGUMENT/CAPTURED_BY/BINDS_TO/RECEIVER/
    /// CONDITION/BINDS edges.
    fn get_method(&self, full_name: &str, signature: &str, include_body: bool)
        -> Result<Subgraph>;

    /// `FILE` and `NAMESPACE_BLOCK` nodes connected via AST.
    fn get_program_structure(&self) -> Result<Subgraph>;

    /// The node itself plus its one-hop in- and out-neighbourhood.
    fn get_neighbours(&self, node: &CpgNode) -> Result<Subgraph>;

    /// The full store as one view.
    fn get_whole_graph(&self) -> Result<Subgraph>;

    /// All node ids in the inclusive range `[lo, hi]`.
    fn get_vertex_ids(&self, lo: i64, hi: i64) -> Result<BTreeSet<i64>>;

    /// Empty the store.
    fn clear(&self) -> Result<()>;
}

/// Edge kinds followed by the `get_method` closure traversal.
pub(crate) const METHOD_CLOSURE_EDGES: &[EdgeKind] = &[
    EdgeKind::Ast,
    EdgeKind::Ref,
    EdgeKind::Cfg,
    EdgeKind::Argument,
    EdgeKind::CapturedBy,
    EdgeKind::BindsTo,
    EdgeKind::Receiver,
    EdgeKind::Condition,
    EdgeKind::Binds,
];

#[cfg(test)]
mod tests;
