//! Graph value types: nodes, property values, and read-only subgraph views.

mod node;
mod subgraph;

pub use node::{CpgNode, PropertyValue};
pub use subgraph::{Subgraph, SubgraphEdge};

/// Tentative id carried by a node builder before its first insert.
pub const UNPERSISTED: i64 = -1;
