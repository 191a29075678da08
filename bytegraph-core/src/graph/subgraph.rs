use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::schema::{EdgeKind, NodeKind};

use super::CpgNode;

/// One edge of a subgraph view, by endpoint ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphEdge {
    pub src: i64,
    pub kind: EdgeKind,
    pub dst: i64,
}

/// A transient, read-only view over a selection of the store: the selected
/// nodes plus every edge whose endpoints are both in the selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subgraph {
    nodes: FxHashMap<i64, CpgNode>,
    edges: Vec<SubgraphEdge>,
}

impl Subgraph {
    pub fn insert_node(&mut self, node: CpgNode) {
        self.nodes.insert(node.id, node);
    }

    /// Records an edge; both endpoints must already be in the view.
    pub fn insert_edge(&mut self, src: i64, kind: EdgeKind, dst: i64) {
        debug_assert!(self.contains(src) && self.contains(dst));
        let edge = SubgraphEdge { src, kind, dst };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: i64) -> Option<&CpgNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CpgNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[SubgraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&CpgNode> {
        self.nodes.values().filter(|n| n.kind == kind).collect()
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<&SubgraphEdge> {
        self.edges.iter().filter(|e| e.kind == kind).collect()
    }

    /// Out-neighbours of `id` along `kind`, restricted to this view.
    pub fn out_neighbours(&self, id: i64, kind: EdgeKind) -> Vec<&CpgNode> {
        self.edges
            .iter()
            .filter(|e| e.src == id && e.kind == kind)
            .filter_map(|e| self.nodes.get(&e.dst))
            .collect()
    }

    /// In-neighbours of `id` along `kind`, restricted to this view.
    pub fn in_neighbours(&self, id: i64, kind: EdgeKind) -> Vec<&CpgNode> {
        self.edges
            .iter()
            .filter(|e| e.dst == id && e.kind == kind)
            .filter_map(|e| self.nodes.get(&e.src))
            .collect()
    }

    pub fn find_method(&self, full_name: &str, signature: &str) -> Option<&CpgNode> {
        self.nodes.values().find(|n| {
            n.kind == NodeKind::Method
                && n.full_name() == Some(full_name)
                && n.signature() == Some(signature)
        })
    }

    /// CALL nodes with the given `name` property, e.g. operator calls.
    pub fn calls_named(&self, name: &str) -> Vec<&CpgNode> {
        self.nodes
            .values()
            .filter(|n| n.kind == NodeKind::Call && n.name() == Some(name))
            .collect()
    }
}
