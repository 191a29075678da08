//! In-memory reference driver.
//!
//! Straightforward adjacency-list store; the correctness oracle every
//! other back-end is measured against.

use std::collections::{BTreeSet, VecDeque};
use std::sync::RwLock;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{CpgError, Result};
use crate::graph::{CpgNode, Subgraph};
use crate::schema::{self, EdgeKind, NodeKind};

use super::{Driver, METHOD_CLOSURE_EDGES};

#[derive(Default)]
struct GraphState {
    nodes: FxHashMap<i64, CpgNode>,
    out_adj: FxHashMap<i64, Vec<(EdgeKind, i64)>>,
    in_adj: FxHashMap<i64, Vec<(EdgeKind, i64)>>,
    by_kind: FxHashMap<NodeKind, FxHashSet<i64>>,
    /// Monotonic allocator, always one past the highest id ever stored.
    next_id: i64,
}

/// Adjacency-list store backed by process memory.
#[derive(Default)]
pub struct MemoryDriver {
    state: RwLock<GraphState>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    // RwLock poisoning means a thread panicked while holding the lock,
    // leaving the store in an unknown state. That is unrecoverable, so
    // these helpers centralise the `.expect()` rather than forcing every
    // caller to thread an error it cannot act on.

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GraphState> {
        self.state
            .read()
            .expect("graph lock poisoned — a thread panicked while holding this lock")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GraphState> {
        self.state
            .write()
            .expect("graph lock poisoned — a thread panicked while holding this lock")
    }

    /// A clone of the stored node, if present.
    pub fn node_by_id(&self, id: i64) -> Option<CpgNode> {
        self.read().nodes.get(&id).cloned()
    }

    /// All edges incident to `id` as `(src, kind, dst)` triples,
    /// dangling entries excluded.
    pub(crate) fn incident_edges(&self, id: i64) -> Vec<(i64, EdgeKind, i64)> {
        let state = self.read();
        let mut edges = Vec::new();
        if let Some(out) = state.out_adj.get(&id) {
            for &(kind, dst) in out {
                if state.nodes.contains_key(&dst) {
                    edges.push((id, kind, dst));
                }
            }
        }
        if let Some(inc) = state.in_adj.get(&id) {
            for &(kind, src) in inc {
                if state.nodes.contains_key(&src) {
                    edges.push((src, kind, id));
                }
            }
        }
        edges
    }

    /// Ids of the method's AST closure (head plus body), if the method
    /// exists.
    pub(crate) fn method_closure(&self, full_name: &str, signature: &str) -> Vec<i64> {
        let state = self.read();
        let Some(root) = find_method(&state, full_name, signature) else {
            return Vec::new();
        };
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([root]);
        visited.insert(root);
        while let Some(id) = queue.pop_front() {
            if let Some(out) = state.out_adj.get(&id) {
                for &(kind, dst) in out {
                    if kind == EdgeKind::Ast
                        && state.nodes.contains_key(&dst)
                        && visited.insert(dst)
                    {
                        queue.push_back(dst);
                    }
                }
            }
        }
        visited.into_iter().collect()
    }

    /// Insert a record verbatim, bypassing id allocation. Used when a
    /// persistent back-end replays its log into the mirror.
    pub(crate) fn insert_raw(&self, node: CpgNode) {
        let mut state = self.write();
        state.next_id = state.next_id.max(node.id + 1);
        state.by_kind.entry(node.kind).or_default().insert(node.id);
        state.nodes.insert(node.id, node);
    }

    /// Insert an edge verbatim; endpoints must already be present.
    pub(crate) fn insert_edge_raw(&self, src: i64, kind: EdgeKind, dst: i64) {
        let mut state = self.write();
        if !has_edge(&state, src, kind, dst) {
            state.out_adj.entry(src).or_default().push((kind, dst));
            state.in_adj.entry(dst).or_default().push((kind, src));
        }
    }

    fn delete_vertex_locked(state: &mut GraphState, id: i64) {
        let Some(node) = state.nodes.remove(&id) else {
            return;
        };
        if let Some(set) = state.by_kind.get_mut(&node.kind) {
            set.remove(&id);
        }
        // Drop this node's own out-edges from the targets' in-lists.
        if let Some(out) = state.out_adj.remove(&id) {
            for (kind, dst) in out {
                if let Some(inc) = state.in_adj.get_mut(&dst) {
                    inc.retain(|&(k, s)| !(k == kind && s == id));
                }
            }
        }
        // Drop references from the sources' out-lists, except inbound
        // CALL edges: those stay dangling so callers keep their
        // call-graph record until the target is re-created.
        if let Some(inc) = state.in_adj.remove(&id) {
            for (kind, src) in inc {
                if kind == EdgeKind::Call {
                    continue;
                }
                if let Some(out) = state.out_adj.get_mut(&src) {
                    out.retain(|&(k, d)| !(k == kind && d == id));
                }
            }
        }
    }

    fn snapshot(state: &GraphState, ids: &FxHashSet<i64>) -> Subgraph {
        let mut view = Subgraph::default();
        for id in ids {
            if let Some(node) = state.nodes.get(id) {
                view.insert_node(node.clone());
            }
        }
        for id in ids {
            if let Some(out) = state.out_adj.get(id) {
                for &(kind, dst) in out {
                    if view.contains(dst) && view.contains(*id) {
                        view.insert_edge(*id, kind, dst);
                    }
                }
            }
        }
        view
    }
}

fn has_edge(state: &GraphState, src: i64, kind: EdgeKind, dst: i64) -> bool {
    state
        .out_adj
        .get(&src)
        .is_some_and(|out| out.contains(&(kind, dst)))
}

fn find_method(state: &GraphState, full_name: &str, signature: &str) -> Option<i64> {
    state
        .by_kind
        .get(&NodeKind::Method)?
        .iter()
        .find(|id| {
            state.nodes.get(id).is_some_and(|n| {
                n.full_name() == Some(full_name) && n.signature() == Some(signature)
            })
        })
        .copied()
}

fn add_vertex_locked(state: &mut GraphState, node: &mut CpgNode) -> i64 {
    if node.is_persisted() {
        if let Some(existing) = state.nodes.get(&node.id) {
            if !existing.same_properties(node) {
                state.nodes.insert(node.id, node.clone());
            }
            return node.id;
        }
        // A persisted handle from another store (or a reload); keep its id.
        state.next_id = state.next_id.max(node.id + 1);
    } else {
        node.id = state.next_id;
        state.next_id += 1;
    }
    state.by_kind.entry(node.kind).or_default().insert(node.id);
    state.nodes.insert(node.id, node.clone());
    node.id
}

/// The builders seed every schema property at construction; this is the
/// driver's defensive second line against hand-built records.
fn check_required_properties(node: &CpgNode) -> Result<()> {
    for descriptor in schema::properties(node.kind) {
        if !node.properties.contains_key(descriptor.name) {
            return Err(CpgError::MissingProperty {
                kind: node.kind.label(),
                property: descriptor.name,
            });
        }
    }
    Ok(())
}

impl Driver for MemoryDriver {
    fn add_vertex(&self, node: &mut CpgNode) -> Result<i64> {
        check_required_properties(node)?;
        let mut state = self.write();
        Ok(add_vertex_locked(&mut state, node))
    }

    fn exists(&self, node: &CpgNode) -> Result<bool> {
        Ok(node.is_persisted() && self.read().nodes.contains_key(&node.id))
    }

    fn edge_exists(&self, src: &CpgNode, dst: &CpgNode, kind: EdgeKind) -> Result<bool> {
        Ok(has_edge(&self.read(), src.id, kind, dst.id))
    }

    fn add_edge(&self, src: &mut CpgNode, dst: &mut CpgNode, kind: EdgeKind) -> Result<()> {
        // Fail closed: the triple is checked before either endpoint is
        // auto-inserted, so an illegal edge leaves no partial state.
        if !schema::is_allowed(src.kind, kind, dst.kind) {
            return Err(CpgError::SchemaViolation {
                src: src.kind.label(),
                edge: kind.label(),
                dst: dst.kind.label(),
            });
        }
        let mut state = self.write();
        if !state.nodes.contains_key(&src.id) {
            check_required_properties(src)?;
            add_vertex_locked(&mut state, src);
        }
        if !state.nodes.contains_key(&dst.id) {
            check_required_properties(dst)?;
            add_vertex_locked(&mut state, dst);
        }
        let (src_id, dst_id) = (src.id, dst.id);
        if !has_edge(&state, src_id, kind, dst_id) {
            state.out_adj.entry(src_id).or_default().push((kind, dst_id));
            state.in_adj.entry(dst_id).or_default().push((kind, src_id));
        }
        Ok(())
    }

    fn delete_vertex(&self, node: &CpgNode) -> Result<()> {
        if !node.is_persisted() {
            return Ok(());
        }
        let mut state = self.write();
        Self::delete_vertex_locked(&mut state, node.id);
        Ok(())
    }

    fn delete_method(&self, full_name: &str, signature: &str) -> Result<()> {
        let closure = self.method_closure(full_name, signature);
        if closure.is_empty() {
            return Ok(());
        }
        debug!(
            method = full_name,
            signature, nodes = closure.len(), "deleting method closure"
        );
        let mut state = self.write();
        for id in closure {
            Self::delete_vertex_locked(&mut state, id);
        }
        Ok(())
    }

    fn get_method(
        &self,
        full_name: &str,
        signature: &str,
        include_body: bool,
    ) -> Result<Subgraph> {
        let state = self.read();
        let Some(root) = find_method(&state, full_name, signature) else {
            return Ok(Subgraph::default());
        };
        let mut selected = FxHashSet::default();
        selected.insert(root);
        if include_body {
            let mut queue = VecDeque::from([root]);
            while let Some(id) = queue.pop_front() {
                if let Some(out) = state.out_adj.get(&id) {
                    for &(kind, dst) in out {
                        if METHOD_CLOSURE_EDGES.contains(&kind)
                            && state.nodes.contains_key(&dst)
                            && selected.insert(dst)
                        {
                            queue.push_back(dst);
                        }
                    }
                }
            }
        } else if let Some(out) = state.out_adj.get(&root) {
            // Head only: the method node plus its signature-level children.
            for &(kind, dst) in out {
                let head_child = state.nodes.get(&dst).is_some_and(|n| {
                    matches!(
                        n.kind,
                        NodeKind::MethodParameterIn | NodeKind::MethodReturn | NodeKind::Modifier
                    )
                });
                if kind == EdgeKind::Ast && head_child {
                    selected.insert(dst);
                }
            }
        }
        Ok(Self::snapshot(&state, &selected))
    }

    fn get_program_structure(&self) -> Result<Subgraph> {
        let state = self.read();
        let mut selected: FxHashSet<i64> = state
            .by_kind
            .get(&NodeKind::File)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        let mut queue: VecDeque<i64> = selected.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if let Some(out) = state.out_adj.get(&id) {
                for &(kind, dst) in out {
                    let is_namespace = state
                        .nodes
                        .get(&dst)
                        .is_some_and(|n| n.kind == NodeKind::NamespaceBlock);
                    if kind == EdgeKind::Ast && is_namespace && selected.insert(dst) {
                        queue.push_back(dst);
                    }
                }
            }
        }
        Ok(Self::snapshot(&state, &selected))
    }

    fn get_neighbours(&self, node: &CpgNode) -> Result<Subgraph> {
        let state = self.read();
        if !state.nodes.contains_key(&node.id) {
            return Ok(Subgraph::default());
        }
        let mut selected = FxHashSet::default();
        selected.insert(node.id);
        if let Some(out) = state.out_adj.get(&node.id) {
            for &(_, dst) in out {
                if state.nodes.contains_key(&dst) {
                    selected.insert(dst);
                }
            }
        }
        if let Some(inc) = state.in_adj.get(&node.id) {
            for &(_, src) in inc {
                if state.nodes.contains_key(&src) {
                    selected.insert(src);
                }
            }
        }
        Ok(Self::snapshot(&state, &selected))
    }

    fn get_whole_graph(&self) -> Result<Subgraph> {
        let state = self.read();
        let all: FxHashSet<i64> = state.nodes.keys().copied().collect();
        Ok(Self::snapshot(&state, &all))
    }

    fn get_vertex_ids(&self, lo: i64, hi: i64) -> Result<BTreeSet<i64>> {
        Ok(self
            .read()
            .nodes
            .keys()
            .copied()
            .filter(|id| (lo..=hi).contains(id))
            .collect())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.write();
        *state = GraphState::default();
        Ok(())
    }
}
