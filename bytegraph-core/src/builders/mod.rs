//! Per-method CPG builders.
//!
//! A method is lowered into a [`MethodDelta`] staging buffer in three
//! passes (AST, then CFG, then PDG). Nothing touches a driver until the
//! whole delta is legal, so a schema violation rolls back by simply
//! dropping the buffer. The association map records which nodes each IR
//! unit produced, in emission order, for the later passes.

mod ast;
mod calls;
mod cfg;
mod pdg;

pub use calls::{CallGraphOracle, CallTarget, ChaOracle};

pub(crate) use ast::build_method;
pub(crate) use cfg::build_cfg;
pub(crate) use pdg::build_pdg;

use rustc_hash::FxHashMap;

use crate::error::{CpgError, Result};
use crate::graph::CpgNode;
use crate::schema::{self, EdgeKind};

/// Index of a node inside one staging buffer.
pub(crate) type LocalId = usize;

/// One staged edge; endpoints are buffer-local indices.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeltaEdge {
    pub src: LocalId,
    pub kind: EdgeKind,
    pub dst: LocalId,
}

/// IR-unit → emitted-node association for one extraction of one method.
/// Entries are appended in emission order; a lookup returns the full list
/// so callers can pick the first, the last, or a typed subset.
#[derive(Debug, Default)]
pub(crate) struct Association {
    units: Vec<Vec<LocalId>>,
}

impl Association {
    pub fn record(&mut self, unit: usize, node: LocalId) {
        if self.units.len() <= unit {
            self.units.resize_with(unit + 1, Vec::new);
        }
        self.units[unit].push(node);
    }

    pub fn nodes(&self, unit: usize) -> &[LocalId] {
        self.units.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, unit: usize) -> Option<LocalId> {
        self.nodes(unit).first().copied()
    }
}

/// How one IR unit lowered, as seen by the CFG pass.
#[derive(Debug, Clone, Copy)]
pub(crate) enum UnitLowering {
    /// A goto: no node of its own, flow resolves through to `target`.
    Transparent { target: usize },
    Plain {
        root: LocalId,
    },
    Branch {
        root: LocalId,
        jump_true: LocalId,
        jump_false: LocalId,
        then_target: usize,
        else_target: usize,
    },
    Return {
        root: LocalId,
    },
}

/// A staged call node with its operand nodes. `linkable` marks real call
/// sites (operator calls never reach the call-graph builder).
#[derive(Debug, Clone)]
pub(crate) struct CallRecord {
    pub node: LocalId,
    pub receiver: Option<LocalId>,
    pub args: Vec<LocalId>,
    pub linkable: bool,
}

/// Staging buffer for one method's sub-CPG.
#[derive(Debug, Default)]
pub struct MethodDelta {
    pub(crate) nodes: Vec<CpgNode>,
    pub(crate) edges: Vec<DeltaEdge>,
    /// Buffer indices of the method head trio. The AST pass stages the
    /// METHOD node first, so `method` is always 0 once built.
    pub(crate) method: LocalId,
    pub(crate) block: LocalId,
    pub(crate) method_return: LocalId,
    pub(crate) locals: FxHashMap<String, LocalId>,
    pub(crate) params: FxHashMap<String, LocalId>,
    /// `(identifier node, variable name)` pairs awaiting REF edges.
    pub(crate) identifiers: Vec<(LocalId, String)>,
    /// `(field-identifier node, owner full name, field name)` awaiting
    /// member resolution after all classes have merged.
    pub(crate) field_refs: Vec<(LocalId, String, String)>,
    /// Call records in emission (pre-)order.
    pub(crate) calls: Vec<CallRecord>,
    pub(crate) units: Vec<UnitLowering>,
    pub(crate) assoc: Association,
}

impl MethodDelta {
    pub(crate) fn add_node(&mut self, node: CpgNode) -> LocalId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Stage an edge, checking the schema first. The whole delta is
    /// discarded on failure, which is the rollback.
    pub(crate) fn add_edge(&mut self, src: LocalId, kind: EdgeKind, dst: LocalId) -> Result<()> {
        let src_kind = self.nodes[src].kind;
        let dst_kind = self.nodes[dst].kind;
        if !schema::is_allowed(src_kind, kind, dst_kind) {
            return Err(CpgError::SchemaViolation {
                src: src_kind.label(),
                edge: kind.label(),
                dst: dst_kind.label(),
            });
        }
        self.edges.push(DeltaEdge { src, kind, dst });
        Ok(())
    }

    pub(crate) fn node(&self, id: LocalId) -> &CpgNode {
        &self.nodes[id]
    }

    /// Call-site nodes in pre-order, matching the oracle's site ordinals.
    pub(crate) fn call_sites(&self) -> Vec<LocalId> {
        self.calls
            .iter()
            .filter(|record| record.linkable)
            .map(|record| record.node)
            .collect()
    }
}
