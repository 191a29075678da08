//! CFG threading along the unit-graph successor relation.
//!
//! Statement-level: the root node of each unit's lowering is its CFG
//! representative. The entry block is the single source; the method
//! return is the single sink. Branches flow through their TRUE/FALSE
//! jump targets; gotos are transparent.

use tracing::warn;

use crate::error::Result;
use crate::ir::{IrMethod, UnitGraph};
use crate::schema::EdgeKind;

use super::{LocalId, MethodDelta, UnitLowering};

/// Where control lands when entering a unit.
#[derive(Debug, Clone, Copy)]
enum Entry {
    Node(LocalId),
    MethodReturn,
}

pub(crate) fn build_cfg(delta: &mut MethodDelta, method: &IrMethod) -> Result<()> {
    let graph = method.unit_graph();
    let unit_count = method.units.len();

    let entry = if unit_count == 0 {
        Entry::MethodReturn
    } else {
        resolve(delta, 0, unit_count)
    };
    add_flow(delta, delta.block, entry)?;

    for index in 0..unit_count {
        match delta.units[index] {
            UnitLowering::Transparent { .. } => {}
            UnitLowering::Plain { root } => {
                let successors = graph.successors(index);
                if successors.is_empty() {
                    // Fallthrough off the final unit.
                    add_flow(delta, root, Entry::MethodReturn)?;
                } else {
                    for &succ in successors {
                        let target = resolve(delta, succ, unit_count);
                        add_flow(delta, root, target)?;
                    }
                }
            }
            UnitLowering::Branch {
                root,
                jump_true,
                jump_false,
                then_target,
                else_target,
            } => {
                delta.add_edge(root, EdgeKind::Cfg, jump_true)?;
                delta.add_edge(root, EdgeKind::Cfg, jump_false)?;
                let then_entry = resolve(delta, then_target, unit_count);
                add_flow(delta, jump_true, then_entry)?;
                let else_entry = resolve(delta, else_target, unit_count);
                add_flow(delta, jump_false, else_entry)?;
            }
            UnitLowering::Return { root } => {
                delta.add_edge(root, EdgeKind::Cfg, delta.method_return)?;
            }
        }
    }
    Ok(())
}

fn add_flow(delta: &mut MethodDelta, from: LocalId, to: Entry) -> Result<()> {
    match to {
        Entry::Node(node) => delta.add_edge(from, EdgeKind::Cfg, node),
        Entry::MethodReturn => delta.add_edge(from, EdgeKind::Cfg, delta.method_return),
    }
}

/// Follow transparent units (gotos) to the first unit that emitted a
/// node; the association map yields the first node emitted for it, the
/// unit's CFG representative. Running off the end of the body, or a
/// degenerate goto cycle, resolves to the method return.
fn resolve(delta: &MethodDelta, start: usize, unit_count: usize) -> Entry {
    let mut index = start;
    let mut steps = 0usize;
    loop {
        if index >= unit_count {
            return Entry::MethodReturn;
        }
        if steps > unit_count {
            warn!(unit = start, "goto cycle with no executable unit");
            return Entry::MethodReturn;
        }
        match delta.units[index] {
            UnitLowering::Transparent { target } => {
                index = target;
                steps += 1;
            }
            _ => {
                return match delta.assoc.first(index) {
                    Some(node) => Entry::Node(node),
                    None => Entry::MethodReturn,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::build_method;
    use super::*;
    use crate::ir::{IrBinOp, IrClass, IrExpr, IrLocal, IrOp, IrUnit};
    use crate::schema::NodeKind;

    fn local(name: &str) -> IrExpr {
        IrExpr::Local {
            name: name.to_string(),
            type_full_name: "int".to_string(),
        }
    }

    fn build(units: Vec<IrUnit>) -> MethodDelta {
        let class = IrClass {
            name: "C".to_string(),
            package: vec![],
            file_name: "C.java".to_string(),
            super_class: None,
            interfaces: vec![],
            type_parameters: vec![],
            fields: vec![],
            methods: vec![],
        };
        let method = crate::ir::IrMethod {
            name: "m".to_string(),
            signature: "void()".to_string(),
            return_type: "void".to_string(),
            modifiers: vec![],
            parameters: vec![],
            locals: vec![
                IrLocal { name: "a".to_string(), type_full_name: "int".to_string() },
                IrLocal { name: "b".to_string(), type_full_name: "int".to_string() },
            ],
            units,
            line_number: 1,
            column_number: -1,
        };
        let mut delta = build_method(&class, &method, 1).expect("ast");
        build_cfg(&mut delta, &method).expect("cfg");
        delta
    }

    fn cfg_edges(delta: &MethodDelta) -> Vec<(LocalId, LocalId)> {
        delta
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Cfg)
            .map(|e| (e.src, e.dst))
            .collect()
    }

    #[test]
    fn test_straight_line_flow() {
        let delta = build(vec![
            IrUnit::new(IrOp::Assign { target: local("a"), value: local("b") }),
            IrUnit::new(IrOp::Return { value: None }),
        ]);
        let edges = cfg_edges(&delta);
        // block -> assign -> return -> method return
        assert_eq!(edges.len(), 3);
        assert!(edges.iter().any(|&(src, _)| src == delta.block));
        assert!(edges.iter().any(|&(_, dst)| dst == delta.method_return));

        // The entry block has no incoming CFG edge.
        assert!(edges.iter().all(|&(_, dst)| dst != delta.block));
        // The method return has no outgoing CFG edge.
        assert!(edges.iter().all(|&(src, _)| src != delta.method_return));
    }

    #[test]
    fn test_branch_flows_through_jump_targets() {
        let delta = build(vec![
            IrUnit::new(IrOp::If {
                condition: IrExpr::Binary {
                    op: IrBinOp::Gt,
                    left: Box::new(local("a")),
                    right: Box::new(local("b")),
                },
                then_target: 1,
                else_target: 3,
            }),
            IrUnit::new(IrOp::Assign { target: local("a"), value: local("b") }),
            IrUnit::new(IrOp::Goto { target: 4 }),
            IrUnit::new(IrOp::Assign { target: local("b"), value: local("a") }),
            IrUnit::new(IrOp::Return { value: None }),
        ]);

        let cs = delta
            .nodes
            .iter()
            .position(|n| n.kind == NodeKind::ControlStructure)
            .expect("control structure");
        let outgoing: Vec<LocalId> = cfg_edges(&delta)
            .into_iter()
            .filter(|&(src, _)| src == cs)
            .map(|(_, dst)| dst)
            .collect();
        assert_eq!(outgoing.len(), 2);
        for dst in outgoing {
            assert_eq!(delta.node(dst).kind, NodeKind::JumpTarget);
        }

        // The goto is transparent: the then-branch assignment flows
        // straight to the return statement.
        let return_stmt = delta
            .nodes
            .iter()
            .position(|n| n.kind == NodeKind::Return)
            .expect("return");
        let then_assign = match delta.units[1] {
            UnitLowering::Plain { root } => root,
            _ => panic!("expected plain lowering"),
        };
        assert!(cfg_edges(&delta).contains(&(then_assign, return_stmt)));
    }

    #[test]
    fn test_empty_body_flows_block_to_return() {
        let delta = build(vec![]);
        assert_eq!(cfg_edges(&delta), vec![(delta.block, delta.method_return)]);
    }
}
