//! AST lowering: one method's units into CPG nodes.
//!
//! Emits the method head (parameters, entry block, method return,
//! modifiers), then lowers every unit in control-flow order under the
//! entry block. Child orders are assigned pre-order left-to-right;
//! `argumentIndex` mirrors the argument position for call operands and
//! equals `order` everywhere else.

use crate::error::Result;
use crate::graph::CpgNode;
use crate::ir::{
    evaluation_strategy_for, IrClass, IrExpr, IrInvoke, IrMethod, IrOp, IrUnit,
};
use crate::schema::{values, EdgeKind, NodeKind};

use super::{CallRecord, LocalId, MethodDelta, UnitLowering};

/// Name of the synthetic assignment operator call.
pub(crate) const ASSIGNMENT_OPERATOR: &str = "<operator>.assignment";

/// Lower `method` of `class` into a fresh staging buffer.
///
/// `method_order` is the method's sibling index under its type
/// declaration.
pub(crate) fn build_method(
    class: &IrClass,
    method: &IrMethod,
    method_order: i64,
) -> Result<MethodDelta> {
    let mut delta = MethodDelta::default();
    let full_name = method.full_name(class);

    let method_node = CpgNode::method(&method.name, &full_name, &method.signature)
        .with_filename(&class.file_name)
        .with_ast_parent(&class.full_name(), values::PARENT_TYPE_DECL)
        .with_line_number(method.line_number)
        .with_column_number(method.column_number)
        .with_order(method_order);
    delta.method = delta.add_node(method_node);

    // Parameters occupy orders 1..p, so the entry block lands at p+1 and
    // the method return at p+2; sibling orders stay dense for any arity.
    let param_count = method.parameters.len() as i64;
    for (index, param) in method.parameters.iter().enumerate() {
        let node = CpgNode::new(NodeKind::MethodParameterIn)
            .with_name(&param.name)
            .with_code(&format!("{} {}", param.type_full_name, param.name))
            .with_type_full_name(&param.type_full_name)
            .with_evaluation_strategy(evaluation_strategy_for(&param.type_full_name))
            .with_line_number(method.line_number)
            .with_order(index as i64 + 1);
        let id = delta.add_node(node);
        delta.add_edge(delta.method, EdgeKind::Ast, id)?;
        delta.params.insert(param.name.clone(), id);
    }

    let block = CpgNode::new(NodeKind::Block)
        .with_type_full_name("void")
        .with_code("{}")
        .with_line_number(method.line_number)
        .with_order(param_count + 1)
        .with_argument_index(0);
    delta.block = delta.add_node(block);
    delta.add_edge(delta.method, EdgeKind::Ast, delta.block)?;

    // Returns always evaluate by reference.
    let method_return = CpgNode::new(NodeKind::MethodReturn)
        .with_code(&method.return_type)
        .with_type_full_name(&method.return_type)
        .with_evaluation_strategy(values::BY_REFERENCE)
        .with_line_number(method.line_number)
        .with_order(param_count + 2);
    delta.method_return = delta.add_node(method_return);
    delta.add_edge(delta.method, EdgeKind::Ast, delta.method_return)?;

    for (index, modifier) in method.modifiers.iter().enumerate() {
        let node = CpgNode::new(NodeKind::Modifier)
            .with_modifier_type(modifier.label())
            .with_order(param_count + 3 + index as i64);
        let id = delta.add_node(node);
        delta.add_edge(delta.method, EdgeKind::Ast, id)?;
    }

    // Locals are the leading children of the entry block.
    let mut block_order = 1i64;
    for local in &method.locals {
        let node = CpgNode::new(NodeKind::Local)
            .with_name(&local.name)
            .with_code(&format!("{} {}", local.type_full_name, local.name))
            .with_type_full_name(&local.type_full_name)
            .with_order(block_order);
        let id = delta.add_node(node);
        delta.add_edge(delta.block, EdgeKind::Ast, id)?;
        delta.locals.insert(local.name.clone(), id);
        block_order += 1;
    }

    for (index, unit) in method.units.iter().enumerate() {
        let lowering = lower_unit(&mut delta, unit, index, &mut block_order)?;
        delta.units.push(lowering);
    }

    Ok(delta)
}

fn lower_unit(
    delta: &mut MethodDelta,
    unit: &IrUnit,
    index: usize,
    block_order: &mut i64,
) -> Result<UnitLowering> {
    let order = *block_order;
    let (line, column) = (unit.line_number, unit.column_number);
    match &unit.op {
        IrOp::Goto { target } => return Ok(UnitLowering::Transparent { target: *target }),
        IrOp::Assign { target, value } => {
            let code = format!("{} = {}", target.code(), value.code());
            let node = CpgNode::new(NodeKind::Call)
                .with_name(ASSIGNMENT_OPERATOR)
                .with_method_full_name(ASSIGNMENT_OPERATOR)
                .with_type_full_name(expr_type(target))
                .with_code(&code)
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(order);
            let root = delta.add_node(node);
            delta.add_edge(delta.block, EdgeKind::Ast, root)?;
            delta.assoc.record(index, root);
            let record = delta.calls.len();
            delta.calls.push(CallRecord {
                node: root,
                receiver: None,
                args: Vec::new(),
                linkable: false,
            });
            let lhs = lower_expr(delta, target, root, 1, 1, line, column, index)?;
            let rhs = lower_expr(delta, value, root, 2, 2, line, column, index)?;
            delta.calls[record].args = vec![lhs, rhs];
            *block_order += 1;
            Ok(UnitLowering::Plain { root })
        }
        IrOp::If {
            condition,
            then_target,
            else_target,
        } => {
            let node = CpgNode::new(NodeKind::ControlStructure)
                .with_code("IF")
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(order);
            let root = delta.add_node(node);
            delta.add_edge(delta.block, EdgeKind::Ast, root)?;
            delta.assoc.record(index, root);
            let cond = lower_expr(delta, condition, root, 1, 1, line, column, index)?;
            delta.add_edge(root, EdgeKind::Condition, cond)?;
            let jump_true = jump_target(delta, root, "TRUE", 2, line, column, index)?;
            let jump_false = jump_target(delta, root, "FALSE", 3, line, column, index)?;
            *block_order += 1;
            Ok(UnitLowering::Branch {
                root,
                jump_true,
                jump_false,
                then_target: *then_target,
                else_target: *else_target,
            })
        }
        IrOp::Invoke(invoke) => {
            let root = lower_invoke(delta, invoke, delta.block, order, order, line, column, index)?;
            *block_order += 1;
            Ok(UnitLowering::Plain { root })
        }
        IrOp::Return { value } => {
            let code = match value {
                Some(value) => format!("return {}", value.code()),
                None => "return".to_string(),
            };
            let node = CpgNode::new(NodeKind::Return)
                .with_code(&code)
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(order);
            let root = delta.add_node(node);
            delta.add_edge(delta.block, EdgeKind::Ast, root)?;
            delta.assoc.record(index, root);
            if let Some(value) = value {
                lower_expr(delta, value, root, 1, 1, line, column, index)?;
            }
            *block_order += 1;
            Ok(UnitLowering::Return { root })
        }
    }
}

fn jump_target(
    delta: &mut MethodDelta,
    parent: LocalId,
    name: &str,
    order: i64,
    line: i64,
    column: i64,
    unit: usize,
) -> Result<LocalId> {
    let node = CpgNode::new(NodeKind::JumpTarget)
        .with_name(name)
        .with_code(name)
        .with_line_number(line)
        .with_column_number(column)
        .with_order(order)
        .with_argument_index(order);
    let id = delta.add_node(node);
    delta.add_edge(parent, EdgeKind::Ast, id)?;
    delta.assoc.record(unit, id);
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
fn lower_expr(
    delta: &mut MethodDelta,
    expr: &IrExpr,
    parent: LocalId,
    order: i64,
    arg_index: i64,
    line: i64,
    column: i64,
    unit: usize,
) -> Result<LocalId> {
    let id = match expr {
        IrExpr::Local {
            name,
            type_full_name,
        } => {
            let node = CpgNode::new(NodeKind::Identifier)
                .with_name(name)
                .with_code(name)
                .with_type_full_name(type_full_name)
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            delta.identifiers.push((id, name.clone()));
            id
        }
        IrExpr::Constant {
            value,
            type_full_name,
        } => {
            let node = CpgNode::new(NodeKind::Literal)
                .with_code(value)
                .with_type_full_name(type_full_name)
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            id
        }
        IrExpr::Binary { op, left, right } => {
            // Side-effect-free binary operators become operator calls
            // with two AST + ARGUMENT children.
            let node = CpgNode::new(NodeKind::Call)
                .with_name(op.call_name())
                .with_method_full_name(op.call_name())
                .with_type_full_name(expr_type(expr))
                .with_code(&expr.code())
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            let record = delta.calls.len();
            delta.calls.push(CallRecord {
                node: id,
                receiver: None,
                args: Vec::new(),
                linkable: false,
            });
            let lhs = lower_expr(delta, left, id, 1, 1, line, column, unit)?;
            let rhs = lower_expr(delta, right, id, 2, 2, line, column, unit)?;
            delta.calls[record].args = vec![lhs, rhs];
            id
        }
        IrExpr::Field {
            owner,
            name,
            base,
            ..
        } => {
            let node = CpgNode::new(NodeKind::FieldIdentifier)
                .with_canonical_name(name)
                .with_code(&expr.code())
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            delta.field_refs.push((id, owner.clone(), name.clone()));
            if let Some(base) = base {
                lower_expr(delta, base, id, 1, 1, line, column, unit)?;
            }
            id
        }
        IrExpr::New { type_full_name } => {
            let node = CpgNode::new(NodeKind::TypeRef)
                .with_type_full_name(type_full_name)
                .with_code(&expr.code())
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            id
        }
        IrExpr::ArrayInit {
            type_full_name,
            elements,
        } => {
            let node = CpgNode::new(NodeKind::ArrayInitializer)
                .with_type_full_name(type_full_name)
                .with_code(&expr.code())
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            for (i, element) in elements.iter().enumerate() {
                let child_order = i as i64 + 1;
                lower_expr(delta, element, id, child_order, child_order, line, column, unit)?;
            }
            id
        }
        IrExpr::MethodRef {
            method_full_name,
            type_full_name,
        } => {
            let node = CpgNode::new(NodeKind::MethodRef)
                .with_method_full_name(method_full_name)
                .with_type_full_name(type_full_name)
                .with_code(&expr.code())
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            id
        }
        IrExpr::Invoke(invoke) => {
            lower_invoke(delta, invoke, parent, order, arg_index, line, column, unit)?
        }
        IrExpr::Opaque { code } => {
            let node = CpgNode::new(NodeKind::Unknown)
                .with_code(code)
                .with_line_number(line)
                .with_column_number(column)
                .with_order(order)
                .with_argument_index(arg_index);
            let id = delta.add_node(node);
            delta.add_edge(parent, EdgeKind::Ast, id)?;
            id
        }
    };
    delta.assoc.record(unit, id);
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
fn lower_invoke(
    delta: &mut MethodDelta,
    invoke: &IrInvoke,
    parent: LocalId,
    order: i64,
    arg_index: i64,
    line: i64,
    column: i64,
    unit: usize,
) -> Result<LocalId> {
    let node = CpgNode::new(NodeKind::Call)
        .with_name(&invoke.name)
        .with_method_full_name(&invoke.method_full_name())
        .with_signature(&invoke.signature)
        .with_dispatch_type(invoke.dispatch.label())
        .with_type_full_name(&invoke.return_type)
        .with_code(&invoke.code())
        .with_line_number(line)
        .with_column_number(column)
        .with_order(order)
        .with_argument_index(arg_index);
    let id = delta.add_node(node);
    delta.add_edge(parent, EdgeKind::Ast, id)?;
    delta.assoc.record(unit, id);

    // Record in pre-order: this call before anything nested inside it,
    // so site ordinals line up with the oracle's traversal.
    let record = delta.calls.len();
    delta.calls.push(CallRecord {
        node: id,
        receiver: None,
        args: Vec::new(),
        linkable: true,
    });

    let mut receiver = None;
    let mut next_order = 1i64;
    if let Some(expr) = &invoke.receiver {
        receiver = Some(lower_expr(delta, expr, id, next_order, 0, line, column, unit)?);
        next_order += 1;
    }
    let mut args = Vec::with_capacity(invoke.args.len());
    for (i, arg) in invoke.args.iter().enumerate() {
        let position = i as i64 + 1;
        args.push(lower_expr(delta, arg, id, next_order, position, line, column, unit)?);
        next_order += 1;
    }
    delta.calls[record].receiver = receiver;
    delta.calls[record].args = args;
    Ok(id)
}

/// Result type of an expression, used for `typeFullName` on operator
/// calls. Comparisons are boolean; arithmetic follows the left operand.
fn expr_type(expr: &IrExpr) -> &str {
    match expr {
        IrExpr::Local { type_full_name, .. }
        | IrExpr::Constant { type_full_name, .. }
        | IrExpr::Field { type_full_name, .. }
        | IrExpr::New { type_full_name }
        | IrExpr::ArrayInit { type_full_name, .. }
        | IrExpr::MethodRef { type_full_name, .. } => type_full_name,
        IrExpr::Binary { op, left, .. } => {
            use crate::ir::IrBinOp::*;
            if matches!(op, Gt | Ge | Eq | Ne | Lt | Le) {
                "boolean"
            } else {
                expr_type(left)
            }
        }
        IrExpr::Invoke(invoke) => &invoke.return_type,
        IrExpr::Opaque { .. } => "null",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Dispatch, IrBinOp, IrLocal, IrModifier, IrParameter};
    use crate::schema::keys;

    fn local(name: &str) -> IrExpr {
        IrExpr::Local {
            name: name.to_string(),
            type_full_name: "int".to_string(),
        }
    }

    fn test_class() -> IrClass {
        IrClass {
            name: "Conditional1".to_string(),
            package: vec![],
            file_name: "Conditional1.java".to_string(),
            super_class: None,
            interfaces: vec![],
            type_parameters: vec![],
            fields: vec![],
            methods: vec![],
        }
    }

    fn main_method(units: Vec<IrUnit>) -> IrMethod {
        IrMethod {
            name: "main".to_string(),
            signature: "void(java.lang.String[])".to_string(),
            return_type: "void".to_string(),
            modifiers: vec![IrModifier::Public, IrModifier::Static],
            parameters: vec![IrParameter {
                name: "args".to_string(),
                type_full_name: "java.lang.String[]".to_string(),
            }],
            locals: vec![
                IrLocal { name: "a".to_string(), type_full_name: "int".to_string() },
                IrLocal { name: "b".to_string(), type_full_name: "int".to_string() },
            ],
            units,
            line_number: 2,
            column_number: 4,
        }
    }

    #[test]
    fn test_method_head_shape() {
        let class = test_class();
        let method = main_method(vec![IrUnit::new(IrOp::Return { value: None })]);
        let delta = build_method(&class, &method, 1).expect("build");

        let method_node = delta.node(delta.method);
        assert_eq!(method_node.full_name(), Some("Conditional1.main"));
        assert_eq!(
            method_node.str_prop(keys::AST_PARENT_TYPE),
            Some(values::PARENT_TYPE_DECL)
        );

        // One parameter, so the entry block sits at order 2.
        let block = delta.node(delta.block);
        assert_eq!(block.order(), 2);
        assert_eq!(block.argument_index(), 0);
        let ret = delta.node(delta.method_return);
        assert_eq!(ret.order(), 3);
        assert_eq!(ret.str_prop(keys::EVALUATION_STRATEGY), Some(values::BY_REFERENCE));

        let param = &delta.nodes[delta.params["args"]];
        assert_eq!(param.order(), 1);
        assert_eq!(
            param.str_prop(keys::EVALUATION_STRATEGY),
            Some(values::BY_REFERENCE)
        );

        let modifiers: Vec<_> = delta
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Modifier)
            .collect();
        assert_eq!(modifiers.len(), 2);
        assert_eq!(modifiers[0].order(), 4);
        assert_eq!(modifiers[1].order(), 5);
    }

    #[test]
    fn test_primitive_parameter_evaluates_by_value() {
        let class = test_class();
        let mut method = main_method(vec![IrUnit::new(IrOp::Return { value: None })]);
        method.parameters = vec![IrParameter {
            name: "n".to_string(),
            type_full_name: "int".to_string(),
        }];
        let delta = build_method(&class, &method, 1).expect("build");
        let param = &delta.nodes[delta.params["n"]];
        assert_eq!(param.str_prop(keys::EVALUATION_STRATEGY), Some(values::BY_VALUE));
    }

    #[test]
    fn test_assignment_lowering() {
        let class = test_class();
        let method = main_method(vec![
            IrUnit::new(IrOp::Assign {
                target: local("a"),
                value: IrExpr::Binary {
                    op: IrBinOp::Add,
                    left: Box::new(local("a")),
                    right: Box::new(local("b")),
                },
            }),
            IrUnit::new(IrOp::Return { value: None }),
        ]);
        let delta = build_method(&class, &method, 1).expect("build");

        let assign = delta
            .nodes
            .iter()
            .find(|n| n.name() == Some(ASSIGNMENT_OPERATOR))
            .expect("assignment call");
        assert_eq!(assign.code(), Some("a = a + b"));
        // Two locals precede the statement under the block.
        assert_eq!(assign.order(), 3);

        let add = delta.nodes.iter().find(|n| n.name() == Some("ADD")).expect("add call");
        assert_eq!(add.kind, NodeKind::Call);
        assert_eq!(add.order(), 2);
        assert_eq!(add.argument_index(), 2);
        assert_eq!(add.str_prop(keys::TYPE_FULL_NAME), Some("int"));

        // Identifiers recorded for the PDG pass: a, a, b.
        assert_eq!(delta.identifiers.len(), 3);
    }

    #[test]
    fn test_if_lowering_produces_condition_and_jump_targets() {
        let class = test_class();
        let method = main_method(vec![
            IrUnit::new(IrOp::If {
                condition: IrExpr::Binary {
                    op: IrBinOp::Gt,
                    left: Box::new(local("a")),
                    right: Box::new(local("b")),
                },
                then_target: 1,
                else_target: 2,
            }),
            IrUnit::new(IrOp::Assign { target: local("a"), value: local("b") }),
            IrUnit::new(IrOp::Return { value: None }),
        ]);
        let delta = build_method(&class, &method, 1).expect("build");

        let cs = delta
            .nodes
            .iter()
            .position(|n| n.kind == NodeKind::ControlStructure)
            .expect("control structure");
        assert_eq!(delta.node(cs).code(), Some("IF"));

        let condition_edges: Vec<_> = delta
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Condition)
            .collect();
        assert_eq!(condition_edges.len(), 1);
        assert_eq!(condition_edges[0].src, cs);
        assert_eq!(delta.node(condition_edges[0].dst).name(), Some("GT"));

        let targets: Vec<_> = delta
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::JumpTarget)
            .collect();
        assert_eq!(targets.len(), 2);
        let names: Vec<_> = targets.iter().filter_map(|n| n.name()).collect();
        assert!(names.contains(&"TRUE") && names.contains(&"FALSE"));
    }

    #[test]
    fn test_invoke_lowering_records_receiver_and_args() {
        let class = test_class();
        let invoke = IrInvoke {
            name: "println".to_string(),
            owner: "java.io.PrintStream".to_string(),
            signature: "void(int)".to_string(),
            return_type: "void".to_string(),
            dispatch: Dispatch::Dynamic,
            receiver: Some(local("out")),
            args: vec![local("a")],
        };
        let method = main_method(vec![
            IrUnit::new(IrOp::Invoke(invoke)),
            IrUnit::new(IrOp::Return { value: None }),
        ]);
        let delta = build_method(&class, &method, 1).expect("build");

        let record = delta.calls.iter().find(|c| c.linkable).expect("call record");
        let receiver = record.receiver.expect("receiver");
        assert_eq!(delta.node(receiver).argument_index(), 0);
        assert_eq!(delta.node(receiver).order(), 1);
        assert_eq!(record.args.len(), 1);
        assert_eq!(delta.node(record.args[0]).argument_index(), 1);
        assert_eq!(delta.node(record.args[0]).order(), 2);
        assert_eq!(
            delta.node(record.node).str_prop(keys::DISPATCH_TYPE),
            Some(values::DYNAMIC_DISPATCH)
        );
        assert_eq!(delta.call_sites(), vec![record.node]);
    }

    #[test]
    fn test_block_sibling_orders_are_dense() {
        let class = test_class();
        let method = main_method(vec![
            IrUnit::new(IrOp::Assign { target: local("a"), value: local("b") }),
            IrUnit::new(IrOp::Assign { target: local("b"), value: local("a") }),
            IrUnit::new(IrOp::Return { value: None }),
        ]);
        let delta = build_method(&class, &method, 1).expect("build");

        let mut orders: Vec<i64> = delta
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Ast && e.src == delta.block)
            .map(|e| delta.node(e.dst).order())
            .collect();
        orders.sort_unstable();
        // 2 locals + 3 statements.
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
    }
}
