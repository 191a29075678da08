//! Intraprocedural def/use and argument wiring.
//!
//! Every identifier gets a REF edge to the local or parameter it names;
//! every staged call gets one ARGUMENT edge per operand and, for
//! instance dispatch, a RECEIVER edge. Field references resolve to
//! MEMBER nodes later, once every class of the run has merged.

use tracing::debug;

use crate::error::Result;
use crate::schema::EdgeKind;

use super::MethodDelta;

pub(crate) fn build_pdg(delta: &mut MethodDelta) -> Result<()> {
    let identifiers = std::mem::take(&mut delta.identifiers);
    for &(node, ref name) in &identifiers {
        let target = delta
            .locals
            .get(name)
            .or_else(|| delta.params.get(name))
            .copied();
        match target {
            Some(target) => delta.add_edge(node, EdgeKind::Ref, target)?,
            // A use of something the method never declared; the lifter
            // models statics as field refs, so this is unexpected.
            None => debug!(variable = %name, "identifier without a matching declaration"),
        }
    }
    delta.identifiers = identifiers;

    let calls = delta.calls.clone();
    for record in &calls {
        for &arg in &record.args {
            delta.add_edge(record.node, EdgeKind::Argument, arg)?;
        }
        if let Some(receiver) = record.receiver {
            delta.add_edge(record.node, EdgeKind::Receiver, receiver)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::build_method;
    use super::*;
    use crate::ir::{
        Dispatch, IrClass, IrExpr, IrInvoke, IrLocal, IrMethod, IrOp, IrParameter, IrUnit,
    };
    use crate::schema::NodeKind;

    fn local(name: &str) -> IrExpr {
        IrExpr::Local {
            name: name.to_string(),
            type_full_name: "int".to_string(),
        }
    }

    fn build(method: IrMethod) -> MethodDelta {
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
        let mut delta = build_method(&class, &method, 1).expect("ast");
        build_pdg(&mut delta).expect("pdg");
        delta
    }

    fn method_with(units: Vec<IrUnit>) -> IrMethod {
        IrMethod {
            name: "m".to_string(),
            signature: "void(int)".to_string(),
            return_type: "void".to_string(),
            modifiers: vec![],
            parameters: vec![IrParameter {
                name: "p".to_string(),
                type_full_name: "int".to_string(),
            }],
            locals: vec![IrLocal {
                name: "a".to_string(),
                type_full_name: "int".to_string(),
            }],
            units,
            line_number: 1,
            column_number: -1,
        }
    }

    #[test]
    fn test_ref_edges_resolve_locals_and_parameters() {
        let delta = build(method_with(vec![
            IrUnit::new(IrOp::Assign { target: local("a"), value: local("p") }),
            IrUnit::new(IrOp::Return { value: None }),
        ]));

        let refs: Vec<_> = delta
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Ref)
            .collect();
        assert_eq!(refs.len(), 2);

        for edge in refs {
            let src = delta.node(edge.src);
            let dst = delta.node(edge.dst);
            assert_eq!(src.kind, NodeKind::Identifier);
            // Each identifier refers to exactly the declaration it names.
            assert_eq!(src.name(), dst.name());
            match src.name() {
                Some("a") => assert_eq!(dst.kind, NodeKind::Local),
                Some("p") => assert_eq!(dst.kind, NodeKind::MethodParameterIn),
                other => panic!("unexpected identifier {other:?}"),
            }
        }
    }

    #[test]
    fn test_argument_and_receiver_edges() {
        let invoke = IrInvoke {
            name: "f".to_string(),
            owner: "C".to_string(),
            signature: "void(int)".to_string(),
            return_type: "void".to_string(),
            dispatch: Dispatch::Dynamic,
            receiver: Some(local("a")),
            args: vec![local("p")],
        };
        let delta = build(method_with(vec![
            IrUnit::new(IrOp::Invoke(invoke)),
            IrUnit::new(IrOp::Return { value: None }),
        ]));

        let call = delta
            .nodes
            .iter()
            .position(|n| n.kind == NodeKind::Call)
            .expect("call");
        let arguments: Vec<_> = delta
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Argument && e.src == call)
            .collect();
        assert_eq!(arguments.len(), 1);
        assert_eq!(delta.node(arguments[0].dst).argument_index(), 1);

        let receivers: Vec<_> = delta
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Receiver && e.src == call)
            .collect();
        assert_eq!(receivers.len(), 1);
        assert_eq!(delta.node(receivers[0].dst).argument_index(), 0);
    }

    #[test]
    fn test_operator_calls_get_argument_edges() {
        let delta = build(method_with(vec![
            IrUnit::new(IrOp::Assign { target: local("a"), value: local("p") }),
            IrUnit::new(IrOp::Return { value: None }),
        ]));
        let assign = delta
            .nodes
            .iter()
            .position(|n| n.kind == NodeKind::Call)
            .expect("assignment call");
        let argument_count = delta
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Argument && e.src == assign)
            .count();
        assert_eq!(argument_count, 2);
    }
}
