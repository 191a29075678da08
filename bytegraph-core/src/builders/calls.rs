//! Call-graph resolution.
//!
//! The builder side only needs an oracle mapping a method to its outgoing
//! call edges; which analysis backs the oracle is a configuration
//! decision. The built-in oracle is class-hierarchy analysis over the
//! loaded IR; a points-to oracle can be registered by the embedder.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{Dispatch, IrProgram};

/// One resolved outgoing call edge.
///
/// `site` is the ordinal of the call site within the method's canonical
/// pre-order invoke sequence; the AST builder emits CALL nodes in the
/// same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub site: usize,
    pub full_name: String,
    pub signature: String,
}

/// The call-graph oracle the linker consumes.
pub trait CallGraphOracle: Send + Sync {
    fn out_edges(&self, method_full_name: &str, signature: &str) -> Vec<CallTarget>;
}

#[derive(Debug, Clone)]
struct SiteInfo {
    owner: String,
    name: String,
    signature: String,
    dispatch: Dispatch,
}

/// Class-hierarchy analysis over one loaded program.
///
/// Static and special dispatch resolve to the declaring class (walking
/// up the superclass chain); virtual dispatch additionally yields every
/// subclass override as a possible target.
pub struct ChaOracle {
    /// Declared `(name, signature)` pairs per class full name.
    declared: FxHashMap<String, FxHashSet<(String, String)>>,
    supers: FxHashMap<String, Option<String>>,
    subclasses: FxHashMap<String, Vec<String>>,
    /// Call sites per `(method full name, signature)`, in pre-order.
    sites: FxHashMap<(String, String), Vec<SiteInfo>>,
}

impl ChaOracle {
    pub fn new(program: &IrProgram) -> Self {
        let mut declared: FxHashMap<String, FxHashSet<(String, String)>> = FxHashMap::default();
        let mut supers = FxHashMap::default();
        let mut subclasses: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut sites = FxHashMap::default();

        for class in &program.classes {
            let full_name = class.full_name();
            let methods = declared.entry(full_name.clone()).or_default();
            for method in &class.methods {
                methods.insert((method.name.clone(), method.signature.clone()));
            }
            supers.insert(full_name.clone(), class.super_class.clone());
            if let Some(super_class) = &class.super_class {
                subclasses
                    .entry(super_class.clone())
                    .or_default()
                    .push(full_name.clone());
            }
            for method in &class.methods {
                let key = (method.full_name(class), method.signature.clone());
                let infos = method
                    .invokes()
                    .into_iter()
                    .map(|invoke| SiteInfo {
                        owner: invoke.owner.clone(),
                        name: invoke.name.clone(),
                        signature: invoke.signature.clone(),
                        dispatch: invoke.dispatch,
                    })
                    .collect();
                sites.insert(key, infos);
            }
        }

        Self {
            declared,
            supers,
            subclasses,
            sites,
        }
    }

    /// The nearest class at or above `owner` declaring the method, or
    /// `owner` itself when the hierarchy does not know it (the target
    /// stays symbolic and the linker emits a phantom head).
    fn resolve_declared(&self, owner: &str, name: &str, signature: &str) -> String {
        let key = (name.to_string(), signature.to_string());
        let mut current = Some(owner.to_string());
        while let Some(class) = current {
            if self
                .declared
                .get(&class)
                .is_some_and(|methods| methods.contains(&key))
            {
                return class;
            }
            current = self.supers.get(&class).cloned().flatten();
        }
        owner.to_string()
    }

    /// Transitive subclasses of `owner` overriding the method.
    fn overrides(&self, owner: &str, name: &str, signature: &str) -> Vec<String> {
        let key = (name.to_string(), signature.to_string());
        let mut found = Vec::new();
        let mut stack: Vec<&str> = vec![owner];
        while let Some(class) = stack.pop() {
            if let Some(children) = self.subclasses.get(class) {
                for child in children {
                    if self
                        .declared
                        .get(child)
                        .is_some_and(|methods| methods.contains(&key))
                    {
                        found.push(child.clone());
                    }
                    stack.push(child);
                }
            }
        }
        found
    }
}

impl CallGraphOracle for ChaOracle {
    fn out_edges(&self, method_full_name: &str, signature: &str) -> Vec<CallTarget> {
        let key = (method_full_name.to_string(), signature.to_string());
        let Some(sites) = self.sites.get(&key) else {
            return Vec::new();
        };
        let mut targets = Vec::new();
        for (site, info) in sites.iter().enumerate() {
            let declared = self.resolve_declared(&info.owner, &info.name, &info.signature);
            targets.push(CallTarget {
                site,
                full_name: format!("{declared}.{}", info.name),
                signature: info.signature.clone(),
            });
            if info.dispatch == Dispatch::Dynamic {
                for class in self.overrides(&info.owner, &info.name, &info.signature) {
                    targets.push(CallTarget {
                        site,
                        full_name: format!("{class}.{}", info.name),
                        signature: info.signature.clone(),
                    });
                }
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrClass, IrInvoke, IrMethod, IrOp, IrUnit};

    fn invoke(owner: &str, name: &str, dispatch: Dispatch) -> IrInvoke {
        IrInvoke {
            name: name.to_string(),
            owner: owner.to_string(),
            signature: "void()".to_string(),
            return_type: "void".to_string(),
            dispatch,
            receiver: None,
            args: vec![],
        }
    }

    fn method(name: &str, units: Vec<IrUnit>) -> IrMethod {
        IrMethod {
            name: name.to_string(),
            signature: "void()".to_string(),
            return_type: "void".to_string(),
            modifiers: vec![],
            parameters: vec![],
            locals: vec![],
            units,
            line_number: 1,
            column_number: -1,
        }
    }

    fn class(name: &str, super_class: Option<&str>, methods: Vec<IrMethod>) -> IrClass {
        IrClass {
            name: name.to_string(),
            package: vec![],
            file_name: format!("{name}.java"),
            super_class: super_class.map(String::from),
            interfaces: vec![],
            type_parameters: vec![],
            fields: vec![],
            methods,
        }
    }

    fn hierarchy() -> IrProgram {
        // Base declares f; Derived overrides it; Main calls both ways.
        IrProgram {
            classes: vec![
                class("Base", None, vec![method("f", vec![IrUnit::new(IrOp::Return { value: None })])]),
                class(
                    "Derived",
                    Some("Base"),
                    vec![method("f", vec![IrUnit::new(IrOp::Return { value: None })])],
                ),
                class(
                    "Main",
                    None,
                    vec![method(
                        "run",
                        vec![
                            IrUnit::new(IrOp::Invoke(invoke("Base", "f", Dispatch::Dynamic))),
                            IrUnit::new(IrOp::Invoke(invoke("Derived", "g", Dispatch::Static))),
                            IrUnit::new(IrOp::Return { value: None }),
                        ],
                    )],
                ),
            ],
        }
    }

    #[test]
    fn test_virtual_dispatch_yields_declared_and_overrides() {
        let oracle = ChaOracle::new(&hierarchy());
        let targets = oracle.out_edges("Main.run", "void()");
        let site0: Vec<&str> = targets
            .iter()
            .filter(|t| t.site == 0)
            .map(|t| t.full_name.as_str())
            .collect();
        assert_eq!(site0, vec!["Base.f", "Derived.f"]);
    }

    #[test]
    fn test_unknown_target_stays_symbolic() {
        let oracle = ChaOracle::new(&hierarchy());
        let targets = oracle.out_edges("Main.run", "void()");
        // Derived.g is not declared anywhere in the hierarchy.
        let site1: Vec<&str> = targets
            .iter()
            .filter(|t| t.site == 1)
            .map(|t| t.full_name.as_str())
            .collect();
        assert_eq!(site1, vec!["Derived.g"]);
    }

    #[test]
    fn test_static_dispatch_resolves_up_the_hierarchy() {
        let mut program = hierarchy();
        // A static call against Derived for a method only Base declares.
        program.classes[2].methods[0].units[1] =
            IrUnit::new(IrOp::Invoke(invoke("Derived", "f", Dispatch::Static)));
        let oracle = ChaOracle::new(&program);
        let targets = oracle.out_edges("Main.run", "void()");
        let site1: Vec<&str> = targets
            .iter()
            .filter(|t| t.site == 1)
            .map(|t| t.full_name.as_str())
            .collect();
        // Derived declares f too, so it resolves there; no override fan-out.
        assert_eq!(site1, vec!["Derived.f"]);
    }

    #[test]
    fn test_unknown_method_has_no_edges() {
        let oracle = ChaOracle::new(&hierarchy());
        assert!(oracle.out_edges("Main.missing", "void()").is_empty());
    }
}
