//! The three-address intermediate form consumed by the extractor.
//!
//! An external lifter (out of scope here) turns JVM class files into this
//! model and ships it as serialised bundles; the builders only ever see
//! these types. A method is an ordered list of units with branch targets
//! expressed as unit indices, which is exactly the unit-graph view the
//! CFG builder needs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::schema::values;

/// One lifted program: the batch of classes handed to `project()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrProgram {
    pub classes: Vec<IrClass>,
}

impl IrProgram {
    pub fn class(&self, full_name: &str) -> Option<&IrClass> {
        self.classes.iter().find(|c| c.full_name() == full_name)
    }
}

/// A lifted class (one compilation unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrClass {
    pub name: String,
    /// Package segments, outermost first; empty for the default package.
    #[serde(default)]
    pub package: Vec<String>,
    pub file_name: String,
    #[serde(default)]
    pub super_class: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub fields: Vec<IrField>,
    #[serde(default)]
    pub methods: Vec<IrMethod>,
}

impl IrClass {
    pub fn full_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package.join("."), self.name)
        }
    }

    /// Content hash used for staleness detection: lowercase-hex SHA-256
    /// over the canonical serialised form.
    pub fn content_hash(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrField {
    pub name: String,
    pub type_full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrParameter {
    pub name: String,
    pub type_full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrLocal {
    pub name: String,
    pub type_full_name: String,
}

/// JVM-level access flags, pre-decoded by the lifter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IrModifier {
    Public,
    Private,
    Protected,
    Static,
    Final,
    Abstract,
    Native,
    Synchronized,
    Constructor,
}

impl IrModifier {
    pub fn label(self) -> &'static str {
        match self {
            IrModifier::Public => "PUBLIC",
            IrModifier::Private => "PRIVATE",
            IrModifier::Protected => "PROTECTED",
            IrModifier::Static => "STATIC",
            IrModifier::Final => "FINAL",
            IrModifier::Abstract => "ABSTRACT",
            IrModifier::Native => "NATIVE",
            IrModifier::Synchronized => "SYNCHRONIZED",
            IrModifier::Constructor => "CONSTRUCTOR",
        }
    }
}

/// A lifted method body: parameters, locals, and ordered units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrMethod {
    pub name: String,
    /// e.g. `"void(java.lang.String[])"`.
    pub signature: String,
    pub return_type: String,
    #[serde(default)]
    pub modifiers: Vec<IrModifier>,
    #[serde(default)]
    pub parameters: Vec<IrParameter>,
    #[serde(default)]
    pub locals: Vec<IrLocal>,
    #[serde(default)]
    pub units: Vec<IrUnit>,
    #[serde(default = "unset_position")]
    pub line_number: i64,
    #[serde(default = "unset_position")]
    pub column_number: i64,
}

fn unset_position() -> i64 {
    -1
}

impl IrMethod {
    pub fn full_name(&self, class: &IrClass) -> String {
        format!("{}.{}", class.full_name(), self.name)
    }

    /// The unit-graph view over this body.
    pub fn unit_graph(&self) -> UnitGraph {
        UnitGraph::new(self)
    }

    /// Every invoke expression in canonical pre-order (units in order, a
    /// call before its receiver and arguments). Call-site ordinals handed
    /// to the call-graph oracle index into this sequence, and the AST
    /// builder emits CALL nodes in the same order.
    pub fn invokes(&self) -> Vec<&IrInvoke> {
        let mut found = Vec::new();
        for unit in &self.units {
            match &unit.op {
                IrOp::Assign { target, value } => {
                    collect_invokes(target, &mut found);
                    collect_invokes(value, &mut found);
                }
                IrOp::If { condition, .. } => collect_invokes(condition, &mut found),
                IrOp::Invoke(invoke) => collect_invoke(invoke, &mut found),
                IrOp::Return { value: Some(value) } => collect_invokes(value, &mut found),
                IrOp::Return { value: None } | IrOp::Goto { .. } => {}
            }
        }
        found
    }
}

fn collect_invoke<'a>(invoke: &'a IrInvoke, found: &mut Vec<&'a IrInvoke>) {
    found.push(invoke);
    if let Some(receiver) = &invoke.receiver {
        collect_invokes(receiver, found);
    }
    for arg in &invoke.args {
        collect_invokes(arg, found);
    }
}

fn collect_invokes<'a>(expr: &'a IrExpr, found: &mut Vec<&'a IrInvoke>) {
    match expr {
        IrExpr::Invoke(invoke) => collect_invoke(invoke, found),
        IrExpr::Binary { left, right, .. } => {
            collect_invokes(left, found);
            collect_invokes(right, found);
        }
        IrExpr::Field { base: Some(base), .. } => collect_invokes(base, found),
        IrExpr::ArrayInit { elements, .. } => {
            for element in elements {
                collect_invokes(element, found);
            }
        }
        _ => {}
    }
}

/// One unit (three-address statement) with its source position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrUnit {
    pub op: IrOp,
    #[serde(default = "unset_position")]
    pub line_number: i64,
    #[serde(default = "unset_position")]
    pub column_number: i64,
}

impl IrUnit {
    pub fn new(op: IrOp) -> Self {
        Self {
            op,
            line_number: -1,
            column_number: -1,
        }
    }

    pub fn at(mut self, line: i64, column: i64) -> Self {
        self.line_number = line;
        self.column_number = column;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrOp {
    Assign {
        target: IrExpr,
        value: IrExpr,
    },
    If {
        condition: IrExpr,
        then_target: usize,
        else_target: usize,
    },
    Goto {
        target: usize,
    },
    Invoke(IrInvoke),
    Return {
        value: Option<IrExpr>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrExpr {
    Local {
        name: String,
        type_full_name: String,
    },
    Constant {
        value: String,
        type_full_name: String,
    },
    Binary {
        op: IrBinOp,
        left: Box<IrExpr>,
        right: Box<IrExpr>,
    },
    Field {
        owner: String,
        name: String,
        type_full_name: String,
        #[serde(default)]
        base: Option<Box<IrExpr>>,
    },
    New {
        type_full_name: String,
    },
    ArrayInit {
        type_full_name: String,
        elements: Vec<IrExpr>,
    },
    MethodRef {
        method_full_name: String,
        type_full_name: String,
    },
    Invoke(Box<IrInvoke>),
    /// An expression this model cannot represent; the lifter keeps its
    /// source rendering.
    Opaque {
        code: String,
    },
}

impl IrExpr {
    /// Source-level rendering used for `code` properties.
    pub fn code(&self) -> String {
        match self {
            IrExpr::Local { name, .. } => name.clone(),
            IrExpr::Constant { value, .. } => value.clone(),
            IrExpr::Binary { op, left, right } => {
                format!("{} {} {}", left.code(), op.symbol(), right.code())
            }
            IrExpr::Field {
                owner, name, base, ..
            } => match base {
                Some(base) => format!("{}.{}", base.code(), name),
                None => format!("{owner}.{name}"),
            },
            IrExpr::New { type_full_name } => {
                format!("new {}", short_type_name(type_full_name))
            }
            IrExpr::ArrayInit { elements, .. } => {
                let inner: Vec<String> = elements.iter().map(IrExpr::code).collect();
                format!("{{{}}}", inner.join(", "))
            }
            IrExpr::MethodRef {
                method_full_name, ..
            } => method_full_name.replace('.', "::"),
            IrExpr::Invoke(invoke) => invoke.code(),
            IrExpr::Opaque { code } => code.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IrBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Gt,
    Ge,
    Eq,
    Ne,
    Lt,
    Le,
}

impl IrBinOp {
    /// Operator mnemonic used as the CALL node's name.
    pub fn call_name(self) -> &'static str {
        match self {
            IrBinOp::Add => "ADD",
            IrBinOp::Sub => "SUB",
            IrBinOp::Mul => "MUL",
            IrBinOp::Div => "DIV",
            IrBinOp::Rem => "REM",
            IrBinOp::And => "AND",
            IrBinOp::Or => "OR",
            IrBinOp::Xor => "XOR",
            IrBinOp::Shl => "SHL",
            IrBinOp::Shr => "SHR",
            IrBinOp::Gt => "GT",
            IrBinOp::Ge => "GE",
            IrBinOp::Eq => "EQ",
            IrBinOp::Ne => "NE",
            IrBinOp::Lt => "LT",
            IrBinOp::Le => "LE",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            IrBinOp::Add => "+",
            IrBinOp::Sub => "-",
            IrBinOp::Mul => "*",
            IrBinOp::Div => "/",
            IrBinOp::Rem => "%",
            IrBinOp::And => "&",
            IrBinOp::Or => "|",
            IrBinOp::Xor => "^",
            IrBinOp::Shl => "<<",
            IrBinOp::Shr => ">>",
            IrBinOp::Gt => ">",
            IrBinOp::Ge => ">=",
            IrBinOp::Eq => "==",
            IrBinOp::Ne => "!=",
            IrBinOp::Lt => "<",
            IrBinOp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dispatch {
    Static,
    Dynamic,
}

impl Dispatch {
    pub fn label(self) -> &'static str {
        match self {
            Dispatch::Static => values::STATIC_DISPATCH,
            Dispatch::Dynamic => values::DYNAMIC_DISPATCH,
        }
    }
}

/// A call site in the lifted body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrInvoke {
    pub name: String,
    /// Full name of the declaring type as written at the call site.
    pub owner: String,
    pub signature: String,
    pub return_type: String,
    pub dispatch: Dispatch,
    #[serde(default)]
    pub receiver: Option<IrExpr>,
    #[serde(default)]
    pub args: Vec<IrExpr>,
}

impl IrInvoke {
    pub fn method_full_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    pub fn code(&self) -> String {
        let args: Vec<String> = self.args.iter().map(IrExpr::code).collect();
        match &self.receiver {
            Some(receiver) => format!("{}.{}({})", receiver.code(), self.name, args.join(", ")),
            None => format!("{}.{}({})", short_type_name(&self.owner), self.name, args.join(", ")),
        }
    }
}

/// Predecessor/successor view over one method's units.
pub struct UnitGraph {
    succs: Vec<Vec<usize>>,
    preds: Vec<Vec<usize>>,
}

impl UnitGraph {
    pub fn new(method: &IrMethod) -> Self {
        let len = method.units.len();
        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); len];
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); len];
        for (idx, unit) in method.units.iter().enumerate() {
            match &unit.op {
                IrOp::If {
                    then_target,
                    else_target,
                    ..
                } => {
                    succs[idx].push(*then_target);
                    succs[idx].push(*else_target);
                }
                IrOp::Goto { target } => succs[idx].push(*target),
                IrOp::Return { .. } => {}
                IrOp::Assign { .. } | IrOp::Invoke(_) => {
                    if idx + 1 < len {
                        succs[idx].push(idx + 1);
                    }
                }
            }
        }
        for (idx, targets) in succs.iter().enumerate() {
            for &target in targets {
                if target < len {
                    preds[target].push(idx);
                }
            }
        }
        Self { succs, preds }
    }

    pub fn successors(&self, unit: usize) -> &[usize] {
        self.succs.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, unit: usize) -> &[usize] {
        self.preds.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// JVM primitive type names (plus `void`).
pub fn is_primitive(type_full_name: &str) -> bool {
    matches!(
        type_full_name,
        "byte" | "short" | "int" | "long" | "float" | "double" | "boolean" | "char" | "void"
    )
}

/// Parameters of primitive type evaluate by value, everything else by
/// reference.
pub fn evaluation_strategy_for(type_full_name: &str) -> &'static str {
    if is_primitive(type_full_name) {
        values::BY_VALUE
    } else {
        values::BY_REFERENCE
    }
}

/// `java.lang.String[]` → `String[]`.
pub fn short_type_name(type_full_name: &str) -> &str {
    type_full_name
        .rsplit('.')
        .next()
        .unwrap_or(type_full_name)
}
