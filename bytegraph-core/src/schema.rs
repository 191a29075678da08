//! CPG schema: node kinds, edge kinds, and the allowed-triples table.
//!
//! Both the builders and the drivers consult this module; builders check
//! triples before staging an edge and drivers re-check before persisting,
//! so an illegal edge can never reach a back-end.

use serde::{Deserialize, Serialize};

/// Node kinds of the code property graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "META_DATA")]
    MetaData,
    #[serde(rename = "FILE")]
    File,
    #[serde(rename = "NAMESPACE_BLOCK")]
    NamespaceBlock,
    #[serde(rename = "TYPE_DECL")]
    TypeDecl,
    #[serde(rename = "MEMBER")]
    Member,
    #[serde(rename = "METHOD")]
    Method,
    #[serde(rename = "METHOD_PARAMETER_IN")]
    MethodParameterIn,
    #[serde(rename = "METHOD_RETURN")]
    MethodReturn,
    #[serde(rename = "MODIFIER")]
    Modifier,
    #[serde(rename = "LOCAL")]
    Local,
    #[serde(rename = "BLOCK")]
    Block,
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "LITERAL")]
    Literal,
    #[serde(rename = "IDENTIFIER")]
    Identifier,
    #[serde(rename = "FIELD_IDENTIFIER")]
    FieldIdentifier,
    #[serde(rename = "METHOD_REF")]
    MethodRef,
    #[serde(rename = "TYPE_REF")]
    TypeRef,
    #[serde(rename = "RETURN")]
    Return,
    #[serde(rename = "JUMP_TARGET")]
    JumpTarget,
    #[serde(rename = "CONTROL_STRUCTURE")]
    ControlStructure,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "ARRAY_INITIALIZER")]
    ArrayInitializer,
    #[serde(rename = "TYPE_ARGUMENT")]
    TypeArgument,
    #[serde(rename = "TYPE_PARAMETER")]
    TypeParameter,
    #[serde(rename = "BINDING")]
    Binding,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::MetaData => "META_DATA",
            NodeKind::File => "FILE",
            NodeKind::NamespaceBlock => "NAMESPACE_BLOCK",
            NodeKind::TypeDecl => "TYPE_DECL",
            NodeKind::Member => "MEMBER",
            NodeKind::Method => "METHOD",
            NodeKind::MethodParameterIn => "METHOD_PARAMETER_IN",
            NodeKind::MethodReturn => "METHOD_RETURN",
            NodeKind::Modifier => "MODIFIER",
            NodeKind::Local => "LOCAL",
            NodeKind::Block => "BLOCK",
            NodeKind::Call => "CALL",
            NodeKind::Literal => "LITERAL",
            NodeKind::Identifier => "IDENTIFIER",
            NodeKind::FieldIdentifier => "FIELD_IDENTIFIER",
            NodeKind::MethodRef => "METHOD_REF",
            NodeKind::TypeRef => "TYPE_REF",
            NodeKind::Return => "RETURN",
            NodeKind::JumpTarget => "JUMP_TARGET",
            NodeKind::ControlStructure => "CONTROL_STRUCTURE",
            NodeKind::Unknown => "UNKNOWN",
            NodeKind::ArrayInitializer => "ARRAY_INITIALIZER",
            NodeKind::TypeArgument => "TYPE_ARGUMENT",
            NodeKind::TypeParameter => "TYPE_PARAMETER",
            NodeKind::Binding => "BINDING",
        }
    }

    /// Method-body kinds: everything that can hang under the entry block.
    pub fn is_body(self) -> bool {
        matches!(
            self,
            NodeKind::Block
                | NodeKind::Call
                | NodeKind::Literal
                | NodeKind::Identifier
                | NodeKind::FieldIdentifier
                | NodeKind::MethodRef
                | NodeKind::TypeRef
                | NodeKind::Return
                | NodeKind::JumpTarget
                | NodeKind::ControlStructure
                | NodeKind::Unknown
                | NodeKind::ArrayInitializer
        )
    }

    /// Body kinds that can appear in value position (call arguments,
    /// branch conditions, return values).
    pub fn is_expression(self) -> bool {
        self.is_body() && !matches!(self, NodeKind::Return | NodeKind::JumpTarget)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Edge kinds of the code property graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    #[serde(rename = "AST")]
    Ast,
    #[serde(rename = "CFG")]
    Cfg,
    #[serde(rename = "ARGUMENT")]
    Argument,
    #[serde(rename = "RECEIVER")]
    Receiver,
    #[serde(rename = "REF")]
    Ref,
    #[serde(rename = "CONDITION")]
    Condition,
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "BINDS")]
    Binds,
    #[serde(rename = "BINDS_TO")]
    BindsTo,
    #[serde(rename = "SOURCE_FILE")]
    SourceFile,
    #[serde(rename = "CAPTURED_BY")]
    CapturedBy,
}

impl EdgeKind {
    pub fn label(self) -> &'static str {
        match self {
            EdgeKind::Ast => "AST",
            EdgeKind::Cfg => "CFG",
            EdgeKind::Argument => "ARGUMENT",
            EdgeKind::Receiver => "RECEIVER",
            EdgeKind::Ref => "REF",
            EdgeKind::Condition => "CONDITION",
            EdgeKind::Call => "CALL",
            EdgeKind::Binds => "BINDS",
            EdgeKind::BindsTo => "BINDS_TO",
            EdgeKind::SourceFile => "SOURCE_FILE",
            EdgeKind::CapturedBy => "CAPTURED_BY",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether the schema permits an edge of kind `edge` from `src` to `dst`.
pub fn is_allowed(src: NodeKind, edge: EdgeKind, dst: NodeKind) -> bool {
    use NodeKind::*;
    match edge {
        EdgeKind::Ast => match (src, dst) {
            (File, NamespaceBlock) => true,
            (NamespaceBlock, NamespaceBlock | TypeDecl) => true,
            (TypeDecl, Member | Method | TypeParameter) => true,
            (
                Method,
                MethodParameterIn | MethodReturn | Modifier | Local | Block,
            ) => true,
            (Block, Local) => true,
            (s, d) => s.is_body() && d.is_body(),
        },
        // Statement-level flow: the entry block is the only source without
        // an incoming edge, the method return the only sink.
        EdgeKind::Cfg => src.is_body() && (dst.is_body() || dst == MethodReturn),
        EdgeKind::Argument => src == Call && dst.is_expression(),
        EdgeKind::Receiver => {
            src == Call
                && matches!(dst, Identifier | Call | MethodRef | TypeRef | Unknown)
        }
        EdgeKind::Ref => matches!(
            (src, dst),
            (Identifier, Local | MethodParameterIn | Member)
                | (FieldIdentifier, Member | Local)
                | (Binding, Method)
        ),
        EdgeKind::Condition => src == ControlStructure && dst.is_expression(),
        EdgeKind::Call => src == Call && dst == Method,
        EdgeKind::Binds => src == TypeDecl && dst == Binding,
        EdgeKind::BindsTo => src == TypeArgument && dst == TypeParameter,
        EdgeKind::SourceFile => src == Method && dst == File,
        // Reserved for closure support; no producer yet.
        EdgeKind::CapturedBy => false,
    }
}

/// Property key names shared by builders, drivers, and the serialised form.
pub mod keys {
    pub const NAME: &str = "name";
    pub const FULL_NAME: &str = "fullName";
    pub const SIGNATURE: &str = "signature";
    pub const FILENAME: &str = "filename";
    pub const HASH: &str = "hash";
    pub const CODE: &str = "code";
    pub const ORDER: &str = "order";
    pub const ARGUMENT_INDEX: &str = "argumentIndex";
    pub const LINE_NUMBER: &str = "lineNumber";
    pub const COLUMN_NUMBER: &str = "columnNumber";
    pub const TYPE_FULL_NAME: &str = "typeFullName";
    pub const METHOD_FULL_NAME: &str = "methodFullName";
    pub const AST_PARENT_FULL_NAME: &str = "astParentFullName";
    pub const AST_PARENT_TYPE: &str = "astParentType";
    pub const EVALUATION_STRATEGY: &str = "evaluationStrategy";
    pub const DISPATCH_TYPE: &str = "dispatchType";
    pub const MODIFIER_TYPE: &str = "modifierType";
    pub const CANONICAL_NAME: &str = "canonicalName";
    pub const LANGUAGE: &str = "language";
    pub const VERSION: &str = "version";
}

/// Controlled vocabularies for enum-valued properties.
pub mod values {
    pub const BY_REFERENCE: &str = "BY_REFERENCE";
    pub const BY_VALUE: &str = "BY_VALUE";
    pub const STATIC_DISPATCH: &str = "STATIC_DISPATCH";
    pub const DYNAMIC_DISPATCH: &str = "DYNAMIC_DISPATCH";
    pub const LANGUAGE_JAVA: &str = "JAVA";
    pub const VERSION_1_8: &str = "1.8";
    /// `astParentType` values.
    pub const PARENT_TYPE_DECL: &str = "TYPE_DECL";
    pub const PARENT_NAMESPACE_BLOCK: &str = "NAMESPACE_BLOCK";
}

/// Default value of a schema property when a builder leaves it unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
}

/// One schema property of a node kind together with its default.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub default: DefaultValue,
}

const fn str_prop(name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor {
        name,
        default: DefaultValue::Str("null"),
    }
}

const fn int_prop(name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor {
        name,
        default: DefaultValue::Int(-1),
    }
}

use self::keys as k;

const ORDER_P: PropertyDescriptor = int_prop(k::ORDER);
const ARGUMENT_INDEX_P: PropertyDescriptor = int_prop(k::ARGUMENT_INDEX);
const LINE_P: PropertyDescriptor = int_prop(k::LINE_NUMBER);
const COLUMN_P: PropertyDescriptor = int_prop(k::COLUMN_NUMBER);
const CODE_P: PropertyDescriptor = str_prop(k::CODE);
const SIGNATURE_P: PropertyDescriptor = PropertyDescriptor {
    name: k::SIGNATURE,
    default: DefaultValue::Str("()"),
};
const EVAL_STRATEGY_P: PropertyDescriptor = PropertyDescriptor {
    name: k::EVALUATION_STRATEGY,
    default: DefaultValue::Str(values::BY_REFERENCE),
};

/// The schema properties of `kind`, each with its default value.
///
/// `FILE.hash` is deliberately absent: its presence means the file was
/// loaded from a byte-addressable source, so it never defaults.
pub fn properties(kind: NodeKind) -> &'static [PropertyDescriptor] {
    const META_DATA: &[PropertyDescriptor] = &[
        PropertyDescriptor { name: k::LANGUAGE, default: DefaultValue::Str(values::LANGUAGE_JAVA) },
        PropertyDescriptor { name: k::VERSION, default: DefaultValue::Str(values::VERSION_1_8) },
        ORDER_P,
    ];
    const FILE: &[PropertyDescriptor] = &[str_prop(k::NAME), ORDER_P];
    const NAMESPACE_BLOCK: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        str_prop(k::FULL_NAME),
        str_prop(k::FILENAME),
        ORDER_P,
    ];
    const TYPE_DECL: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        str_prop(k::FULL_NAME),
        str_prop(k::AST_PARENT_FULL_NAME),
        str_prop(k::AST_PARENT_TYPE),
        str_prop(k::FILENAME),
        ORDER_P,
    ];
    const MEMBER: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        CODE_P,
        str_prop(k::TYPE_FULL_NAME),
        ORDER_P,
    ];
    const METHOD: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        str_prop(k::FULL_NAME),
        SIGNATURE_P,
        str_prop(k::FILENAME),
        str_prop(k::AST_PARENT_FULL_NAME),
        str_prop(k::AST_PARENT_TYPE),
        LINE_P,
        COLUMN_P,
        ORDER_P,
    ];
    const METHOD_PARAMETER_IN: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        CODE_P,
        str_prop(k::TYPE_FULL_NAME),
        EVAL_STRATEGY_P,
        LINE_P,
        COLUMN_P,
        ORDER_P,
    ];
    const METHOD_RETURN: &[PropertyDescriptor] = &[
        CODE_P,
        str_prop(k::TYPE_FULL_NAME),
        EVAL_STRATEGY_P,
        LINE_P,
        COLUMN_P,
        ORDER_P,
    ];
    const MODIFIER: &[PropertyDescriptor] = &[str_prop(k::MODIFIER_TYPE), ORDER_P];
    const LOCAL: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        CODE_P,
        str_prop(k::TYPE_FULL_NAME),
        ORDER_P,
    ];
    const TYPED_BODY: &[PropertyDescriptor] = &[
        str_prop(k::TYPE_FULL_NAME),
        ORDER_P,
        ARGUMENT_INDEX_P,
        LINE_P,
        COLUMN_P,
        CODE_P,
    ];
    const CALL: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        str_prop(k::METHOD_FULL_NAME),
        SIGNATURE_P,
        PropertyDescriptor {
            name: k::DISPATCH_TYPE,
            default: DefaultValue::Str(values::STATIC_DISPATCH),
        },
        str_prop(k::TYPE_FULL_NAME),
        ORDER_P,
        ARGUMENT_INDEX_P,
        LINE_P,
        COLUMN_P,
        CODE_P,
    ];
    const IDENTIFIER: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        str_prop(k::TYPE_FULL_NAME),
        ORDER_P,
        ARGUMENT_INDEX_P,
        LINE_P,
        COLUMN_P,
        CODE_P,
    ];
    const FIELD_IDENTIFIER: &[PropertyDescriptor] = &[
        str_prop(k::CANONICAL_NAME),
        ORDER_P,
        ARGUMENT_INDEX_P,
        LINE_P,
        COLUMN_P,
        CODE_P,
    ];
    const METHOD_REF: &[PropertyDescriptor] = &[
        str_prop(k::METHOD_FULL_NAME),
        str_prop(k::TYPE_FULL_NAME),
        ORDER_P,
        ARGUMENT_INDEX_P,
        LINE_P,
        COLUMN_P,
        CODE_P,
    ];
    const PLAIN_BODY: &[PropertyDescriptor] =
        &[ORDER_P, ARGUMENT_INDEX_P, LINE_P, COLUMN_P, CODE_P];
    const JUMP_TARGET: &[PropertyDescriptor] = &[
        str_prop(k::NAME),
        ORDER_P,
        ARGUMENT_INDEX_P,
        LINE_P,
        COLUMN_P,
        CODE_P,
    ];
    const TYPE_VAR: &[PropertyDescriptor] = &[str_prop(k::NAME), ORDER_P];
    const BINDING: &[PropertyDescriptor] = &[str_prop(k::NAME), SIGNATURE_P, ORDER_P];

    match kind {
        NodeKind::MetaData => META_DATA,
        NodeKind::File => FILE,
        NodeKind::NamespaceBlock => NAMESPACE_BLOCK,
        NodeKind::TypeDecl => TYPE_DECL,
        NodeKind::Member => MEMBER,
        NodeKind::Method => METHOD,
        NodeKind::MethodParameterIn => METHOD_PARAMETER_IN,
        NodeKind::MethodReturn => METHOD_RETURN,
        NodeKind::Modifier => MODIFIER,
        NodeKind::Local => LOCAL,
        NodeKind::Block => TYPED_BODY,
        NodeKind::Call => CALL,
        NodeKind::Literal | NodeKind::TypeRef | NodeKind::ArrayInitializer => TYPED_BODY,
        NodeKind::Identifier => IDENTIFIER,
        NodeKind::FieldIdentifier => FIELD_IDENTIFIER,
        NodeKind::MethodRef => METHOD_REF,
        NodeKind::Return | NodeKind::Unknown | NodeKind::ControlStructure => PLAIN_BODY,
        NodeKind::JumpTarget => JUMP_TARGET,
        NodeKind::TypeArgument | NodeKind::TypeParameter => TYPE_VAR,
        NodeKind::Binding => BINDING,
    }
}
