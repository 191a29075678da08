use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::schema::{self, keys, DefaultValue, NodeKind};

use super::UNPERSISTED;

/// A property value. The schema's closed value set: strings, 64-bit
/// integers, and booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Str(s) => f.write_str(s),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A node builder and, once persisted, a node record.
///
/// `id` is `UNPERSISTED` (−1) until the first `add_vertex`; the driver
/// rewrites it with the allocated id. All schema properties are seeded
/// with their defaults at construction, so a node can never reach a
/// driver with a required property absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpgNode {
    pub id: i64,
    #[serde(rename = "label")]
    pub kind: NodeKind,
    pub properties: FxHashMap<String, PropertyValue>,
}

impl CpgNode {
    pub fn new(kind: NodeKind) -> Self {
        let mut properties = FxHashMap::default();
        for desc in schema::properties(kind) {
            let value = match desc.default {
                DefaultValue::Str(s) => PropertyValue::Str(s.to_string()),
                DefaultValue::Int(i) => PropertyValue::Int(i),
            };
            properties.insert(desc.name.to_string(), value);
        }
        Self {
            id: UNPERSISTED,
            kind,
            properties,
        }
    }

    // ==================== Convenience constructors ====================

    pub fn meta_data() -> Self {
        Self::new(NodeKind::MetaData)
    }

    pub fn file(name: &str) -> Self {
        Self::new(NodeKind::File).with_name(name)
    }

    pub fn namespace_block(name: &str, full_name: &str, filename: &str) -> Self {
        Self::new(NodeKind::NamespaceBlock)
            .with_name(name)
            .with_full_name(full_name)
            .with_filename(filename)
    }

    pub fn type_decl(name: &str, full_name: &str, filename: &str) -> Self {
        Self::new(NodeKind::TypeDecl)
            .with_name(name)
            .with_full_name(full_name)
            .with_filename(filename)
    }

    pub fn method(name: &str, full_name: &str, signature: &str) -> Self {
        Self::new(NodeKind::Method)
            .with_name(name)
            .with_full_name(full_name)
            .with_signature(signature)
    }

    pub fn binding(name: &str, signature: &str) -> Self {
        Self::new(NodeKind::Binding)
            .with_name(name)
            .with_signature(signature)
    }

    // ==================== Fluent setters ====================

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn with_name(self, name: &str) -> Self {
        self.with_property(keys::NAME, name)
    }

    pub fn with_full_name(self, full_name: &str) -> Self {
        self.with_property(keys::FULL_NAME, full_name)
    }

    pub fn with_signature(self, signature: &str) -> Self {
        self.with_property(keys::SIGNATURE, signature)
    }

    pub fn with_filename(self, filename: &str) -> Self {
        self.with_property(keys::FILENAME, filename)
    }

    pub fn with_hash(self, hash: &str) -> Self {
        self.with_property(keys::HASH, hash)
    }

    pub fn with_code(self, code: &str) -> Self {
        self.with_property(keys::CODE, code)
    }

    pub fn with_order(self, order: i64) -> Self {
        self.with_property(keys::ORDER, order)
    }

    pub fn with_argument_index(self, index: i64) -> Self {
        self.with_property(keys::ARGUMENT_INDEX, index)
    }

    pub fn with_line_number(self, line: i64) -> Self {
        self.with_property(keys::LINE_NUMBER, line)
    }

    pub fn with_column_number(self, column: i64) -> Self {
        self.with_property(keys::COLUMN_NUMBER, column)
    }

    pub fn with_type_full_name(self, type_full_name: &str) -> Self {
        self.with_property(keys::TYPE_FULL_NAME, type_full_name)
    }

    pub fn with_method_full_name(self, method_full_name: &str) -> Self {
        self.with_property(keys::METHOD_FULL_NAME, method_full_name)
    }

    pub fn with_ast_parent(self, full_name: &str, parent_type: &str) -> Self {
        self.with_property(keys::AST_PARENT_FULL_NAME, full_name)
            .with_property(keys::AST_PARENT_TYPE, parent_type)
    }

    pub fn with_evaluation_strategy(self, strategy: &str) -> Self {
        self.with_property(keys::EVALUATION_STRATEGY, strategy)
    }

    pub fn with_dispatch_type(self, dispatch: &str) -> Self {
        self.with_property(keys::DISPATCH_TYPE, dispatch)
    }

    pub fn with_modifier_type(self, modifier: &str) -> Self {
        self.with_property(keys::MODIFIER_TYPE, modifier)
    }

    pub fn with_canonical_name(self, name: &str) -> Self {
        self.with_property(keys::CANONICAL_NAME, name)
    }

    // ==================== Typed getters ====================

    pub fn str_prop(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }

    pub fn int_prop(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(PropertyValue::as_int)
    }

    pub fn name(&self) -> Option<&str> {
        self.str_prop(keys::NAME)
    }

    pub fn full_name(&self) -> Option<&str> {
        self.str_prop(keys::FULL_NAME)
    }

    pub fn signature(&self) -> Option<&str> {
        self.str_prop(keys::SIGNATURE)
    }

    pub fn filename(&self) -> Option<&str> {
        self.str_prop(keys::FILENAME)
    }

    pub fn hash(&self) -> Option<&str> {
        self.str_prop(keys::HASH)
    }

    pub fn code(&self) -> Option<&str> {
        self.str_prop(keys::CODE)
    }

    pub fn order(&self) -> i64 {
        self.int_prop(keys::ORDER).unwrap_or(-1)
    }

    pub fn argument_index(&self) -> i64 {
        self.int_prop(keys::ARGUMENT_INDEX).unwrap_or(-1)
    }

    pub fn is_persisted(&self) -> bool {
        self.id >= 0
    }

    /// Property-level equality, ignoring the id. The driver treats a
    /// re-insert of an equal builder as a no-op.
    pub fn same_properties(&self, other: &CpgNode) -> bool {
        self.kind == other.kind && self.properties == other.properties
    }
}
