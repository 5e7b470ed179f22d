//! Arbitrary in-memory values stored in object containers

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::table::Table;

/// A live resource that only exists in the running process (open connection,
/// file handle, thread). It can be held in a value graph but never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalResource {
    /// Resource kind, e.g. `connection`
    pub kind: String,
    pub description: String,
}

impl ExternalResource {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
        }
    }
}

/// Deepest nesting of lists and records an object container stores.
///
/// Each level takes two levels of the JSON payload, and the reader stops at
/// 128, so this leaves room for a table at the deepest level.
pub const MAX_NESTING: usize = 48;

/// Value graph written to and restored from an object container
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "super::float_bits")] f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
    Table(Table),
    #[serde(skip)]
    External(ExternalResource),
}

/// Structural equality; reals compare by bit pattern so NaN equals itself
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::External(a), Value::External(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Locate the first external resource in the graph.
    ///
    /// Returns its path: `$` is the root, `.name` a record field, `[i]` a list item.
    pub fn find_external(&self) -> Option<(String, &ExternalResource)> {
        self.find_external_at("$".to_string())
    }

    fn find_external_at(&self, path: String) -> Option<(String, &ExternalResource)> {
        match self {
            Value::External(resource) => Some((path, resource)),
            Value::List(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| item.find_external_at(format!("{}[{}]", path, i))),
            Value::Record(fields) => fields
                .iter()
                .find_map(|(name, field)| field.find_external_at(field_path(&path, name))),
            _ => None,
        }
    }

    /// Path of the first value nested more than `limit` levels deep; the root
    /// is level 1
    pub fn find_too_deep(&self, limit: usize) -> Option<String> {
        self.find_too_deep_at("$".to_string(), limit)
    }

    fn find_too_deep_at(&self, path: String, remaining: usize) -> Option<String> {
        if remaining == 0 {
            return Some(path);
        }
        match self {
            Value::List(items) => items.iter().enumerate().find_map(|(i, item)| {
                item.find_too_deep_at(format!("{}[{}]", path, i), remaining - 1)
            }),
            Value::Record(fields) => fields.iter().find_map(|(name, field)| {
                field.find_too_deep_at(field_path(&path, name), remaining - 1)
            }),
            _ => None,
        }
    }

    /// Short kind name used in messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Table(_) => "table",
            Value::External(_) => "external",
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }
}

fn field_path(path: &str, name: &str) -> String {
    if path == "$" {
        format!("${}", name)
    } else {
        format!("{}.{}", path, name)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Table(table)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ExternalResource> for Value {
    fn from(resource: ExternalResource) -> Self {
        Value::External(resource)
    }
}

/// What an object export writes
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPayload {
    /// One value, optionally carrying the name it is bound to
    Single { name: Option<String>, value: Value },
    /// Several named values, in binding order
    Named(IndexMap<String, Value>),
}

impl ObjectPayload {
    pub fn value(value: impl Into<Value>) -> Self {
        ObjectPayload::Single {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        ObjectPayload::Single {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    /// Build a multi-object payload from `(name, value)` pairs
    pub fn bindings<I, N, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        ObjectPayload::Named(
            entries
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Caller-side set of name bindings that a named container is restored into
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    bindings: IndexMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value, returning the previous binding for that name
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.bindings.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
