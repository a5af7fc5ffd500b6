//! Property-graph data model: kinds, identifiers, values, nodes, and
//! relationships.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A node label or relationship type name.
///
/// Identity is the case-sensitive string. Kinds are cheap to clone and
/// compare; the relational backend interns each distinct kind to a small
/// integer ID on first use and never reassigns it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kind(Arc<str>);

impl Kind {
    pub fn new(name: impl AsRef<str>) -> Self {
        Kind(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self.0)
    }
}

impl From<&str> for Kind {
    fn from(name: &str) -> Self {
        Kind::new(name)
    }
}

pub type Kinds = Vec<Kind>;

/// Backend-assigned opaque entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(pub i64);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dynamically-typed property value.
///
/// This is the full set of scalars and simple composites a property bag may
/// hold. Values serialize to each backend's native representation at write
/// time (JSONB documents on the relational backend, typed bolt parameters on
/// the native backend) and decode back through the value negotiator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    Kind(Kind),
    StringList(Vec<String>),
    KindList(Vec<Kind>),
}

impl Value {
    /// Serialize into the relational backend's JSONB representation.
    /// Timestamps become RFC3339 text; kinds become their names.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Value::from(*value),
            Value::String(value) => serde_json::Value::String(value.clone()),
            Value::Time(value) => serde_json::Value::String(value.to_rfc3339()),
            Value::Kind(kind) => serde_json::Value::String(kind.as_str().to_string()),
            Value::StringList(values) => {
                serde_json::Value::from(values.clone())
            }
            Value::KindList(kinds) => serde_json::Value::from(
                kinds.iter().map(|k| k.as_str().to_string()).collect::<Vec<_>>(),
            ),
        }
    }

    /// Decode from a JSONB document field. The inverse of [`Value::to_json`]
    /// up to type erasure: timestamps and kinds come back as strings and are
    /// coerced on demand by the value negotiator.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                let mut strings = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::String(s) => strings.push(s.clone()),
                        _ => return None,
                    }
                }
                Some(Value::StringList(strings))
            }
            serde_json::Value::Object(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

impl From<Kind> for Value {
    fn from(value: Kind) -> Self {
        Value::Kind(value)
    }
}

/// A property bag: field name to dynamically-typed value.
///
/// Updates overwrite the stored bag wholesale; there is no partial-field
/// patch at the storage layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    map: HashMap<String, Value>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.map.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.map.get(field)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.map.iter()
    }

    /// Serialize the bag into a JSONB document.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::with_capacity(self.map.len());
        for (field, value) in &self.map {
            object.insert(field.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }

    /// Decode a bag from a JSONB document, skipping fields that do not hold
    /// a representable property value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut properties = Properties::new();
        if let serde_json::Value::Object(object) = value {
            for (field, raw) in object {
                if let Some(decoded) = Value::from_json(raw) {
                    properties.map.insert(field.clone(), decoded);
                }
            }
        }
        properties
    }
}

impl FromIterator<(String, Value)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Properties {
            map: iter.into_iter().collect(),
        }
    }
}

/// A graph node: backend-assigned ID, at least one kind, and a property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: Id,
    pub kinds: Kinds,
    pub properties: Properties,
}

impl Node {
    pub fn new(id: Id, kinds: Kinds, properties: Properties) -> Self {
        Node {
            id,
            kinds,
            properties,
        }
    }
}

/// A graph relationship: backend-assigned ID, endpoints, exactly one kind,
/// and a property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: Id,
    pub start_id: Id,
    pub end_id: Id,
    pub kind: Kind,
    pub properties: Properties,
}

impl Relationship {
    pub fn new(id: Id, start_id: Id, end_id: Id, kind: Kind, properties: Properties) -> Self {
        Relationship {
            id,
            start_id,
            end_id,
            kind,
            properties,
        }
    }
}

/// A traversal path, decode-only at this layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}
