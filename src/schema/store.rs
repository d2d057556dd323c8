//! Attribute Store - per-instance configuration and state
//!
//! The store is a dynamically-typed value tree holding one resource
//! instance's attributes, plus the tracked remote identifier. It is
//! populated from user configuration before Create/Update and from the
//! remote response after Read.

use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Path to an attribute, addressed from the resource root.
///
/// Displayed in dotted form (`rule.0.priority`) in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    /// Path to a top-level attribute.
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Extend the path by one segment.
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A single attribute value.
///
/// `Set` elements are keyed by their content hash so that two sets holding
/// the same elements compare equal and serialize identically regardless of
/// the order they were inserted in.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int(i64),
    /// Ordered collection.
    List(Vec<AttributeValue>),
    /// Unordered collection, keyed by element content hash.
    Set(BTreeMap<String, AttributeValue>),
    /// One nested block instance (field name -> value).
    Block(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Build a `Set` from elements, deriving the order-independent keys.
    pub fn set_from(elements: impl IntoIterator<Item = AttributeValue>) -> Self {
        let mut map = BTreeMap::new();
        for element in elements {
            map.insert(element.content_hash(), element);
        }
        AttributeValue::Set(map)
    }

    /// Build a `Block` from named fields.
    pub fn block_from(
        fields: impl IntoIterator<Item = (impl Into<String>, AttributeValue)>,
    ) -> Self {
        AttributeValue::Block(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Value-derived key for set membership. Stable for a given value
    /// regardless of the insertion order of nested collections.
    pub fn content_hash(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.to_json().to_string().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Canonical JSON rendering. Sets become arrays in key order, blocks
    /// become objects with sorted keys.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::String(s) => Value::String(s.clone()),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Int(i) => Value::Number((*i).into()),
            AttributeValue::List(items) => {
                Value::Array(items.iter().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Set(items) => {
                Value::Array(items.values().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Block(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Human-readable kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::List(_) => "list",
            AttributeValue::Set(_) => "set",
            AttributeValue::Block(_) => "block",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

/// Attribute store for one resource instance.
///
/// Top-level attribute name -> value tree, plus the canonical remote
/// identifier once the instance is tracked. Instance-scoped: the store is
/// never shared between concurrently-processed instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    id: Option<String>,
    values: BTreeMap<String, AttributeValue>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracked canonical identifier, if the instance exists remotely.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.values.insert(name.into(), value);
    }

    /// Remove an attribute. Absence is distinct from an explicitly-set
    /// empty collection.
    pub fn unset(&mut self, name: &str) -> Option<AttributeValue> {
        self.values.remove(name)
    }

    /// Look up a nested value by path. List segments are numeric indexes,
    /// set segments are content-hash keys.
    pub fn get_path(&self, path: &AttributePath) -> Option<&AttributeValue> {
        let mut segments = path.segments().iter();
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                AttributeValue::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                AttributeValue::Set(items) => items.get(segment)?,
                AttributeValue::Block(fields) => fields.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Drop all tracked state, identifier included.
    pub fn clear(&mut self) {
        self.id = None;
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.values.is_empty()
    }
}
