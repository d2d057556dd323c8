//! Attribute descriptors - the declared shape of a resource's schema
//!
//! Every value the store may hold is described by exactly one descriptor
//! reachable from the resource's root schema. Descriptors are built in code
//! by resource definitions, so a schema mistake is a programming error and
//! fails loudly at registration time.

use super::store::AttributeValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Validation predicate attached to a descriptor.
pub type Validator = Arc<dyn Fn(&AttributeValue) -> Result<(), String> + Send + Sync>;

/// Who is allowed (or expected) to populate an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    /// User must supply it.
    Required,
    /// User may supply it.
    Optional,
    /// Only the remote API populates it.
    Computed,
    /// User may supply it; the remote API fills it in otherwise.
    OptionalComputed,
}

impl AttributeMode {
    pub fn is_computed(self) -> bool {
        matches!(self, AttributeMode::Computed | AttributeMode::OptionalComputed)
    }

    pub fn user_settable(self) -> bool {
        !matches!(self, AttributeMode::Computed)
    }
}

/// Primitive kind of an attribute.
///
/// A `Block` attribute is a collection of nested objects described by its
/// own schema; with `max_items(1)` the model-facing representation
/// collapses to a single object-or-absent.
#[derive(Clone)]
pub enum AttributeKind {
    String,
    Bool,
    Int,
    List(Box<AttributeKind>),
    Set(Box<AttributeKind>),
    Block(Schema),
}

impl AttributeKind {
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Bool => "bool",
            AttributeKind::Int => "int",
            AttributeKind::List(_) => "list",
            AttributeKind::Set(_) => "set",
            AttributeKind::Block(_) => "block",
        }
    }

    /// Value written for an omitted optional attribute. Blocks have no
    /// zero value - an omitted block stays absent.
    pub fn zero_value(&self) -> Option<AttributeValue> {
        match self {
            AttributeKind::String => Some(AttributeValue::String(String::new())),
            AttributeKind::Bool => Some(AttributeValue::Bool(false)),
            AttributeKind::Int => Some(AttributeValue::Int(0)),
            AttributeKind::List(_) => Some(AttributeValue::List(Vec::new())),
            AttributeKind::Set(_) => Some(AttributeValue::Set(BTreeMap::new())),
            AttributeKind::Block(_) => None,
        }
    }
}

impl fmt::Debug for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::List(elem) => write!(f, "list of {:?}", elem),
            AttributeKind::Set(elem) => write!(f, "set of {:?}", elem),
            AttributeKind::Block(schema) => write!(f, "block({:?})", schema),
            other => f.write_str(other.name()),
        }
    }
}

/// Declared shape of one attribute.
#[derive(Clone)]
pub struct AttributeDescriptor {
    name: String,
    kind: AttributeKind,
    mode: AttributeMode,
    default: Option<AttributeValue>,
    validator: Option<Validator>,
    min_items: Option<usize>,
    max_items: Option<usize>,
}

impl AttributeDescriptor {
    fn new(name: impl Into<String>, kind: AttributeKind, mode: AttributeMode) -> Self {
        Self {
            name: name.into(),
            kind,
            mode,
            default: None,
            validator: None,
            min_items: None,
            max_items: None,
        }
    }

    pub fn required(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::Required)
    }

    pub fn optional(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::Optional)
    }

    pub fn computed(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::Computed)
    }

    pub fn optional_computed(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::OptionalComputed)
    }

    pub fn with_default(mut self, default: impl Into<AttributeValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// At most one nested block ("pointer-or-value" cardinality).
    pub fn single(self) -> Self {
        self.with_max_items(1)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn mode(&self) -> AttributeMode {
        self.mode
    }

    pub fn default(&self) -> Option<&AttributeValue> {
        self.default.as_ref()
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn min_items(&self) -> Option<usize> {
        self.min_items
    }

    pub fn max_items(&self) -> Option<usize> {
        self.max_items
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Named descriptor table for one resource (or one nested block).
#[derive(Clone, Default)]
pub struct Schema {
    attributes: BTreeMap<String, AttributeDescriptor>,
}

impl Schema {
    /// Build a schema from descriptors. Duplicate names are a registration
    /// bug and panic immediately.
    pub fn new(descriptors: impl IntoIterator<Item = AttributeDescriptor>) -> Self {
        let mut attributes = BTreeMap::new();
        for descriptor in descriptors {
            let name = descriptor.name().to_string();
            if attributes.insert(name.clone(), descriptor).is_some() {
                panic!("duplicate attribute descriptor: {}", name);
            }
        }
        Self { attributes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Combine two descriptor tables (arguments + computed attributes).
    /// A name declared in both is a registration bug and panics.
    pub fn merged(&self, other: &Schema) -> Schema {
        let mut attributes = self.attributes.clone();
        for (name, descriptor) in &other.attributes {
            if attributes.insert(name.clone(), descriptor.clone()).is_some() {
                panic!("attribute declared in both schemas: {}", name);
            }
        }
        Schema { attributes }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.attributes.keys()).finish()
    }
}

/// Stock validation predicates.
pub mod validators {
    use super::{AttributeValue, Validator};
    use std::sync::Arc;

    /// Value must be one of the allowed strings.
    pub fn one_of(allowed: &'static [&'static str]) -> Validator {
        Arc::new(move |value| match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(()),
            Some(s) => Err(format!("`{}` is not one of {:?}", s, allowed)),
            None => Err("expected a string".to_string()),
        })
    }

    /// String value must not be empty.
    pub fn non_empty() -> Validator {
        Arc::new(|value| match value.as_str() {
            Some(s) if !s.is_empty() => Ok(()),
            Some(_) => Err("must not be empty".to_string()),
            None => Err("expected a string".to_string()),
        })
    }

    /// Integer value must fall within the inclusive range.
    pub fn int_range(min: i64, max: i64) -> Validator {
        Arc::new(move |value| match value.as_int() {
            Some(i) if (min..=max).contains(&i) => Ok(()),
            Some(i) => Err(format!("{} is outside {}..={}", i, min, max)),
            None => Err("expected an integer".to_string()),
        })
    }
}
