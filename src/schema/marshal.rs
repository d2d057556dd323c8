//! Schema Marshaller - typed models in and out of the attribute store
//!
//! Models are plain `serde` structs. `decode` validates the store against
//! the schema and deserializes it into a model; `encode` is the dual,
//! producing a full attribute set from a populated model. Both fail fast
//! with a [`SchemaError`] when a model field has no descriptor or a value
//! fails its descriptor's validation.
//!
//! Model conventions mirror the store's zero-value semantics: optional
//! scalar fields are plain `String`/`i64`/`bool` with `#[serde(default)]`,
//! single-cardinality blocks and computed fields are `Option<T>`.

use super::descriptor::{AttributeDescriptor, AttributeKind, AttributeMode, Schema};
use super::store::{AttributePath, AttributeStore, AttributeValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Mismatch between a model, a schema, and the store. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("no attribute descriptor for `{path}`")]
    UnknownAttribute { path: String },

    #[error("attribute `{path}` expects {expected}, got {found}")]
    KindMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("attribute `{path}` failed validation: {message}")]
    ValidationFailed { path: String, message: String },

    #[error("attribute `{path}` holds {found} item(s), allowed range is {min}..={max}")]
    Cardinality {
        path: String,
        found: usize,
        min: usize,
        max: usize,
    },

    #[error("required attribute `{path}` is missing")]
    MissingRequired { path: String },

    #[error("failed to deserialize model: {message}")]
    Deserialize { message: String },

    #[error("failed to serialize model: {message}")]
    Serialize { message: String },
}

/// Decode the store into a typed model.
///
/// Every stored value is checked against its descriptor first; attributes
/// absent from the store stay absent from the model-facing JSON, so model
/// fields for optional and computed attributes need `#[serde(default)]`
/// or an `Option` type.
pub fn decode<T: DeserializeOwned>(schema: &Schema, store: &AttributeStore) -> Result<T, SchemaError> {
    validate_store(schema, store)?;

    let mut fields = serde_json::Map::new();
    for (name, value) in store.iter() {
        let descriptor = schema.get(name).expect("validated above");
        fields.insert(name.to_string(), model_json(descriptor.kind(), descriptor.max_items(), value));
    }

    serde_json::from_value(Value::Object(fields)).map_err(|e| SchemaError::Deserialize {
        message: e.to_string(),
    })
}

/// Encode a typed model into the store.
///
/// Produces the full attribute set: defaults and zero values for omitted
/// optional attributes, absence for omitted blocks, content-hash keys for
/// sets. An `OptionalComputed` attribute the model omits keeps whatever
/// the store already holds - remote-populated state is never clobbered by
/// an unset field.
pub fn encode<T: Serialize>(
    schema: &Schema,
    model: &T,
    store: &mut AttributeStore,
) -> Result<(), SchemaError> {
    let json = serde_json::to_value(model).map_err(|e| SchemaError::Serialize {
        message: e.to_string(),
    })?;
    let Value::Object(fields) = json else {
        return Err(SchemaError::Serialize {
            message: "model must serialize to an object".to_string(),
        });
    };

    // Fail fast on model fields with no descriptor.
    for name in fields.keys() {
        if schema.get(name).is_none() {
            return Err(SchemaError::UnknownAttribute {
                path: name.clone(),
            });
        }
    }

    for descriptor in schema.descriptors() {
        let path = AttributePath::root(descriptor.name());
        match fields.get(descriptor.name()).filter(|v| !v.is_null()) {
            Some(json_value) => {
                let value = value_from_json(&path, descriptor.kind(), json_value)?;
                check_value(&path, descriptor, &value)?;
                store.set(descriptor.name(), value);
            }
            None => encode_absent(descriptor, &path, store)?,
        }
    }

    Ok(())
}

/// Check every stored value against the schema: unknown attributes, kind
/// mismatches, validator failures, and cardinality violations.
pub fn validate_store(schema: &Schema, store: &AttributeStore) -> Result<(), SchemaError> {
    for (name, value) in store.iter() {
        let path = AttributePath::root(name);
        let descriptor = schema.get(name).ok_or_else(|| SchemaError::UnknownAttribute {
            path: path.to_string(),
        })?;
        check_value(&path, descriptor, value)?;
    }
    Ok(())
}

/// Fill defaults for arguments the configuration omits, so operations
/// decode the same values the schema documents.
pub fn apply_defaults(schema: &Schema, store: &mut AttributeStore) {
    for descriptor in schema.descriptors() {
        if store.get(descriptor.name()).is_none() {
            if let Some(default) = descriptor.default() {
                store.set(descriptor.name(), default.clone());
            }
        }
    }
}

fn encode_absent(
    descriptor: &AttributeDescriptor,
    path: &AttributePath,
    store: &mut AttributeStore,
) -> Result<(), SchemaError> {
    // Remote state already populated this attribute; an unset model field
    // must not overwrite it.
    if descriptor.mode() == AttributeMode::OptionalComputed && store.get(descriptor.name()).is_some()
    {
        return Ok(());
    }

    if let Some(default) = descriptor.default() {
        store.set(descriptor.name(), default.clone());
        return Ok(());
    }

    match descriptor.mode() {
        AttributeMode::Required => Err(SchemaError::MissingRequired {
            path: path.to_string(),
        }),
        AttributeMode::Optional | AttributeMode::OptionalComputed => {
            match descriptor.kind().zero_value() {
                Some(zero) => store.set(descriptor.name(), zero),
                None => {
                    store.unset(descriptor.name());
                }
            }
            Ok(())
        }
        AttributeMode::Computed => {
            store.unset(descriptor.name());
            Ok(())
        }
    }
}

fn check_value(
    path: &AttributePath,
    descriptor: &AttributeDescriptor,
    value: &AttributeValue,
) -> Result<(), SchemaError> {
    check_kind(path, descriptor.kind(), value)?;
    check_cardinality(path, descriptor, value)?;
    if let Some(validator) = descriptor.validator() {
        validator(value).map_err(|message| SchemaError::ValidationFailed {
            path: path.to_string(),
            message,
        })?;
    }
    Ok(())
}

fn check_kind(
    path: &AttributePath,
    kind: &AttributeKind,
    value: &AttributeValue,
) -> Result<(), SchemaError> {
    match (kind, value) {
        (AttributeKind::String, AttributeValue::String(_)) => Ok(()),
        (AttributeKind::Bool, AttributeValue::Bool(_)) => Ok(()),
        (AttributeKind::Int, AttributeValue::Int(_)) => Ok(()),
        (AttributeKind::List(element), AttributeValue::List(items)) => {
            for (index, item) in items.iter().enumerate() {
                check_kind(&path.child(index), element, item)?;
            }
            Ok(())
        }
        (AttributeKind::Set(element), AttributeValue::Set(items)) => {
            for (key, item) in items {
                check_kind(&path.child(key), element, item)?;
                let actual = item.content_hash();
                if *key != actual {
                    return Err(SchemaError::ValidationFailed {
                        path: path.child(key).to_string(),
                        message: format!("set element keyed `{}` hashes to `{}`", key, actual),
                    });
                }
            }
            Ok(())
        }
        (AttributeKind::Block(schema), AttributeValue::List(items)) => {
            for (index, item) in items.iter().enumerate() {
                let item_path = path.child(index);
                let AttributeValue::Block(block_fields) = item else {
                    return Err(SchemaError::KindMismatch {
                        path: item_path.to_string(),
                        expected: "block",
                        found: item.kind_name(),
                    });
                };
                check_block(&item_path, schema, block_fields)?;
            }
            Ok(())
        }
        (expected, found) => Err(SchemaError::KindMismatch {
            path: path.to_string(),
            expected: expected.name(),
            found: found.kind_name(),
        }),
    }
}

fn check_block(
    path: &AttributePath,
    schema: &Schema,
    fields: &BTreeMap<String, AttributeValue>,
) -> Result<(), SchemaError> {
    for (name, value) in fields {
        let field_path = path.child(name);
        let descriptor = schema.get(name).ok_or_else(|| SchemaError::UnknownAttribute {
            path: field_path.to_string(),
        })?;
        check_value(&field_path, descriptor, value)?;
    }
    Ok(())
}

fn check_cardinality(
    path: &AttributePath,
    descriptor: &AttributeDescriptor,
    value: &AttributeValue,
) -> Result<(), SchemaError> {
    let count = match value {
        AttributeValue::List(items) => items.len(),
        AttributeValue::Set(items) => items.len(),
        _ => return Ok(()),
    };
    let min = descriptor.min_items().unwrap_or(0);
    let max = descriptor.max_items().unwrap_or(usize::MAX);
    if count < min || count > max {
        return Err(SchemaError::Cardinality {
            path: path.to_string(),
            found: count,
            min,
            max,
        });
    }
    Ok(())
}

/// Store value -> model-facing JSON. Single-cardinality blocks collapse to
/// one object (or null when empty), sets surface in canonical key order.
fn model_json(kind: &AttributeKind, max_items: Option<usize>, value: &AttributeValue) -> Value {
    match (kind, value) {
        (AttributeKind::Block(schema), AttributeValue::List(items)) => {
            let objects: Vec<Value> = items
                .iter()
                .map(|item| match item {
                    AttributeValue::Block(fields) => block_model_json(schema, fields),
                    other => other.to_json(),
                })
                .collect();
            if max_items == Some(1) {
                objects.into_iter().next().unwrap_or(Value::Null)
            } else {
                Value::Array(objects)
            }
        }
        (AttributeKind::List(element), AttributeValue::List(items)) => Value::Array(
            items
                .iter()
                .map(|item| model_json(element, None, item))
                .collect(),
        ),
        (AttributeKind::Set(element), AttributeValue::Set(items)) => Value::Array(
            items
                .values()
                .map(|item| model_json(element, None, item))
                .collect(),
        ),
        _ => value.to_json(),
    }
}

fn block_model_json(schema: &Schema, fields: &BTreeMap<String, AttributeValue>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| {
                let rendered = match schema.get(name) {
                    Some(descriptor) => model_json(descriptor.kind(), descriptor.max_items(), value),
                    None => value.to_json(),
                };
                (name.clone(), rendered)
            })
            .collect(),
    )
}

/// Model-facing JSON -> store value. Blocks accept either a single object
/// or an array of objects; sets are rekeyed by content hash.
fn value_from_json(
    path: &AttributePath,
    kind: &AttributeKind,
    json: &Value,
) -> Result<AttributeValue, SchemaError> {
    match kind {
        AttributeKind::String => json
            .as_str()
            .map(|s| AttributeValue::String(s.to_string()))
            .ok_or_else(|| mismatch(path, "string", json)),
        AttributeKind::Bool => json
            .as_bool()
            .map(AttributeValue::Bool)
            .ok_or_else(|| mismatch(path, "bool", json)),
        AttributeKind::Int => json
            .as_i64()
            .map(AttributeValue::Int)
            .ok_or_else(|| mismatch(path, "int", json)),
        AttributeKind::List(element) => {
            let items = json.as_array().ok_or_else(|| mismatch(path, "list", json))?;
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                values.push(value_from_json(&path.child(index), element, item)?);
            }
            Ok(AttributeValue::List(values))
        }
        AttributeKind::Set(element) => {
            let items = json.as_array().ok_or_else(|| mismatch(path, "set", json))?;
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                values.push(value_from_json(&path.child(index), element, item)?);
            }
            Ok(AttributeValue::set_from(values))
        }
        AttributeKind::Block(schema) => {
            let objects: Vec<&Value> = match json {
                Value::Object(_) => vec![json],
                Value::Array(items) => items.iter().collect(),
                _ => return Err(mismatch(path, "block", json)),
            };
            let mut values = Vec::with_capacity(objects.len());
            for (index, object) in objects.into_iter().enumerate() {
                values.push(block_from_json(&path.child(index), schema, object)?);
            }
            Ok(AttributeValue::List(values))
        }
    }
}

fn block_from_json(
    path: &AttributePath,
    schema: &Schema,
    json: &Value,
) -> Result<AttributeValue, SchemaError> {
    let Value::Object(object) = json else {
        return Err(mismatch(path, "block", json));
    };

    for name in object.keys() {
        if schema.get(name).is_none() {
            return Err(SchemaError::UnknownAttribute {
                path: path.child(name).to_string(),
            });
        }
    }

    let mut fields = BTreeMap::new();
    for descriptor in schema.descriptors() {
        let field_path = path.child(descriptor.name());
        match object.get(descriptor.name()).filter(|v| !v.is_null()) {
            Some(value) => {
                fields.insert(
                    descriptor.name().to_string(),
                    value_from_json(&field_path, descriptor.kind(), value)?,
                );
            }
            None => {
                if let Some(default) = descriptor.default() {
                    fields.insert(descriptor.name().to_string(), default.clone());
                } else {
                    match descriptor.mode() {
                        AttributeMode::Required => {
                            return Err(SchemaError::MissingRequired {
                                path: field_path.to_string(),
                            })
                        }
                        AttributeMode::Optional => {
                            if let Some(zero) = descriptor.kind().zero_value() {
                                fields.insert(descriptor.name().to_string(), zero);
                            }
                        }
                        // Nested computed fields stay absent until the
                        // remote read supplies them.
                        AttributeMode::Computed | AttributeMode::OptionalComputed => {}
                    }
                }
            }
        }
    }
    Ok(AttributeValue::Block(fields))
}

fn mismatch(path: &AttributePath, expected: &'static str, json: &Value) -> SchemaError {
    let found = match json {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    SchemaError::KindMismatch {
        path: path.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor::validators;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct RuleModel {
        name: String,
        action: String,
        #[serde(default)]
        priority: i64,
        #[serde(default)]
        source_ranges: Vec<String>,
        #[serde(default)]
        log_config: Option<LogConfigModel>,
        #[serde(default)]
        self_link: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct LogConfigModel {
        #[serde(default)]
        enabled: bool,
        #[serde(default)]
        sample_rate: i64,
    }

    fn rule_schema() -> Schema {
        Schema::new(vec![
            AttributeDescriptor::required("name", AttributeKind::String)
                .with_validator(validators::non_empty()),
            AttributeDescriptor::required("action", AttributeKind::String)
                .with_validator(validators::one_of(&["ALLOW", "DENY"])),
            AttributeDescriptor::optional("priority", AttributeKind::Int)
                .with_default(1000_i64)
                .with_validator(validators::int_range(0, 65535)),
            AttributeDescriptor::optional(
                "source_ranges",
                AttributeKind::Set(Box::new(AttributeKind::String)),
            ),
            AttributeDescriptor::optional(
                "log_config",
                AttributeKind::Block(Schema::new(vec![
                    AttributeDescriptor::optional("enabled", AttributeKind::Bool),
                    AttributeDescriptor::optional("sample_rate", AttributeKind::Int),
                ])),
            )
            .single(),
            AttributeDescriptor::computed("self_link", AttributeKind::String),
        ])
    }

    fn sample_model() -> RuleModel {
        RuleModel {
            name: "allow-ssh".to_string(),
            action: "ALLOW".to_string(),
            priority: 900,
            source_ranges: vec!["10.0.0.0/8".to_string(), "192.168.0.0/16".to_string()],
            log_config: Some(LogConfigModel {
                enabled: true,
                sample_rate: 5,
            }),
            self_link: None,
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let schema = rule_schema();
        let model = sample_model();

        let mut store = AttributeStore::new();
        encode(&schema, &model, &mut store).unwrap();
        let mut decoded: RuleModel = decode(&schema, &store).unwrap();

        decoded.source_ranges.sort();
        let mut expected = model.clone();
        expected.source_ranges.sort();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn encode_applies_defaults_and_zero_values() {
        let schema = rule_schema();
        let model = RuleModel {
            name: "deny-all".to_string(),
            action: "DENY".to_string(),
            priority: 0,
            source_ranges: Vec::new(),
            log_config: None,
            self_link: None,
        };

        let mut store = AttributeStore::new();
        encode(&schema, &model, &mut store).unwrap();

        // Explicit 0 is kept; the default only covers an absent field.
        assert_eq!(store.get("priority").and_then(AttributeValue::as_int), Some(0));
        assert_eq!(
            store.get("source_ranges"),
            Some(&AttributeValue::Set(Default::default()))
        );
        // Omitted block stays absent, not empty.
        assert!(store.get("log_config").is_none());
    }

    #[test]
    fn encode_preserves_remote_populated_optional_computed() {
        let schema = Schema::new(vec![
            AttributeDescriptor::required("name", AttributeKind::String),
            AttributeDescriptor::optional_computed("fingerprint", AttributeKind::String),
        ]);

        #[derive(Serialize)]
        struct Model {
            name: String,
            fingerprint: Option<String>,
        }

        let mut store = AttributeStore::new();
        store.set("fingerprint", AttributeValue::from("abc123"));

        encode(
            &schema,
            &Model {
                name: "allow-ssh".to_string(),
                fingerprint: None,
            },
            &mut store,
        )
        .unwrap();

        assert_eq!(
            store.get("fingerprint").and_then(AttributeValue::as_str),
            Some("abc123")
        );
    }

    #[test]
    fn encode_rejects_model_field_without_descriptor() {
        #[derive(Serialize)]
        struct Model {
            name: String,
            bogus: String,
        }

        let schema = Schema::new(vec![AttributeDescriptor::required(
            "name",
            AttributeKind::String,
        )]);
        let mut store = AttributeStore::new();
        let err = encode(
            &schema,
            &Model {
                name: "x".to_string(),
                bogus: "y".to_string(),
            },
            &mut store,
        )
        .unwrap_err();

        assert!(matches!(err, SchemaError::UnknownAttribute { .. }));
    }

    #[test]
    fn decode_rejects_validator_failure() {
        let schema = rule_schema();
        let mut store = AttributeStore::new();
        store.set("name", AttributeValue::from("allow-ssh"));
        store.set("action", AttributeValue::from("AUDIT"));

        let err = decode::<RuleModel>(&schema, &store).unwrap_err();
        assert!(matches!(err, SchemaError::ValidationFailed { .. }));
    }

    #[test]
    fn decode_rejects_unknown_store_attribute() {
        let schema = rule_schema();
        let mut store = AttributeStore::new();
        store.set("name", AttributeValue::from("allow-ssh"));
        store.set("action", AttributeValue::from("ALLOW"));
        store.set("colour", AttributeValue::from("red"));

        let err = decode::<RuleModel>(&schema, &store).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownAttribute { .. }));
    }

    #[test]
    fn set_encoding_is_order_independent() {
        let schema = rule_schema();
        let mut forward = sample_model();
        forward.source_ranges = vec!["a".into(), "b".into(), "c".into()];
        let mut reversed = forward.clone();
        reversed.source_ranges.reverse();

        let mut store_a = AttributeStore::new();
        let mut store_b = AttributeStore::new();
        encode(&schema, &forward, &mut store_a).unwrap();
        encode(&schema, &reversed, &mut store_b).unwrap();

        assert_eq!(store_a, store_b);
    }

    #[test]
    fn single_block_collapses_to_object() {
        let schema = rule_schema();
        let mut store = AttributeStore::new();
        encode(&schema, &sample_model(), &mut store).unwrap();

        // Stored as a one-element list of blocks.
        assert!(matches!(
            store.get("log_config"),
            Some(AttributeValue::List(items)) if items.len() == 1
        ));

        // Decoded back to a single optional object.
        let decoded: RuleModel = decode(&schema, &store).unwrap();
        assert_eq!(
            decoded.log_config,
            Some(LogConfigModel {
                enabled: true,
                sample_rate: 5,
            })
        );
    }

    #[test]
    fn cardinality_violation_is_reported() {
        let schema = Schema::new(vec![AttributeDescriptor::optional(
            "rule",
            AttributeKind::Block(Schema::new(vec![AttributeDescriptor::optional(
                "priority",
                AttributeKind::Int,
            )])),
        )
        .single()]);

        #[derive(Serialize)]
        struct Model {
            rule: Vec<serde_json::Value>,
        }

        let mut store = AttributeStore::new();
        let err = encode(
            &schema,
            &Model {
                rule: vec![
                    serde_json::json!({"priority": 1}),
                    serde_json::json!({"priority": 2}),
                ],
            },
            &mut store,
        )
        .unwrap_err();

        assert!(matches!(err, SchemaError::Cardinality { found: 2, .. }));
    }

    #[test]
    fn apply_defaults_fills_missing_arguments_only() {
        let schema = rule_schema();
        let mut store = AttributeStore::new();
        store.set("name", AttributeValue::from("allow-ssh"));
        store.set("priority", AttributeValue::from(77));

        apply_defaults(&schema, &mut store);

        assert_eq!(store.get("priority").and_then(AttributeValue::as_int), Some(77));
        // No default declared for action: stays absent.
        assert!(store.get("action").is_none());
    }
}
