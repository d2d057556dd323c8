//! Variant Resolver - tag-discriminated payload families
//!
//! Management APIs carry polymorphic payloads whose concrete shape is
//! named by a discriminator field on the wire (`"kind": "Protocol"`).
//! A [`VariantFamily`] declares the closed set of discriminators for one
//! such family; [`VariantFamily::narrow`] re-interprets a generic payload
//! as one concrete shape and [`VariantFamily::widen`] builds the tagged
//! envelope for outbound serialization.
//!
//! The discriminator belongs to the payload type itself (an associated
//! const), so a resolver can never compare against a neighbouring
//! variant's constant - mismatched pairings fail the exhaustiveness tests
//! below instead of silently narrowing the wrong shape.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A concrete shape within a discriminated payload family.
pub trait TaggedVariant: Serialize + DeserializeOwned {
    /// Discriminator value carried in the serialized payload.
    const DISCRIMINATOR: &'static str;
}

/// Failure to resolve a payload against a variant family.
#[derive(Debug, thiserror::Error)]
pub enum VariantError {
    #[error("{family} payload has no `{tag_field}` discriminator field")]
    MissingDiscriminator {
        family: &'static str,
        tag_field: &'static str,
    },

    #[error("unknown {family} variant `{found}`, known variants: {known:?}")]
    UnknownVariant {
        family: &'static str,
        found: String,
        known: &'static [&'static str],
    },

    #[error("variant `{discriminator}` is not part of the {family} family")]
    ForeignVariant {
        family: &'static str,
        discriminator: &'static str,
    },

    #[error("failed to decode {family} variant `{discriminator}`: {message}")]
    Decode {
        family: &'static str,
        discriminator: &'static str,
        message: String,
    },

    #[error("failed to encode {family} variant `{discriminator}`: {message}")]
    Encode {
        family: &'static str,
        discriminator: &'static str,
        message: String,
    },
}

/// The closed, enumerable set of discriminators for one payload family.
#[derive(Debug, Clone, Copy)]
pub struct VariantFamily {
    name: &'static str,
    tag_field: &'static str,
    known: &'static [&'static str],
}

impl VariantFamily {
    pub const fn new(
        name: &'static str,
        tag_field: &'static str,
        known: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            tag_field,
            known,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn known(&self) -> &'static [&'static str] {
        self.known
    }

    /// Read and vet the discriminator carried by a payload.
    ///
    /// A discriminator outside the declared set is surfaced as
    /// [`VariantError::UnknownVariant`] so callers can decide between
    /// failing and best-effort passthrough - it is never coerced.
    pub fn discriminator_of<'a>(&self, payload: &'a Value) -> Result<&'a str, VariantError> {
        let tag = payload
            .get(self.tag_field)
            .and_then(Value::as_str)
            .ok_or(VariantError::MissingDiscriminator {
                family: self.name,
                tag_field: self.tag_field,
            })?;
        if !self.known.contains(&tag) {
            return Err(VariantError::UnknownVariant {
                family: self.name,
                found: tag.to_string(),
                known: self.known,
            });
        }
        Ok(tag)
    }

    /// Narrow a generic payload to the concrete shape `T`.
    ///
    /// `Ok(None)` means the payload carries a different known
    /// discriminator - "wrong variant", not an error - and the caller
    /// should try the next candidate.
    pub fn narrow<T: TaggedVariant>(&self, payload: &Value) -> Result<Option<T>, VariantError> {
        let tag = self.discriminator_of(payload)?;
        if tag != T::DISCRIMINATOR {
            return Ok(None);
        }

        let mut body = payload.clone();
        if let Some(object) = body.as_object_mut() {
            object.remove(self.tag_field);
        }
        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| VariantError::Decode {
                family: self.name,
                discriminator: T::DISCRIMINATOR,
                message: e.to_string(),
            })
    }

    /// Widen a concrete shape into its tagged envelope for serialization.
    pub fn widen<T: TaggedVariant>(&self, payload: &T) -> Result<Value, VariantError> {
        if !self.known.contains(&T::DISCRIMINATOR) {
            return Err(VariantError::ForeignVariant {
                family: self.name,
                discriminator: T::DISCRIMINATOR,
            });
        }

        let mut envelope = serde_json::to_value(payload).map_err(|e| VariantError::Encode {
            family: self.name,
            discriminator: T::DISCRIMINATOR,
            message: e.to_string(),
        })?;
        let Some(object) = envelope.as_object_mut() else {
            return Err(VariantError::Encode {
                family: self.name,
                discriminator: T::DISCRIMINATOR,
                message: "variant payload must serialize to an object".to_string(),
            });
        };
        object.insert(
            self.tag_field.to_string(),
            Value::String(T::DISCRIMINATOR.to_string()),
        );
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    const CONDITIONS: VariantFamily =
        VariantFamily::new("rule condition", "kind", &["SourceIp", "Protocol", "Tag"]);

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SourceIpCondition {
        ranges: Vec<String>,
    }

    impl TaggedVariant for SourceIpCondition {
        const DISCRIMINATOR: &'static str = "SourceIp";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ProtocolCondition {
        protocol: String,
        #[serde(default)]
        ports: Vec<String>,
    }

    impl TaggedVariant for ProtocolCondition {
        const DISCRIMINATOR: &'static str = "Protocol";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TagCondition {
        tags: Vec<String>,
    }

    impl TaggedVariant for TagCondition {
        const DISCRIMINATOR: &'static str = "Tag";
    }

    #[test]
    fn narrow_matches_its_own_discriminator_only() {
        let payload = CONDITIONS
            .widen(&ProtocolCondition {
                protocol: "tcp".to_string(),
                ports: vec!["22".to_string()],
            })
            .unwrap();

        // Every declared pairing: matched for its own type, unmatched for
        // every other type in the family.
        assert!(CONDITIONS
            .narrow::<ProtocolCondition>(&payload)
            .unwrap()
            .is_some());
        assert!(CONDITIONS
            .narrow::<SourceIpCondition>(&payload)
            .unwrap()
            .is_none());
        assert!(CONDITIONS.narrow::<TagCondition>(&payload).unwrap().is_none());
    }

    #[test]
    fn widen_then_narrow_round_trips() {
        let condition = SourceIpCondition {
            ranges: vec!["10.0.0.0/8".to_string()],
        };
        let envelope = CONDITIONS.widen(&condition).unwrap();
        assert_eq!(envelope["kind"], "SourceIp");

        let narrowed: SourceIpCondition = CONDITIONS.narrow(&envelope).unwrap().unwrap();
        assert_eq!(narrowed, condition);
    }

    #[test]
    fn unknown_discriminator_is_a_typed_error() {
        let payload = json!({"kind": "GeoMatch", "countries": ["NL"]});
        let err = CONDITIONS.narrow::<TagCondition>(&payload).unwrap_err();
        assert!(matches!(
            err,
            VariantError::UnknownVariant { ref found, .. } if found == "GeoMatch"
        ));
    }

    #[test]
    fn missing_discriminator_is_distinguishable() {
        let payload = json!({"tags": ["web"]});
        let err = CONDITIONS.narrow::<TagCondition>(&payload).unwrap_err();
        assert!(matches!(err, VariantError::MissingDiscriminator { .. }));
    }

    #[test]
    fn widen_rejects_a_variant_outside_the_family() {
        #[derive(Serialize, Deserialize)]
        struct Stray {
            value: String,
        }
        impl TaggedVariant for Stray {
            const DISCRIMINATOR: &'static str = "Stray";
        }

        let err = CONDITIONS
            .widen(&Stray {
                value: "x".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, VariantError::ForeignVariant { .. }));
    }

    #[test]
    fn decode_failure_names_family_and_discriminator() {
        let payload = json!({"kind": "Tag", "tags": "not-an-array"});
        let err = CONDITIONS.narrow::<TagCondition>(&payload).unwrap_err();
        assert!(matches!(
            err,
            VariantError::Decode {
                discriminator: "Tag",
                ..
            }
        ));
    }
}
