//! Property-based tests using proptest
//!
//! Verifies the marshaller's round-trip and set-permutation guarantees,
//! the identifier codec's parse/format inverse, and discriminator/variant
//! pairing across a whole family.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use strata::schema::{
    decode, encode, validators, AttributeDescriptor, AttributeKind, AttributeStore, Schema,
};
use strata::{IdentifierCodec, TaggedVariant, VariantFamily};

// =============================================================================
// Marshaller properties
// =============================================================================

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
    ])
}

fn arb_model() -> impl Strategy<Value = RuleModel> {
    (
        "[a-z][a-z0-9-]{0,15}",
        prop_oneof!["ALLOW", "DENY"],
        0i64..=65535,
        prop::collection::vec("[0-9]{1,3}\\.[0-9]{1,3}\\.0\\.0/[0-9]{1,2}", 0..6),
        prop::option::of((any::<bool>(), 0i64..100)),
    )
        .prop_map(|(name, action, priority, source_ranges, log)| RuleModel {
            name,
            action,
            priority,
            source_ranges,
            log_config: log.map(|(enabled, sample_rate)| LogConfigModel {
                enabled,
                sample_rate,
            }),
        })
}

/// Set semantics: order-insensitive, duplicates collapse.
fn normalized_ranges(ranges: &[String]) -> Vec<String> {
    let mut out: Vec<String> = ranges.to_vec();
    out.sort();
    out.dedup();
    out
}

proptest! {
    /// decode(encode(m)) == m for every valid model, up to set semantics.
    #[test]
    fn encode_decode_round_trips(model in arb_model()) {
        let schema = rule_schema();
        let mut store = AttributeStore::new();
        encode(&schema, &model, &mut store).unwrap();
        let decoded: RuleModel = decode(&schema, &store).unwrap();

        prop_assert_eq!(&decoded.name, &model.name);
        prop_assert_eq!(&decoded.action, &model.action);
        prop_assert_eq!(decoded.priority, model.priority);
        prop_assert_eq!(&decoded.log_config, &model.log_config);
        prop_assert_eq!(
            normalized_ranges(&decoded.source_ranges),
            normalized_ranges(&model.source_ranges)
        );
    }

    /// Encoding the same logical set in any element order produces an
    /// identical store representation.
    #[test]
    fn set_encoding_is_permutation_invariant(
        model in arb_model(),
        rotation in 0usize..8,
        reverse in any::<bool>()
    ) {
        let schema = rule_schema();

        let mut permuted = model.clone();
        if !permuted.source_ranges.is_empty() {
            let len = permuted.source_ranges.len();
            permuted.source_ranges.rotate_left(rotation % len);
        }
        if reverse {
            permuted.source_ranges.reverse();
        }

        let mut store_a = AttributeStore::new();
        let mut store_b = AttributeStore::new();
        encode(&schema, &model, &mut store_a).unwrap();
        encode(&schema, &permuted, &mut store_b).unwrap();

        prop_assert_eq!(store_a, store_b);
    }

    /// Encoding twice into the same store is idempotent.
    #[test]
    fn double_encode_is_idempotent(model in arb_model()) {
        let schema = rule_schema();
        let mut store = AttributeStore::new();
        encode(&schema, &model, &mut store).unwrap();
        let first = store.clone();
        encode(&schema, &model, &mut store).unwrap();
        prop_assert_eq!(first, store);
    }
}

// =============================================================================
// Identifier codec properties
// =============================================================================

proptest! {
    /// parse(format(id)) == id, including values containing separators
    /// and percent signs.
    #[test]
    fn identifier_round_trips(
        project in "[ -~]{1,24}",
        name in "[ -~]{1,24}"
    ) {
        let codec = IdentifierCodec::new(&["projects", "firewalls"]);
        let id = codec.build(&[project.as_str(), name.as_str()]).unwrap();
        let parsed = codec.parse(&codec.format(&id)).unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// Formatted identifiers always have the declared segment layout.
    #[test]
    fn formatted_identifiers_have_stable_layout(
        project in "[a-z0-9-]{1,16}",
        name in "[a-z0-9-]{1,16}"
    ) {
        let codec = IdentifierCodec::new(&["projects", "firewalls"]);
        let id = codec.build(&[project.as_str(), name.as_str()]).unwrap();
        let formatted = codec.format(&id);
        prop_assert!(formatted.starts_with("projects/"));
        prop_assert_eq!(formatted.split('/').count(), 4);
    }
}

// =============================================================================
// Variant pairing properties
// =============================================================================

const CONDITIONS: VariantFamily =
    VariantFamily::new("rule condition", "kind", &["SourceIp", "Protocol", "Tag"]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SourceIpCondition {
    ranges: Vec<String>,
}

impl TaggedVariant for SourceIpCondition {
    const DISCRIMINATOR: &'static str = "SourceIp";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProtocolCondition {
    protocol: String,
    #[serde(default)]
    ports: Vec<String>,
}

impl TaggedVariant for ProtocolCondition {
    const DISCRIMINATOR: &'static str = "Protocol";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TagCondition {
    tags: Vec<String>,
}

impl TaggedVariant for TagCondition {
    const DISCRIMINATOR: &'static str = "Tag";
}

proptest! {
    /// For every declared discriminator d: narrow::<D>(widen::<D>(p))
    /// matches, and narrowing to any other declared variant does not -
    /// the copy-paste-discriminator defect cannot survive this matrix.
    #[test]
    fn discriminator_variant_pairing_is_exhaustive(
        ranges in prop::collection::vec("[0-9./]{1,18}", 0..4),
        protocol in "[a-z]{2,6}",
        ports in prop::collection::vec("[0-9]{1,5}", 0..4),
        tags in prop::collection::vec("[a-z-]{1,10}", 0..4)
    ) {
        let source_ip = CONDITIONS.widen(&SourceIpCondition { ranges: ranges.clone() }).unwrap();
        let proto = CONDITIONS.widen(&ProtocolCondition { protocol: protocol.clone(), ports: ports.clone() }).unwrap();
        let tag = CONDITIONS.widen(&TagCondition { tags: tags.clone() }).unwrap();

        // Matched for their own discriminator, with the payload intact.
        prop_assert_eq!(
            CONDITIONS.narrow::<SourceIpCondition>(&source_ip).unwrap(),
            Some(SourceIpCondition { ranges })
        );
        prop_assert_eq!(
            CONDITIONS.narrow::<ProtocolCondition>(&proto).unwrap(),
            Some(ProtocolCondition { protocol, ports })
        );
        prop_assert_eq!(
            CONDITIONS.narrow::<TagCondition>(&tag).unwrap(),
            Some(TagCondition { tags })
        );

        // Unmatched for every other variant in the family.
        prop_assert_eq!(CONDITIONS.narrow::<ProtocolCondition>(&source_ip).unwrap(), None);
        prop_assert_eq!(CONDITIONS.narrow::<TagCondition>(&source_ip).unwrap(), None);
        prop_assert_eq!(CONDITIONS.narrow::<SourceIpCondition>(&proto).unwrap(), None);
        prop_assert_eq!(CONDITIONS.narrow::<TagCondition>(&proto).unwrap(), None);
        prop_assert_eq!(CONDITIONS.narrow::<SourceIpCondition>(&tag).unwrap(), None);
        prop_assert_eq!(CONDITIONS.narrow::<ProtocolCondition>(&tag).unwrap(), None);
    }

    /// The discriminator stamped by widen is always the payload type's own.
    #[test]
    fn widen_stamps_the_types_own_discriminator(tags in prop::collection::vec("[a-z]{1,8}", 0..4)) {
        let envelope = CONDITIONS.widen(&TagCondition { tags }).unwrap();
        prop_assert_eq!(envelope.get("kind"), Some(&json!("Tag")));
    }
}
