//! Resource identifiers - ordered scope segments with a canonical form
//!
//! An identifier is a tuple of `key/value` scope segments
//! (`projects/acme/firewalls/allow-ssh`). The codec's `parse` is the left
//! inverse of `format`: values are percent-encoded on the way out so the
//! round trip holds even for values containing `/` or `%`.

use std::fmt;

/// A parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    segments: Vec<(String, String)>,
}

impl Identifier {
    pub fn new(
        segments: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self {
            segments: segments
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Value of the named scope segment.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}/{}", key, urlencoding::encode(value))?;
        }
        Ok(())
    }
}

/// Identifier parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("identifier has {found} segment(s), expected {expected}")]
    SegmentCount { expected: usize, found: usize },

    #[error("identifier segment {position} is `{found}`, expected `{expected}`")]
    SegmentKey {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("identifier segment `{key}` has an empty value")]
    EmptySegment { key: String },

    #[error("identifier segment `{key}` is not valid percent-encoding")]
    Malformed { key: String },
}

/// Formats and parses identifiers for one resource type's scope shape.
#[derive(Debug, Clone)]
pub struct IdentifierCodec {
    keys: Vec<String>,
}

impl IdentifierCodec {
    pub fn new(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Build an identifier from scope values, in key order.
    pub fn build(&self, values: &[&str]) -> Result<Identifier, IdentityError> {
        if values.len() != self.keys.len() {
            return Err(IdentityError::SegmentCount {
                expected: self.keys.len(),
                found: values.len(),
            });
        }
        for (key, value) in self.keys.iter().zip(values) {
            if value.is_empty() {
                return Err(IdentityError::EmptySegment { key: key.clone() });
            }
        }
        Ok(Identifier::new(
            self.keys.iter().map(String::as_str).zip(values.iter().copied()),
        ))
    }

    /// Canonical string form.
    pub fn format(&self, id: &Identifier) -> String {
        id.to_string()
    }

    /// Parse the canonical form back into an identifier.
    pub fn parse(&self, input: &str) -> Result<Identifier, IdentityError> {
        let parts: Vec<&str> = input.split('/').collect();
        if parts.len() != self.keys.len() * 2 {
            return Err(IdentityError::SegmentCount {
                expected: self.keys.len(),
                found: parts.len() / 2,
            });
        }

        let mut segments = Vec::with_capacity(self.keys.len());
        for (position, key) in self.keys.iter().enumerate() {
            let found_key = parts[position * 2];
            if found_key != key {
                return Err(IdentityError::SegmentKey {
                    position,
                    expected: key.clone(),
                    found: found_key.to_string(),
                });
            }
            let raw_value = parts[position * 2 + 1];
            if raw_value.is_empty() {
                return Err(IdentityError::EmptySegment { key: key.clone() });
            }
            let value = urlencoding::decode(raw_value)
                .map_err(|_| IdentityError::Malformed { key: key.clone() })?;
            segments.push((key.clone(), value.into_owned()));
        }
        Ok(Identifier { segments })
    }
}
