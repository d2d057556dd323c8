//! Schema layer
//!
//! Declarative attribute descriptors, the per-instance attribute store,
//! and the marshaller that moves typed models in and out of it.
//!
//! # Architecture
//!
//! - [`descriptor`] - attribute descriptors, schemas, stock validators
//! - [`store`] - the dynamically-typed, schema-validated value container
//! - [`marshal`] - `decode`/`encode` between stores and serde models

mod descriptor;
mod marshal;
mod store;

pub use descriptor::{
    validators, AttributeDescriptor, AttributeKind, AttributeMode, Schema, Validator,
};
pub use marshal::{apply_defaults, decode, encode, validate_store, SchemaError};
pub use store::{AttributePath, AttributeStore, AttributeValue};
