//! strata - typed resource lifecycle framework for cloud management APIs
//!
//! Resource definitions declare their schema, identifier shape, and one
//! operation per lifecycle phase; the engine handles the rest: schema
//! marshalling between typed models and the per-instance attribute store,
//! existence probes and import-conflict detection before create, silent
//! "gone" handling on read, sparse-diff updates, per-phase timeouts, and
//! polling of long-running remote operations.
//!
//! # Module map
//!
//! - [`schema`] - attribute descriptors, the attribute store, marshalling
//! - [`variant`] - tag-discriminated payload families
//! - [`identity`] - identifier segments with a canonical string form
//! - [`lifecycle`] - operations, the resource contract, the engine
//! - [`poller`] - long-running-operation polling
//! - [`remote`] - the management-API client collaborator
//! - [`config`] - tuning configuration (poll cadence, endpoint)
//! - [`logging`] - opt-in tracing setup for hosts

pub mod config;
pub mod identity;
pub mod lifecycle;
pub mod logging;
pub mod poller;
pub mod remote;
pub mod schema;
pub mod variant;

/// Version injected at compile time via STRATA_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("STRATA_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub use config::FrameworkConfig;
pub use identity::{Identifier, IdentifierCodec, IdentityError};
pub use lifecycle::{
    ImportHook, InstanceState, LifecycleEngine, LifecycleError, Operation, OperationScope, Phase,
    ResourceDefinition, ResourceInstance, WorkFuture,
};
pub use poller::{PollError, PollHandle, PollState, Poller, PollerConfig, ProbeFn};
pub use remote::{ApiClient, RemoteError, TokenProvider};
pub use schema::{
    AttributeDescriptor, AttributeKind, AttributeMode, AttributePath, AttributeStore,
    AttributeValue, Schema, SchemaError,
};
pub use variant::{TaggedVariant, VariantError, VariantFamily};
