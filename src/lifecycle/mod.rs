//! Lifecycle layer
//!
//! Sequences a resource definition's per-phase operations against the
//! attribute store: existence probes before create, import-conflict and
//! "gone" detection, per-phase timeouts, and state persistence.
//!
//! # Architecture
//!
//! - [`operation`] - phases, operation descriptors, the live metadata scope
//! - [`resource`] - the contract every resource definition implements
//! - [`engine`] - the per-instance state machine

mod engine;
mod operation;
mod resource;

pub use engine::{InstanceState, LifecycleEngine, ResourceInstance};
pub use operation::{Operation, OperationScope, Phase, WorkFuture};
pub use resource::{ImportHook, ResourceDefinition};

use crate::identity::IdentityError;
use crate::poller::PollError;
use crate::schema::SchemaError;
use crate::variant::VariantError;
use std::time::Duration;

/// Terminal failure of a lifecycle phase.
///
/// `Gone` and `ImportRequired` are control flow as much as errors: the
/// engine intercepts `Gone` on Read and Delete (silent transition), and
/// `ImportRequired` is user-actionable and never retried.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("a {type_name} with id `{id}` already exists - import it into tracked state instead of re-creating it")]
    ImportRequired { type_name: &'static str, id: String },

    #[error("resource `{id}` no longer exists remotely")]
    Gone { id: String },

    #[error("{phase} phase did not complete within {timeout:?}")]
    PhaseTimeout { phase: Phase, timeout: Duration },

    #[error("remote system rejected the {phase} call")]
    RemoteOperationFailed {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    #[error("no identifier is tracked for this instance ({phase} phase)")]
    MissingIdentifier { phase: Phase },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Poll(#[from] PollError),
}
