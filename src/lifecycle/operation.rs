//! Operation descriptors and the live metadata scope
//!
//! A resource definition provides one [`Operation`] per phase: a timeout
//! and a work function. Work functions are written as plain async fns and
//! wrapped at the call site:
//!
//! ```ignore
//! fn create(&self) -> Operation<ApiClient> {
//!     Operation::new(Duration::from_secs(30 * 60), |scope| Box::pin(create_rule(scope)))
//! }
//!
//! async fn create_rule(scope: &mut OperationScope<ApiClient>) -> Result<(), LifecycleError> {
//!     let model: RuleModel = scope.decode()?;
//!     // remote calls via scope.client() ...
//! }
//! ```

use super::LifecycleError;
use crate::identity::{Identifier, IdentifierCodec};
use crate::schema::{self, AttributeStore, Schema};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle phase a scope is executing under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Create => "create",
            Phase::Read => "read",
            Phase::Update => "update",
            Phase::Delete => "delete",
        })
    }
}

/// Future returned by a work function, borrowing the scope it runs in.
pub type WorkFuture<'a> = BoxFuture<'a, Result<(), LifecycleError>>;

type WorkFn<C> = Arc<dyn for<'a> Fn(&'a mut OperationScope<C>) -> WorkFuture<'a> + Send + Sync>;

/// A named phase's unit of work plus its timeout. Ephemeral: built fresh
/// by the resource definition for each invocation.
pub struct Operation<C> {
    timeout: Duration,
    work: WorkFn<C>,
}

impl<C> Operation<C> {
    pub fn new<F>(timeout: Duration, work: F) -> Self
    where
        F: for<'a> Fn(&'a mut OperationScope<C>) -> WorkFuture<'a> + Send + Sync + 'static,
    {
        Self {
            timeout,
            work: Arc::new(work),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn invoke<'a>(&self, scope: &'a mut OperationScope<C>) -> WorkFuture<'a> {
        (self.work)(scope)
    }
}

impl<C> Clone for Operation<C> {
    fn clone(&self) -> Self {
        Self {
            timeout: self.timeout,
            work: Arc::clone(&self.work),
        }
    }
}

/// Live metadata handed to a work function: the client handle, the
/// instance's store, schema and identifier helpers, and phase context.
pub struct OperationScope<C> {
    type_name: &'static str,
    phase: Phase,
    client: Arc<C>,
    schema: Schema,
    codec: IdentifierCodec,
    store: AttributeStore,
    changed: BTreeSet<String>,
    supplied: Option<AttributeStore>,
}

impl<C> OperationScope<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        type_name: &'static str,
        phase: Phase,
        client: Arc<C>,
        schema: Schema,
        codec: IdentifierCodec,
        store: AttributeStore,
        changed: BTreeSet<String>,
        supplied: Option<AttributeStore>,
    ) -> Self {
        Self {
            type_name,
            phase,
            client,
            schema,
            codec,
            store,
            changed,
            supplied,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The injected remote client handle.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Decode the instance's store into a typed model.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, LifecycleError> {
        Ok(schema::decode(&self.schema, &self.store)?)
    }

    /// Encode a typed model back into the instance's store.
    pub fn encode<T: Serialize>(&mut self, model: &T) -> Result<(), LifecycleError> {
        Ok(schema::encode(&self.schema, model, &mut self.store)?)
    }

    /// Decode the user-supplied configuration made available to the
    /// custom-import hook.
    pub fn decode_supplied<T: DeserializeOwned>(&self) -> Result<Option<T>, LifecycleError> {
        match &self.supplied {
            None => Ok(None),
            Some(supplied) => Ok(Some(schema::decode(&self.schema, supplied)?)),
        }
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AttributeStore {
        &mut self.store
    }

    pub fn codec(&self) -> &IdentifierCodec {
        &self.codec
    }

    /// The instance's tracked identifier.
    pub fn id(&self) -> Result<Identifier, LifecycleError> {
        let raw = self.store.id().ok_or(LifecycleError::MissingIdentifier {
            phase: self.phase,
        })?;
        Ok(self.codec.parse(raw)?)
    }

    /// Persist the canonical identifier into the store.
    pub fn set_id(&mut self, id: &Identifier) {
        self.store.set_id(self.codec.format(id));
    }

    /// Whether a top-level attribute differs between desired and tracked
    /// state (update phase only; empty otherwise).
    pub fn has_change(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    pub fn changed(&self) -> &BTreeSet<String> {
        &self.changed
    }

    /// The remote object is gone: return this from a Read or Delete work
    /// function to let the engine transition silently instead of failing.
    pub fn mark_as_gone(&self, id: &Identifier) -> LifecycleError {
        tracing::debug!(
            resource = self.type_name,
            id = %self.codec.format(id),
            "remote reports not-found"
        );
        LifecycleError::Gone {
            id: self.codec.format(id),
        }
    }

    /// A live remote object shadows the planned create. Terminal and
    /// user-actionable; the engine raises this itself after a successful
    /// existence probe.
    pub fn requires_import(&self, id: &Identifier) -> LifecycleError {
        LifecycleError::ImportRequired {
            type_name: self.type_name,
            id: self.codec.format(id),
        }
    }

    /// Wrap a remote failure with this scope's phase.
    pub fn remote_failure(&self, error: impl Into<anyhow::Error>) -> LifecycleError {
        LifecycleError::RemoteOperationFailed {
            phase: self.phase,
            source: error.into(),
        }
    }

    pub(crate) fn into_store(self) -> AttributeStore {
        self.store
    }
}
