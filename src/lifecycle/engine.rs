//! Lifecycle Engine - the per-instance state machine
//!
//! Each engine method drives one phase for one instance. Methods take
//! `&self` and are safe to call concurrently for distinct instances; a
//! single instance is serialized by its `&mut ResourceInstance`.

use super::operation::{Operation, OperationScope, Phase};
use super::resource::ResourceDefinition;
use super::LifecycleError;
use crate::identity::Identifier;
use crate::schema::{self, AttributeStore, Schema};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Where an instance sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Absent,
    Planned,
    Creating,
    Present,
    Updating,
    Deleting,
    /// The tracked remote object no longer exists; a subsequent plan may
    /// re-create it.
    Gone,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstanceState::Absent => "absent",
            InstanceState::Planned => "planned",
            InstanceState::Creating => "creating",
            InstanceState::Present => "present",
            InstanceState::Updating => "updating",
            InstanceState::Deleting => "deleting",
            InstanceState::Gone => "gone",
        })
    }
}

/// One resource instance's local representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstance {
    state: InstanceState,
    store: AttributeStore,
}

impl ResourceInstance {
    /// A tracked instance, e.g. restored from durable storage.
    pub fn present(store: AttributeStore) -> Self {
        Self {
            state: InstanceState::Present,
            store,
        }
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }

    pub fn id(&self) -> Option<&str> {
        self.store.id()
    }
}

/// Sequences operations against the attribute store. Client handles are
/// read-only and shared across all instances the engine processes.
pub struct LifecycleEngine<C> {
    client: Arc<C>,
}

impl<C: Send + Sync + 'static> LifecycleEngine<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Absent -> Creating -> Present.
    ///
    /// When the definition can derive the identifier from configuration,
    /// an existence probe runs first; a live remote object yields
    /// [`LifecycleError::ImportRequired`] and no mutating call is issued.
    pub async fn create<D>(
        &self,
        definition: &D,
        mut config: AttributeStore,
    ) -> Result<ResourceInstance, LifecycleError>
    where
        D: ResourceDefinition<Client = C>,
    {
        let arguments = definition.arguments();
        schema::validate_store(&arguments, &config)?;
        schema::apply_defaults(&arguments, &mut config);
        tracing::info!(
            resource = definition.type_name(),
            state = %InstanceState::Planned,
            "create planned"
        );

        if let Some(planned) = definition.planned_identifier(&config) {
            if self.probe_exists(definition, &config, &planned).await? {
                return Err(LifecycleError::ImportRequired {
                    type_name: definition.type_name(),
                    id: definition.identifier().format(&planned),
                });
            }
        }

        tracing::info!(
            resource = definition.type_name(),
            state = %InstanceState::Creating,
            "creating"
        );
        let mut scope = self.scope(definition, Phase::Create, config, BTreeSet::new(), None);
        self.run_phase(definition.type_name(), Phase::Create, &definition.create(), &mut scope)
            .await?;

        let store = scope.into_store();
        if store.id().is_none() {
            return Err(LifecycleError::MissingIdentifier {
                phase: Phase::Create,
            });
        }
        tracing::info!(
            resource = definition.type_name(),
            id = store.id(),
            state = %InstanceState::Present,
            "created"
        );
        Ok(ResourceInstance {
            state: InstanceState::Present,
            store,
        })
    }

    /// Re-read remote state into the store. A remote not-found transitions
    /// silently to `Gone` and clears the tracked identifier - never an
    /// error, so a subsequent plan can re-create instead of wedging.
    pub async fn refresh<D>(
        &self,
        definition: &D,
        instance: &mut ResourceInstance,
    ) -> Result<(), LifecycleError>
    where
        D: ResourceDefinition<Client = C>,
    {
        if instance.store.id().is_none() {
            return Err(LifecycleError::MissingIdentifier { phase: Phase::Read });
        }

        let mut scope = self.scope(
            definition,
            Phase::Read,
            instance.store.clone(),
            BTreeSet::new(),
            None,
        );
        match self
            .run_phase(definition.type_name(), Phase::Read, &definition.read(), &mut scope)
            .await
        {
            Ok(()) => {
                instance.store = scope.into_store();
                instance.state = InstanceState::Present;
                Ok(())
            }
            Err(LifecycleError::Gone { id }) => {
                tracing::info!(
                    resource = definition.type_name(),
                    id = %id,
                    state = %InstanceState::Gone,
                    "remote object disappeared; clearing tracked state"
                );
                instance.store.clear();
                instance.state = InstanceState::Gone;
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Present -> Updating -> Present. Only runs when at least one
    /// non-computed top-level attribute differs; the changed set is
    /// exposed on the scope so the work function sends a sparse patch.
    pub async fn update<D>(
        &self,
        definition: &D,
        instance: &mut ResourceInstance,
        mut desired: AttributeStore,
    ) -> Result<(), LifecycleError>
    where
        D: ResourceDefinition<Client = C>,
    {
        let arguments = definition.arguments();
        schema::validate_store(&arguments, &desired)?;
        schema::apply_defaults(&arguments, &mut desired);

        let changed = changed_arguments(&arguments, &instance.store, &desired);
        if changed.is_empty() {
            tracing::debug!(
                resource = definition.type_name(),
                "no argument changed; skipping update"
            );
            return Ok(());
        }

        let id = instance
            .store
            .id()
            .ok_or(LifecycleError::MissingIdentifier {
                phase: Phase::Update,
            })?
            .to_string();

        // Carry the tracked identifier and remote-computed values into the
        // working store; the desired configuration only holds arguments.
        let mut work_store = desired;
        work_store.set_id(id);
        let merged = definition.arguments().merged(&definition.attributes());
        for descriptor in merged.descriptors() {
            if descriptor.mode().is_computed() && work_store.get(descriptor.name()).is_none() {
                if let Some(value) = instance.store.get(descriptor.name()) {
                    work_store.set(descriptor.name(), value.clone());
                }
            }
        }

        instance.state = InstanceState::Updating;
        tracing::info!(
            resource = definition.type_name(),
            changed = ?changed,
            state = %InstanceState::Updating,
            "updating"
        );
        let mut scope = self.scope(definition, Phase::Update, work_store, changed, None);
        match self
            .run_phase(definition.type_name(), Phase::Update, &definition.update(), &mut scope)
            .await
        {
            Ok(()) => {
                instance.store = scope.into_store();
                instance.state = InstanceState::Present;
                Ok(())
            }
            Err(error) => {
                instance.state = InstanceState::Present;
                Err(error)
            }
        }
    }

    /// Present -> Deleting -> Absent. Success clears all tracked state
    /// unconditionally, even when the delete response is empty or
    /// ambiguous; a work function reporting `Gone` counts as success.
    pub async fn destroy<D>(
        &self,
        definition: &D,
        instance: &mut ResourceInstance,
    ) -> Result<(), LifecycleError>
    where
        D: ResourceDefinition<Client = C>,
    {
        if instance.store.id().is_none() {
            instance.store.clear();
            instance.state = InstanceState::Absent;
            return Ok(());
        }

        instance.state = InstanceState::Deleting;
        let mut scope = self.scope(
            definition,
            Phase::Delete,
            instance.store.clone(),
            BTreeSet::new(),
            None,
        );
        match self
            .run_phase(definition.type_name(), Phase::Delete, &definition.delete(), &mut scope)
            .await
        {
            Ok(()) | Err(LifecycleError::Gone { .. }) => {
                instance.store.clear();
                instance.state = InstanceState::Absent;
                tracing::info!(
                    resource = definition.type_name(),
                    state = %InstanceState::Absent,
                    "deleted"
                );
                Ok(())
            }
            Err(error) => {
                instance.state = InstanceState::Present;
                Err(error)
            }
        }
    }

    /// Adopt an existing remote object: Read seeded with the identifier,
    /// then the definition's custom-import hook with the user-supplied
    /// configuration available (write-only fields a Read cannot recover).
    pub async fn import<D>(
        &self,
        definition: &D,
        id: &Identifier,
        supplied: Option<AttributeStore>,
    ) -> Result<ResourceInstance, LifecycleError>
    where
        D: ResourceDefinition<Client = C>,
    {
        let mut store = AttributeStore::new();
        store.set_id(definition.identifier().format(id));

        let mut scope = self.scope(definition, Phase::Read, store, BTreeSet::new(), supplied);
        self.run_phase(definition.type_name(), Phase::Read, &definition.read(), &mut scope)
            .await?;

        if let Some(hook) = definition.custom_import() {
            let timeout = definition.read().timeout();
            match tokio::time::timeout(timeout, hook(&mut scope)).await {
                Err(_) => {
                    return Err(LifecycleError::PhaseTimeout {
                        phase: Phase::Read,
                        timeout,
                    })
                }
                Ok(result) => result?,
            }
        }

        Ok(ResourceInstance {
            state: InstanceState::Present,
            store: scope.into_store(),
        })
    }

    /// Existence probe before create: run the Read operation against the
    /// planned identifier. `Gone` means the name is free.
    async fn probe_exists<D>(
        &self,
        definition: &D,
        config: &AttributeStore,
        planned: &Identifier,
    ) -> Result<bool, LifecycleError>
    where
        D: ResourceDefinition<Client = C>,
    {
        let mut probe_store = config.clone();
        probe_store.set_id(definition.identifier().format(planned));
        let mut scope = self.scope(definition, Phase::Read, probe_store, BTreeSet::new(), None);
        match self
            .run_phase(definition.type_name(), Phase::Read, &definition.read(), &mut scope)
            .await
        {
            Ok(()) => Ok(true),
            Err(LifecycleError::Gone { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn scope<D>(
        &self,
        definition: &D,
        phase: Phase,
        store: AttributeStore,
        changed: BTreeSet<String>,
        supplied: Option<AttributeStore>,
    ) -> OperationScope<C>
    where
        D: ResourceDefinition<Client = C>,
    {
        OperationScope::new(
            definition.type_name(),
            phase,
            Arc::clone(&self.client),
            definition.arguments().merged(&definition.attributes()),
            definition.identifier(),
            store,
            changed,
            supplied,
        )
    }

    /// Run one operation under its own timeout. The deadline cancels the
    /// in-flight work future; the resulting error is distinct from a
    /// remote-reported failure.
    async fn run_phase(
        &self,
        type_name: &'static str,
        phase: Phase,
        operation: &Operation<C>,
        scope: &mut OperationScope<C>,
    ) -> Result<(), LifecycleError> {
        let operation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "phase",
            resource = type_name,
            phase = %phase,
            operation = %operation_id
        );
        match tokio::time::timeout(operation.timeout(), operation.invoke(scope))
            .instrument(span)
            .await
        {
            Err(_) => {
                tracing::warn!(
                    resource = type_name,
                    phase = %phase,
                    timeout = ?operation.timeout(),
                    "phase deadline elapsed; in-flight work cancelled"
                );
                Err(LifecycleError::PhaseTimeout {
                    phase,
                    timeout: operation.timeout(),
                })
            }
            Ok(result) => result,
        }
    }
}

/// Top-level arguments whose desired value differs from the tracked one.
fn changed_arguments(
    arguments: &Schema,
    current: &AttributeStore,
    desired: &AttributeStore,
) -> BTreeSet<String> {
    arguments
        .descriptors()
        .filter(|descriptor| current.get(descriptor.name()) != desired.get(descriptor.name()))
        .map(|descriptor| descriptor.name().to_string())
        .collect()
}
