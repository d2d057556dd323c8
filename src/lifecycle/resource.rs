//! The contract every resource definition implements
//!
//! A definition declares its schema (user-settable arguments and
//! remote-computed attributes), its identifier shape, and one operation
//! per lifecycle phase. The engine consumes nothing else.

use super::operation::{Operation, OperationScope, WorkFuture};
use crate::identity::{Identifier, IdentifierCodec};
use crate::schema::{AttributeStore, Schema};
use std::sync::Arc;

/// Hook run after an import-driven Read, with the user-supplied
/// configuration available on the scope - for fields the remote Read
/// cannot recover (write-only secrets and the like).
pub type ImportHook<C> =
    Arc<dyn for<'a> Fn(&'a mut OperationScope<C>) -> WorkFuture<'a> + Send + Sync>;

/// One manageable resource type.
pub trait ResourceDefinition: Send + Sync {
    /// Remote client handle injected into every operation scope.
    type Client: Send + Sync + 'static;

    /// Stable name used in identifiers, logs, and error messages.
    fn type_name(&self) -> &'static str;

    /// User-settable schema.
    fn arguments(&self) -> Schema;

    /// Remote-computed-only schema.
    fn attributes(&self) -> Schema;

    /// Identifier shape for this resource type.
    fn identifier(&self) -> IdentifierCodec;

    fn create(&self) -> Operation<Self::Client>;
    fn read(&self) -> Operation<Self::Client>;
    fn update(&self) -> Operation<Self::Client>;
    fn delete(&self) -> Operation<Self::Client>;

    /// Identifier the resource would get if created from this
    /// configuration, when derivable. Enables the pre-create existence
    /// probe; `None` (the default) skips it for remote-assigned ids.
    fn planned_identifier(&self, _config: &AttributeStore) -> Option<Identifier> {
        None
    }

    /// Optional post-import hook; see [`ImportHook`].
    fn custom_import(&self) -> Option<ImportHook<Self::Client>> {
        None
    }
}
