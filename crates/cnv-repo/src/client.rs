//! The `RepositoryClient` contract.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::Value;

use cnv_model::EntityType;

use crate::error::RepoError;

/// A raw entity document together with the ETag guarding its next write.
#[derive(Debug, Clone)]
pub struct VersionedValue {
    pub etag: String,
    pub value: Value,
}

/// Incoming-link map: relation name → set of referring entity identifiers.
pub type IncomingLinks = HashMap<String, BTreeSet<String>>;

/// JSON-document CRUD against the upstream entity store.
///
/// Implementations must be thread-safe; one client is shared across all
/// listener and worker tasks. Every network call carries a finite timeout.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Read one entity. `Ok(None)` when the upstream has no such entity.
    async fn read(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> Result<Option<VersionedValue>, RepoError>;

    /// Create an entity; the upstream assigns the identifier. The returned
    /// document carries the assigned `id` and the initial ETag.
    async fn create(
        &self,
        entity_type: EntityType,
        body: Value,
    ) -> Result<VersionedValue, RepoError>;

    /// ETag-conditioned replace, returning the stored document and its new
    /// ETag. A stale `etag` yields [`RepoError::Conflict`].
    async fn update_and_read(
        &self,
        entity_type: EntityType,
        id: &str,
        etag: &str,
        body: Value,
    ) -> Result<VersionedValue, RepoError>;

    /// Entities that reference `id`, grouped by relation name.
    async fn incoming(&self, id: &str) -> Result<IncomingLinks, RepoError>;

    /// Identifiers of entities of `entity_type` whose `attr` equals `value`.
    async fn find_by_attribute(
        &self,
        entity_type: EntityType,
        attr: &str,
        value: &Value,
    ) -> Result<Vec<String>, RepoError>;

    /// Cheap connectivity probe used at startup.
    async fn ping(&self) -> Result<(), RepoError>;
}
