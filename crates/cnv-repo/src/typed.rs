//! Typed helpers layered over the JSON-level [`RepositoryClient`].
//!
//! The JSON surface keeps the trait object-safe; these functions add the
//! serde round-trip and attach entity identifiers to decode failures so the
//! aggregator can skip undeserializable children instead of aborting.

use serde_json::Value;

use cnv_model::{PersistentEntity, Versioned};

use crate::client::{RepositoryClient, VersionedValue};
use crate::error::RepoError;

fn decode<T: PersistentEntity>(id: &str, raw: VersionedValue) -> Result<Versioned<T>, RepoError> {
    let entity: T = serde_json::from_value(raw.value).map_err(|e| RepoError::Malformed {
        id: id.to_string(),
        detail: e.to_string(),
    })?;
    Ok(Versioned::new(raw.etag, entity))
}

fn encode<T: PersistentEntity>(entity: &T) -> Result<Value, RepoError> {
    serde_json::to_value(entity).map_err(|e| RepoError::Malformed {
        id: entity.id().to_string(),
        detail: e.to_string(),
    })
}

/// Read and decode one entity.
pub async fn read<T: PersistentEntity>(
    client: &dyn RepositoryClient,
    id: &str,
) -> Result<Option<Versioned<T>>, RepoError> {
    match client.read(T::TYPE, id).await? {
        Some(raw) => decode(id, raw).map(Some),
        None => Ok(None),
    }
}

/// Create an entity; the returned record carries the upstream-assigned id.
pub async fn create<T: PersistentEntity>(
    client: &dyn RepositoryClient,
    entity: &T,
) -> Result<Versioned<T>, RepoError> {
    let raw = client.create(T::TYPE, encode(entity)?).await?;
    let id = raw
        .value
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    decode(&id, raw)
}

/// ETag-conditioned write of a previously-read entity, returning the fresh
/// stored version.
pub async fn update_and_read<T: PersistentEntity>(
    client: &dyn RepositoryClient,
    current: &Versioned<T>,
) -> Result<Versioned<T>, RepoError> {
    let id = current.entity.id().to_string();
    let raw = client
        .update_and_read(T::TYPE, &id, &current.etag, encode(&current.entity)?)
        .await?;
    decode(&id, raw)
}
