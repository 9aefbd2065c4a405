//! In-memory `RepositoryClient` with real optimistic-concurrency semantics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use cnv_model::{EntityType, PersistentEntity};
use cnv_repo::{IncomingLinks, RepoError, RepositoryClient, VersionedValue};

struct Stored {
    entity_type: EntityType,
    version: u64,
    value: Value,
    /// Conditional-write attempts that will be failed with `Conflict`
    /// regardless of the presented ETag. Decremented per attempt.
    injected_conflicts: u32,
    /// Successful conditional writes.
    updates: u32,
}

#[derive(Default)]
struct Store {
    seq: u64,
    entities: HashMap<String, Stored>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

fn etag(version: u64) -> String {
    format!("\"v{version}\"")
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn mint_id(store: &mut Store, entity_type: EntityType) -> String {
        store.seq += 1;
        format!(
            "https://repo.local/{}/{}",
            entity_type.collection(),
            store.seq
        )
    }

    /// Store an entity, minting an identifier when it has none. Returns the
    /// stored identifier.
    pub fn seed<T: PersistentEntity>(&self, mut entity: T) -> String {
        let mut store = self.store.lock();
        let id = if entity.id().is_empty() {
            Self::mint_id(&mut store, T::TYPE)
        } else {
            entity.id().to_string()
        };
        entity.set_id(id.clone());
        let value = serde_json::to_value(&entity).expect("fixture entities serialize");
        store.entities.insert(
            id.clone(),
            Stored {
                entity_type: T::TYPE,
                version: 1,
                value,
                injected_conflicts: 0,
                updates: 0,
            },
        );
        id
    }

    /// Read back a stored entity, decoded.
    pub fn get<T: PersistentEntity>(&self, id: &str) -> Option<T> {
        let store = self.store.lock();
        let stored = store.entities.get(id)?;
        serde_json::from_value(stored.value.clone()).ok()
    }

    /// Successful conditional writes against `id` so far.
    pub fn update_count(&self, id: &str) -> u32 {
        self.store
            .lock()
            .entities
            .get(id)
            .map(|s| s.updates)
            .unwrap_or(0)
    }

    /// Fail the next `n` conditional writes against `id` with a conflict.
    pub fn inject_conflicts(&self, id: &str, n: u32) {
        if let Some(stored) = self.store.lock().entities.get_mut(id) {
            stored.injected_conflicts = n;
        }
    }

    /// Identifiers of all stored entities of one type.
    pub fn ids_of(&self, entity_type: EntityType) -> Vec<String> {
        let store = self.store.lock();
        let mut ids: Vec<String> = store
            .entities
            .iter()
            .filter(|(_, s)| s.entity_type == entity_type)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Does `value` reference `id`, directly or inside an array?
fn references(value: &Value, id: &str) -> bool {
    match value {
        Value::String(s) => s == id,
        Value::Array(items) => items.iter().any(|v| references(v, id)),
        _ => false,
    }
}

#[async_trait]
impl RepositoryClient for InMemoryRepository {
    async fn read(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> Result<Option<VersionedValue>, RepoError> {
        let store = self.store.lock();
        Ok(store
            .entities
            .get(id)
            .filter(|stored| stored.entity_type == entity_type)
            .map(|stored| VersionedValue {
                etag: etag(stored.version),
                value: stored.value.clone(),
            }))
    }

    async fn create(
        &self,
        entity_type: EntityType,
        mut body: Value,
    ) -> Result<VersionedValue, RepoError> {
        let mut store = self.store.lock();
        let id = Self::mint_id(&mut store, entity_type);
        body["id"] = Value::String(id.clone());
        store.entities.insert(
            id,
            Stored {
                entity_type,
                version: 1,
                value: body.clone(),
                injected_conflicts: 0,
                updates: 0,
            },
        );
        Ok(VersionedValue {
            etag: etag(1),
            value: body,
        })
    }

    async fn update_and_read(
        &self,
        _entity_type: EntityType,
        id: &str,
        presented_etag: &str,
        mut body: Value,
    ) -> Result<VersionedValue, RepoError> {
        let mut store = self.store.lock();
        let stored = store
            .entities
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound { id: id.to_string() })?;

        if stored.injected_conflicts > 0 {
            stored.injected_conflicts -= 1;
            return Err(RepoError::Conflict { id: id.to_string() });
        }
        if presented_etag != etag(stored.version) {
            return Err(RepoError::Conflict { id: id.to_string() });
        }

        body["id"] = Value::String(id.to_string());
        stored.version += 1;
        stored.value = body.clone();
        stored.updates += 1;
        Ok(VersionedValue {
            etag: etag(stored.version),
            value: body,
        })
    }

    async fn incoming(&self, id: &str) -> Result<IncomingLinks, RepoError> {
        let store = self.store.lock();
        let mut links = IncomingLinks::new();
        for (owner_id, stored) in &store.entities {
            let Some(fields) = stored.value.as_object() else {
                continue;
            };
            for (field, value) in fields {
                if field != "id" && references(value, id) {
                    links
                        .entry(field.clone())
                        .or_default()
                        .insert(owner_id.clone());
                }
            }
        }
        Ok(links)
    }

    async fn find_by_attribute(
        &self,
        entity_type: EntityType,
        attr: &str,
        value: &Value,
    ) -> Result<Vec<String>, RepoError> {
        let store = self.store.lock();
        let mut ids: Vec<String> = store
            .entities
            .iter()
            .filter(|(_, stored)| stored.entity_type == entity_type)
            .filter(|(_, stored)| stored.value.get(attr).unwrap_or(&Value::Null) == value)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
