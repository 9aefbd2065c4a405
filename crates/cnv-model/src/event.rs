//! Normalized event envelope consumed from the upstream repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityType;

/// What happened to the entity upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Creation,
    Modification,
}

/// One normalized upstream event.
///
/// The `payload` is the upstream's change notification verbatim; the engine
/// only inspects its attribution fields for self-loop suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryEvent {
    /// Emitter-assigned correlation id; carried through logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub event_type: EventType,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl RepositoryEvent {
    /// Returns `true` when the payload attributes the change to `agent` —
    /// i.e. the event describes a write this process made itself and must be
    /// dropped to avoid self-looping.
    ///
    /// Both attribution spellings the upstream emits are checked:
    /// `payload.attribution.user-agent` and
    /// `payload.attribution.software-agent`.
    pub fn attributed_to(&self, agent: &str) -> bool {
        if agent.is_empty() {
            return false;
        }
        let Some(attribution) = self
            .payload
            .as_ref()
            .and_then(|p| p.get("attribution"))
        else {
            return false;
        };
        ["user-agent", "software-agent"].iter().any(|key| {
            attribution
                .get(key)
                .and_then(|v| v.as_str())
                .map(|v| v == agent)
                .unwrap_or(false)
        })
    }
}
