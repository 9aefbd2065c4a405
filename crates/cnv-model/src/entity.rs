//! Persistent entity records and their wire representation.
//!
//! Records mirror the upstream repository's JSON documents (camelCase keys,
//! URI-valued references). The engine never invents fields the upstream does
//! not carry; unknown upstream fields are dropped on read and therefore must
//! never be written back blindly — all writes go through the critical-section
//! engine, which re-reads before mutating.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::status::{
    AggregatedStatus, CopyStatus, DepositStatus, SubmissionSource,
};

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Discriminator for the persistent entity kinds the engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Submission,
    Deposit,
    RepositoryCopy,
    Repository,
    File,
}

impl EntityType {
    /// Collection segment used by the upstream HTTP API.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Submission => "submissions",
            Self::Deposit => "deposits",
            Self::RepositoryCopy => "repositoryCopies",
            Self::Repository => "repositories",
            Self::File => "files",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ---------------------------------------------------------------------------
// PersistentEntity
// ---------------------------------------------------------------------------

/// Capability set shared by every record the engine reads or writes.
///
/// Deliberately small: identity plus the type tag. Status-specific behavior
/// stays on the concrete types (tagged variants over a deep hierarchy).
pub trait PersistentEntity:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    const TYPE: EntityType;

    fn id(&self) -> &str;

    /// Set the identifier assigned by the upstream on create.
    fn set_id(&mut self, id: String);
}

// ---------------------------------------------------------------------------
// Versioned
// ---------------------------------------------------------------------------

/// An entity read from the upstream together with the ETag that guards its
/// next conditional write.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub etag: String,
    pub entity: T,
}

impl<T> Versioned<T> {
    pub fn new(etag: impl Into<String>, entity: T) -> Self {
        Self {
            etag: etag.into(),
            entity,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Root of a custody transfer. Created upstream by an external actor.
///
/// The engine owns exactly one field: `aggregated_status`. Everything else is
/// read-only input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub id: String,
    pub submitted: bool,
    pub source: SubmissionSource,
    /// Target repository references, in the order the submitter chose them.
    #[serde(default)]
    pub repositories: Vec<String>,
    pub aggregated_status: AggregatedStatus,
    /// Descriptive metadata blob forwarded into packages verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl PersistentEntity for Submission {
    const TYPE: EntityType = EntityType::Submission;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// Deposit
// ---------------------------------------------------------------------------

/// One custody-transfer attempt to one target repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    #[serde(default)]
    pub id: String,
    /// Parent submission reference.
    pub submission: String,
    /// Target repository reference.
    pub repository: String,
    /// Absent (`None`) means dirty: created, no concluded transfer attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_status: Option<DepositStatus>,
    /// URL of the target's asynchronous status document, when the target
    /// acknowledges deposits out of band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_ref: Option<String>,
    /// Reference to the RepositoryCopy created once bytes land in the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_copy: Option<String>,
}

impl Deposit {
    /// A fresh, dirty deposit for one (submission, repository) pair.
    pub fn dirty(submission: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            submission: submission.into(),
            repository: repository.into(),
            deposit_status: None,
            status_ref: None,
            repository_copy: None,
        }
    }

    /// Terminal deposits must never be mutated by the engine.
    pub fn is_terminal(&self) -> bool {
        crate::status::deposit_status_is_terminal(self.deposit_status)
    }

    pub fn is_intermediate(&self) -> bool {
        !self.is_terminal()
    }
}

impl PersistentEntity for Deposit {
    const TYPE: EntityType = EntityType::Deposit;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// RepositoryCopy
// ---------------------------------------------------------------------------

/// Opaque handle to where the package lives inside the target repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCopy {
    #[serde(default)]
    pub id: String,
    pub copy_status: CopyStatus,
    /// Target-side identifiers (item URLs, handles, DOIs).
    #[serde(default)]
    pub external_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_url: Option<String>,
}

impl RepositoryCopy {
    /// A placeholder copy created at the moment a transfer lands bytes.
    pub fn in_progress(item_url: Option<String>) -> Self {
        Self {
            id: String::new(),
            copy_status: CopyStatus::InProgress,
            external_ids: item_url.iter().cloned().collect(),
            access_url: item_url,
        }
    }
}

impl PersistentEntity for RepositoryCopy {
    const TYPE: EntityType = EntityType::RepositoryCopy;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// A downstream archival target, as described upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Short registry key (e.g. `"pmc"`), when the upstream carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PersistentEntity for Repository {
    const TYPE: EntityType = EntityType::Repository;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// SubmissionFile
// ---------------------------------------------------------------------------

/// A file attached to a submission upstream. `uri` is the retrievable
/// location of the bytes; a file without one cannot be packaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFile {
    #[serde(default)]
    pub id: String,
    /// Parent submission reference.
    pub submission: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl PersistentEntity for SubmissionFile {
    const TYPE: EntityType = EntityType::File;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// A reference to the entity a failure should be charged to.
///
/// Carried alongside errors so the central error handler can mark the right
/// record FAILED without knowing how the error arose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Submission(String),
    Deposit(String),
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Submission(id) | Self::Deposit(id) => id,
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submission(id) => write!(f, "Submission({id})"),
            Self::Deposit(id) => write!(f, "Deposit({id})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_round_trips_camel_case() {
        let d = Deposit {
            id: "urn:dep:1".into(),
            submission: "urn:sub:1".into(),
            repository: "urn:repo:1".into(),
            deposit_status: Some(DepositStatus::Submitted),
            status_ref: Some("https://target/statement/1".into()),
            repository_copy: None,
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["depositStatus"], "submitted");
        assert_eq!(json["statusRef"], "https://target/statement/1");
        assert!(json.get("repositoryCopy").is_none());

        let back: Deposit = serde_json::from_value(json).unwrap();
        assert_eq!(back.deposit_status, Some(DepositStatus::Submitted));
    }

    #[test]
    fn dirty_deposit_has_no_status() {
        let d = Deposit::dirty("urn:sub:1", "urn:repo:1");
        assert!(d.deposit_status.is_none());
        assert!(d.is_intermediate());
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("depositStatus").is_none());
    }

    #[test]
    fn placeholder_copy_carries_item_url_both_ways() {
        let rc = RepositoryCopy::in_progress(Some("https://target/item/9".into()));
        assert_eq!(rc.copy_status, CopyStatus::InProgress);
        assert_eq!(rc.external_ids, vec!["https://target/item/9"]);
        assert_eq!(rc.access_url.as_deref(), Some("https://target/item/9"));

        let rc = RepositoryCopy::in_progress(None);
        assert!(rc.external_ids.is_empty());
        assert!(rc.access_url.is_none());
    }

    #[test]
    fn submission_tolerates_missing_optional_fields() {
        let s: Submission = serde_json::from_str(
            r#"{"submitted": true, "source": "pass", "aggregatedStatus": "not-started"}"#,
        )
        .unwrap();
        assert!(s.repositories.is_empty());
        assert!(s.metadata.is_none());
        assert_eq!(s.aggregated_status, AggregatedStatus::NotStarted);
    }
}
