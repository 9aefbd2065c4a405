//! Status vocabularies and their terminal / intermediate partition.
//!
//! The string forms are the upstream repository's JSON vocabulary; serde
//! attributes pin them so a status round-trips byte-identically.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SubmissionSource
// ---------------------------------------------------------------------------

/// Who authored the submission record upstream.
///
/// Only user-driven (`Pass`) submissions are admissible for deposit; records
/// harvested from other systems are ignored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionSource {
    Pass,
    Other,
}

// ---------------------------------------------------------------------------
// AggregatedStatus
// ---------------------------------------------------------------------------

/// Submission-level outcome aggregated over all child deposits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregatedStatus {
    NotStarted,
    InProgress,
    Failed,
    /// Every child deposit is accepted. **Terminal.**
    Accepted,
    /// At least one child deposit is rejected. **Terminal.**
    Rejected,
}

impl AggregatedStatus {
    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    pub fn is_intermediate(self) -> bool {
        !self.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// DepositStatus
// ---------------------------------------------------------------------------

/// Deposit-level lifecycle status.
///
/// A deposit with **no** status (`Option::None` on the entity) is *dirty*:
/// it has been created but no transfer attempt has concluded. Dirty counts
/// as intermediate everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    /// Bytes reached the target; logical acceptance still pending.
    Submitted,
    /// Target accepted custody. **Terminal.**
    Accepted,
    /// Target rejected the package. **Terminal.**
    Rejected,
    /// The transfer attempt failed before the target took custody.
    Failed,
}

impl DepositStatus {
    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    pub fn is_intermediate(self) -> bool {
        !self.is_terminal()
    }
}

/// Terminal check over the entity-level `Option<DepositStatus>`.
///
/// `None` (dirty) is intermediate by definition.
pub fn deposit_status_is_terminal(status: Option<DepositStatus>) -> bool {
    status.map(DepositStatus::is_terminal).unwrap_or(false)
}

// ---------------------------------------------------------------------------
// CopyStatus
// ---------------------------------------------------------------------------

/// Status of the package copy inside the target repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyStatus {
    InProgress,
    /// The target holds a complete copy. **Terminal.**
    Complete,
    /// The target refused the copy. **Terminal.**
    Rejected,
}

impl CopyStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Rejected)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_terminal_partition() {
        assert!(AggregatedStatus::Accepted.is_terminal());
        assert!(AggregatedStatus::Rejected.is_terminal());
        assert!(AggregatedStatus::NotStarted.is_intermediate());
        assert!(AggregatedStatus::InProgress.is_intermediate());
        assert!(AggregatedStatus::Failed.is_intermediate());
    }

    #[test]
    fn deposit_terminal_partition() {
        assert!(DepositStatus::Accepted.is_terminal());
        assert!(DepositStatus::Rejected.is_terminal());
        assert!(DepositStatus::Submitted.is_intermediate());
        assert!(DepositStatus::Failed.is_intermediate());
    }

    #[test]
    fn dirty_deposit_is_intermediate() {
        assert!(!deposit_status_is_terminal(None));
        assert!(deposit_status_is_terminal(Some(DepositStatus::Accepted)));
    }

    #[test]
    fn status_wire_vocabulary_is_stable() {
        assert_eq!(
            serde_json::to_string(&AggregatedStatus::NotStarted).unwrap(),
            "\"not-started\""
        );
        assert_eq!(
            serde_json::to_string(&AggregatedStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::to_string(&DepositStatus::Submitted).unwrap(),
            "\"submitted\""
        );
        assert_eq!(
            serde_json::to_string(&CopyStatus::Complete).unwrap(),
            "\"complete\""
        );
        let parsed: DepositStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(parsed, DepositStatus::Rejected);
    }
}
