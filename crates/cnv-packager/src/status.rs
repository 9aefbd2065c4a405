//! Interpretation of target-native status documents.
//!
//! Each target speaks its own vocabulary ("archived", "withdrawn",
//! "in-workflow", …). The registry document carries a per-target mapping
//! from those terms to deposit statuses; [`MappingStatusProcessor`] fetches
//! the status document and runs its term through that table. Richer dialects
//! plug in behind [`DepositStatusProcessor`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use cnv_model::Deposit;

use crate::config::TargetConfig;

// ---------------------------------------------------------------------------
// DepositStatusOutcome
// ---------------------------------------------------------------------------

/// What a status document says about a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositStatusOutcome {
    Accepted,
    Rejected,
    /// Still in the target's workflow; poll again later.
    Submitted,
    /// The document's term maps to nothing. The refresher treats this as a
    /// failure of the refresh, never of the deposit.
    Unknown,
}

// ---------------------------------------------------------------------------
// StatusMapping
// ---------------------------------------------------------------------------

/// Term → status table from the registry document, with a `default-mapping`
/// fallback entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMapping {
    entries: BTreeMap<String, String>,
}

impl StatusMapping {
    pub const DEFAULT_KEY: &'static str = "default-mapping";

    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    /// Map a target-native term. Falls back to the `default-mapping` entry;
    /// an unmapped term (or a `null` mapping) resolves to `Unknown`.
    pub fn resolve(&self, term: &str) -> DepositStatusOutcome {
        let needle = term.trim().to_ascii_lowercase();
        let mapped = self
            .entries
            .get(&needle)
            .or_else(|| self.entries.get(Self::DEFAULT_KEY));
        match mapped.map(String::as_str) {
            Some("accepted") => DepositStatusOutcome::Accepted,
            Some("rejected") => DepositStatusOutcome::Rejected,
            Some("submitted") => DepositStatusOutcome::Submitted,
            _ => DepositStatusOutcome::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// DepositStatusProcessor
// ---------------------------------------------------------------------------

/// Resolves a deposit's `status_ref` document to an outcome.
#[async_trait]
pub trait DepositStatusProcessor: Send + Sync {
    async fn process(
        &self,
        deposit: &Deposit,
        config: &TargetConfig,
    ) -> anyhow::Result<DepositStatusOutcome>;
}

// ---------------------------------------------------------------------------
// MappingStatusProcessor
// ---------------------------------------------------------------------------

/// Default processor: fetch the JSON statement behind `status_ref`, read its
/// `status` term, run it through the target's mapping table.
pub struct MappingStatusProcessor {
    http: reqwest::Client,
}

impl MappingStatusProcessor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DepositStatusProcessor for MappingStatusProcessor {
    async fn process(
        &self,
        deposit: &Deposit,
        config: &TargetConfig,
    ) -> anyhow::Result<DepositStatusOutcome> {
        let status_ref = deposit
            .status_ref
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("deposit {} has no status reference", deposit.id))?;

        let response = self.http.get(status_ref).send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "status document fetch returned HTTP {} for {status_ref}",
                response.status()
            );
        }
        let document: serde_json::Value = response.json().await?;
        let term = document
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                anyhow::anyhow!("status document at {status_ref} carries no status term")
            })?;

        let outcome = config.deposit.mapping.resolve(term);
        debug!(deposit = %deposit.id, term, ?outcome, "resolved status document");
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> StatusMapping {
        let mut entries = BTreeMap::new();
        entries.insert("archived".to_string(), "accepted".to_string());
        entries.insert("withdrawn".to_string(), "rejected".to_string());
        entries.insert(
            StatusMapping::DEFAULT_KEY.to_string(),
            "submitted".to_string(),
        );
        StatusMapping::from_entries(entries)
    }

    #[test]
    fn known_terms_resolve_directly() {
        let m = mapping();
        assert_eq!(m.resolve("archived"), DepositStatusOutcome::Accepted);
        assert_eq!(m.resolve("withdrawn"), DepositStatusOutcome::Rejected);
    }

    #[test]
    fn unknown_term_falls_back_to_default() {
        let m = mapping();
        assert_eq!(m.resolve("in-workflow"), DepositStatusOutcome::Submitted);
    }

    #[test]
    fn resolution_is_case_and_whitespace_insensitive() {
        let m = mapping();
        assert_eq!(m.resolve("  Archived "), DepositStatusOutcome::Accepted);
    }

    #[test]
    fn without_default_an_unmapped_term_is_unknown() {
        let mut entries = BTreeMap::new();
        entries.insert("archived".to_string(), "accepted".to_string());
        let m = StatusMapping::from_entries(entries);
        assert_eq!(m.resolve("in-workflow"), DepositStatusOutcome::Unknown);
    }

    #[test]
    fn null_valued_default_is_unknown() {
        let mut entries = BTreeMap::new();
        entries.insert(
            StatusMapping::DEFAULT_KEY.to_string(),
            "null".to_string(),
        );
        let m = StatusMapping::from_entries(entries);
        assert_eq!(m.resolve("whatever"), DepositStatusOutcome::Unknown);
    }

    #[test]
    fn mapping_deserializes_from_flat_table() {
        let m: StatusMapping = serde_json::from_str(
            r#"{"archived": "accepted", "default-mapping": "submitted"}"#,
        )
        .unwrap();
        assert_eq!(m.resolve("archived"), DepositStatusOutcome::Accepted);
        assert_eq!(m.resolve("anything"), DepositStatusOutcome::Submitted);
    }
}
