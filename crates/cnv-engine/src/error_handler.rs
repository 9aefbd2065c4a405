//! Central sink for uncaught failures.
//!
//! Failures arriving here carry an optional [`EntityRef`] naming the record
//! the failure should be charged to. A non-terminal referenced entity is
//! marked FAILED through the critical-section engine; a terminal one is
//! logged and dropped (terminal state never mutates); an unattributed
//! failure is logged only.

use std::sync::Arc;

use tracing::{debug, error, warn};

use cnv_cse::{CriticalEngine, CriticalOutcome};
use cnv_model::{
    AggregatedStatus, Deposit, DepositStatus, EntityRef, Submission,
};

use crate::errors::RemedialError;

pub struct ErrorHandler {
    cse: Arc<CriticalEngine>,
}

impl ErrorHandler {
    pub fn new(cse: Arc<CriticalEngine>) -> Arc<Self> {
        Arc::new(Self { cse })
    }

    /// Consume one failure.
    pub async fn handle(&self, err: anyhow::Error, entity: Option<EntityRef>) {
        if err.downcast_ref::<RemedialError>().is_some() {
            error!(entity = ?entity, cause = %format_chain(&err), "REMEDIAL failure; leaving entity state untouched");
            return;
        }

        let Some(entity) = entity else {
            error!(cause = %format_chain(&err), "unattributed failure");
            return;
        };

        error!(%entity, cause = %format_chain(&err), "marking entity FAILED");
        match &entity {
            EntityRef::Deposit(id) => self.mark_deposit_failed(id).await,
            EntityRef::Submission(id) => self.mark_submission_failed(id).await,
        }
    }

    async fn mark_deposit_failed(&self, id: &str) {
        let result = self
            .cse
            .perform_critical(
                id,
                |d: &Deposit| !d.is_terminal(),
                |mut d: Deposit| async move {
                    d.deposit_status = Some(DepositStatus::Failed);
                    // A failed deposit holds no copy in the target.
                    d.repository_copy = None;
                    Ok((d, ()))
                },
                |d, _| d.deposit_status == Some(DepositStatus::Failed),
            )
            .await;
        Self::report(id, result.outcome(), result.into_cause());
    }

    async fn mark_submission_failed(&self, id: &str) {
        let result = self
            .cse
            .perform_critical(
                id,
                |s: &Submission| s.aggregated_status.is_intermediate(),
                |mut s: Submission| async move {
                    s.aggregated_status = AggregatedStatus::Failed;
                    Ok((s, ()))
                },
                |s, _| s.aggregated_status == AggregatedStatus::Failed,
            )
            .await;
        Self::report(id, result.outcome(), result.into_cause());
    }

    fn report(id: &str, outcome: CriticalOutcome, cause: Option<anyhow::Error>) {
        match outcome {
            CriticalOutcome::Performed => debug!(id, "entity marked FAILED"),
            CriticalOutcome::PreconditionMiss => {
                debug!(id, "entity already terminal; failure dropped")
            }
            other => warn!(
                id,
                ?other,
                cause = cause.map(|c| format_chain(&c)).unwrap_or_default(),
                "could not mark entity FAILED"
            ),
        }
    }
}

fn format_chain(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
