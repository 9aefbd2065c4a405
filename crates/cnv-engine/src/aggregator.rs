//! Collapses per-deposit outcomes into the submission's aggregate status.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cnv_cse::CriticalOutcome;
use cnv_model::{
    policy, AggregatedStatus, Deposit, DepositStatus, Submission,
};
use cnv_repo::typed;

use crate::builder::SUBMISSION_RELATION;
use crate::context::EngineContext;

pub struct SubmissionAggregator {
    ctx: Arc<EngineContext>,
}

impl SubmissionAggregator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Re-derive the submission's aggregate status from its children.
    ///
    /// Only when *every* readable child deposit is terminal does the
    /// submission settle: ACCEPTED if all children accepted, REJECTED
    /// otherwise. Any intermediate child leaves the submission untouched, so
    /// repeated aggregation over unchanged children writes nothing —
    /// running this from every deposit event is safe.
    pub async fn aggregate(&self, submission_id: &str) {
        let repo = Arc::clone(&self.ctx.repo);
        let result = self
            .ctx
            .cse
            .perform_critical(
                submission_id,
                policy::submission_aggregatable,
                move |mut s: Submission| {
                    let repo = Arc::clone(&repo);
                    async move {
                        let links = repo.incoming(&s.id).await?;
                        let mut statuses: Vec<Option<DepositStatus>> = Vec::new();
                        if let Some(referrers) = links.get(SUBMISSION_RELATION) {
                            for id in referrers {
                                match typed::read::<Deposit>(repo.as_ref(), id).await {
                                    Ok(Some(d)) => statuses.push(d.entity.deposit_status),
                                    Ok(None) => continue,
                                    Err(e) if e.is_malformed() => {
                                        // Corrupt children must not block
                                        // aggregation of the rest.
                                        warn!(deposit = %id, cause = %e, "skipping undeserializable deposit");
                                        continue;
                                    }
                                    Err(e) => return Err(e.into()),
                                }
                            }
                        }

                        let verdict = settle(&statuses);
                        if let Some(status) = verdict {
                            s.aggregated_status = status;
                        }
                        Ok((s, verdict))
                    }
                },
                |_: &Submission, _: &Option<AggregatedStatus>| true,
            )
            .await;

        match result.outcome() {
            CriticalOutcome::Performed => match result.value() {
                Some(Some(status)) => {
                    info!(submission = submission_id, ?status, "submission settled")
                }
                _ => debug!(
                    submission = submission_id,
                    "children not all terminal; aggregate unchanged"
                ),
            },
            CriticalOutcome::PreconditionMiss => {
                debug!(submission = submission_id, "submission already terminal")
            }
            _ => {
                let cause = result
                    .into_cause()
                    .unwrap_or_else(|| anyhow::anyhow!("aggregation failed"));
                warn!(submission = submission_id, cause = %format!("{cause:#}"), "aggregation did not conclude");
            }
        }
    }
}

/// The deterministic verdict over child statuses.
///
/// `None` — leave the submission as it is (no children yet, or some child
/// still intermediate). `Some(status)` — every child is terminal.
fn settle(statuses: &[Option<DepositStatus>]) -> Option<AggregatedStatus> {
    if statuses.is_empty() {
        return None;
    }
    let all_terminal = statuses
        .iter()
        .all(|s| cnv_model::status::deposit_status_is_terminal(*s));
    if !all_terminal {
        return None;
    }
    let all_accepted = statuses
        .iter()
        .all(|s| *s == Some(DepositStatus::Accepted));
    Some(if all_accepted {
        AggregatedStatus::Accepted
    } else {
        AggregatedStatus::Rejected
    })
}
