//! Claims submissions and fans out per-target deposit work.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cnv_cse::CriticalOutcome;
use cnv_model::{
    policy, AggregatedStatus, Deposit, DepositSubmission, EntityRef, Repository, Submission,
};
use cnv_repo::typed;

use crate::builder::{self, SUBMISSION_RELATION};
use crate::context::EngineContext;
use crate::error_handler::ErrorHandler;
use crate::pool::WorkerHandle;
use crate::task::DepositTask;

pub struct SubmissionProcessor {
    ctx: Arc<EngineContext>,
    errors: Arc<ErrorHandler>,
    workers: WorkerHandle,
}

impl SubmissionProcessor {
    pub fn new(
        ctx: Arc<EngineContext>,
        errors: Arc<ErrorHandler>,
        workers: WorkerHandle,
    ) -> Self {
        Self {
            ctx,
            errors,
            workers,
        }
    }

    /// React to one submission event: claim the submission (at most once)
    /// and dispatch a deposit task per target.
    pub async fn process(&self, submission_id: &str) {
        let repo = Arc::clone(&self.ctx.repo);
        let result = self
            .ctx
            .cse
            .perform_critical(
                submission_id,
                policy::submission_admissible,
                move |mut s: Submission| {
                    let repo = Arc::clone(&repo);
                    async move {
                        let deposit_submission =
                            builder::build_deposit_submission(repo.as_ref(), &s).await?;
                        s.aggregated_status = AggregatedStatus::InProgress;
                        Ok((s, deposit_submission))
                    }
                },
                |s: &Submission, ds: &DepositSubmission| {
                    s.aggregated_status == AggregatedStatus::InProgress && !ds.files.is_empty()
                },
            )
            .await;

        match result.outcome() {
            CriticalOutcome::Performed => {
                let (fresh, deposit_submission) =
                    result.into_success().expect("performed carries payload");
                info!(
                    submission = submission_id,
                    targets = fresh.entity.repositories.len(),
                    "submission claimed"
                );
                self.fan_out(&fresh.entity, deposit_submission).await;
            }
            CriticalOutcome::PreconditionMiss => {
                debug!(submission = submission_id, "submission not admissible; dropped");
            }
            _ => {
                let cause = result
                    .into_cause()
                    .unwrap_or_else(|| anyhow::anyhow!("claim failed"))
                    .context(format!("claiming submission {submission_id}"));
                self.errors
                    .handle(cause, Some(EntityRef::Submission(submission_id.to_string())))
                    .await;
            }
        }
    }

    /// One deposit per target. Deposit creation is sequential; dispatch is
    /// non-blocking; ordering across targets is not guaranteed.
    async fn fan_out(&self, submission: &Submission, deposit_submission: DepositSubmission) {
        for target_id in &submission.repositories {
            if let Err(e) = self
                .deposit_to(submission, &deposit_submission, target_id)
                .await
            {
                // deposit_to attributes failures itself; this is a belt for
                // failures that happen before a deposit exists.
                self.errors
                    .handle(
                        e.context(format!("fanning out to {target_id}")),
                        Some(EntityRef::Submission(submission.id.clone())),
                    )
                    .await;
            }
        }
    }

    async fn deposit_to(
        &self,
        submission: &Submission,
        deposit_submission: &DepositSubmission,
        target_id: &str,
    ) -> anyhow::Result<()> {
        let repository =
            match typed::read::<Repository>(self.ctx.repo.as_ref(), target_id).await? {
                Some(v) => v.entity,
                None => anyhow::bail!("target repository {target_id} is unreadable"),
            };

        // At most one deposit per (submission, repository): re-claims of a
        // previously FAILED submission reuse the existing record.
        let deposit = match self
            .existing_deposit(&submission.id, &repository.id)
            .await?
        {
            Some(existing) if existing.is_terminal() => {
                debug!(
                    submission = %submission.id,
                    repository = %repository.id,
                    "target already settled; no new deposit"
                );
                return Ok(());
            }
            Some(existing) if !policy::deposit_retryable(&existing) => {
                debug!(
                    submission = %submission.id,
                    repository = %repository.id,
                    "deposit already in flight; no new dispatch"
                );
                return Ok(());
            }
            Some(existing) => existing,
            None => {
                let created = typed::create(
                    self.ctx.repo.as_ref(),
                    &Deposit::dirty(&submission.id, &repository.id),
                )
                .await?;
                created.entity
            }
        };

        let Some(packager) = self.ctx.registry.lookup(&repository) else {
            warn!(
                target: "configuration",
                repository = %repository.id,
                deposit = %deposit.id,
                "no packager configured for target"
            );
            self.errors
                .handle(
                    anyhow::anyhow!(
                        "no packager configured for repository {} (key {:?})",
                        repository.id,
                        repository.repository_key
                    ),
                    Some(EntityRef::Deposit(deposit.id.clone())),
                )
                .await;
            return Ok(());
        };

        let task = DepositTask {
            deposit_id: deposit.id.clone(),
            submission: deposit_submission.clone(),
            repository,
            packager,
        };
        if let Err(rejected) = self.workers.try_dispatch(task) {
            self.errors
                .handle(
                    anyhow::Error::new(rejected).context("dispatching deposit task"),
                    Some(EntityRef::Deposit(deposit.id.clone())),
                )
                .await;
        }
        Ok(())
    }

    async fn existing_deposit(
        &self,
        submission_id: &str,
        repository_id: &str,
    ) -> anyhow::Result<Option<Deposit>> {
        let links = self.ctx.repo.incoming(submission_id).await?;
        let Some(referrers) = links.get(SUBMISSION_RELATION) else {
            return Ok(None);
        };
        for id in referrers {
            match typed::read::<Deposit>(self.ctx.repo.as_ref(), id).await {
                Ok(Some(d)) if d.entity.repository == repository_id => {
                    return Ok(Some(d.entity))
                }
                Ok(_) => continue,
                Err(e) if e.is_malformed() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}
