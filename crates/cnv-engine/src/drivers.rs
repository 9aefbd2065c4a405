//! Operator drivers: re-enqueue failed deposits, re-poll submitted ones.
//!
//! Invoked from the CLI (`retry` / `refresh`) and from the daemon's
//! periodic job. Each is a one-shot sweep; per-deposit admission is still
//! decided by the critical sections, so a sweep racing live events stays
//! safe.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use cnv_model::{policy, Deposit, EntityRef, EntityType, Repository, Submission};
use cnv_repo::typed;

use crate::builder;
use crate::context::EngineContext;
use crate::error_handler::ErrorHandler;
use crate::pool::WorkerHandle;
use crate::refresher::DepositStatusRefresher;
use crate::task::DepositTask;

/// What a sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub scanned: usize,
    pub acted: usize,
}

// ---------------------------------------------------------------------------
// RetryDriver
// ---------------------------------------------------------------------------

/// Re-enqueues FAILED (and never-attempted dirty) deposits.
pub struct RetryDriver {
    ctx: Arc<EngineContext>,
    errors: Arc<ErrorHandler>,
    workers: WorkerHandle,
}

impl RetryDriver {
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

    /// Retry every FAILED and dirty deposit upstream.
    pub async fn retry_all(&self) -> anyhow::Result<DriverReport> {
        let mut ids = self
            .ctx
            .repo
            .find_by_attribute(EntityType::Deposit, "depositStatus", &json!("failed"))
            .await?;
        ids.extend(
            self.ctx
                .repo
                .find_by_attribute(EntityType::Deposit, "depositStatus", &Value::Null)
                .await?,
        );
        ids.sort();
        ids.dedup();

        let mut report = DriverReport {
            scanned: ids.len(),
            ..Default::default()
        };
        for id in &ids {
            if self.retry_one(id).await? {
                report.acted += 1;
            }
        }
        info!(scanned = report.scanned, dispatched = report.acted, "retry sweep complete");
        Ok(report)
    }

    /// Retry one deposit. Returns whether a task was dispatched.
    pub async fn retry_one(&self, deposit_id: &str) -> anyhow::Result<bool> {
        let Some(deposit) = typed::read::<Deposit>(self.ctx.repo.as_ref(), deposit_id).await?
        else {
            warn!(deposit = deposit_id, "retry target does not exist");
            return Ok(false);
        };
        let deposit = deposit.entity;
        if !policy::deposit_retryable(&deposit) {
            debug!(deposit = deposit_id, status = ?deposit.deposit_status, "not retryable; skipped");
            return Ok(false);
        }

        let Some(submission) =
            typed::read::<Submission>(self.ctx.repo.as_ref(), &deposit.submission).await?
        else {
            anyhow::bail!("submission {} of deposit {deposit_id} is unreadable", deposit.submission);
        };
        let deposit_submission =
            builder::build_deposit_submission(self.ctx.repo.as_ref(), &submission.entity).await?;

        let Some(repository) =
            typed::read::<Repository>(self.ctx.repo.as_ref(), &deposit.repository).await?
        else {
            anyhow::bail!("repository {} of deposit {deposit_id} is unreadable", deposit.repository);
        };
        let repository = repository.entity;

        let Some(packager) = self.ctx.registry.lookup(&repository) else {
            warn!(
                target: "configuration",
                deposit = deposit_id,
                repository = %repository.id,
                "no packager configured; deposit stays FAILED"
            );
            return Ok(false);
        };

        let task = DepositTask {
            deposit_id: deposit_id.to_string(),
            submission: deposit_submission,
            repository,
            packager,
        };
        if let Err(rejected) = self.workers.try_dispatch(task) {
            self.errors
                .handle(
                    anyhow::Error::new(rejected).context("dispatching retry task"),
                    Some(EntityRef::Deposit(deposit_id.to_string())),
                )
                .await;
            return Ok(false);
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// RefreshDriver
// ---------------------------------------------------------------------------

/// Re-polls the status references of SUBMITTED deposits.
pub struct RefreshDriver {
    ctx: Arc<EngineContext>,
    refresher: DepositStatusRefresher,
}

impl RefreshDriver {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            refresher: DepositStatusRefresher::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    pub async fn refresh_all(&self) -> anyhow::Result<DriverReport> {
        let ids = self
            .ctx
            .repo
            .find_by_attribute(EntityType::Deposit, "depositStatus", &json!("submitted"))
            .await?;

        let mut report = DriverReport {
            scanned: ids.len(),
            ..Default::default()
        };
        for id in &ids {
            self.refresher.refresh(id).await;
            report.acted += 1;
        }
        info!(scanned = report.scanned, "refresh sweep complete");
        Ok(report)
    }

    pub async fn refresh_one(&self, deposit_id: &str) -> anyhow::Result<()> {
        self.refresher.refresh(deposit_id).await;
        Ok(())
    }
}
