//! One deposit task: package, transmit, record the outcome.

use std::sync::Arc;

use tracing::{debug, warn};

use cnv_cse::CriticalOutcome;
use cnv_model::{
    policy, Deposit, DepositStatus, DepositSubmission, EntityRef, Repository, RepositoryCopy,
};
use cnv_packager::{Packager, TransportParams, TransportResponse};
use cnv_repo::typed;

use crate::context::EngineContext;
use crate::error_handler::ErrorHandler;
use crate::refresher::DepositStatusRefresher;

/// Package one submission for one target and transmit it.
pub struct DepositTask {
    pub deposit_id: String,
    pub submission: DepositSubmission,
    pub repository: Repository,
    pub packager: Arc<Packager>,
}

impl std::fmt::Debug for DepositTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepositTask")
            .field("deposit_id", &self.deposit_id)
            .field("submission", &self.submission.submission_id)
            .field("repository", &self.repository.id)
            .finish()
    }
}

impl DepositTask {
    /// Run the transfer. Failures are routed to the error handler; this
    /// function itself never propagates.
    pub async fn execute(self, ctx: &Arc<EngineContext>, errors: &Arc<ErrorHandler>) {
        let deposit_id = self.deposit_id.clone();
        match self.transfer(ctx).await {
            Ok(TransferConclusion::Settled) => {}
            Ok(TransferConclusion::AwaitingStatus) => {
                schedule_first_refresh(ctx, &deposit_id);
            }
            Ok(TransferConclusion::Skipped) => {
                debug!(deposit = %deposit_id, "deposit no longer eligible for transfer");
            }
            Err(e) => {
                errors
                    .handle(e, Some(EntityRef::Deposit(deposit_id)))
                    .await;
            }
        }
    }

    /// Physical transfer plus the follow-up logical update.
    async fn transfer(self, ctx: &Arc<EngineContext>) -> anyhow::Result<TransferConclusion> {
        let packager = Arc::clone(&self.packager);
        let submission = self.submission;
        let deposit_id = self.deposit_id;

        let params = TransportParams::from_binding(
            &packager.config.transport.protocol_binding,
        );

        // Critical section 1: the physical transfer. The session is closed
        // on every path out of the attempt.
        let assembler_options = packager.config.assembler.options.clone();
        let critical_packager = Arc::clone(&packager);
        let critical_params = params.clone();
        let result = ctx
            .cse
            .perform_critical(
                &deposit_id,
                |d: &Deposit| policy::deposit_retryable(d),
                move |mut d: Deposit| {
                    let packager = Arc::clone(&critical_packager);
                    let submission = submission.clone();
                    let options = assembler_options.clone();
                    let params = critical_params.clone();
                    async move {
                        let package = packager.assembler.assemble(&submission, &options).await?;
                        let mut session = packager.transport.open(&params).await?;
                        let sent = session.send(package, &params).await;
                        if let Err(e) = session.close().await {
                            warn!(cause = %e, "transport session close failed");
                        }
                        let response = sent?;
                        if !response.success {
                            anyhow::bail!(
                                "target refused the package: {}",
                                response.cause.as_deref().unwrap_or("no cause given")
                            );
                        }
                        d.deposit_status = Some(DepositStatus::Submitted);
                        Ok((d, response))
                    }
                },
                |d: &Deposit, response: &TransportResponse| {
                    d.deposit_status == Some(DepositStatus::Submitted) && response.success
                },
            )
            .await;

        let (_, response) = match result.outcome() {
            CriticalOutcome::Performed => result.into_success().expect("performed carries payload"),
            CriticalOutcome::PreconditionMiss => return Ok(TransferConclusion::Skipped),
            _ => {
                return Err(result
                    .into_cause()
                    .unwrap_or_else(|| anyhow::anyhow!("transfer critical section failed"))
                    .context(format!("transferring deposit {deposit_id}")))
            }
        };

        // Critical section 2: record the logical outcome the receipt implies.
        let receipt = response.receipt.unwrap_or_default();
        match receipt.status_url {
            Some(status_url) => {
                attach_status_reference(ctx, &packager, &deposit_id, status_url, receipt.item_url)
                    .await?;
                Ok(TransferConclusion::AwaitingStatus)
            }
            None => {
                settle_synchronous(ctx, &deposit_id, receipt.item_url).await?;
                Ok(TransferConclusion::Settled)
            }
        }
    }
}

enum TransferConclusion {
    /// Synchronous target: custody settled, deposit ACCEPTED.
    Settled,
    /// Asynchronous target: statusRef attached, refresh pending.
    AwaitingStatus,
    /// Pre-condition miss: another agent settled the deposit first.
    Skipped,
}

/// Asynchronous target: attach the statement URL and a placeholder copy.
async fn attach_status_reference(
    ctx: &Arc<EngineContext>,
    packager: &Arc<Packager>,
    deposit_id: &str,
    status_url: String,
    item_url: Option<String>,
) -> anyhow::Result<()> {
    let status_url = match &packager.config.deposit.status_ref_rewrite {
        Some(rewrite) => rewrite.apply(&status_url),
        None => status_url,
    };

    let repo = Arc::clone(&ctx.repo);
    let result = ctx
        .cse
        .perform_critical(
            deposit_id,
            |_: &Deposit| true,
            move |mut d: Deposit| {
                let repo = Arc::clone(&repo);
                let status_url = status_url.clone();
                let item_url = item_url.clone();
                async move {
                    let copy = typed::create(
                        repo.as_ref(),
                        &RepositoryCopy::in_progress(item_url),
                    )
                    .await?;
                    d.status_ref = Some(status_url);
                    d.repository_copy = Some(copy.entity.id.clone());
                    Ok((d, copy.entity.id))
                }
            },
            |_: &Deposit, _: &String| true,
        )
        .await;

    match result.outcome() {
        CriticalOutcome::Performed => {
            debug!(deposit = deposit_id, "status reference attached");
            Ok(())
        }
        _ => Err(result
            .into_cause()
            .unwrap_or_else(|| anyhow::anyhow!("status attachment failed"))
            .context(format!("attaching status reference to {deposit_id}"))),
    }
}

/// Synchronous target: landing the bytes is acceptance.
async fn settle_synchronous(
    ctx: &Arc<EngineContext>,
    deposit_id: &str,
    item_url: Option<String>,
) -> anyhow::Result<()> {
    let repo = Arc::clone(&ctx.repo);
    let result = ctx
        .cse
        .perform_critical(
            deposit_id,
            |d: &Deposit| d.is_intermediate(),
            move |mut d: Deposit| {
                let repo = Arc::clone(&repo);
                let item_url = item_url.clone();
                async move {
                    let mut copy = RepositoryCopy::in_progress(item_url);
                    copy.copy_status = cnv_model::CopyStatus::Complete;
                    let copy = typed::create(repo.as_ref(), &copy).await?;
                    d.deposit_status = Some(DepositStatus::Accepted);
                    d.repository_copy = Some(copy.entity.id.clone());
                    Ok((d, copy.entity.id))
                }
            },
            |d: &Deposit, _: &String| {
                d.deposit_status == Some(DepositStatus::Accepted) && d.repository_copy.is_some()
            },
        )
        .await;

    match result.outcome() {
        CriticalOutcome::Performed => {
            debug!(deposit = deposit_id, "deposit settled synchronously");
            Ok(())
        }
        CriticalOutcome::PreconditionMiss => Ok(()),
        _ => Err(result
            .into_cause()
            .unwrap_or_else(|| anyhow::anyhow!("synchronous settlement failed"))
            .context(format!("settling deposit {deposit_id}"))),
    }
}

/// First refresh of an asynchronous target waits out the configured delay,
/// off the worker slot.
fn schedule_first_refresh(ctx: &Arc<EngineContext>, deposit_id: &str) {
    let ctx = Arc::clone(ctx);
    let deposit_id = deposit_id.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(ctx.settings.first_refresh_delay).await;
        DepositStatusRefresher::new(Arc::clone(&ctx))
            .refresh(&deposit_id)
            .await;
    });
}
