//! Resolves asynchronous target-side outcomes for submitted deposits.

use std::sync::Arc;

use tracing::{debug, warn};

use cnv_cse::CriticalOutcome;
use cnv_model::{
    policy, CopyStatus, Deposit, DepositStatus, Repository, RepositoryCopy,
};
use cnv_packager::{DepositStatusOutcome, Packager};
use cnv_repo::typed;

use crate::context::EngineContext;

pub struct DepositStatusRefresher {
    ctx: Arc<EngineContext>,
}

impl DepositStatusRefresher {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Poll the deposit's status reference and settle the deposit and its
    /// repository copy when the target has decided.
    ///
    /// A failure here is a failure of the *refresh*: the deposit is left
    /// untouched (still SUBMITTED) and will be polled again. Nothing is
    /// marked FAILED from this path.
    pub async fn refresh(&self, deposit_id: &str) {
        if let Err(e) = self.try_refresh(deposit_id).await {
            warn!(deposit = deposit_id, cause = %format!("{e:#}"), "status refresh failed; deposit left as-is");
        }
    }

    async fn try_refresh(&self, deposit_id: &str) -> anyhow::Result<()> {
        // Admission checks that need reads happen up front; the critical
        // section re-checks the entity-local ones.
        let Some(current) = typed::read::<Deposit>(self.ctx.repo.as_ref(), deposit_id).await?
        else {
            warn!(deposit = deposit_id, "refresh target does not exist");
            return Ok(());
        };
        if !policy::deposit_refreshable(&current.entity) {
            debug!(deposit = deposit_id, "deposit not refreshable; skipping");
            return Ok(());
        }

        let Some(repository) =
            typed::read::<Repository>(self.ctx.repo.as_ref(), &current.entity.repository).await?
        else {
            anyhow::bail!(
                "repository {} of deposit {deposit_id} is unreadable",
                current.entity.repository
            );
        };
        let Some(packager) = self.ctx.registry.lookup(&repository.entity) else {
            warn!(
                target: "configuration",
                deposit = deposit_id,
                repository = %repository.entity.id,
                "no packager configured; cannot refresh"
            );
            return Ok(());
        };

        let copy_id = match current.entity.repository_copy.as_deref() {
            Some(id) => id.to_string(),
            None => {
                debug!(deposit = deposit_id, "no repository copy attached; skipping");
                return Ok(());
            }
        };
        if typed::read::<RepositoryCopy>(self.ctx.repo.as_ref(), &copy_id)
            .await?
            .is_none()
        {
            anyhow::bail!("repository copy {copy_id} of deposit {deposit_id} is unreadable");
        }

        let ctx = Arc::clone(&self.ctx);
        let result = self
            .ctx
            .cse
            .perform_critical(
                deposit_id,
                |d: &Deposit| policy::deposit_refreshable(d),
                move |d: Deposit| {
                    let ctx = Arc::clone(&ctx);
                    let packager = Arc::clone(&packager);
                    let copy_id = copy_id.clone();
                    async move { resolve_and_settle(ctx, packager, d, copy_id).await }
                },
                |d: &Deposit, copy: &RepositoryCopy| congruent(d, copy),
            )
            .await;

        match result.outcome() {
            CriticalOutcome::Performed => {
                let (fresh, copy) = result.into_success().expect("performed carries payload");
                debug!(
                    deposit = deposit_id,
                    status = ?fresh.entity.deposit_status,
                    copy_status = ?copy.copy_status,
                    "refresh concluded"
                );
                Ok(())
            }
            CriticalOutcome::PreconditionMiss => {
                debug!(deposit = deposit_id, "deposit settled concurrently; refresh dropped");
                Ok(())
            }
            _ => Err(result
                .into_cause()
                .unwrap_or_else(|| anyhow::anyhow!("refresh critical section failed"))),
        }
    }
}

/// Run the target's status pipeline and settle deposit + copy accordingly.
async fn resolve_and_settle(
    ctx: Arc<EngineContext>,
    packager: Arc<Packager>,
    mut deposit: Deposit,
    copy_id: String,
) -> anyhow::Result<(Deposit, RepositoryCopy)> {
    let outcome = packager
        .status_processor
        .process(&deposit, &packager.config)
        .await?;

    let copy_status = match outcome {
        DepositStatusOutcome::Accepted => {
            deposit.deposit_status = Some(DepositStatus::Accepted);
            Some(CopyStatus::Complete)
        }
        DepositStatusOutcome::Rejected => {
            deposit.deposit_status = Some(DepositStatus::Rejected);
            Some(CopyStatus::Rejected)
        }
        DepositStatusOutcome::Submitted => None,
        DepositStatusOutcome::Unknown => {
            // An unmapped term is not a verdict. Fail the refresh; the
            // deposit stays SUBMITTED until a later poll resolves it.
            anyhow::bail!("status document term does not map to any deposit status");
        }
    };

    let copy = match copy_status {
        Some(new_status) => {
            let result = ctx
                .cse
                .perform_critical(
                    &copy_id,
                    |c: &RepositoryCopy| !c.copy_status.is_terminal(),
                    move |mut c: RepositoryCopy| async move {
                        c.copy_status = new_status;
                        Ok((c, ()))
                    },
                    move |c: &RepositoryCopy, _: &()| c.copy_status == new_status,
                )
                .await;
            match result.outcome() {
                CriticalOutcome::Performed | CriticalOutcome::PreconditionMiss => result
                    .entity()
                    .map(|v| v.entity.clone())
                    .ok_or_else(|| anyhow::anyhow!("copy {copy_id} vanished during refresh"))?,
                _ => {
                    return Err(result
                        .into_cause()
                        .unwrap_or_else(|| anyhow::anyhow!("copy update failed"))
                        .context(format!("updating repository copy {copy_id}")))
                }
            }
        }
        None => typed::read::<RepositoryCopy>(ctx.repo.as_ref(), &copy_id)
            .await?
            .map(|v| v.entity)
            .ok_or_else(|| anyhow::anyhow!("copy {copy_id} vanished during refresh"))?,
    };

    Ok((deposit, copy))
}

/// A settled deposit and its copy must agree: ACCEPTED pairs with COMPLETE,
/// REJECTED with REJECTED, SUBMITTED with IN_PROGRESS.
fn congruent(deposit: &Deposit, copy: &RepositoryCopy) -> bool {
    match deposit.deposit_status {
        Some(DepositStatus::Accepted) => copy.copy_status == CopyStatus::Complete,
        Some(DepositStatus::Rejected) => copy.copy_status == CopyStatus::Rejected,
        Some(DepositStatus::Submitted) => copy.copy_status == CopyStatus::InProgress,
        _ => false,
    }
}
