//! Routes deposit events: terminal deposits aggregate, intermediate ones
//! refresh.

use std::sync::Arc;

use tracing::{debug, warn};

use cnv_model::Deposit;
use cnv_repo::typed;

use crate::aggregator::SubmissionAggregator;
use crate::context::EngineContext;
use crate::refresher::DepositStatusRefresher;

pub struct DepositProcessor {
    ctx: Arc<EngineContext>,
    aggregator: SubmissionAggregator,
    refresher: DepositStatusRefresher,
}

impl DepositProcessor {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            aggregator: SubmissionAggregator::new(Arc::clone(&ctx)),
            refresher: DepositStatusRefresher::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    pub async fn process(&self, deposit_id: &str) {
        let deposit = match typed::read::<Deposit>(self.ctx.repo.as_ref(), deposit_id).await {
            Ok(Some(v)) => v.entity,
            Ok(None) => {
                warn!(deposit = deposit_id, "deposit event for unknown entity");
                return;
            }
            Err(e) => {
                warn!(deposit = deposit_id, cause = %e, "deposit unreadable; event dropped");
                return;
            }
        };

        if deposit.is_terminal() {
            debug!(deposit = deposit_id, submission = %deposit.submission, "terminal deposit; aggregating");
            self.aggregator.aggregate(&deposit.submission).await;
        } else {
            debug!(deposit = deposit_id, "intermediate deposit; refreshing");
            self.refresher.refresh(deposit_id).await;
        }
    }
}
