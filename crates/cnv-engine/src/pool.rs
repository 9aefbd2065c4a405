//! Bounded deposit worker pool.
//!
//! N workers drain a bounded queue of [`DepositTask`]s. Dispatch never
//! blocks: a full queue rejects the task and the caller surfaces the
//! rejection as a deposit-scoped failure (the deposit is marked FAILED, not
//! silently dropped).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::EngineContext;
use crate::error_handler::ErrorHandler;
use crate::task::DepositTask;

/// Dispatch side of the pool. Clone freely; drop all clones to let the
/// workers drain and exit.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<DepositTask>,
}

/// A task the queue had no room for, handed back to the caller.
#[derive(Debug)]
pub struct PoolFull(pub DepositTask);

impl std::fmt::Display for PoolFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "deposit worker queue is full; rejected task for {}",
            self.0.deposit_id
        )
    }
}

impl std::error::Error for PoolFull {}

impl WorkerHandle {
    /// Non-blocking dispatch. A closed pool counts as full.
    pub fn try_dispatch(&self, task: DepositTask) -> Result<(), PoolFull> {
        self.tx.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(task)
            | mpsc::error::TrySendError::Closed(task) => PoolFull(task),
        })
    }

    /// Queue slots currently unoccupied (diagnostic).
    pub fn free_slots(&self) -> usize {
        self.tx.capacity()
    }
}

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers over a queue of `queue_capacity` slots.
    pub fn spawn(
        ctx: Arc<EngineContext>,
        errors: Arc<ErrorHandler>,
        concurrency: usize,
        queue_capacity: usize,
    ) -> (WorkerHandle, WorkerPool) {
        let (tx, rx) = mpsc::channel::<DepositTask>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..concurrency.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let ctx = Arc::clone(&ctx);
                let errors = Arc::clone(&errors);
                tokio::spawn(async move {
                    loop {
                        let task = { rx.lock().await.recv().await };
                        let Some(task) = task else {
                            debug!(worker, "queue closed; worker exiting");
                            break;
                        };
                        debug!(worker, deposit = %task.deposit_id, "task picked up");
                        task.execute(&ctx, &errors).await;
                    }
                })
            })
            .collect();

        (WorkerHandle { tx }, WorkerPool { workers })
    }

    /// Wait for the workers to drain, up to `grace`; abort stragglers.
    ///
    /// The caller must drop every [`WorkerHandle`] first, or the workers
    /// never see the queue close.
    pub async fn shutdown(mut self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0usize;
        for handle in &mut self.workers {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut *handle).await.is_err() {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted == 0 {
            info!("deposit workers drained");
        } else {
            warn!(aborted, grace_secs = grace.as_secs(), "deposit workers did not drain in time");
        }
    }
}
