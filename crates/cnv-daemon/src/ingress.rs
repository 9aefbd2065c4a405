//! Listener pools: drain the ingress queue into the processors.
//!
//! One dispatcher routes events by entity kind into two bounded queues; a
//! pool of listeners per queue invokes the matching processor. A slot is
//! held for the duration of the processor call, so pool size bounds
//! concurrent upstream work.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use cnv_engine::{DepositProcessor, EngineContext, ErrorHandler, SubmissionProcessor, WorkerHandle};
use cnv_model::{EntityType, RepositoryEvent};

use crate::state::Counters;

pub struct ListenerSet {
    dispatcher: JoinHandle<()>,
    listeners: Vec<JoinHandle<()>>,
}

/// Spawn the dispatcher plus `concurrency` listeners per entity kind.
pub fn spawn_listeners(
    mut ingress: mpsc::Receiver<RepositoryEvent>,
    counters: Arc<Counters>,
    ctx: Arc<EngineContext>,
    errors: Arc<ErrorHandler>,
    workers: WorkerHandle,
    concurrency: usize,
) -> ListenerSet {
    let (submission_tx, submission_rx) = mpsc::channel::<RepositoryEvent>(concurrency * 4);
    let (deposit_tx, deposit_rx) = mpsc::channel::<RepositoryEvent>(concurrency * 4);

    let dispatcher = tokio::spawn(async move {
        while let Some(event) = ingress.recv().await {
            let routed = match event.entity_type {
                EntityType::Submission => submission_tx.send(event).await,
                EntityType::Deposit => deposit_tx.send(event).await,
                // The ingress route already filtered other kinds.
                _ => Ok(()),
            };
            if routed.is_err() {
                debug!("listener queues closed; dispatcher exiting");
                break;
            }
        }
        info!("ingress closed; dispatcher exiting");
    });

    let submission_rx = Arc::new(Mutex::new(submission_rx));
    let deposit_rx = Arc::new(Mutex::new(deposit_rx));
    let mut listeners = Vec::with_capacity(concurrency * 2);

    for listener in 0..concurrency.max(1) {
        let rx = Arc::clone(&submission_rx);
        let counters = Arc::clone(&counters);
        let processor = SubmissionProcessor::new(
            Arc::clone(&ctx),
            Arc::clone(&errors),
            workers.clone(),
        );
        listeners.push(tokio::spawn(async move {
            loop {
                let event = { rx.lock().await.recv().await };
                let Some(event) = event else { break };
                debug!(listener, submission = %event.entity_id, "submission event picked up");
                processor.process(&event.entity_id).await;
                Counters::bump(&counters.submissions_processed);
            }
        }));
    }

    for listener in 0..concurrency.max(1) {
        let rx = Arc::clone(&deposit_rx);
        let counters = Arc::clone(&counters);
        let processor = DepositProcessor::new(Arc::clone(&ctx));
        listeners.push(tokio::spawn(async move {
            loop {
                let event = { rx.lock().await.recv().await };
                let Some(event) = event else { break };
                debug!(listener, deposit = %event.entity_id, "deposit event picked up");
                processor.process(&event.entity_id).await;
                Counters::bump(&counters.deposits_processed);
            }
        }));
    }

    ListenerSet {
        dispatcher,
        listeners,
    }
}

impl ListenerSet {
    /// Wait for the dispatcher and every listener to drain and exit.
    /// The ingress sender must be dropped first.
    pub async fn drain(self) {
        let _ = self.dispatcher.await;
        for listener in self.listeners {
            let _ = listener.await;
        }
        info!("listener pools drained");
    }
}
