//! Shared harness for the engine scenario tests.

// Each scenario binary uses a different slice of this module.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cnv_cse::{CriticalEngine, RetrySettings};
use cnv_engine::{
    DepositProcessor, EngineContext, EngineSettings, ErrorHandler, RefreshDriver, RetryDriver,
    SubmissionProcessor, WorkerHandle, WorkerPool,
};
use cnv_model::{PersistentEntity, Submission};
use cnv_packager::{Packager, PackagerRegistry};
use cnv_testkit::{fixtures, InMemoryRepository};

pub struct Harness {
    pub repo: Arc<InMemoryRepository>,
    pub ctx: Arc<EngineContext>,
    pub errors: Arc<ErrorHandler>,
    pub workers: WorkerHandle,
    pub pool: WorkerPool,
}

impl Harness {
    pub fn submission_processor(&self) -> SubmissionProcessor {
        SubmissionProcessor::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.errors),
            self.workers.clone(),
        )
    }

    pub fn deposit_processor(&self) -> DepositProcessor {
        DepositProcessor::new(Arc::clone(&self.ctx))
    }

    pub fn retry_driver(&self) -> RetryDriver {
        RetryDriver::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.errors),
            self.workers.clone(),
        )
    }

    pub fn refresh_driver(&self) -> RefreshDriver {
        RefreshDriver::new(Arc::clone(&self.ctx))
    }
}

/// Build a harness over fakes with default pool sizing.
pub fn harness(packagers: Vec<Packager>) -> Harness {
    harness_sized(packagers, 4, 32)
}

/// Build a harness with explicit worker/queue sizing.
pub fn harness_sized(packagers: Vec<Packager>, workers: usize, queue: usize) -> Harness {
    let repo = InMemoryRepository::new();
    let cse = Arc::new(CriticalEngine::with_retry(
        Arc::clone(&repo) as Arc<dyn cnv_repo::RepositoryClient>,
        RetrySettings {
            attempts: 10,
            backoff: Duration::from_millis(1),
        },
    ));

    let mut registry = PackagerRegistry::new();
    for packager in packagers {
        registry.register(packager);
    }

    let ctx = EngineContext::new(
        Arc::clone(&repo) as Arc<dyn cnv_repo::RepositoryClient>,
        cse,
        Arc::new(registry),
        EngineSettings {
            // Scenario tests drive refreshes explicitly; the automatic first
            // refresh must stay out of the way.
            first_refresh_delay: Duration::from_secs(600),
        },
    );
    let errors = ErrorHandler::new(Arc::clone(&ctx.cse));
    let (handle, pool) = WorkerPool::spawn(
        Arc::clone(&ctx),
        Arc::clone(&errors),
        workers,
        queue,
    );

    Harness {
        repo,
        ctx,
        errors,
        workers: handle,
        pool,
    }
}

/// Seed a submission targeting freshly-minted repositories (one registry key
/// each), with two linked files.
pub fn seed_submission(repo: &InMemoryRepository, target_keys: &[&str]) -> (String, Vec<String>) {
    let repo_ids: Vec<String> = target_keys
        .iter()
        .map(|key| repo.seed(fixtures::repository(key)))
        .collect();

    let refs: Vec<&str> = repo_ids.iter().map(String::as_str).collect();
    let sub_id = repo.seed(fixtures::submission_targeting(&refs));
    repo.seed(fixtures::file(&sub_id, "manuscript.pdf", "https://store/manuscript.pdf"));
    repo.seed(fixtures::file(&sub_id, "dataset.csv", "https://store/dataset.csv"));
    (sub_id, repo_ids)
}

/// Poll until `predicate` holds, failing the test after two seconds.
pub async fn wait_until<F>(what: &str, mut predicate: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !predicate() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Read a stored entity, panicking when absent.
pub fn stored<T: PersistentEntity>(repo: &InMemoryRepository, id: &str) -> T {
    repo.get(id)
        .unwrap_or_else(|| panic!("entity {id} missing from repository"))
}

/// The submission's current aggregate status.
pub fn aggregate_of(repo: &InMemoryRepository, id: &str) -> cnv_model::AggregatedStatus {
    stored::<Submission>(repo, id).aggregated_status
}
