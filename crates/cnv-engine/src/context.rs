//! Shared wiring for all processors.

use std::sync::Arc;
use std::time::Duration;

use cnv_cse::CriticalEngine;
use cnv_packager::PackagerRegistry;
use cnv_repo::RepositoryClient;

/// Tunables that reach into processor behavior.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Minimum wait between a successful submit and the first status
    /// refresh of an asynchronous target.
    pub first_refresh_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            first_refresh_delay: Duration::from_millis(10_000),
        }
    }
}

/// Everything the processors share. Cheap to clone via `Arc`.
pub struct EngineContext {
    pub repo: Arc<dyn RepositoryClient>,
    pub cse: Arc<CriticalEngine>,
    pub registry: Arc<PackagerRegistry>,
    pub settings: EngineSettings,
}

impl EngineContext {
    pub fn new(
        repo: Arc<dyn RepositoryClient>,
        cse: Arc<CriticalEngine>,
        registry: Arc<PackagerRegistry>,
        settings: EngineSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            repo,
            cse,
            registry,
            settings,
        })
    }
}
