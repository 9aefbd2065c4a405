//! Construction of the full engine from settings: upstream client, registry
//! document, packagers, critical-section engine, worker pool.

use std::sync::Arc;

use tracing::info;

use cnv_assembler::SimpleArchiveAssembler;
use cnv_config::{load_registry, Settings};
use cnv_cse::CriticalEngine;
use cnv_engine::{EngineContext, EngineSettings, ErrorHandler, WorkerHandle, WorkerPool};
use cnv_packager::{
    Assembler, DepositStatusProcessor, MappingStatusProcessor, Packager, PackagerRegistry,
    TargetConfig, Transport,
};
use cnv_repo::{HttpRepositoryClient, HttpRepositoryConfig, RepositoryClient};
use cnv_transport::{FilesystemTransport, HttpDepositTransport, LocationRetriever};

use crate::error::DaemonError;

/// Queue depth of the deposit worker pool, in multiples of its concurrency.
const WORKER_QUEUE_FACTOR: usize = 4;

/// A fully-wired engine, ready to listen or to run a one-shot driver.
pub struct Runtime {
    pub ctx: Arc<EngineContext>,
    pub errors: Arc<ErrorHandler>,
    pub workers: WorkerHandle,
    pub pool: WorkerPool,
    pub config_hash: String,
}

/// Build the runtime. Fails with [`DaemonError::Upstream`] when the entity
/// store does not answer, and [`DaemonError::Config`] for everything the
/// operator must fix.
pub async fn bootstrap(settings: &Settings) -> Result<Runtime, DaemonError> {
    let repo: Arc<dyn RepositoryClient> = {
        let mut config = HttpRepositoryConfig::new(
            settings.repository_base_url.clone(),
            settings.http_agent.clone(),
        );
        config.username = settings.repository_username.clone();
        config.password = settings.repository_password.clone();
        Arc::new(
            HttpRepositoryClient::new(config)
                .map_err(|e| DaemonError::Config(e.to_string()))?,
        )
    };

    repo.ping()
        .await
        .map_err(|e| DaemonError::Upstream(e.to_string()))?;
    info!(upstream = %settings.repository_base_url, "upstream repository reachable");

    let loaded = load_registry(&settings.registry_location).await?;
    let mut registry = PackagerRegistry::new();
    for (key, config) in loaded.targets {
        let packager = build_packager(&key, config)?;
        registry.register(packager);
    }
    if registry.is_empty() {
        return Err(DaemonError::Config(
            "registry document configures no targets".into(),
        ));
    }
    info!(
        targets = registry.len(),
        config_hash = %loaded.config_hash,
        "packager registry built"
    );

    let cse = Arc::new(CriticalEngine::new(Arc::clone(&repo)));
    let ctx = EngineContext::new(
        repo,
        cse,
        Arc::new(registry),
        EngineSettings {
            first_refresh_delay: settings.first_refresh_delay,
        },
    );
    let errors = ErrorHandler::new(Arc::clone(&ctx.cse));
    let (workers, pool) = WorkerPool::spawn(
        Arc::clone(&ctx),
        Arc::clone(&errors),
        settings.workers_concurrency,
        settings.workers_concurrency * WORKER_QUEUE_FACTOR,
    );

    Ok(Runtime {
        ctx,
        errors,
        workers,
        pool,
        config_hash: loaded.config_hash,
    })
}

/// Resolve one target's configured component names into live components.
fn build_packager(key: &str, config: TargetConfig) -> Result<Packager, DaemonError> {
    let assembler: Arc<dyn Assembler> = match config.assembler.specification.as_str() {
        cnv_assembler::SPECIFICATION => {
            let retriever = LocationRetriever::new()
                .map_err(|e| DaemonError::Config(e.to_string()))?
                .with_realms(config.transport.auth_realms.clone());
            Arc::new(SimpleArchiveAssembler::new(Arc::new(retriever)))
        }
        other => {
            return Err(DaemonError::Config(format!(
                "target {key}: unknown assembler specification {other:?}"
            )))
        }
    };

    let protocol = config
        .transport
        .protocol_binding
        .get(cnv_packager::params::PROTOCOL)
        .map(String::as_str)
        .unwrap_or_default();
    let transport: Arc<dyn Transport> = match protocol {
        "filesystem" => Arc::new(FilesystemTransport),
        "http" => Arc::new(
            HttpDepositTransport::new().map_err(|e| DaemonError::Config(e.to_string()))?,
        ),
        other => {
            return Err(DaemonError::Config(format!(
                "target {key}: unknown transport protocol {other:?}"
            )))
        }
    };

    let status_processor: Arc<dyn DepositStatusProcessor> =
        match config.deposit.processing.bean_name.as_str() {
            "mapping" => Arc::new(MappingStatusProcessor::new(reqwest::Client::new())),
            other => {
                return Err(DaemonError::Config(format!(
                    "target {key}: unknown status processor {other:?}"
                )))
            }
        };

    Ok(Packager {
        name: key.to_string(),
        assembler,
        transport,
        status_processor,
        config,
    })
}
