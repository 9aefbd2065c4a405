//! `conveyor` entry point.
//!
//! Thin by intent: parse arguments, set up tracing, load settings, delegate
//! to the daemon runtime or a one-shot driver, and map failure classes onto
//! exit codes (0 ok, 1 configuration, 2 upstream unavailable, 3 runtime
//! fault).

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use cnv_config::Settings;
use cnv_daemon::{bootstrap, DaemonError};
use cnv_engine::{RefreshDriver, RetryDriver};

/// Bound on the drain wait after a one-shot driver run.
const DRIVER_DRAIN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Deposit orchestration daemon and operator drivers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run event consumers and worker pools until signalled.
    Listen,

    /// Re-enqueue FAILED (and never-attempted) deposits.
    Retry {
        /// Retry only this deposit; all eligible deposits otherwise.
        #[arg(long)]
        uri: Option<String>,
    },

    /// Re-poll the status references of SUBMITTED deposits.
    Refresh {
        /// Refresh only this deposit; all submitted deposits otherwise.
        #[arg(long)]
        uri: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn exit_code(err: &DaemonError) -> u8 {
    match err {
        DaemonError::Config(_) => 1,
        DaemonError::Upstream(_) => 2,
        DaemonError::Fault(_) => 3,
    }
}

async fn run(cli: Cli) -> Result<(), DaemonError> {
    let settings = Settings::from_env()?;

    match cli.cmd {
        Commands::Listen => cnv_daemon::run(settings).await,

        Commands::Retry { uri } => {
            let runtime = bootstrap(&settings).await?;
            let driver = RetryDriver::new(
                Arc::clone(&runtime.ctx),
                Arc::clone(&runtime.errors),
                runtime.workers.clone(),
            );
            let outcome = match uri {
                Some(uri) => driver.retry_one(&uri).await.map(|dispatched| {
                    info!(deposit = %uri, dispatched, "retry complete");
                }),
                None => driver.retry_all().await.map(|report| {
                    println!("scanned={} dispatched={}", report.scanned, report.acted);
                }),
            };
            // Let dispatched transfers finish before the process exits.
            drop(driver);
            drop(runtime.workers);
            runtime.pool.shutdown(DRIVER_DRAIN_GRACE).await;
            outcome.map_err(DaemonError::Fault)
        }

        Commands::Refresh { uri } => {
            let runtime = bootstrap(&settings).await?;
            let driver = RefreshDriver::new(Arc::clone(&runtime.ctx));
            let outcome = match uri {
                Some(uri) => driver.refresh_one(&uri).await,
                None => driver.refresh_all().await.map(|report| {
                    println!("scanned={}", report.scanned);
                }),
            };
            drop(runtime.workers);
            runtime.pool.shutdown(DRIVER_DRAIN_GRACE).await;
            outcome.map_err(DaemonError::Fault)
        }
    }
}
