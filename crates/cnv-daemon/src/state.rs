//! Shared runtime state for the daemon's HTTP surface.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum; this module owns
//! nothing async itself. Counters are plain atomics bumped at ingress and
//! read by `GET /v1/status`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use cnv_model::RepositoryEvent;

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE
/// events on `GET /v1/stream`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Ingest { entity_id: String, accepted: bool },
}

/// Ingress and processing counters.
#[derive(Default)]
pub struct Counters {
    pub events_accepted: AtomicU64,
    pub events_dropped_self: AtomicU64,
    pub events_dropped_unhandled: AtomicU64,
    pub events_rejected_full: AtomicU64,
    pub submissions_processed: AtomicU64,
    pub deposits_processed: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time snapshot returned by `GET /v1/status`.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub config_hash: String,
    pub events_accepted: u64,
    pub events_dropped_self: u64,
    pub events_dropped_unhandled: u64,
    pub events_rejected_full: u64,
    pub submissions_processed: u64,
    pub deposits_processed: u64,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
///
/// The listener pools share only `counters` — handing them the whole state
/// would keep the ingress sender alive and stall the shutdown drain.
pub struct AppState {
    pub build: BuildInfo,
    /// Self-identifying agent; events attributed to it are dropped.
    pub self_agent: String,
    pub config_hash: String,
    pub counters: Arc<Counters>,
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Front of the ingress queue; the dispatcher drains the other end.
    pub ingress: mpsc::Sender<RepositoryEvent>,
}

impl AppState {
    pub fn new(
        self_agent: String,
        config_hash: String,
        ingress: mpsc::Sender<RepositoryEvent>,
    ) -> Arc<Self> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Arc::new(Self {
            build: BuildInfo {
                service: "conveyor",
                version: env!("CARGO_PKG_VERSION"),
            },
            self_agent,
            config_hash,
            counters: Arc::new(Counters::default()),
            bus,
            ingress,
        })
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            config_hash: self.config_hash.clone(),
            events_accepted: Counters::read(&self.counters.events_accepted),
            events_dropped_self: Counters::read(&self.counters.events_dropped_self),
            events_dropped_unhandled: Counters::read(&self.counters.events_dropped_unhandled),
            events_rejected_full: Counters::read(&self.counters.events_rejected_full),
            submissions_processed: Counters::read(&self.counters.submissions_processed),
            deposits_processed: Counters::read(&self.counters.deposits_processed),
        }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(
    bus: broadcast::Sender<BusMsg>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    })
}
