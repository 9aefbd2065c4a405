//! Axum router and all HTTP handlers.
//!
//! `build_router` is the single entry point; `runtime.rs` attaches
//! middleware layers after this call so tests can use the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use cnv_model::{EntityType, RepositoryEvent};

use crate::state::{AppState, BusMsg, Counters};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/healthz", get(healthz))
        .route("/v1/status", get(status))
        .route("/v1/stream", get(stream))
        .route("/v1/events", post(ingest_event))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/healthz
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
    version: &'static str,
}

async fn healthz(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

async fn status(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.snapshot()))
}

// ---------------------------------------------------------------------------
// POST /v1/events
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct IngestResponse {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

/// Accept one normalized event envelope.
///
/// - `202` — enqueued for processing.
/// - `200` with `accepted: false` — dropped by policy (self-attributed
///   change, or an entity kind the engine does not act on).
/// - `429` — the ingress queue is full; the emitter should redeliver.
async fn ingest_event(
    State(st): State<Arc<AppState>>,
    Json(event): Json<RepositoryEvent>,
) -> impl IntoResponse {
    if event.attributed_to(&st.self_agent) {
        Counters::bump(&st.counters.events_dropped_self);
        debug!(
            entity = %event.entity_id,
            event_id = ?event.event_id,
            "self-attributed event dropped"
        );
        let _ = st.bus.send(BusMsg::Ingest {
            entity_id: event.entity_id,
            accepted: false,
        });
        return (
            StatusCode::OK,
            Json(IngestResponse {
                accepted: false,
                reason: Some("self-attributed"),
            }),
        );
    }

    if !matches!(
        event.entity_type,
        EntityType::Submission | EntityType::Deposit
    ) {
        Counters::bump(&st.counters.events_dropped_unhandled);
        return (
            StatusCode::OK,
            Json(IngestResponse {
                accepted: false,
                reason: Some("unhandled-entity-type"),
            }),
        );
    }

    let entity_id = event.entity_id.clone();
    match st.ingress.try_send(event) {
        Ok(()) => {
            Counters::bump(&st.counters.events_accepted);
            let _ = st.bus.send(BusMsg::Ingest {
                entity_id,
                accepted: true,
            });
            (
                StatusCode::ACCEPTED,
                Json(IngestResponse {
                    accepted: true,
                    reason: None,
                }),
            )
        }
        Err(_) => {
            Counters::bump(&st.counters.events_rejected_full);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(IngestResponse {
                    accepted: false,
                    reason: Some("ingress-queue-full"),
                }),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

async fn stream(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = st.bus.subscribe();
    Sse::new(broadcast_to_sse(rx)).keep_alive(KeepAlive::new())
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Ingest { .. } => "ingest",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
