//! A deliberately thin operator-facing HTTP surface: `/healthz`,
//! `/generation`, and an SSE `/logs` tail. Read-only by design — no
//! tenant/profile/upstream CRUD, since this proxy has no multi-tenancy to
//! administer, just the one running generation's health and log stream.

pub mod log_layer;

pub use log_layer::LogTail;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use mcpcp_core::RequestHandler;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

pub struct AdminState {
    pub handler: Arc<RequestHandler>,
    pub log_tail: LogTail,
}

#[must_use]
pub fn router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/generation", get(generation_status))
        .route("/logs", get(logs_stream))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct UpstreamStatus {
    id: String,
    connected: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationStatus {
    generation_id: u64,
    upstreams: Vec<UpstreamStatus>,
}

async fn generation_status(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let generation = state.handler.generation();
    let upstreams = generation
        .aggregator
        .connection_states()
        .into_iter()
        .map(|(id, connected)| UpstreamStatus { id, connected })
        .collect();
    Json(GenerationStatus { generation_id: generation.id, upstreams })
}

/// Backlog of recent lines followed by a live tail, so a client connecting
/// mid-incident still sees what led up to it.
async fn logs_stream(State(state): State<Arc<AdminState>>) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let backlog = stream::iter(state.log_tail.snapshot().into_iter().map(|line| Ok(Event::default().data(line))));
    let live = BroadcastStream::new(state.log_tail.subscribe())
        .filter_map(|line| async move { line.ok().map(|line| Ok(Event::default().data(line))) });
    Sse::new(backlog.chain(live)).keep_alive(KeepAlive::default())
}
