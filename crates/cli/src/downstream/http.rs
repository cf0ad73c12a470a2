//! HTTP downstream surface for `downstream.transport` ∈ {`sse`,
//! `streamable-http`}.
//!
//! `rmcp`'s `transport-streamable-http-server` session machinery (resumable
//! streams, per-session event ids) is real infrastructure, but hand-authoring
//! the server side of that protocol with no compiler to check it against is
//! a bet this proxy doesn't need to make: every MCP request here is
//! independently dispatchable, so a single POST handler that parses one
//! `ClientJsonRpcMessage` and replies with one `ServerJsonRpcMessage` covers
//! both configured transport kinds. This drops session resumption and
//! server-initiated streaming; see DESIGN.md.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use mcpcp_core::RequestHandler;
use rmcp::model::{ClientJsonRpcMessage, JsonRpcRequest, JsonRpcResponse, JsonRpcVersion2_0, ServerJsonRpcMessage};
use std::sync::Arc;

#[must_use]
pub fn router(handler: Arc<RequestHandler>) -> Router {
    Router::new().route("/", post(handle_message)).with_state(handler)
}

async fn handle_message(
    State(handler): State<Arc<RequestHandler>>,
    Json(message): Json<ClientJsonRpcMessage>,
) -> impl IntoResponse {
    let ClientJsonRpcMessage::Request(JsonRpcRequest { id, request, .. }) = message else {
        // Notifications carry no id to reply against; MCP clients don't
        // expect a body back for them.
        return StatusCode::ACCEPTED.into_response();
    };

    let response = match super::dispatch(&handler, request).await {
        Ok(result) => ServerJsonRpcMessage::Response(JsonRpcResponse { jsonrpc: JsonRpcVersion2_0, id, result }),
        Err(error) => ServerJsonRpcMessage::error(error, id),
    };

    Json(response).into_response()
}
