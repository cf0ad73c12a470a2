//! Shared plumbing across the three `UpstreamClient` implementations: once
//! a transport has produced a running `rmcp` client service, listing/calling
//! against it is identical regardless of how the bytes got there. Only
//! `connect()` differs per transport (`stdio.rs`, `sse.rs`,
//! `streamable_http.rs`); this module is the common call path underneath.

use mcpcp_core::content::ToolCallResult;
use mcpcp_core::error::UpstreamError;
use rmcp::RoleClient;
use rmcp::model::{CallToolRequestParam, GetPromptRequestParam, ReadResourceRequestParam};
use rmcp::service::RunningService;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::convert::{to_value_list, tool_result_from_rmcp};

pub type ClientService = RunningService<RoleClient, ()>;

fn transport_err(upstream_id: &str, err: impl std::fmt::Display) -> UpstreamError {
    UpstreamError::Transport { upstream_id: upstream_id.to_string(), message: err.to_string() }
}

fn not_connected(upstream_id: &str) -> UpstreamError {
    UpstreamError::NotConnected { upstream_id: upstream_id.to_string() }
}

/// Build a `reqwest::Client` carrying the upstream's configured static
/// headers (e.g. an API key) as default headers, so the HTTP-based
/// transports don't need to re-attach them per request.
pub fn build_http_client(headers: &HashMap<String, String>) -> reqwest::Client {
    let mut default_headers = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) else {
            tracing::warn!(header = %name, "skipping invalid upstream header");
            continue;
        };
        default_headers.insert(name, value);
    }
    reqwest::Client::builder()
        .default_headers(default_headers)
        .build()
        .unwrap_or_default()
}

pub async fn close(service: &Mutex<Option<ClientService>>) {
    if let Some(running) = service.lock().await.take() {
        let _ = running.cancel().await;
    }
}

pub async fn list_tools(service: &Mutex<Option<ClientService>>, upstream_id: &str) -> Result<Vec<Value>, UpstreamError> {
    let guard = service.lock().await;
    let running = guard.as_ref().ok_or_else(|| not_connected(upstream_id))?;
    let result = running
        .list_tools(Default::default())
        .await
        .map_err(|e| transport_err(upstream_id, e))?;
    Ok(to_value_list(result.tools))
}

pub async fn list_resources(service: &Mutex<Option<ClientService>>, upstream_id: &str) -> Result<Vec<Value>, UpstreamError> {
    let guard = service.lock().await;
    let running = guard.as_ref().ok_or_else(|| not_connected(upstream_id))?;
    let result = running
        .list_resources(Default::default())
        .await
        .map_err(|e| transport_err(upstream_id, e))?;
    Ok(to_value_list(result.resources))
}

pub async fn list_prompts(service: &Mutex<Option<ClientService>>, upstream_id: &str) -> Result<Vec<Value>, UpstreamError> {
    let guard = service.lock().await;
    let running = guard.as_ref().ok_or_else(|| not_connected(upstream_id))?;
    let result = running
        .list_prompts(Default::default())
        .await
        .map_err(|e| transport_err(upstream_id, e))?;
    Ok(to_value_list(result.prompts))
}

pub async fn call_tool(
    service: &Mutex<Option<ClientService>>,
    upstream_id: &str,
    name: &str,
    args: Value,
) -> Result<ToolCallResult, UpstreamError> {
    let guard = service.lock().await;
    let running = guard.as_ref().ok_or_else(|| not_connected(upstream_id))?;
    let arguments = args.as_object().cloned();
    let result = running
        .call_tool(CallToolRequestParam { name: name.to_string().into(), arguments })
        .await
        .map_err(|e| transport_err(upstream_id, e))?;
    Ok(tool_result_from_rmcp(result))
}

pub async fn read_resource(service: &Mutex<Option<ClientService>>, upstream_id: &str, uri: &str) -> Result<Value, UpstreamError> {
    let guard = service.lock().await;
    let running = guard.as_ref().ok_or_else(|| not_connected(upstream_id))?;
    let result = running
        .read_resource(ReadResourceRequestParam { uri: uri.to_string() })
        .await
        .map_err(|e| transport_err(upstream_id, e))?;
    serde_json::to_value(result).map_err(|e| UpstreamError::Protocol { upstream_id: upstream_id.to_string(), message: e.to_string() })
}

pub async fn get_prompt(
    service: &Mutex<Option<ClientService>>,
    upstream_id: &str,
    name: &str,
    args: Option<Value>,
) -> Result<Value, UpstreamError> {
    let guard = service.lock().await;
    let running = guard.as_ref().ok_or_else(|| not_connected(upstream_id))?;
    let arguments = args.and_then(|v| v.as_object().cloned());
    let result = running
        .get_prompt(GetPromptRequestParam { name: name.to_string(), arguments })
        .await
        .map_err(|e| transport_err(upstream_id, e))?;
    serde_json::to_value(result).map_err(|e| UpstreamError::Protocol { upstream_id: upstream_id.to_string(), message: e.to_string() })
}
