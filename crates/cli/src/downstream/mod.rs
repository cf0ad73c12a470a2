//! The downstream MCP surface: whatever this proxy exposes toward the
//! agent client, regardless of which wire transport carries it.
//!
//! `dispatch` is the one place a `ClientRequest` becomes a `ServerResult`;
//! `stdio.rs` and `http.rs` each just get bytes in, hand the parsed request
//! to `dispatch`, and serialize whatever comes back. Built on manual
//! JSON-RPC envelope construction rather than `rmcp`'s higher-level
//! `ServerHandler`/session-manager machinery — see DESIGN.md for why.

pub mod http;
pub mod stdio;

use mcpcp_core::RequestHandler;
use mcpcp_transports::convert::tool_result_to_rmcp;
use rmcp::model::{
    ClientRequest, ErrorData, GetPromptResult, Implementation, InitializeResult, ListPromptsResult,
    ListResourcesResult, ListToolsResult, Prompt, ProtocolVersion, PromptsCapability, ReadResourceResult, Resource,
    ServerCapabilities, ServerResult, Tool, ToolsCapability,
};
use serde_json::Value;

/// Handle one parsed downstream request against the control plane,
/// returning the `ServerResult` variant to wrap in a response envelope, or
/// an `ErrorData` to wrap in a JSON-RPC error. Five request types are
/// proxied (tools/resources/prompts list, tool call, resource read, prompt
/// get); `initialize` and `ping` are protocol-level handshake requests
/// every MCP server answers regardless of what it proxies.
pub async fn dispatch(handler: &RequestHandler, request: ClientRequest) -> Result<ServerResult, ErrorData> {
    match request {
        ClientRequest::InitializeRequest(_) => Ok(ServerResult::InitializeResult(server_initialize_result())),
        ClientRequest::PingRequest(_) => Ok(ServerResult::empty(())),
        ClientRequest::ListToolsRequest(_) => {
            let tools = handler
                .list_tools()
                .await
                .into_iter()
                .filter_map(value_into::<Tool>)
                .collect();
            Ok(ServerResult::ListToolsResult(ListToolsResult { tools, ..Default::default() }))
        }
        ClientRequest::ListResourcesRequest(_) => {
            let resources = handler
                .list_resources()
                .await
                .into_iter()
                .filter_map(value_into::<Resource>)
                .collect();
            Ok(ServerResult::ListResourcesResult(ListResourcesResult { resources, ..Default::default() }))
        }
        ClientRequest::ListPromptsRequest(_) => {
            let prompts = handler
                .list_prompts()
                .await
                .into_iter()
                .filter_map(value_into::<Prompt>)
                .collect();
            Ok(ServerResult::ListPromptsResult(ListPromptsResult { prompts, ..Default::default() }))
        }
        ClientRequest::CallToolRequest(req) => {
            let name = req.params.name.to_string();
            let args = req.params.arguments.map(Value::Object).unwrap_or_default();
            let result = handler.call_tool(&name, args).await;
            Ok(ServerResult::CallToolResult(tool_result_to_rmcp(result)))
        }
        ClientRequest::ReadResourceRequest(req) => {
            let value = handler.read_resource(&req.params.uri).await.map_err(route_error)?;
            let result = value_into::<ReadResourceResult>(value)
                .ok_or_else(|| ErrorData::internal_error("malformed upstream resource payload", None))?;
            Ok(ServerResult::ReadResourceResult(result))
        }
        ClientRequest::GetPromptRequest(req) => {
            let args = req.params.arguments.map(Value::Object);
            let value = handler.get_prompt(&req.params.name, args).await.map_err(route_error)?;
            let result = value_into::<GetPromptResult>(value)
                .ok_or_else(|| ErrorData::internal_error("malformed upstream prompt payload", None))?;
            Ok(ServerResult::GetPromptResult(result))
        }
        other => Err(ErrorData::invalid_request(format!("unsupported request: {other:?}"), None)),
    }
}

fn value_into<T: serde::de::DeserializeOwned>(value: Value) -> Option<T> {
    serde_json::from_value(value).ok()
}

fn route_error(err: mcpcp_core::error::RouteError) -> ErrorData {
    ErrorData::invalid_params(err.to_string(), None)
}

fn server_initialize_result() -> InitializeResult {
    InitializeResult {
        protocol_version: ProtocolVersion::default(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: Some(false) }),
            resources: None,
            prompts: Some(PromptsCapability { list_changed: Some(false) }),
            logging: None,
            completions: None,
            experimental: None,
        },
        server_info: Implementation {
            name: "mcpcp".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            icons: None,
            title: Some("mcp-control-plane".into()),
            website_url: None,
        },
        instructions: None,
    }
}
