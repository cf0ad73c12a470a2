//! Wire-shape conversions between `rmcp`'s typed client results and this
//! crate's `serde_json::Value`/`ToolCallResult` boundary (`mcpcp-core`'s
//! `UpstreamClient` contract deliberately stays untyped on the MCP SDK so
//! that swapping transports never touches `crates/core`).

use mcpcp_core::content::{ContentBlock, ToolCallResult};
use serde_json::Value;

/// `rmcp::model::Tool`/`Resource`/`Prompt` all serialize straightforwardly;
/// going through `Value` keeps the aggregator's namespacing rewrite
/// (`schema["name"] = ...`) working on plain JSON rather than a typed
/// struct it would otherwise have to special-case per record kind.
pub fn to_value_list<T: serde::Serialize>(items: Vec<T>) -> Vec<Value> {
    items
        .into_iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect()
}

/// `rmcp::model::CallToolResult` -> `ToolCallResult`. Walked field-by-field
/// rather than deserialized directly into `ToolCallResult`, since the wire
/// shape uses `mimeType`/`isError` (MCP's own camelCase) while this crate's
/// `ContentBlock` is tagged `mime_type` for the proxy's own wire surface.
pub fn tool_result_from_rmcp(result: rmcp::model::CallToolResult) -> ToolCallResult {
    let is_error = result.is_error.unwrap_or(false);
    let content = result.content.into_iter().filter_map(content_block_from_rmcp).collect();
    ToolCallResult { content, is_error }
}

fn content_block_from_rmcp(content: rmcp::model::Content) -> Option<ContentBlock> {
    let raw = content.raw;
    match raw {
        rmcp::model::RawContent::Text(text) => Some(ContentBlock::Text { text: text.text }),
        rmcp::model::RawContent::Image(image) => Some(ContentBlock::Image {
            data: image.data,
            mime_type: image.mime_type,
        }),
        rmcp::model::RawContent::Resource(resource) => {
            Some(ContentBlock::Resource { resource: serde_json::to_value(resource).ok()? })
        }
        rmcp::model::RawContent::Audio(_) => None,
    }
}

/// `ToolCallResult` -> `rmcp::model::CallToolResult`, the reverse of
/// [`tool_result_from_rmcp`] for the downstream-facing direction (serving a
/// tool call back to the agent client rather than reading one from an
/// upstream).
pub fn tool_result_to_rmcp(result: ToolCallResult) -> rmcp::model::CallToolResult {
    let content = result.content.into_iter().map(content_block_to_rmcp).collect();
    rmcp::model::CallToolResult {
        content,
        structured_content: None,
        is_error: Some(result.is_error),
        meta: None,
    }
}

/// An embedded-resource content block carries a typed `uri`/`mimeType`/
/// `text`-or-`blob` shape on the wire that this crate's `Value`-backed
/// `ContentBlock::Resource` doesn't preserve losslessly; re-serializing it as
/// text keeps the payload intact for the client to parse instead of
/// guessing at a reconstruction that might not round-trip.
fn content_block_to_rmcp(block: ContentBlock) -> rmcp::model::Content {
    match block {
        ContentBlock::Text { text } => rmcp::model::Content::text(text),
        ContentBlock::Image { data, mime_type } => rmcp::model::Content::image(data, mime_type),
        ContentBlock::Resource { resource } => {
            rmcp::model::Content::text(serde_json::to_string(&resource).unwrap_or_else(|_| resource.to_string()))
        }
    }
}
