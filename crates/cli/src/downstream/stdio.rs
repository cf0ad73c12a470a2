//! Newline-delimited JSON-RPC over stdin/stdout, the
//! default downstream transport and the one the CLI's `run` subcommand uses
//! with no flags. One JSON value per line in both directions, the simplest
//! framing `rmcp`'s own wire format supports and the one every MCP stdio
//! client already speaks.

use mcpcp_core::RequestHandler;
use rmcp::model::{ClientJsonRpcMessage, JsonRpcRequest, JsonRpcResponse, JsonRpcVersion2_0, ServerJsonRpcMessage};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub async fn serve(handler: Arc<RequestHandler>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message: ClientJsonRpcMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed downstream message");
                continue;
            }
        };

        let ClientJsonRpcMessage::Request(JsonRpcRequest { id, request, .. }) = message else {
            // Notifications (e.g. `notifications/initialized`) and batches
            // get no response on this transport.
            continue;
        };

        let response = match super::dispatch(&handler, request).await {
            Ok(result) => ServerJsonRpcMessage::Response(JsonRpcResponse { jsonrpc: JsonRpcVersion2_0, id, result }),
            Err(error) => ServerJsonRpcMessage::error(error, id),
        };

        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}
