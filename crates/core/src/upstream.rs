//! The upstream client contract.
//!
//! A thin facade over whichever transport (subprocess stdio, SSE, streamable
//! HTTP) backs a given upstream — the transport itself is out of this
//! crate's scope; concrete implementations live in `mcpcp-transports`.
//! Listing failures surface as `Err(UpstreamError)`; call failures surface
//! as an `isError`-tagged [`ToolCallResult`] so the downstream surface never
//! throws across an RPC boundary.

use crate::content::ToolCallResult;
use crate::error::UpstreamError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    fn id(&self) -> &str;

    async fn connect(&self) -> Result<(), UpstreamError>;
    async fn close(&self);

    /// An observable connection flag; the transport flips it on connect/
    /// disconnect. Cheap and non-blocking to read.
    fn is_connected(&self) -> watch::Receiver<bool>;

    async fn list_tools(&self) -> Result<Vec<Value>, UpstreamError>;
    async fn list_resources(&self) -> Result<Vec<Value>, UpstreamError>;
    async fn list_prompts(&self) -> Result<Vec<Value>, UpstreamError>;

    /// Never returns `Err` for a tool-level failure — those come back as
    /// `Ok(ToolCallResult { is_error: true, .. })`. `Err` is reserved for
    /// transport-level failures the caller cannot route around (e.g. the
    /// upstream process died mid-call).
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolCallResult, UpstreamError>;

    async fn read_resource(&self, uri: &str) -> Result<Value, UpstreamError>;
    async fn get_prompt(&self, name: &str, args: Option<Value>) -> Result<Value, UpstreamError>;
}
