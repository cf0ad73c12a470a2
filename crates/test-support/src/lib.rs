//! Shared test doubles: a fake upstream client, fake LLM client, fake
//! tokenizer, and small process/network helpers for integration tests that
//! need a real bound port or a spawned child process.

use async_trait::async_trait;
use mcpcp_core::error::{LlmError, UpstreamError};
use mcpcp_core::{ToolCallResult, UpstreamClient};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::TcpListener;
use std::process::Child;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// A configurable fake upstream: canned `tools/list`, `resources/list`,
/// `prompts/list` responses, and a per-call-name response table for
/// `call_tool`. Missing call-name entries fall back to echoing the args back
/// as a single text block, which is usually enough to assert on routing.
pub struct FakeUpstreamClient {
    id: String,
    tools: Vec<Value>,
    resources: Vec<Value>,
    prompts: Vec<Value>,
    call_responses: Mutex<std::collections::HashMap<String, ToolCallResult>>,
    fail_listing: bool,
    call_count: AtomicUsize,
    connected_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
}

impl FakeUpstreamClient {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            id: id.into(),
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
            call_responses: Mutex::new(std::collections::HashMap::new()),
            fail_listing: false,
            call_count: AtomicUsize::new(0),
            connected_tx: tx,
            connected_rx: rx,
        }
    }

    #[must_use]
    pub fn with_tool(mut self, name: &str) -> Self {
        self.tools.push(serde_json::json!({
            "name": name,
            "description": format!("fake tool {name}"),
            "inputSchema": {"type": "object", "properties": {}, "required": []}
        }));
        self
    }

    #[must_use]
    pub fn with_resource(mut self, uri: &str) -> Self {
        self.resources.push(serde_json::json!({"uri": uri, "name": uri}));
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, name: &str) -> Self {
        self.prompts.push(serde_json::json!({"name": name}));
        self
    }

    #[must_use]
    pub fn with_call_response(self, name: &str, response: ToolCallResult) -> Self {
        self.call_responses.lock().insert(name.to_string(), response);
        self
    }

    #[must_use]
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstreamClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> Result<(), UpstreamError> {
        let _ = self.connected_tx.send(true);
        Ok(())
    }

    async fn close(&self) {
        let _ = self.connected_tx.send(false);
    }

    fn is_connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    async fn list_tools(&self) -> Result<Vec<Value>, UpstreamError> {
        if self.fail_listing {
            return Err(UpstreamError::Transport {
                upstream_id: self.id.clone(),
                message: "simulated listing failure".to_string(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn list_resources(&self) -> Result<Vec<Value>, UpstreamError> {
        if self.fail_listing {
            return Err(UpstreamError::Transport {
                upstream_id: self.id.clone(),
                message: "simulated listing failure".to_string(),
            });
        }
        Ok(self.resources.clone())
    }

    async fn list_prompts(&self) -> Result<Vec<Value>, UpstreamError> {
        if self.fail_listing {
            return Err(UpstreamError::Transport {
                upstream_id: self.id.clone(),
                message: "simulated listing failure".to_string(),
            });
        }
        Ok(self.prompts.clone())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolCallResult, UpstreamError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(canned) = self.call_responses.lock().get(name) {
            return Ok(canned.clone());
        }
        Ok(ToolCallResult::text(args.to_string()))
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, UpstreamError> {
        self.resources
            .iter()
            .find(|r| r["uri"] == Value::String(uri.to_string()))
            .cloned()
            .ok_or_else(|| UpstreamError::Protocol {
                upstream_id: self.id.clone(),
                message: format!("no such resource: {uri}"),
            })
    }

    async fn get_prompt(&self, name: &str, _args: Option<Value>) -> Result<Value, UpstreamError> {
        self.prompts
            .iter()
            .find(|p| p["name"] == Value::String(name.to_string()))
            .cloned()
            .ok_or_else(|| UpstreamError::Protocol {
                upstream_id: self.id.clone(),
                message: format!("no such prompt: {name}"),
            })
    }
}

/// A fake `LlmClient` that either echoes a fixed response or fails, to
/// exercise the compressor's and masker's fail-open paths without a network
/// call.
pub struct FakeLlmClient {
    response: Result<String, String>,
    call_count: AtomicUsize,
}

impl FakeLlmClient {
    #[must_use]
    pub fn responding_with(text: impl Into<String>) -> Self {
        Self { response: Ok(text.into()), call_count: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self { response: Err(message.into()), call_count: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl mcpcp_core::capability::LlmClient for FakeLlmClient {
    async fn generate_text(&self, _system: &str, _user: &str, _max_tokens: usize) -> Result<String, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(LlmError::Transport)
    }
}

/// Whitespace-splitting tokenizer — close enough to `cl100k` behavior for
/// tests that only care about relative ordering of token counts.
pub struct WordCountTokenizer;

impl mcpcp_core::capability::Tokenizer for WordCountTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Binds an ephemeral port, drops the listener, and returns the port number
/// for a child process to bind moments later. Inherently racy against other
/// processes on the same host; acceptable for test use.
#[must_use]
pub fn pick_unused_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local_addr")
        .port()
}

/// Polls `GET {url}` until it returns any HTTP response or `timeout` elapses.
pub async fn wait_http_ok(url: &str, timeout: std::time::Duration) -> anyhow::Result<()> {
    let client = reqwest_lite::Client::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if client.get(url).send().await.is_ok() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("timed out waiting for {url} to respond");
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

mod reqwest_lite {
    pub use reqwest::Client;
}

/// Kills the wrapped child process on drop, so a test that spawns a binary
/// under test never leaks it when an assertion panics partway through.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[must_use]
pub fn fake_tools_upstream(id: &str, tool_names: &[&str]) -> Arc<dyn UpstreamClient> {
    let mut upstream = FakeUpstreamClient::new(id);
    for name in tool_names {
        upstream = upstream.with_tool(name);
    }
    Arc::new(upstream)
}
