//! Subprocess upstream: a child process speaking MCP over stdin/stdout,
//! the simplest and most common upstream tool-server transport.

use async_trait::async_trait;
use mcpcp_core::content::ToolCallResult;
use mcpcp_core::error::UpstreamError;
use mcpcp_core::upstream::UpstreamClient;
use rmcp::ServiceExt;
use rmcp::transport::TokioChildProcess;
use serde_json::Value;
use std::collections::HashMap;
use tokio::process::Command;
use tokio::sync::{Mutex, watch};

use crate::common::{self, ClientService};

pub struct StdioUpstreamClient {
    id: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    service: Mutex<Option<ClientService>>,
    connected_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
}

impl StdioUpstreamClient {
    #[must_use]
    pub fn new(id: String, command: String, args: Vec<String>, env: HashMap<String, String>) -> Self {
        let (connected_tx, connected_rx) = watch::channel(false);
        Self { id, command, args, env, service: Mutex::new(None), connected_tx, connected_rx }
    }
}

#[async_trait]
impl UpstreamClient for StdioUpstreamClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> Result<(), UpstreamError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).envs(&self.env);
        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| UpstreamError::Transport { upstream_id: self.id.clone(), message: e.to_string() })?;
        let running = ()
            .serve(transport)
            .await
            .map_err(|e| UpstreamError::Transport { upstream_id: self.id.clone(), message: e.to_string() })?;
        *self.service.lock().await = Some(running);
        let _ = self.connected_tx.send(true);
        Ok(())
    }

    async fn close(&self) {
        common::close(&self.service).await;
        let _ = self.connected_tx.send(false);
    }

    fn is_connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    async fn list_tools(&self) -> Result<Vec<Value>, UpstreamError> {
        common::list_tools(&self.service, &self.id).await
    }

    async fn list_resources(&self) -> Result<Vec<Value>, UpstreamError> {
        common::list_resources(&self.service, &self.id).await
    }

    async fn list_prompts(&self) -> Result<Vec<Value>, UpstreamError> {
        common::list_prompts(&self.service, &self.id).await
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolCallResult, UpstreamError> {
        common::call_tool(&self.service, &self.id, name, args).await
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, UpstreamError> {
        common::read_resource(&self.service, &self.id, uri).await
    }

    async fn get_prompt(&self, name: &str, args: Option<Value>) -> Result<Value, UpstreamError> {
        common::get_prompt(&self.service, &self.id, name, args).await
    }
}
