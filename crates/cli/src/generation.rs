//! Turns a loaded [`ResolvedConfig`] into a running [`Generation`]: build an
//! `UpstreamClient` per descriptor, connect them best-effort in parallel
//! (a down upstream is a warning, never a fatal startup error), then
//! refresh the aggregator so `list_tools`/`list_resources`/`list_prompts`
//! have something to serve.

use mcpcp_config::ResolvedConfig;
use mcpcp_core::capability::{LlmClient, Tokenizer};
use mcpcp_core::generation::Generation;
use mcpcp_core::resolver::ToolConfigResolver;
use mcpcp_core::upstream::UpstreamClient;
use mcpcp_llm::{Cl100kTokenizer, OpenAiCompatibleClient};
use mcpcp_llm::openai::OpenAiConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Build the next generation id. Generation 1 is the first one built at
/// startup; each hot reload increments it.
pub async fn build_generation(config: &ResolvedConfig, id: u64) -> Generation {
    let mut clients: HashMap<String, Arc<dyn UpstreamClient>> = HashMap::new();
    for descriptor in &config.upstreams {
        if !descriptor.enabled {
            continue;
        }
        let client = mcpcp_transports::build_upstream_client(descriptor);
        clients.insert(descriptor.id.clone(), client);
    }

    // Connect concurrently; a failing upstream is logged and left
    // unconnected rather than aborting startup, matching the aggregator's
    // own partial-failure tolerance for `list_*` against it later.
    let connects = clients.values().cloned().map(|client| async move {
        if let Err(err) = client.connect().await {
            tracing::warn!(upstream_id = %client.id(), error = %err, "upstream failed to connect");
        }
    });
    futures::future::join_all(connects).await;

    let resolver = ToolConfigResolver::new(config.policy.clone());
    let llm = build_llm_client(config);
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(Cl100kTokenizer::new());

    let generation = Generation::new(id, resolver, clients, config.custom_pii_patterns.clone(), llm, tokenizer);
    generation.aggregator.refresh().await;
    generation
}

/// Tear down every upstream client owned by a generation being replaced or
/// shut down. Best-effort: a close failure is logged, not propagated — the
/// process is moving on regardless.
pub async fn shutdown_generation(generation: &Generation) {
    for client in generation.aggregator.clients() {
        client.close().await;
    }
}

/// A single LLM endpoint backs both the compressor and the masker's
/// LLM-fallback PII detection (`Router::new` takes one `llm` capability and
/// hands it to both — `crates/core/src/router.rs`). `compression.baseUrl`
/// takes priority since compression is the more common reason to configure
/// one at all; `masking.llmConfig` is used when compression has no endpoint
/// but masking still wants LLM fallback. Neither configured means no LLM
/// capability at all, and compression/masking both fall back to their
/// policy-level `enabled: false` defaults (`handler.rs`'s `llm_or_noop`).
fn build_llm_client(config: &ResolvedConfig) -> Option<Arc<dyn LlmClient>> {
    let (base_url, api_key, model) = if let Some(section) = config.compression_llm.as_ref().filter(|s| s.base_url.is_some()) {
        (section.base_url.clone().unwrap(), section.api_key.clone(), section.model.clone())
    } else if let Some(section) = config.masking_llm.as_ref().filter(|s| s.base_url.is_some()) {
        (section.base_url.clone().unwrap(), section.api_key.clone(), section.model.clone())
    } else {
        return None;
    };

    let model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
    let http = mcpcp_transports::common::build_http_client(&HashMap::new());
    let client = OpenAiCompatibleClient::new(http, OpenAiConfig { base_url, api_key, model });
    Some(Arc::new(client))
}
