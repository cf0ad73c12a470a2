//! Request Handler.
//!
//! Wires the full per-call pipeline: cache lookup, route + mask + dispatch,
//! bypass-or-compress, restoration, cache store. The handler owns the state
//! that survives a hot reload (cache, retry tracker) plus a swappable
//! [`Generation`] for everything that doesn't.

use crate::aggregator::{BYPASS_FIELD, GOAL_FIELD};
use crate::cache::{cache_key, ResultCache};
use crate::compressor::Compressor;
use crate::content::ToolCallResult;
use crate::generation::Generation;
use crate::masker::restore_originals;
use crate::retry::RetryTracker;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

pub struct RequestHandler {
    generation: RwLock<Arc<Generation>>,
    cache: ResultCache,
    cache_enabled: bool,
    cache_errors: bool,
    tracker: RetryTracker,
}

impl RequestHandler {
    #[must_use]
    pub fn new(generation: Generation, max_cache_entries: usize, cache_enabled: bool, cache_errors: bool) -> Self {
        Self {
            generation: RwLock::new(Arc::new(generation)),
            cache: ResultCache::new(max_cache_entries),
            cache_enabled,
            cache_errors,
            tracker: RetryTracker::new(),
        }
    }

    /// Atomic swap for hot reload ("configuration generation
    /// swap"). In-flight requests keep the `Arc<Generation>` they captured
    /// at entry; only requests starting after this call observe the new one.
    pub fn set_generation(&self, generation: Generation) {
        *self.generation.write() = Arc::new(generation);
        self.cache.update_config();
    }

    #[must_use]
    pub fn generation(&self) -> Arc<Generation> {
        self.generation.read().clone()
    }

    pub async fn call_tool(&self, name: &str, args: Value) -> ToolCallResult {
        let generation = self.generation();
        let (peeked_goal, bypass) = peek_hints(&args);
        let cache_policy = generation.resolver.resolve_cache_policy(name);

        let key = (self.cache_enabled && cache_policy.enabled)
            .then(|| cache_key(name, &args_for_key(&args), peeked_goal.as_deref()));

        if let Some(key) = &key
            && let Some(hit) = self.cache.get(key)
        {
            return hit;
        }

        let outcome = generation.router.call_tool(name, args).await;
        let goal = outcome.goal.or(peeked_goal);

        let final_result = if bypass {
            outcome.result
        } else {
            let multiplier = if let Some(cfg) = generation.resolver.retry_escalation() {
                self.tracker.record_call(name);
                Some(self.tracker.escalation_multiplier(name, &cfg))
            } else {
                None
            };
            let compression_policy = generation.resolver.resolve_compression_policy(name);
            Compressor::new(generation.tokenizer.clone(), llm_or_noop(&generation))
                .compress_tool_result(outcome.result, name, goal.as_deref(), multiplier, &compression_policy)
                .await
        };

        let restored = restore_in_place(final_result, &outcome.restoration_map);

        if let Some(key) = key
            && self.cache_enabled
            && (!restored.is_error || self.cache_errors)
        {
            self.cache.set(key, restored.clone(), cache_policy.ttl_seconds);
        }

        restored
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value, crate::error::RouteError> {
        self.generation().router.read_resource(uri).await
    }

    pub async fn get_prompt(&self, name: &str, args: Option<Value>) -> Result<Value, crate::error::RouteError> {
        self.generation().router.get_prompt(name, args).await
    }

    pub async fn list_tools(&self) -> Vec<Value> {
        let generation = self.generation();
        generation.aggregator.list_tools(&generation.resolver).await
    }

    pub async fn list_resources(&self) -> Vec<Value> {
        self.generation().aggregator.list_resources().await
    }

    pub async fn list_prompts(&self) -> Vec<Value> {
        self.generation().aggregator.list_prompts().await
    }

    pub fn cleanup_retry_tracker(&self, window_seconds: u64) {
        self.tracker.cleanup(window_seconds);
    }

    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup()
    }
}

/// Compressor always needs an `Arc<dyn LlmClient>`; when no LLM capability is
/// configured, compression is effectively disabled at the policy layer
/// (`enabled: false` default with no endpoint) so this path is never hit in
/// practice, but the type still needs inhabiting — see `capability::NoopLlm`.
fn llm_or_noop(generation: &Generation) -> Arc<dyn crate::capability::LlmClient> {
    generation
        .llm
        .clone()
        .unwrap_or_else(|| Arc::new(crate::capability::NoopLlm))
}

fn peek_hints(args: &Value) -> (Option<String>, bool) {
    let Value::Object(obj) = args else {
        return (None, false);
    };
    let goal = obj.get(GOAL_FIELD).and_then(Value::as_str).map(str::to_string);
    let bypass = obj.get(BYPASS_FIELD).and_then(Value::as_bool).unwrap_or(false);
    (goal, bypass)
}

fn args_for_key(args: &Value) -> Value {
    let Value::Object(obj) = args else {
        return args.clone();
    };
    let mut out = obj.clone();
    out.remove(GOAL_FIELD);
    out.remove(BYPASS_FIELD);
    Value::Object(out)
}

fn restore_in_place(
    mut result: ToolCallResult,
    restoration_map: &std::collections::HashMap<String, String>,
) -> ToolCallResult {
    if restoration_map.is_empty() {
        return result;
    }
    for block in &mut result.content {
        if let Some(text) = block.as_text_mut() {
            *text = restore_originals(text, restoration_map);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Tokenizer;
    use crate::policy::PolicyConfig;
    use crate::resolver::ToolConfigResolver;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::watch;

    struct WordTokenizer;
    impl Tokenizer for WordTokenizer {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    struct EchoClient;
    #[async_trait]
    impl crate::upstream::UpstreamClient for EchoClient {
        fn id(&self) -> &str {
            "u"
        }
        async fn connect(&self) -> Result<(), crate::error::UpstreamError> {
            Ok(())
        }
        async fn close(&self) {}
        fn is_connected(&self) -> watch::Receiver<bool> {
            watch::channel(true).1
        }
        async fn list_tools(&self) -> Result<Vec<Value>, crate::error::UpstreamError> {
            Ok(vec![serde_json::json!({"name": "search", "inputSchema": {"type": "object"}})])
        }
        async fn list_resources(&self) -> Result<Vec<Value>, crate::error::UpstreamError> {
            Ok(Vec::new())
        }
        async fn list_prompts(&self) -> Result<Vec<Value>, crate::error::UpstreamError> {
            Ok(Vec::new())
        }
        async fn call_tool(
            &self,
            _name: &str,
            _args: Value,
        ) -> Result<ToolCallResult, crate::error::UpstreamError> {
            Ok(ToolCallResult::text("result payload"))
        }
        async fn read_resource(&self, _uri: &str) -> Result<Value, crate::error::UpstreamError> {
            unimplemented!()
        }
        async fn get_prompt(
            &self,
            _name: &str,
            _args: Option<Value>,
        ) -> Result<Value, crate::error::UpstreamError> {
            unimplemented!()
        }
    }

    fn build_handler(cfg: PolicyConfig, cache_enabled: bool) -> RequestHandler {
        let mut clients: HashMap<String, Arc<dyn crate::upstream::UpstreamClient>> = HashMap::new();
        clients.insert("u".to_string(), Arc::new(EchoClient));
        let resolver = ToolConfigResolver::new(cfg);
        let generation = Generation::new(1, resolver, clients, Vec::new(), None, Arc::new(WordTokenizer));
        RequestHandler::new(generation, 100, cache_enabled, false)
    }

    #[tokio::test]
    async fn second_identical_call_is_served_from_cache() {
        let mut cfg = PolicyConfig::default();
        cfg.default_cache.enabled = Some(true);
        cfg.default_cache.ttl_seconds = Some(60);
        let handler = build_handler(cfg, true);
        handler.generation().aggregator.refresh().await;

        let first = handler.call_tool("u__search", serde_json::json!({"q": "x"})).await;
        let second = handler.call_tool("u__search", serde_json::json!({"q": "x"})).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn different_goal_produces_independent_cache_entries() {
        let mut cfg = PolicyConfig::default();
        cfg.default_cache.enabled = Some(true);
        let handler = build_handler(cfg, true);
        handler.generation().aggregator.refresh().await;

        handler
            .call_tool("u__search", serde_json::json!({"q": "x", "_mcpcp_goal": "goal a"}))
            .await;
        // Second call with a different goal must not short-circuit on the
        // first goal's cache entry — both are recorded under distinct keys.
        let second = handler
            .call_tool("u__search", serde_json::json!({"q": "x", "_mcpcp_goal": "goal b"}))
            .await;
        assert!(!second.is_error);
    }

    #[tokio::test]
    async fn bypass_skips_compression() {
        let handler = build_handler(PolicyConfig::default(), false);
        handler.generation().aggregator.refresh().await;
        let result = handler
            .call_tool("u__search", serde_json::json!({"q": "x", "_mcpcp_bypass": true}))
            .await;
        assert_eq!(result.content[0].as_text(), Some("result payload"));
    }

    #[tokio::test]
    async fn not_found_tool_returns_error_result_not_a_panic() {
        let handler = build_handler(PolicyConfig::default(), false);
        handler.generation().aggregator.refresh().await;
        let result = handler.call_tool("u__missing", serde_json::json!({})).await;
        assert!(result.is_error);
    }
}
