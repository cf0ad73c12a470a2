//! Router.
//!
//! `call_tool` extracts the goal/bypass hint fields, masks the forwarded
//! arguments, and either short-circuits with a not-found error (hidden
//! tools are indistinguishable from absent ones on the wire) or dispatches
//! to the owning upstream. `read_resource`/`get_prompt` are plain
//! route-and-forward — no masking, no goal extraction.

use crate::aggregator::{extract_hints, Aggregator};
use crate::capability::LlmClient;
use crate::content::ToolCallResult;
use crate::error::RouteError;
use crate::masker::PiiMasker;
use crate::resolver::ToolConfigResolver;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CallOutcome {
    pub result: ToolCallResult,
    pub goal: Option<String>,
    pub restoration_map: HashMap<String, String>,
}

pub struct Router {
    aggregator: Arc<Aggregator>,
    resolver: Arc<ToolConfigResolver>,
    masker: Arc<PiiMasker>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl Router {
    #[must_use]
    pub fn new(
        aggregator: Arc<Aggregator>,
        resolver: Arc<ToolConfigResolver>,
        masker: Arc<PiiMasker>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self { aggregator, resolver, masker, llm }
    }

    /// Never returns `Err` for a routing failure —
    /// not-found and upstream exceptions both surface as an `isError` result,
    /// so the downstream client never sees a transport-level throw for a
    /// tool call.
    pub async fn call_tool(&self, namespaced_name: &str, args: Value) -> CallOutcome {
        let mut args_obj = match args {
            Value::Object(obj) => obj,
            other => {
                // Non-object args can't carry hint fields; forward as-is.
                return self.dispatch(namespaced_name, other, None).await;
            }
        };
        let (goal, _bypass) = extract_hints(&mut args_obj);
        let mut forwarded = Value::Object(args_obj);

        let masking_policy = self.resolver.resolve_masking_policy(namespaced_name);
        let restoration_map = if masking_policy.enabled {
            let mask_result = self
                .masker
                .mask_tool_args(forwarded, &masking_policy, self.llm.as_deref())
                .await;
            forwarded = mask_result.masked;
            mask_result.restoration_map
        } else {
            HashMap::new()
        };

        let mut outcome = self.dispatch(namespaced_name, forwarded, goal).await;
        outcome.restoration_map = restoration_map;
        outcome
    }

    async fn dispatch(&self, namespaced_name: &str, args: Value, goal: Option<String>) -> CallOutcome {
        if self.resolver.is_tool_hidden(namespaced_name) {
            return CallOutcome {
                result: not_found(&RouteError::ToolNotFound(namespaced_name.to_string())),
                goal,
                restoration_map: HashMap::new(),
            };
        }

        let Some(target) = self.aggregator.find_tool(namespaced_name) else {
            return CallOutcome {
                result: not_found(&RouteError::ToolNotFound(namespaced_name.to_string())),
                goal,
                restoration_map: HashMap::new(),
            };
        };

        let Some(client) = self.aggregator.client(&target.upstream_id) else {
            return CallOutcome {
                result: not_found(&RouteError::ToolNotFound(namespaced_name.to_string())),
                goal,
                restoration_map: HashMap::new(),
            };
        };

        let result = match client.call_tool(&target.original, args).await {
            Ok(result) => result,
            Err(err) => ToolCallResult::error(err.to_string()),
        };

        CallOutcome { result, goal, restoration_map: HashMap::new() }
    }

    /// Plain route-and-forward; throws (via `Err`) on not-found, per
    /// Plain route-and-forward.
    pub async fn read_resource(&self, namespaced_uri: &str) -> Result<Value, RouteError> {
        let target = self
            .aggregator
            .find_resource(namespaced_uri)
            .ok_or_else(|| RouteError::ResourceNotFound(namespaced_uri.to_string()))?;
        let client = self
            .aggregator
            .client(&target.upstream_id)
            .ok_or_else(|| RouteError::ResourceNotFound(namespaced_uri.to_string()))?;
        client
            .read_resource(&target.original)
            .await
            .map_err(|_| RouteError::ResourceNotFound(namespaced_uri.to_string()))
    }

    pub async fn get_prompt(&self, namespaced_name: &str, args: Option<Value>) -> Result<Value, RouteError> {
        let target = self
            .aggregator
            .find_prompt(namespaced_name)
            .ok_or_else(|| RouteError::PromptNotFound(namespaced_name.to_string()))?;
        let client = self
            .aggregator
            .client(&target.upstream_id)
            .ok_or_else(|| RouteError::PromptNotFound(namespaced_name.to_string()))?;
        client
            .get_prompt(&target.original, args)
            .await
            .map_err(|_| RouteError::PromptNotFound(namespaced_name.to_string()))
    }
}

fn not_found(err: &RouteError) -> ToolCallResult {
    ToolCallResult::error(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyConfig;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use tokio::sync::watch;

    struct FakeClient {
        id: String,
    }

    #[async_trait]
    impl crate::upstream::UpstreamClient for FakeClient {
        fn id(&self) -> &str {
            &self.id
        }
        async fn connect(&self) -> Result<(), crate::error::UpstreamError> {
            Ok(())
        }
        async fn close(&self) {}
        fn is_connected(&self) -> watch::Receiver<bool> {
            watch::channel(true).1
        }
        async fn list_tools(&self) -> Result<Vec<Value>, crate::error::UpstreamError> {
            Ok(vec![serde_json::json!({"name": "echo", "inputSchema": {"type": "object"}})])
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
            args: Value,
        ) -> Result<ToolCallResult, crate::error::UpstreamError> {
            Ok(ToolCallResult::text(args.to_string()))
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

    async fn build_router(cfg: PolicyConfig) -> (Router, Arc<Aggregator>) {
        let mut clients: Map<String, Arc<dyn crate::upstream::UpstreamClient>> = Map::new();
        clients.insert("u".to_string(), Arc::new(FakeClient { id: "u".to_string() }));
        let aggregator = Arc::new(Aggregator::new(clients));
        aggregator.refresh().await;
        let resolver = Arc::new(ToolConfigResolver::new(cfg));
        let masker = Arc::new(PiiMasker::new(Vec::new()));
        let router = Router::new(aggregator.clone(), resolver, masker, None);
        (router, aggregator)
    }

    #[tokio::test]
    async fn hidden_tool_is_reported_not_found() {
        let mut cfg = PolicyConfig::default();
        cfg.hidden_tools.push("u__echo".to_string());
        let (router, _agg) = build_router(cfg).await;
        let outcome = router.call_tool("u__echo", serde_json::json!({})).await;
        assert!(outcome.result.is_error);
        assert!(outcome.result.content[0].as_text().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let (router, _agg) = build_router(PolicyConfig::default()).await;
        let outcome = router.call_tool("u__nonexistent", serde_json::json!({})).await;
        assert!(outcome.result.is_error);
    }

    #[tokio::test]
    async fn goal_field_is_extracted_and_stripped_before_forwarding() {
        let (router, _agg) = build_router(PolicyConfig::default()).await;
        let outcome = router
            .call_tool("u__echo", serde_json::json!({"q": "hi", "_mcpcp_goal": "find the thing"}))
            .await;
        assert_eq!(outcome.goal.as_deref(), Some("find the thing"));
        let forwarded = outcome.result.content[0].as_text().unwrap();
        assert!(!forwarded.contains("_mcpcp_goal"));
        assert!(forwarded.contains("hi"));
    }

    #[tokio::test]
    async fn masking_round_trips_through_dispatch() {
        let mut cfg = PolicyConfig::default();
        cfg.default_masking.enabled = Some(true);
        cfg.default_masking.pii_types = Some(vec!["email".to_string()]);
        let (router, _agg) = build_router(cfg).await;
        let outcome = router
            .call_tool("u__echo", serde_json::json!({"note": "contact a@b.co"}))
            .await;
        let forwarded = outcome.result.content[0].as_text().unwrap();
        assert!(forwarded.contains("EMAIL_REDACTED"));
        assert!(!outcome.restoration_map.is_empty());
        let restored = crate::masker::restore_originals(forwarded, &outcome.restoration_map);
        assert!(restored.contains("a@b.co"));
    }
}
