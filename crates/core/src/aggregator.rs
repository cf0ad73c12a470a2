//! Aggregator.
//!
//! Merges listings from every connected upstream under the spec's bit-exact
//! namespacing, caches the merged view, and applies the schema transforms
//! (hidden tools/params, description overrides, goal-aware/bypass field
//! injection) before exposing tools to the downstream client.

use crate::model::{
    namespace_resource, namespace_tool_or_prompt, split_resource_namespace,
    split_tool_or_prompt_namespace, AggregatedPrompt, AggregatedResource, AggregatedTool,
};
use crate::resolver::ToolConfigResolver;
use crate::upstream::UpstreamClient;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const GOAL_FIELD: &str = "_mcpcp_goal";
pub const BYPASS_FIELD: &str = "_mcpcp_bypass";

pub struct RouteTarget {
    pub upstream_id: String,
    pub original: String,
}

struct Caches {
    tools: Vec<AggregatedTool>,
    resources: Vec<AggregatedResource>,
    prompts: Vec<AggregatedPrompt>,
    valid: bool,
}

pub struct Aggregator {
    clients: HashMap<String, Arc<dyn UpstreamClient>>,
    caches: RwLock<Caches>,
}

impl Aggregator {
    #[must_use]
    pub fn new(clients: HashMap<String, Arc<dyn UpstreamClient>>) -> Self {
        Self {
            clients,
            caches: RwLock::new(Caches {
                tools: Vec::new(),
                resources: Vec::new(),
                prompts: Vec::new(),
                valid: false,
            }),
        }
    }

    pub fn invalidate_cache(&self) {
        self.caches.write().valid = false;
    }

    #[must_use]
    pub fn is_cache_valid(&self) -> bool {
        self.caches.read().valid
    }

    /// Re-list every connected upstream, namespace each item, and replace
    /// the cached view. A failing upstream is logged and skipped — partial
    /// failure tolerance.
    pub async fn refresh(&self) {
        let mut tools = Vec::new();
        let mut resources = Vec::new();
        let mut prompts = Vec::new();

        for (upstream_id, client) in &self.clients {
            match client.list_tools().await {
                Ok(items) => {
                    for mut item in items {
                        let original_name = item
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let namespaced = namespace_tool_or_prompt(upstream_id, &original_name);
                        if let Value::Object(obj) = &mut item {
                            obj.insert("name".to_string(), Value::String(namespaced.clone()));
                        }
                        tools.push(AggregatedTool {
                            upstream_id: upstream_id.clone(),
                            original_name,
                            namespaced_name: namespaced,
                            schema: item,
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(upstream_id = %upstream_id, error = %err, "tools/list failed; skipping upstream");
                }
            }

            match client.list_resources().await {
                Ok(items) => {
                    for mut item in items {
                        let original_uri = item
                            .get("uri")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let namespaced = namespace_resource(upstream_id, &original_uri);
                        if let Value::Object(obj) = &mut item {
                            obj.insert("uri".to_string(), Value::String(namespaced.clone()));
                        }
                        resources.push(AggregatedResource {
                            upstream_id: upstream_id.clone(),
                            original_uri,
                            namespaced_uri: namespaced,
                            descriptor: item,
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(upstream_id = %upstream_id, error = %err, "resources/list failed; skipping upstream");
                }
            }

            match client.list_prompts().await {
                Ok(items) => {
                    for mut item in items {
                        let original_name = item
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let namespaced = namespace_tool_or_prompt(upstream_id, &original_name);
                        if let Value::Object(obj) = &mut item {
                            obj.insert("name".to_string(), Value::String(namespaced.clone()));
                        }
                        prompts.push(AggregatedPrompt {
                            upstream_id: upstream_id.clone(),
                            original_name,
                            namespaced_name: namespaced,
                            descriptor: item,
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(upstream_id = %upstream_id, error = %err, "prompts/list failed; skipping upstream");
                }
            }
        }

        let mut caches = self.caches.write();
        caches.tools = tools;
        caches.resources = resources;
        caches.prompts = prompts;
        caches.valid = true;
    }

    async fn ensure_fresh(&self) {
        if !self.is_cache_valid() {
            self.refresh().await;
        }
    }

    /// The visible, transformed tool listing: hidden tools
    /// dropped, description overrides applied, hidden parameters stripped,
    /// goal-aware/bypass fields injected.
    pub async fn list_tools(&self, resolver: &ToolConfigResolver) -> Vec<Value> {
        self.ensure_fresh().await;
        let bypass_enabled = resolver.is_bypass_enabled();

        let tools = self.caches.read().tools.clone();
        tools
            .into_iter()
            .filter(|t| !resolver.is_tool_hidden(&t.namespaced_name))
            .map(|t| transform_tool(&t, resolver, bypass_enabled))
            .collect()
    }

    pub async fn list_resources(&self) -> Vec<Value> {
        self.ensure_fresh().await;
        self.caches.read().resources.iter().map(|r| r.descriptor.clone()).collect()
    }

    pub async fn list_prompts(&self) -> Vec<Value> {
        self.ensure_fresh().await;
        self.caches.read().prompts.iter().map(|p| p.descriptor.clone()).collect()
    }

    /// O(n) linear scan. Returns `None` if the tool doesn't exist *or* is
    /// hidden — callers distinguish "hidden" from "absent" only for error
    /// message purposes, never behaviorally ("hidden equals
    /// absent").
    #[must_use]
    pub fn find_tool(&self, namespaced: &str) -> Option<RouteTarget> {
        let caches = self.caches.read();
        caches
            .tools
            .iter()
            .find(|t| t.namespaced_name == namespaced)
            .map(|t| RouteTarget {
                upstream_id: t.upstream_id.clone(),
                original: t.original_name.clone(),
            })
    }

    #[must_use]
    pub fn is_tool_known(&self, namespaced: &str) -> bool {
        self.find_tool(namespaced).is_some()
    }

    #[must_use]
    pub fn find_resource(&self, namespaced: &str) -> Option<RouteTarget> {
        let caches = self.caches.read();
        caches
            .resources
            .iter()
            .find(|r| r.namespaced_uri == namespaced)
            .map(|r| RouteTarget {
                upstream_id: r.upstream_id.clone(),
                original: r.original_uri.clone(),
            })
    }

    #[must_use]
    pub fn find_prompt(&self, namespaced: &str) -> Option<RouteTarget> {
        let caches = self.caches.read();
        caches
            .prompts
            .iter()
            .find(|p| p.namespaced_name == namespaced)
            .map(|p| RouteTarget {
                upstream_id: p.upstream_id.clone(),
                original: p.original_name.clone(),
            })
    }

    #[must_use]
    pub fn client(&self, upstream_id: &str) -> Option<Arc<dyn UpstreamClient>> {
        self.clients.get(upstream_id).cloned()
    }

    /// `(upstream_id, is_connected)` for every configured upstream, for the
    /// admin surface's generation-status endpoint.
    #[must_use]
    pub fn connection_states(&self) -> Vec<(String, bool)> {
        self.clients
            .iter()
            .map(|(id, client)| (id.clone(), *client.is_connected().borrow()))
            .collect()
    }

    /// Every client this generation owns, for closing them down on hot
    /// reload or shutdown (the aggregator is the sole owner of the map;
    /// nothing else holds these `Arc`s longer-lived than a single call).
    #[must_use]
    pub fn clients(&self) -> Vec<Arc<dyn UpstreamClient>> {
        self.clients.values().cloned().collect()
    }
}

fn transform_tool(tool: &AggregatedTool, resolver: &ToolConfigResolver, bypass_enabled: bool) -> Value {
    let mut schema = tool.schema.clone();
    let Value::Object(obj) = &mut schema else {
        return schema;
    };

    if let Some(desc) = resolver.description_override(&tool.namespaced_name) {
        obj.insert("description".to_string(), Value::String(desc));
    }

    let hidden_params = resolver.hidden_parameters(&tool.namespaced_name);
    if !hidden_params.is_empty()
        && let Some(Value::Object(input_schema)) = obj.get_mut("inputSchema")
    {
        if let Some(Value::Object(props)) = input_schema.get_mut("properties") {
            for p in &hidden_params {
                props.remove(p);
            }
        }
        if let Some(Value::Array(required)) = input_schema.get_mut("required") {
            required.retain(|v| !v.as_str().is_some_and(|s| hidden_params.iter().any(|h| h == s)));
        }
    }

    if resolver.is_goal_aware_enabled(&tool.namespaced_name)
        && let Some(Value::Object(input_schema)) = obj.get_mut("inputSchema")
    {
        inject_goal_field(input_schema);
        append_description_hint(
            obj,
            "Provide `_mcpcp_goal` describing what you're looking for; irrelevant detail will be omitted from the response.",
        );
    }

    if bypass_enabled
        && let Some(Value::Object(input_schema)) = obj.get_mut("inputSchema")
    {
        inject_bypass_field(input_schema);
        append_description_hint(
            obj,
            "Set `_mcpcp_bypass: true` to receive the raw, unprocessed result.",
        );
    }

    schema
}

fn inject_goal_field(input_schema: &mut serde_json::Map<String, Value>) {
    let props = input_schema
        .entry("properties".to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Value::Object(props) = props {
        props.insert(
            GOAL_FIELD.to_string(),
            serde_json::json!({
                "type": "string",
                "description": "What you are looking for in this tool's response. The proxy uses this to keep only relevant information."
            }),
        );
    }
    let required = input_schema
        .entry("required".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(required) = required
        && !required.iter().any(|v| v.as_str() == Some(GOAL_FIELD))
    {
        required.push(Value::String(GOAL_FIELD.to_string()));
    }
}

fn inject_bypass_field(input_schema: &mut serde_json::Map<String, Value>) {
    let props = input_schema
        .entry("properties".to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Value::Object(props) = props {
        props.insert(
            BYPASS_FIELD.to_string(),
            serde_json::json!({
                "type": "boolean",
                "description": "Skip masking/compression and return the raw upstream result."
            }),
        );
    }
}

fn append_description_hint(obj: &mut serde_json::Map<String, Value>, hint: &str) {
    let existing = obj.get("description").and_then(Value::as_str).unwrap_or_default();
    let updated = if existing.is_empty() {
        hint.to_string()
    } else {
        format!("{existing} {hint}")
    };
    obj.insert("description".to_string(), Value::String(updated));
}

/// Strip `_mcpcp_goal`/`_mcpcp_bypass` (and return their values) from a
/// forwarded-args object. Used by the router before dispatching upstream —
/// kept here because it operates on the same field constants.
#[must_use]
pub fn extract_hints(args: &mut serde_json::Map<String, Value>) -> (Option<String>, Option<bool>) {
    let goal = args.remove(GOAL_FIELD).and_then(|v| v.as_str().map(str::to_string));
    let bypass = args.remove(BYPASS_FIELD).and_then(|v| v.as_bool());
    (goal, bypass)
}

/// Validate that every aggregated record's namespaced identifier recovers
/// its owning upstream id and original name/uri purely from the record
/// (never by re-parsing the namespaced string).
#[must_use]
pub fn namespacing_round_trips(tool: &AggregatedTool) -> bool {
    let Some((up, orig)) = split_tool_or_prompt_namespace(&tool.namespaced_name) else {
        return false;
    };
    up == tool.upstream_id && orig == tool.original_name
}

#[must_use]
pub fn resource_namespacing_round_trips(resource: &AggregatedResource) -> bool {
    let Some((up, orig)) = split_resource_namespace(&resource.namespaced_uri) else {
        return false;
    };
    up == resource.upstream_id && orig == resource.original_uri
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::watch;

    struct FakeClient {
        id: String,
        tools: Vec<Value>,
        fail_tools: bool,
    }

    #[async_trait]
    impl UpstreamClient for FakeClient {
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
            if self.fail_tools {
                return Err(crate::error::UpstreamError::Transport {
                    upstream_id: self.id.clone(),
                    message: "boom".to_string(),
                });
            }
            Ok(self.tools.clone())
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
        ) -> Result<crate::content::ToolCallResult, crate::error::UpstreamError> {
            unimplemented!()
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

    fn search_tool() -> Value {
        serde_json::json!({"name": "search", "inputSchema": {"type": "object", "properties": {"q": {"type": "string"}}}})
    }

    #[tokio::test]
    async fn namespaced_routing_across_two_upstreams() {
        let mut clients: HashMap<String, Arc<dyn UpstreamClient>> = HashMap::new();
        clients.insert(
            "a".to_string(),
            Arc::new(FakeClient { id: "a".to_string(), tools: vec![search_tool()], fail_tools: false }),
        );
        clients.insert(
            "b".to_string(),
            Arc::new(FakeClient { id: "b".to_string(), tools: vec![search_tool()], fail_tools: false }),
        );
        let aggregator = Aggregator::new(clients);
        let resolver = ToolConfigResolver::new(PolicyConfig::default());
        let tools = aggregator.list_tools(&resolver).await;
        let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
        assert!(names.contains(&"a__search"));
        assert!(names.contains(&"b__search"));

        let route = aggregator.find_tool("a__search").expect("route");
        assert_eq!(route.upstream_id, "a");
        assert_eq!(route.original, "search");
    }

    #[tokio::test]
    async fn partial_upstream_failure_is_tolerated() {
        let mut clients: HashMap<String, Arc<dyn UpstreamClient>> = HashMap::new();
        clients.insert(
            "a".to_string(),
            Arc::new(FakeClient { id: "a".to_string(), tools: vec![search_tool()], fail_tools: false }),
        );
        clients.insert(
            "b".to_string(),
            Arc::new(FakeClient { id: "b".to_string(), tools: vec![], fail_tools: true }),
        );
        let aggregator = Aggregator::new(clients);
        let resolver = ToolConfigResolver::new(PolicyConfig::default());
        let tools = aggregator.list_tools(&resolver).await;
        assert_eq!(tools.len(), 1);
        assert!(aggregator.find_tool("b__anything").is_none());
    }

    #[tokio::test]
    async fn hidden_tool_is_absent_from_listing_but_still_routable() {
        let mut clients: HashMap<String, Arc<dyn UpstreamClient>> = HashMap::new();
        clients.insert(
            "a".to_string(),
            Arc::new(FakeClient { id: "a".to_string(), tools: vec![search_tool()], fail_tools: false }),
        );
        let aggregator = Aggregator::new(clients);
        let mut cfg = PolicyConfig::default();
        cfg.hidden_tools.push("a__search".to_string());
        let resolver = ToolConfigResolver::new(cfg);

        let tools = aggregator.list_tools(&resolver).await;
        assert!(tools.is_empty());
        // The router, not the aggregator, is what turns "hidden" into "not found"
        // (see router.rs) — the aggregator still knows how to route it.
        assert!(aggregator.find_tool("a__search").is_some());
    }
}
