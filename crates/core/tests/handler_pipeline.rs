//! End-to-end pipeline tests: cache → router → masking → compression →
//! restoration, wired through a full [`RequestHandler`] against fake
//! upstreams.

use mcpcp_core::generation::Generation;
use mcpcp_core::handler::RequestHandler;
use mcpcp_core::policy::PolicyConfig;
use mcpcp_core::resolver::ToolConfigResolver;
use mcpcp_core::UpstreamClient;
use mcpcp_test_support::{FakeLlmClient, FakeUpstreamClient, WordCountTokenizer};
use std::collections::HashMap;
use std::sync::Arc;

fn clients(upstreams: Vec<FakeUpstreamClient>) -> HashMap<String, Arc<dyn UpstreamClient>> {
    upstreams
        .into_iter()
        .map(|u| (u.id().to_string(), Arc::new(u) as Arc<dyn UpstreamClient>))
        .collect()
}

async fn handler_with(cfg: PolicyConfig, clients: HashMap<String, Arc<dyn UpstreamClient>>) -> RequestHandler {
    let resolver = ToolConfigResolver::new(cfg);
    let generation = Generation::new(1, resolver, clients, Vec::new(), None, Arc::new(WordCountTokenizer));
    generation.aggregator.refresh().await;
    RequestHandler::new(generation, 100, true, false)
}

#[tokio::test]
async fn namespaced_routing_across_two_upstreams() {
    let handler = handler_with(
        PolicyConfig::default(),
        clients(vec![
            FakeUpstreamClient::new("alpha").with_tool("search"),
            FakeUpstreamClient::new("beta").with_tool("search"),
        ]),
    )
    .await;

    let tools = handler.list_tools().await;
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"alpha__search"));
    assert!(names.contains(&"beta__search"));

    let result = handler.call_tool("alpha__search", serde_json::json!({"q": "hi"})).await;
    assert!(!result.is_error);
}

#[tokio::test]
async fn goal_field_is_injected_into_the_schema_when_goal_aware() {
    let mut cfg = PolicyConfig::default();
    cfg.default_goal_aware = true;
    cfg.default_compression.goal_aware = Some(true);
    let handler = handler_with(cfg, clients(vec![FakeUpstreamClient::new("a").with_tool("search")])).await;

    let tools = handler.list_tools().await;
    let schema = &tools[0]["inputSchema"];
    assert!(schema["properties"]["_mcpcp_goal"].is_object());
    assert!(schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v == "_mcpcp_goal"));
}

#[tokio::test]
async fn cache_hit_depends_on_goal_not_just_args() {
    let mut cfg = PolicyConfig::default();
    cfg.default_cache.enabled = Some(true);
    let handler = handler_with(cfg, clients(vec![FakeUpstreamClient::new("a").with_tool("search")])).await;

    let args = serde_json::json!({"q": "hi"});
    let first = handler.call_tool("a__search", args.clone()).await;
    let second = handler.call_tool("a__search", args).await;
    assert_eq!(first, second);

    let with_goal = handler
        .call_tool("a__search", serde_json::json!({"q": "hi", "_mcpcp_goal": "summarize"}))
        .await;
    // A distinct goal must not collapse onto the goal-less cache entry.
    assert_eq!(with_goal.content[0].as_text(), first.content[0].as_text());
}

#[tokio::test]
async fn masking_round_trips_end_to_end() {
    let mut cfg = PolicyConfig::default();
    cfg.default_masking.enabled = Some(true);
    cfg.default_masking.pii_types = Some(vec!["email".to_string()]);
    let handler = handler_with(cfg, clients(vec![FakeUpstreamClient::new("a").with_tool("echo")])).await;

    let result = handler
        .call_tool("a__echo", serde_json::json!({"note": "reach me at user@example.com"}))
        .await;
    // The fake upstream echoes args back; since the echoed text contains the
    // placeholder, restoration must have replaced it with the original email.
    let text = result.content[0].as_text().unwrap();
    assert!(text.contains("user@example.com"));
    assert!(!text.contains("EMAIL_REDACTED"));
}

#[tokio::test]
async fn hidden_tool_is_not_found_end_to_end() {
    let mut cfg = PolicyConfig::default();
    cfg.hidden_tools.push("a__secret".to_string());
    let handler = handler_with(cfg, clients(vec![FakeUpstreamClient::new("a").with_tool("secret")])).await;

    let tools = handler.list_tools().await;
    assert!(tools.is_empty());

    let result = handler.call_tool("a__secret", serde_json::json!({})).await;
    assert!(result.is_error);
    assert!(result.content[0].as_text().unwrap().contains("not found"));
}

#[tokio::test]
async fn partial_upstream_failure_does_not_break_other_upstreams() {
    let handler = handler_with(
        PolicyConfig::default(),
        clients(vec![
            FakeUpstreamClient::new("healthy").with_tool("search"),
            FakeUpstreamClient::new("broken").fail_listing(),
        ]),
    )
    .await;

    let tools = handler.list_tools().await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "healthy__search");
}

#[tokio::test]
async fn retry_escalation_widens_compression_budget_on_repeated_calls() {
    use mcpcp_core::capability::LlmClient;

    let mut cfg = PolicyConfig::default();
    cfg.default_compression.token_threshold = Some(1);
    cfg.default_compression.max_output_tokens = Some(10);
    cfg.retry_escalation = Some(mcpcp_core::policy::RetryEscalationConfig {
        enabled: true,
        window_seconds: 60,
        token_multiplier: 1.0,
    });

    let long_text = "word ".repeat(20);
    let upstream = FakeUpstreamClient::new("a")
        .with_tool("search")
        .with_call_response("search", mcpcp_core::ToolCallResult::text(long_text));

    let resolver = ToolConfigResolver::new(cfg);
    let llm = Arc::new(FakeLlmClient::responding_with("compressed"));
    let generation = Generation::new(
        1,
        resolver,
        clients(vec![upstream]),
        Vec::new(),
        Some(llm.clone() as Arc<dyn LlmClient>),
        Arc::new(WordCountTokenizer),
    );
    generation.aggregator.refresh().await;
    let handler = RequestHandler::new(generation, 100, false, false);

    handler.call_tool("a__search", serde_json::json!({"q": "1"})).await;
    handler.call_tool("a__search", serde_json::json!({"q": "2"})).await;
    handler.call_tool("a__search", serde_json::json!({"q": "3"})).await;

    // Each call compresses (token_threshold=1 guarantees that); the budget
    // passed to the LLM grows with escalation, though the fake LLM's fixed
    // reply can't surface that directly — what we can assert is that every
    // repeated call actually reached the LLM (none short-circuited).
    assert_eq!(llm.call_count(), 3);
}
