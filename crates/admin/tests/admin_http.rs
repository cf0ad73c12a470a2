//! Exercises the admin surface over a real bound port rather than just
//! calling the handler functions in-process, so the `axum::serve`/`Router`
//! wiring in `lib.rs` is actually covered, not just its handler bodies.

use mcpcp_admin::{AdminState, LogTail};
use mcpcp_core::generation::Generation;
use mcpcp_core::handler::RequestHandler;
use mcpcp_core::policy::PolicyConfig;
use mcpcp_core::resolver::ToolConfigResolver;
use mcpcp_test_support::{fake_tools_upstream, pick_unused_port, wait_http_ok};
use std::sync::Arc;
use std::time::Duration;

async fn spawn_admin() -> (u16, tokio::task::JoinHandle<()>) {
    let clients = [("a".to_string(), fake_tools_upstream("a", &["search"]))].into_iter().collect();
    let resolver = ToolConfigResolver::new(PolicyConfig::default());
    let generation = Generation::new(1, resolver, clients, Vec::new(), None, Arc::new(mcpcp_test_support::WordCountTokenizer));
    generation.aggregator.refresh().await;
    let handler = Arc::new(RequestHandler::new(generation, 100, false, false));

    let state = Arc::new(AdminState { handler, log_tail: LogTail::new(16) });
    let router = mcpcp_admin::router(state);

    let port = pick_unused_port();
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.expect("bind admin port");
    let task = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("admin server");
    });
    (port, task)
}

#[tokio::test]
async fn healthz_returns_ok() {
    let (port, task) = spawn_admin().await;
    let url = format!("http://127.0.0.1:{port}/healthz");
    wait_http_ok(&url, Duration::from_secs(5)).await.expect("admin surface came up");

    let body = reqwest::get(&url).await.expect("request healthz").text().await.expect("read body");
    assert_eq!(body, "ok");
    task.abort();
}

#[tokio::test]
async fn generation_status_reports_connected_upstream() {
    let (port, task) = spawn_admin().await;
    let healthz = format!("http://127.0.0.1:{port}/healthz");
    wait_http_ok(&healthz, Duration::from_secs(5)).await.expect("admin surface came up");

    let body: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{port}/generation"))
        .await
        .expect("request generation status")
        .json()
        .await
        .expect("parse json");

    assert_eq!(body["generationId"], 1);
    let upstreams = body["upstreams"].as_array().expect("upstreams array");
    assert_eq!(upstreams.len(), 1);
    assert_eq!(upstreams[0]["id"], "a");
    task.abort();
}
