//! HTTP surface tests, driven through `tower::ServiceExt::oneshot`

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use agentvisor::llm::ModelFactory;
use agentvisor::orchestrator::{Orchestrator, OrchestratorConfig};
use agentvisor::server::{create_router, AppState, RateLimiter};

use common::{host_loop, ScriptedFactory, ScriptedModel};

fn app(factory: ScriptedFactory, limiter: RateLimiter, persistent: &std::path::Path) -> Router {
    let agents = host_loop(persistent, 5);
    let factory: Arc<dyn ModelFactory> = Arc::new(factory);
    let orchestrator = Arc::new(Orchestrator::new(
        factory.clone(),
        agents.clone(),
        OrchestratorConfig::default(),
    ));
    create_router(AppState {
        agents,
        orchestrator,
        factory,
        limiter: Arc::new(limiter),
        backend: "host",
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Parse every `data:` line of an SSE body
async fn sse_events(response: axum::response::Response) -> Vec<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let persistent = tempfile::tempdir().unwrap();
    let app = app(ScriptedFactory::default(), RateLimiter::with_defaults(), persistent.path());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "host");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    agentvisor::metrics::init();
    let persistent = tempfile::tempdir().unwrap();
    let app = app(ScriptedFactory::default(), RateLimiter::with_defaults(), persistent.path());

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("agentvisor_active_streams"));
}

#[tokio::test]
async fn test_agent_run_streams_events() {
    let persistent = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::default().with(ScriptedModel::new(
        "scripted",
        vec!["Thinking it over.\n<done>hello back</done>"],
    ));
    let app = app(factory, RateLimiter::with_defaults(), persistent.path());

    let response = app
        .oneshot(post(
            "/api/agents/run",
            json!({"provider": "ollama", "model": "scripted", "agent_name": "greeter", "task": "say hello"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_events(response).await;
    let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["start", "thinking", "message", "done"]);
    assert_eq!(events[0]["agent"], "greeter");
    assert_eq!(events[2]["display"], "Thinking it over.");
    assert_eq!(events[3]["summary"], "hello back");
}

#[tokio::test]
async fn test_agent_run_with_unknown_provider_streams_single_error() {
    let persistent = tempfile::tempdir().unwrap();
    let app = app(ScriptedFactory::default(), RateLimiter::with_defaults(), persistent.path());

    let response = app
        .oneshot(post(
            "/api/agents/run",
            json!({"provider": "watson", "model": "x", "task": "hi"}),
        ))
        .await
        .unwrap();
    let events = sse_events(response).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert!(events[0]["message"].as_str().unwrap().contains("watson"));
}

#[tokio::test]
async fn test_orchestration_run_streams_events() {
    let persistent = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::default()
        .with(ScriptedModel::new(
            "boss",
            vec!["[BACKEND_TASK] build the API", "[PROJECT_COMPLETE] Shipped."],
        ))
        .with(ScriptedModel::new("api-dev", vec!["<done>API ready</done>"]));
    let app = app(factory, RateLimiter::with_defaults(), persistent.path());

    let response = app
        .oneshot(post(
            "/api/orchestrations/run",
            json!({
                "instruction": "Build a todo service",
                "supervisor": {"provider": "ollama", "model": "boss"},
                "backend": {"provider": "ollama", "model": "api-dev"},
                "max_rounds": 3
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(response).await;
    assert_eq!(events[0]["type"], "round_start");
    assert_eq!(events[0]["max_rounds"], 3);
    assert!(events
        .iter()
        .any(|e| e["type"] == "parallel_start" && e["count"] == 1));
    assert!(events
        .iter()
        .any(|e| e["type"] == "agent_message" && e["agent"] == "backend" && e["text"] == "API ready"));
    let last = events.last().unwrap();
    assert_eq!(last["type"], "done");
    assert_eq!(last["summary"], "Shipped.");
}

#[tokio::test]
async fn test_rate_limited_request_gets_429() {
    let persistent = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::default().with(ScriptedModel::repeating("scripted", "<done>ok</done>"));
    let app = app(factory, RateLimiter::new(1, 0.0), persistent.path());
    let body = json!({"provider": "ollama", "model": "scripted", "task": "hi"});

    let first = app.clone().oneshot(post("/api/agents/run", body.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(post("/api/agents/run", body)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));
    let bytes = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
    let rejection: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(rejection["error"], "rate limited");
    assert!(rejection["retry_after_ms"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let persistent = tempfile::tempdir().unwrap();
    let app = app(ScriptedFactory::default(), RateLimiter::with_defaults(), persistent.path());

    let response = app
        .oneshot(post("/api/agents/run", json!({"provider": "ollama"})))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
