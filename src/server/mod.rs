//! HTTP surface
//!
//! - `POST /api/agents/run` - single agent run, streamed as SSE
//! - `POST /api/orchestrations/run` - supervisor-led team run, streamed as SSE
//! - `GET /metrics` - Prometheus text format
//! - `GET /health` - liveness and active backend

pub mod rate_limit;
pub mod runs;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::debug;

use crate::agent::AgentLoop;
use crate::llm::ModelFactory;
use crate::metrics;
use crate::orchestrator::Orchestrator;

pub use rate_limit::{RateLimited, RateLimiter};
pub use runs::AgentRunRequest;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<AgentLoop>,
    pub orchestrator: Arc<Orchestrator>,
    pub factory: Arc<dyn ModelFactory>,
    pub limiter: Arc<RateLimiter>,
    /// Isolation backend name reported by `/health`
    pub backend: &'static str,
}

impl AppState {
    /// Draw a token for `endpoint`, or build the 429 response
    pub(crate) fn admit(&self, endpoint: &'static str) -> Result<(), Response> {
        self.limiter.try_acquire().map_err(|rejected| {
            debug!(endpoint, retry_after_ms = rejected.retry_after_ms, "request rate limited");
            metrics::RATE_LIMITED.with_label_values(&[endpoint]).inc();
            let retry_after_secs = rejected.retry_after_ms.div_ceil(1000).to_string();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs)],
                Json(rejected),
            )
                .into_response()
        })
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/agents/run", post(runs::run_agent))
        .route("/api/orchestrations/run", post(runs::run_orchestration))
        .route("/metrics", get(prometheus_metrics))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub backend: &'static str,
    pub version: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        backend: state.backend,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn prometheus_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_text(),
    )
}
