//! Prometheus metrics
//!
//! All metrics live in the default registry and are exposed in text format
//! by `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec,
    CounterVec, Encoder, Gauge, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Loop
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finished agent runs.
    ///
    /// Labels:
    /// - outcome: done, no_action, ceiling, error, cancelled
    pub static ref AGENT_RUNS: CounterVec = register_counter_vec!(
        "agentvisor_agent_runs_total",
        "Agent runs by finish reason",
        &["outcome"]
    ).expect("failed to register AGENT_RUNS metric");

    /// Iterations (model calls) used per agent run.
    pub static ref AGENT_ITERATIONS: Histogram = register_histogram!(
        "agentvisor_agent_iterations",
        "Model calls per agent run",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0, 20.0]
    ).expect("failed to register AGENT_ITERATIONS metric");

    /// Tool dispatches, by tool name and whether the result was an error.
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "agentvisor_tool_calls_total",
        "Tool calls dispatched by agents",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Model call latency in seconds.
    ///
    /// Labels:
    /// - provider: ollama, openai, anthropic, gemini
    /// - status: ok, error
    pub static ref LLM_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "agentvisor_llm_call_duration_seconds",
        "Latency of model calls",
        &["provider", "status"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).expect("failed to register LLM_CALL_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Sandbox
    // ─────────────────────────────────────────────────────────────────────────────

    /// Sandbox executions by language and outcome.
    pub static ref SANDBOX_EXECUTIONS: CounterVec = register_counter_vec!(
        "agentvisor_sandbox_executions_total",
        "Sandbox executions by language and outcome",
        &["language", "outcome"]
    ).expect("failed to register SANDBOX_EXECUTIONS metric");

    /// Sandbox wall-clock duration in seconds, by strategy.
    pub static ref SANDBOX_DURATION: HistogramVec = register_histogram_vec!(
        "agentvisor_sandbox_duration_seconds",
        "Wall-clock duration of sandbox executions",
        &["strategy"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register SANDBOX_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Orchestrator
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finished orchestrations.
    ///
    /// Labels:
    /// - outcome: complete, exhausted, idle, error, cancelled
    pub static ref ORCHESTRATIONS: CounterVec = register_counter_vec!(
        "agentvisor_orchestrations_total",
        "Orchestration runs by outcome",
        &["outcome"]
    ).expect("failed to register ORCHESTRATIONS metric");

    /// Rounds used per orchestration.
    pub static ref ORCHESTRATION_ROUNDS: Histogram = register_histogram!(
        "agentvisor_orchestration_rounds",
        "Rounds per orchestration run",
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 8.0, 10.0]
    ).expect("failed to register ORCHESTRATION_ROUNDS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // HTTP
    // ─────────────────────────────────────────────────────────────────────────────

    /// SSE streams currently open.
    pub static ref ACTIVE_STREAMS: Gauge = register_gauge!(
        "agentvisor_active_streams",
        "Server-sent event streams currently open"
    ).expect("failed to register ACTIVE_STREAMS metric");

    /// Requests rejected by the rate limiter, by endpoint.
    pub static ref RATE_LIMITED: CounterVec = register_counter_vec!(
        "agentvisor_rate_limited_total",
        "Requests rejected by admission control",
        &["endpoint"]
    ).expect("failed to register RATE_LIMITED metric");
}

/// Touch every metric so it shows up in the first scrape.
pub fn init() {
    ACTIVE_STREAMS.set(0.0);
    lazy_static::initialize(&AGENT_RUNS);
    lazy_static::initialize(&AGENT_ITERATIONS);
    lazy_static::initialize(&TOOL_CALLS);
    lazy_static::initialize(&LLM_CALL_DURATION);
    lazy_static::initialize(&SANDBOX_EXECUTIONS);
    lazy_static::initialize(&SANDBOX_DURATION);
    lazy_static::initialize(&ORCHESTRATIONS);
    lazy_static::initialize(&ORCHESTRATION_ROUNDS);
    lazy_static::initialize(&RATE_LIMITED);
}

/// Render the default registry in Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buf).into_owned()
}
