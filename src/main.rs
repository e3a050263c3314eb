use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use agentvisor::agent::AgentLoop;
use agentvisor::config::ServerConfig;
use agentvisor::llm::{ModelFactory, ProviderFactory};
use agentvisor::orchestrator::Orchestrator;
use agentvisor::sandbox::SandboxExecutor;
use agentvisor::server::{create_router, AppState, RateLimiter};
use agentvisor::tools::ToolRegistry;
use agentvisor::{metrics, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    config.validate()?;

    telemetry::init_tracing("agentvisor", config.otlp_endpoint.as_deref(), config.json_logs)?;
    metrics::init();

    let backend = config.isolation_backend()?;
    let executor = Arc::new(SandboxExecutor::new(backend, config.sandbox_policy()));
    let tools = Arc::new(ToolRegistry::new(executor, config.network_tools));
    let agents = Arc::new(AgentLoop::new(tools, config.agent_config()));

    let factory: Arc<dyn ModelFactory> = Arc::new(
        ProviderFactory::new(config.provider_urls(), config.llm_timeout())
            .context("failed to build HTTP client")?,
    );
    let orchestrator = Arc::new(Orchestrator::new(
        factory.clone(),
        agents.clone(),
        config.orchestrator_config(),
    ));

    let state = AppState {
        agents,
        orchestrator,
        factory,
        limiter: Arc::new(RateLimiter::new(config.rate_burst, config.rate_per_sec)),
        backend: config.backend_name(),
    };

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(
        bind = %config.bind,
        backend = config.backend_name(),
        timeout_secs = config.timeout_secs,
        network_tools = config.network_tools,
        "agentvisor listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    telemetry::shutdown_tracing();
    Ok(())
}
