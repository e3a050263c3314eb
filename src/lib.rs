//! agentvisor - multi-agent LLM runtime with sandboxed tool execution
//!
//! Agents talk to a chat model, request tools through a text protocol embedded
//! in their replies, and get the results back as conversation turns. Code runs
//! in short-lived or long-lived isolates; a supervisor can split work between
//! a frontend and a backend agent over several rounds.
//!
//! # Modules
//!
//! - `protocol` - tool-call, completion and assignment parsing; truncation
//! - `sandbox` - isolation backends and the executor
//! - `tools` - tool specs, registry and dispatch
//! - `llm` - provider clients behind the `ChatModel` trait
//! - `agent` - sessions and the agent loop
//! - `orchestrator` - supervisor/frontend/backend rounds
//! - `server` - SSE endpoints, health, metrics
//! - `metrics` - Prometheus metrics
//! - `telemetry` - logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use agentvisor::{AgentLoop, AgentSession, EventSink, SandboxExecutor, ToolRegistry};
//!
//! let executor = Arc::new(SandboxExecutor::new(backend, SandboxPolicy::default()));
//! let agents = AgentLoop::new(Arc::new(ToolRegistry::new(executor, false)), AgentConfig::default());
//! let mut session = AgentSession::new("agent", model, Vec::new(), 10)?;
//! let outcome = agents.run(&mut session, "What is 2 + 2?", &EventSink::discard()).await;
//! ```

pub mod agent;
pub mod config;
pub mod events;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod protocol;
pub mod sandbox;
pub mod server;
pub mod telemetry;
pub mod tools;

pub use agent::{AgentConfig, AgentEvent, AgentLoop, AgentOutcome, AgentSession, FinishReason};
pub use events::EventSink;
pub use llm::{AgentProfile, ChatModel, ModelFactory, Provider};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorEvent};
pub use sandbox::{SandboxExecutor, SandboxPolicy};
pub use tools::ToolRegistry;
