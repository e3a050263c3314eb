//! Multi-agent orchestration
//!
//! A supervisor plans and reviews; frontend and backend agents do the work
//! in parallel. See [`Orchestrator`] for the round protocol.

pub mod events;
pub mod prompts;
pub mod round;
pub mod runner;

pub use events::OrchestratorEvent;
pub use round::{OrchestrationRequest, OrchestrationRound, Role};
pub use runner::{
    OrchestrationOutcome, OrchestrationStatus, Orchestrator, OrchestratorConfig, OrchestratorError,
    DEFAULT_MAX_ROUNDS, DEFAULT_ROUND_LIMIT,
};
