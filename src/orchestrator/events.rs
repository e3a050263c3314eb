//! Live events emitted by an orchestration

use serde::Serialize;

/// One event in an orchestration stream
///
/// Every orchestration ends with exactly one `done` or `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    RoundStart {
        round: usize,
        max_rounds: usize,
    },
    AgentStart {
        agent: String,
        action: String,
    },
    AgentMessage {
        agent: String,
        text: String,
    },
    ParallelStart {
        count: usize,
    },
    RoundComplete {
        round: usize,
    },
    Done {
        summary: String,
    },
    Error {
        message: String,
    },
}

impl OrchestratorEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorEvent::Done { .. } | OrchestratorEvent::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorEvent::RoundStart { .. } => "round_start",
            OrchestratorEvent::AgentStart { .. } => "agent_start",
            OrchestratorEvent::AgentMessage { .. } => "agent_message",
            OrchestratorEvent::ParallelStart { .. } => "parallel_start",
            OrchestratorEvent::RoundComplete { .. } => "round_complete",
            OrchestratorEvent::Done { .. } => "done",
            OrchestratorEvent::Error { .. } => "error",
        }
    }

    pub(crate) fn message(agent: &str, text: impl Into<String>) -> Self {
        OrchestratorEvent::AgentMessage {
            agent: agent.to_string(),
            text: text.into(),
        }
    }
}
