//! Live events emitted by an agent run

use std::collections::BTreeMap;

use serde::Serialize;

/// One event in an agent run's stream
///
/// Serialized with a `type` discriminator, e.g.
/// `{"type":"tool_call","tool":"execute_code","arguments":{...}}`.
/// Every run ends with exactly one `done` or `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Start {
        agent: String,
        session_id: String,
    },
    Thinking {
        iteration: usize,
    },
    Message {
        raw: String,
        display: String,
    },
    ToolCall {
        tool: String,
        arguments: BTreeMap<String, String>,
    },
    ToolResult {
        tool: String,
        output: String,
        is_error: bool,
    },
    Done {
        summary: String,
    },
    Error {
        message: String,
    },
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. } | AgentEvent::Error { .. })
    }

    /// The `type` tag this event serializes with
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Start { .. } => "start",
            AgentEvent::Thinking { .. } => "thinking",
            AgentEvent::Message { .. } => "message",
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::Done { .. } => "done",
            AgentEvent::Error { .. } => "error",
        }
    }
}
