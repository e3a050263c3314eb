//! Agent module for LLM-driven tool use
//!
//! This module provides the loop that drives one model through tool calls:
//!
//! ```text
//! Task → AgentLoop → ChatModel (system prompt + tool manual + history)
//!            ↓
//!      parse reply: <done> / native call / <tool_call>
//!            ↓
//!      ToolRegistry::dispatch → SandboxExecutor / workdir files / network
//!            ↓
//!      tool result appended as a user turn → loop, or finish
//! ```
//!
//! Every run emits [`AgentEvent`]s and owns an [`AgentSession`] whose
//! working directory is removed when the run ends.

pub mod controller;
pub mod events;
pub mod prompt;
pub mod session;

pub use controller::{AgentConfig, AgentLoop, AgentOutcome, FinishReason};
pub use events::AgentEvent;
pub use prompt::{build_system_prompt, DEFAULT_AGENT_SYSTEM_PROMPT};
pub use session::AgentSession;
