//! Tools agents can invoke
//!
//! The registry holds a fixed set of [`ToolSpec`]s and routes each
//! [`ToolInvocation`] to the sandbox, the agent's working directory or the
//! network.

pub mod fs;
pub mod invocation;
pub mod registry;
pub mod spec;

use thiserror::Error;

pub use invocation::{ToolInvocation, ToolResult};
pub use registry::{ToolContext, ToolRegistry};
pub use spec::{ParamType, ToolParam, ToolSpec};

/// Reasons a tool call could not be carried out
///
/// These never escape the registry; they are rendered into an error
/// [`ToolResult`] for the model to read.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{name}'. Available tools: {available}")]
    UnknownTool { name: String, available: String },

    #[error("tool '{tool}' requires parameter '{param}'")]
    MissingParameter { tool: String, param: String },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("path '{0}' is outside the working directory")]
    PathEscape(String),

    #[error("{0}")]
    Io(String),

    #[error("request failed: {0}")]
    Network(String),
}
