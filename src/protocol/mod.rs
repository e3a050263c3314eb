//! Text protocols embedded in model output
//!
//! - `tool_call` - `<tool_call>` / `<done>` blocks written by any agent
//! - `assignment` - `[FRONTEND_TASK]`-style sections written by the supervisor
//! - `truncate` - bounded output for anything fed back into a prompt

pub mod assignment;
pub mod tool_call;
pub mod truncate;

pub use assignment::{parse_assignment, Assignment, ResolvedTask};
pub use tool_call::{parse_response, parse_tool_call, render_tool_call, ParsedResponse};
pub use truncate::{truncate_output, TRUNCATION_MARKER};
