//! Per-run agent sessions
//!
//! A session lives for exactly one run: it owns the conversation, the
//! iteration counter and a private working directory that is removed when
//! the session is closed (or dropped).

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::llm::{ChatModel, Conversation, ConversationTurn};

/// State of one agent run
pub struct AgentSession {
    /// Unique session ID
    pub id: String,
    /// Display name ("frontend", "agent", ...)
    pub name: String,
    /// Model client, holding the provider credential
    pub model: Arc<dyn ChatModel>,
    /// Role prompt; the tool manual is appended when the run starts
    pub system_prompt: Option<String>,
    pub conversation: Conversation,
    pub iterations: usize,
    pub max_iterations: usize,
    workdir: Option<TempDir>,
}

impl AgentSession {
    /// Create a session with a fresh working directory
    ///
    /// # Arguments
    /// * `name` - Agent name used in events and logs
    /// * `model` - Chat model the session talks to
    /// * `history` - Prior conversation turns supplied by the caller
    /// * `max_iterations` - Iteration ceiling
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn ChatModel>,
        history: Vec<ConversationTurn>,
        max_iterations: usize,
    ) -> std::io::Result<Self> {
        let id = Uuid::now_v7().to_string();
        let workdir = tempfile::Builder::new()
            .prefix(&format!("agentvisor-{}-", &id[..8]))
            .tempdir()?;
        debug!(session_id = %id, workdir = %workdir.path().display(), "session created");
        Ok(Self {
            id,
            name: name.into(),
            model,
            system_prompt: None,
            conversation: Conversation::from_turns(history),
            iterations: 0,
            max_iterations,
            workdir: Some(workdir),
        })
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Private working directory; `None` once the session is closed
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(TempDir::path)
    }

    /// Remove the working directory
    pub fn close(&mut self) {
        if let Some(dir) = self.workdir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(session_id = %self.id, path = %path.display(), error = %e, "failed to remove session workdir");
            } else {
                debug!(session_id = %self.id, "session workdir removed");
            }
        }
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        self.close();
    }
}
