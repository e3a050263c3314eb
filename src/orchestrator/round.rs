//! Round records and request types

use serde::{Deserialize, Serialize};

use crate::llm::AgentProfile;
use crate::protocol::Assignment;

/// What happened in one round; the only state carried across rounds
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationRound {
    pub round: usize,
    pub supervisor_output: String,
    pub assignment: Assignment,
    pub frontend_result: Option<String>,
    pub backend_result: Option<String>,
}

/// A team role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Supervisor,
    Frontend,
    Backend,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Supervisor => "supervisor",
            Role::Frontend => "frontend",
            Role::Backend => "backend",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/orchestrations/run`
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationRequest {
    pub instruction: String,
    pub supervisor: AgentProfile,
    #[serde(default)]
    pub frontend: Option<AgentProfile>,
    #[serde(default)]
    pub backend: Option<AgentProfile>,
    #[serde(default)]
    pub project_context: Option<String>,
    #[serde(default)]
    pub max_rounds: Option<usize>,
}
