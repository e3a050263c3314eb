//! Orchestrator - supervisor/frontend/backend rounds
//!
//! ```text
//! round N:  supervisor (single shot, no tools)
//!               │ parse [FRONTEND_TASK] [BACKEND_TASK] [..._REWORK] [PROJECT_COMPLETE]
//!               ▼
//!           ┌── frontend AgentLoop ──┐
//!           │                        ├── join ──► results ──► round N+1 review
//!           └── backend  AgentLoop ──┘
//! ```
//!
//! The run ends when the supervisor signals completion (round 2 or later,
//! explicit marker, no work handed out), when it hands out nothing after
//! round 1, when the round budget runs out, or on the first error.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::events::OrchestratorEvent;
use super::prompts::{
    initial_context, review_context, supervisor_system_prompt, worker_task, DEFAULT_BACKEND_PROMPT,
    DEFAULT_FRONTEND_PROMPT,
};
use super::round::{OrchestrationRequest, OrchestrationRound, Role};
use crate::agent::{AgentEvent, AgentLoop, AgentSession, FinishReason};
use crate::events::{EventSink, DEFAULT_EVENT_BUFFER};
use crate::llm::{AgentProfile, ChatError, ChatModel, ChatRequest, ConversationTurn, ModelFactory};
use crate::metrics::{LLM_CALL_DURATION, ORCHESTRATIONS, ORCHESTRATION_ROUNDS};
use crate::protocol::assignment::strip_tags;
use crate::protocol::{parse_assignment, truncate_output, ResolvedTask};

/// Default round budget
pub const DEFAULT_MAX_ROUNDS: usize = 3;

/// Largest round budget a caller can ask for by default
pub const DEFAULT_ROUND_LIMIT: usize = 10;

/// Cap on tool output forwarded as agent messages
const FORWARDED_OUTPUT_LIMIT: usize = 2 * 1024;

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Round budget used when a request does not set one
    pub max_rounds: usize,
    /// Upper bound on any requested round budget
    pub round_limit: usize,
    /// Iteration ceiling for frontend and backend agents
    pub agent_max_iterations: usize,
    /// Each worker result is truncated to this size in the review prompt
    pub result_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_limit: DEFAULT_ROUND_LIMIT,
            agent_max_iterations: crate::agent::controller::DEFAULT_MAX_ITERATIONS,
            result_limit: 8 * 1024,
        }
    }
}

/// Orchestration-level failures; each ends the run with an `error` event
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid {role} profile: {source}")]
    Profile {
        role: Role,
        #[source]
        source: ChatError,
    },

    #[error("the supervisor assigned {role} work but no {role} agent is configured")]
    MissingAgent { role: Role },

    #[error("the supervisor produced no assignments in round 1")]
    NoInitialAssignments,

    #[error("supervisor call failed: {0}")]
    Supervisor(#[source] ChatError),

    #[error("instruction is empty")]
    EmptyInstruction,
}

/// How an orchestration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    /// Supervisor signalled completion
    Complete,
    /// Supervisor handed out nothing after round 1
    Idle,
    /// Round budget exhausted
    Exhausted,
    Failed,
    Cancelled,
}

impl OrchestrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationStatus::Complete => "complete",
            OrchestrationStatus::Idle => "idle",
            OrchestrationStatus::Exhausted => "exhausted",
            OrchestrationStatus::Failed => "error",
            OrchestrationStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of an orchestration
#[derive(Debug, Clone)]
pub struct OrchestrationOutcome {
    pub status: OrchestrationStatus,
    pub summary: String,
    pub rounds: Vec<OrchestrationRound>,
}

/// Models resolved from the request's profiles
struct Team {
    supervisor: Arc<dyn ChatModel>,
    supervisor_prompt: String,
    frontend: Option<Worker>,
    backend: Option<Worker>,
}

struct Worker {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
}

/// Runs supervisor-led multi-agent rounds
pub struct Orchestrator {
    factory: Arc<dyn ModelFactory>,
    agents: Arc<AgentLoop>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn ModelFactory>, agents: Arc<AgentLoop>, config: OrchestratorConfig) -> Self {
        Self {
            factory,
            agents,
            config,
        }
    }

    /// Run an orchestration, streaming events into `sink`
    pub async fn run(
        &self,
        request: OrchestrationRequest,
        sink: &EventSink<OrchestratorEvent>,
    ) -> OrchestrationOutcome {
        let trace_id = Uuid::now_v7().to_string();
        let max_rounds = request
            .max_rounds
            .filter(|n| *n > 0)
            .unwrap_or(self.config.max_rounds)
            .clamp(1, self.config.round_limit.max(1));
        let span = info_span!(
            "orchestration",
            trace_id = %trace_id,
            max_rounds,
            otel.name = "orchestration"
        );

        let mut rounds = Vec::new();
        let result = self
            .drive(&request, max_rounds, &mut rounds, sink)
            .instrument(span)
            .await;

        let (status, summary) = match result {
            Ok((status, summary)) => {
                if status != OrchestrationStatus::Cancelled {
                    sink.emit(OrchestratorEvent::Done { summary: summary.clone() }).await;
                }
                (status, summary)
            }
            Err(e) => {
                warn!(trace_id = %trace_id, error = %e, "Orchestration failed");
                let message = e.to_string();
                sink.emit(OrchestratorEvent::Error { message: message.clone() }).await;
                (OrchestrationStatus::Failed, message)
            }
        };

        ORCHESTRATIONS.with_label_values(&[status.as_str()]).inc();
        ORCHESTRATION_ROUNDS.observe(rounds.len() as f64);
        info!(trace_id = %trace_id, status = status.as_str(), rounds = rounds.len(), "Orchestration finished");

        OrchestrationOutcome {
            status,
            summary,
            rounds,
        }
    }

    fn build_team(&self, request: &OrchestrationRequest) -> Result<Team, OrchestratorError> {
        let build = |role: Role, profile: &AgentProfile| {
            self.factory
                .build(profile)
                .map_err(|source| OrchestratorError::Profile { role, source })
        };
        let worker = |role: Role, profile: &Option<AgentProfile>, default_prompt: &str| {
            profile
                .as_ref()
                .map(|p| {
                    Ok::<_, OrchestratorError>(Worker {
                        model: build(role, p)?,
                        system_prompt: p
                            .system_prompt
                            .clone()
                            .filter(|s| !s.trim().is_empty())
                            .unwrap_or_else(|| default_prompt.to_string()),
                    })
                })
                .transpose()
        };

        Ok(Team {
            supervisor: build(Role::Supervisor, &request.supervisor)?,
            supervisor_prompt: supervisor_system_prompt(request.supervisor.system_prompt.as_deref()),
            frontend: worker(Role::Frontend, &request.frontend, DEFAULT_FRONTEND_PROMPT)?,
            backend: worker(Role::Backend, &request.backend, DEFAULT_BACKEND_PROMPT)?,
        })
    }

    async fn drive(
        &self,
        request: &OrchestrationRequest,
        max_rounds: usize,
        rounds: &mut Vec<OrchestrationRound>,
        sink: &EventSink<OrchestratorEvent>,
    ) -> Result<(OrchestrationStatus, String), OrchestratorError> {
        if request.instruction.trim().is_empty() {
            return Err(OrchestratorError::EmptyInstruction);
        }
        let team = self.build_team(request)?;
        let project_context = request.project_context.as_deref();

        for round in 1..=max_rounds {
            if sink.is_closed() {
                info!(round, "Event consumer disconnected, stopping");
                return Ok((OrchestrationStatus::Cancelled, String::new()));
            }

            let round_span = info_span!("orchestration_round", round);
            sink.emit(OrchestratorEvent::RoundStart { round, max_rounds }).await;

            let context = match rounds.last() {
                None => initial_context(&request.instruction, project_context),
                Some(previous) => review_context(
                    &request.instruction,
                    project_context,
                    previous,
                    self.config.result_limit,
                ),
            };

            let action = if round == 1 { "planning" } else { "reviewing" };
            sink.emit(OrchestratorEvent::AgentStart {
                agent: Role::Supervisor.to_string(),
                action: action.to_string(),
            })
            .await;

            let supervisor_output = self
                .consult_supervisor(&team, &context)
                .instrument(round_span.clone())
                .await?;
            sink.emit(OrchestratorEvent::message(Role::Supervisor.as_str(), supervisor_output.clone()))
                .await;

            let assignment = parse_assignment(&supervisor_output);
            info!(
                round,
                frontend = assignment.frontend().is_some(),
                backend = assignment.backend().is_some(),
                completion_marker = assignment.completion_marker,
                "Supervisor response parsed"
            );

            if assignment.signals_completion(round) {
                let summary = strip_tags(&supervisor_output);
                let summary = if summary.is_empty() {
                    format!("Project complete after {} rounds.", round - 1)
                } else {
                    summary
                };
                return Ok((OrchestrationStatus::Complete, summary));
            }

            let frontend_task = assignment.frontend();
            let backend_task = assignment.backend();
            if frontend_task.is_none() && backend_task.is_none() {
                if round == 1 {
                    return Err(OrchestratorError::NoInitialAssignments);
                }
                return Ok((
                    OrchestrationStatus::Idle,
                    format!("The supervisor issued no further assignments after round {}.", round - 1),
                ));
            }

            // Resolve every role before dispatching anything.
            let frontend_job = pair(Role::Frontend, frontend_task, team.frontend.as_ref())?;
            let backend_job = pair(Role::Backend, backend_task, team.backend.as_ref())?;

            let count = usize::from(frontend_job.is_some()) + usize::from(backend_job.is_some());
            sink.emit(OrchestratorEvent::ParallelStart { count }).await;

            let (frontend_result, backend_result) = async {
                tokio::join!(
                    self.run_worker(Role::Frontend, frontend_job, request, sink),
                    self.run_worker(Role::Backend, backend_job, request, sink),
                )
            }
            .instrument(round_span)
            .await;

            rounds.push(OrchestrationRound {
                round,
                supervisor_output,
                assignment,
                frontend_result,
                backend_result,
            });
            sink.emit(OrchestratorEvent::RoundComplete { round }).await;
        }

        Ok((
            OrchestrationStatus::Exhausted,
            format!(
                "Reached the maximum of {max_rounds} rounds without a completion signal from the supervisor."
            ),
        ))
    }

    async fn consult_supervisor(&self, team: &Team, context: &str) -> Result<String, OrchestratorError> {
        let turns = [ConversationTurn::user(context)];
        let provider = team.supervisor.provider();
        let start = Instant::now();
        let result = team
            .supervisor
            .complete(ChatRequest {
                system: &team.supervisor_prompt,
                turns: &turns,
                tools: &[],
            })
            .instrument(info_span!("llm_call", agent = "supervisor", provider = %provider))
            .await;
        let status = if result.is_ok() { "ok" } else { "error" };
        LLM_CALL_DURATION
            .with_label_values(&[provider.as_str(), status])
            .observe(start.elapsed().as_secs_f64());
        Ok(result.map_err(OrchestratorError::Supervisor)?.text)
    }

    /// Run one worker agent and return its result text
    async fn run_worker(
        &self,
        role: Role,
        job: Option<(ResolvedTask, &Worker)>,
        request: &OrchestrationRequest,
        sink: &EventSink<OrchestratorEvent>,
    ) -> Option<String> {
        let (task, worker) = job?;
        let action = if task.rework { "rework" } else { "task" };
        sink.emit(OrchestratorEvent::AgentStart {
            agent: role.to_string(),
            action: action.to_string(),
        })
        .await;

        let mut session = match AgentSession::new(
            role.as_str(),
            worker.model.clone(),
            Vec::new(),
            self.config.agent_max_iterations,
        ) {
            Ok(session) => session.with_system_prompt(Some(worker.system_prompt.clone())),
            Err(e) => {
                let text = format!("[{role} agent could not start: {e}]");
                sink.emit(OrchestratorEvent::message(role.as_str(), text.clone())).await;
                return Some(text);
            }
        };

        let (agent_sink, mut agent_events) = EventSink::channel(DEFAULT_EVENT_BUFFER);
        let parent = sink.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = agent_events.recv().await {
                if let Some(text) = describe(&event) {
                    if !parent.emit(OrchestratorEvent::message(role.as_str(), text)).await {
                        break;
                    }
                }
            }
        });

        let task_text = worker_task(
            &request.instruction,
            request.project_context.as_deref(),
            &task.text,
            task.rework,
        );
        let outcome = self.agents.run(&mut session, &task_text, &agent_sink).await;
        drop(agent_sink);
        if let Err(e) = forwarder.await {
            warn!(role = %role, error = %e, "event forwarder failed");
        }

        Some(match outcome.reason {
            FinishReason::Failed => format!("[{role} agent failed: {}]", outcome.summary),
            _ => outcome.summary,
        })
    }
}

fn pair(
    role: Role,
    task: Option<ResolvedTask>,
    worker: Option<&Worker>,
) -> Result<Option<(ResolvedTask, &Worker)>, OrchestratorError> {
    match (task, worker) {
        (None, _) => Ok(None),
        (Some(task), Some(worker)) => Ok(Some((task, worker))),
        (Some(_), None) => Err(OrchestratorError::MissingAgent { role }),
    }
}

/// Text forwarded to the orchestration stream for a worker event
fn describe(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Message { display, .. } => Some(display.clone()),
        AgentEvent::ToolCall { tool, .. } => Some(format!("[calling {tool}]")),
        AgentEvent::ToolResult { tool, output, is_error } => {
            let label = if *is_error { "failed" } else { "returned" };
            Some(format!(
                "[{tool} {label}]\n{}",
                truncate_output(output, FORWARDED_OUTPUT_LIMIT)
            ))
        }
        AgentEvent::Done { summary } => Some(summary.clone()),
        AgentEvent::Error { message } => Some(format!("[error] {message}")),
        AgentEvent::Start { .. } | AgentEvent::Thinking { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_worker_is_error() {
        let task = ResolvedTask {
            text: "build".to_string(),
            rework: false,
        };
        assert!(matches!(
            pair(Role::Backend, Some(task), None),
            Err(OrchestratorError::MissingAgent { role: Role::Backend })
        ));
        assert!(pair(Role::Backend, None, None).unwrap().is_none());
    }

    #[test]
    fn test_describe_skips_bookkeeping_events() {
        assert!(describe(&AgentEvent::Thinking { iteration: 1 }).is_none());
        let text = describe(&AgentEvent::ToolResult {
            tool: "run_shell".into(),
            output: "boom".into(),
            is_error: true,
        })
        .unwrap();
        assert_eq!(text, "[run_shell failed]\nboom");
    }
}
