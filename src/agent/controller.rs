//! Agent Loop - think, act, observe until done
//!
//! The loop drives one model through repeated calls. Each reply is parsed
//! for a done marker and a single tool call; the tool result is appended to
//! the conversation as a synthetic user turn and the model is called again.
//!
//! ```text
//! AWAIT_MODEL ──► PARSED ──┬─► TOOL_DISPATCH ──► AWAIT_MODEL
//!                          ├─► DONE ───────────► TERMINAL
//!                          ├─► NO_ACTION ──────► TERMINAL
//!                          └─► CEILING ────────► TERMINAL
//! ```
//!
//! Model failures end the run with an `error` event and are not retried.
//! Tool failures are ordinary results the model sees on its next turn.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::events::AgentEvent;
use super::prompt::{build_system_prompt, tool_result_turn};
use super::session::AgentSession;
use crate::events::EventSink;
use crate::llm::{ChatRequest, ModelReply};
use crate::metrics::{AGENT_ITERATIONS, AGENT_RUNS, LLM_CALL_DURATION};
use crate::protocol::{parse_response, render_tool_call, truncate_output};
use crate::tools::{ToolContext, ToolInvocation, ToolRegistry, ToolSpec};

/// Default iteration ceiling
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Largest iteration ceiling a caller can ask for by default
pub const DEFAULT_ITERATION_LIMIT: usize = 50;

/// Default cap on tool output placed into history
pub const DEFAULT_HISTORY_OUTPUT_LIMIT: usize = 20 * 1024;

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Iteration ceiling used when a request does not set one
    pub max_iterations: usize,
    /// Upper bound on any requested iteration ceiling
    pub iteration_limit: usize,
    /// Tool output is truncated to this many bytes before entering history
    pub history_output_limit: usize,
    /// Offer tools through the provider's function-calling API as well
    pub native_tools: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            history_output_limit: DEFAULT_HISTORY_OUTPUT_LIMIT,
            native_tools: true,
        }
    }
}

impl AgentConfig {
    /// Ceiling for a run: the requested value clamped to `1..=iteration_limit`,
    /// or the configured default when none was asked for
    pub fn iteration_ceiling(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|n| *n > 0)
            .unwrap_or(self.max_iterations)
            .clamp(1, self.iteration_limit.max(1))
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model emitted a done marker
    Done,
    /// The model answered without calling a tool
    NoAction,
    /// The iteration ceiling was hit
    CeilingReached,
    /// The model call failed
    Failed,
    /// The event consumer went away
    Cancelled,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Done => "done",
            FinishReason::NoAction => "no_action",
            FinishReason::CeilingReached => "ceiling",
            FinishReason::Failed => "error",
            FinishReason::Cancelled => "cancelled",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FinishReason::Failed)
    }
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub reason: FinishReason,
    /// Final summary, or the error message for failed runs
    pub summary: String,
    /// Number of iterations (model calls) made
    pub iterations: usize,
    /// Number of tool calls dispatched
    pub tool_calls: usize,
    /// Unique trace ID for this run
    pub trace_id: String,
}

/// What one parsed reply asks the loop to do
enum Action {
    Finish(String),
    Answer(String),
    Call(ToolInvocation),
}

/// Drives agent sessions against the tool registry
pub struct AgentLoop {
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl AgentLoop {
    pub fn new(tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self { tools, config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run `task` to completion in `session`
    ///
    /// Emits events into `sink` and always finishes with exactly one `done`
    /// or `error` (unless the consumer has already gone away). The session's
    /// working directory is removed before this returns.
    pub async fn run(
        &self,
        session: &mut AgentSession,
        task: &str,
        sink: &EventSink<AgentEvent>,
    ) -> AgentOutcome {
        let trace_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "agent_run",
            trace_id = %trace_id,
            session_id = %session.id,
            agent = %session.name,
            provider = %session.model.provider(),
            model = %session.model.model(),
            otel.name = "agent_run"
        );

        let outcome = self.drive(session, task, sink, &trace_id).instrument(span).await;
        session.close();

        AGENT_RUNS.with_label_values(&[outcome.reason.as_str()]).inc();
        AGENT_ITERATIONS.observe(outcome.iterations as f64);
        outcome
    }

    async fn drive(
        &self,
        session: &mut AgentSession,
        task: &str,
        sink: &EventSink<AgentEvent>,
        trace_id: &str,
    ) -> AgentOutcome {
        let mut tool_calls = 0;
        let finish = |reason: FinishReason, summary: String, iterations: usize, tool_calls: usize| AgentOutcome {
            reason,
            summary,
            iterations,
            tool_calls,
            trace_id: trace_id.to_string(),
        };

        info!(task_len = task.len(), max_iterations = session.max_iterations, "Starting agent run");
        sink.emit(AgentEvent::Start {
            agent: session.name.clone(),
            session_id: session.id.clone(),
        })
        .await;

        let Some(workdir) = session.workdir().map(ToolContext::new) else {
            let message = "session working directory is gone".to_string();
            sink.emit(AgentEvent::Error { message: message.clone() }).await;
            return finish(FinishReason::Failed, message, 0, 0);
        };

        let system = build_system_prompt(session.system_prompt.as_deref(), &self.tools.manual());
        if !task.trim().is_empty() {
            session.conversation.push_user(task);
        }
        let native_tools: &[ToolSpec] = if self.config.native_tools {
            self.tools.specs()
        } else {
            &[]
        };

        loop {
            if sink.is_closed() {
                info!(iterations = session.iterations, "Event consumer disconnected, stopping");
                return finish(FinishReason::Cancelled, String::new(), session.iterations, tool_calls);
            }

            if session.iterations >= session.max_iterations {
                warn!(iterations = session.iterations, "Iteration ceiling reached");
                let summary = format!(
                    "Iteration ceiling reached after {} iterations without a completion signal.",
                    session.iterations
                );
                sink.emit(AgentEvent::Done { summary: summary.clone() }).await;
                return finish(FinishReason::CeilingReached, summary, session.iterations, tool_calls);
            }

            session.iterations += 1;
            let iteration = session.iterations;
            sink.emit(AgentEvent::Thinking { iteration }).await;

            let reply = match self.call_model(session, &system, native_tools, iteration).await {
                Ok(reply) => reply,
                Err(message) => {
                    sink.emit(AgentEvent::Error { message: message.clone() }).await;
                    return finish(FinishReason::Failed, message, iteration, tool_calls);
                }
            };

            let parsed = parse_response(&reply.text);
            if !parsed.display.is_empty() {
                sink.emit(AgentEvent::Message {
                    raw: reply.text.clone(),
                    display: parsed.display.clone(),
                })
                .await;
            }

            // Done marker wins, then the provider's native call, then a text call.
            let action = match (parsed.done, reply.native_call, parsed.tool_call) {
                (Some(summary), _, _) => Action::Finish(summary),
                (None, Some(native), _) => {
                    let mut history_text = reply.text.clone();
                    if !history_text.trim().is_empty() {
                        history_text.push('\n');
                    }
                    history_text.push_str(&render_tool_call(&native));
                    session.conversation.push_assistant(history_text);
                    Action::Call(native)
                }
                (None, None, Some(call)) => {
                    session.conversation.push_assistant(reply.text.clone());
                    Action::Call(call)
                }
                (None, None, None) if parsed.display.is_empty() => {
                    Action::Answer("The model returned an empty response.".to_string())
                }
                (None, None, None) => Action::Answer(parsed.display),
            };

            match action {
                Action::Finish(summary) => {
                    session.conversation.push_assistant(reply.text);
                    let summary = if summary.is_empty() {
                        "Task complete.".to_string()
                    } else {
                        summary
                    };
                    info!(iterations = iteration, tool_calls, "Agent signalled completion");
                    sink.emit(AgentEvent::Done { summary: summary.clone() }).await;
                    return finish(FinishReason::Done, summary, iteration, tool_calls);
                }
                Action::Answer(answer) => {
                    session.conversation.push_assistant(reply.text);
                    info!(iterations = iteration, tool_calls, "Agent answered without a tool call");
                    sink.emit(AgentEvent::Done { summary: answer.clone() }).await;
                    return finish(FinishReason::NoAction, answer, iteration, tool_calls);
                }
                Action::Call(call) => {
                    tool_calls += 1;
                    sink.emit(AgentEvent::ToolCall {
                        tool: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .await;

                    let result = self.tools.dispatch(&workdir, &call).await;
                    let output = truncate_output(&result.output, self.config.history_output_limit);
                    info!(
                        tool = %call.name,
                        is_error = result.is_error,
                        output_len = result.output.len(),
                        "Tool call finished"
                    );

                    sink.emit(AgentEvent::ToolResult {
                        tool: call.name.clone(),
                        output: output.clone(),
                        is_error: result.is_error,
                    })
                    .await;
                    session
                        .conversation
                        .push_user(tool_result_turn(&call.name, &output, result.is_error));
                }
            }
        }
    }

    async fn call_model(
        &self,
        session: &AgentSession,
        system: &str,
        tools: &[ToolSpec],
        iteration: usize,
    ) -> Result<ModelReply, String> {
        let provider = session.model.provider();
        let llm_span = info_span!(
            "llm_call",
            iteration,
            provider = %provider,
            model = %session.model.model(),
            otel.name = "llm_call"
        );

        let start = Instant::now();
        let result = session
            .model
            .complete(ChatRequest {
                system,
                turns: session.conversation.turns(),
                tools,
            })
            .instrument(llm_span)
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(reply) => {
                LLM_CALL_DURATION
                    .with_label_values(&[provider.as_str(), "ok"])
                    .observe(elapsed);
                info!(iteration, duration_ms = elapsed * 1000.0, "LLM call completed");
                Ok(reply)
            }
            Err(e) => {
                LLM_CALL_DURATION
                    .with_label_values(&[provider.as_str(), "error"])
                    .observe(elapsed);
                warn!(iteration, error = %e, "LLM call failed");
                Err(format!("model call failed: {e}"))
            }
        }
    }
}
