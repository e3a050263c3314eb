//! SSE run endpoints
//!
//! Each request spawns the run on its own task and streams events from an
//! `EventSink` channel. Dropping the response (client disconnect) closes the
//! channel, which the agent loop and orchestrator observe at their next
//! iteration or round boundary.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{info, warn};

use super::AppState;
use crate::agent::{AgentEvent, AgentSession};
use crate::events::{EventSink, DEFAULT_EVENT_BUFFER};
use crate::llm::{AgentProfile, ConversationTurn};
use crate::metrics::ACTIVE_STREAMS;
use crate::orchestrator::{OrchestrationRequest, OrchestratorEvent};

/// Body of `POST /api/agents/run`
#[derive(Debug, Clone, Deserialize)]
pub struct AgentRunRequest {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    pub task: String,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

impl AgentRunRequest {
    fn profile(&self) -> AgentProfile {
        AgentProfile {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

pub(crate) async fn run_agent(
    State(state): State<AppState>,
    Json(request): Json<AgentRunRequest>,
) -> Response {
    if let Err(rejected) = state.admit("agents") {
        return rejected;
    }
    let (sink, events) = EventSink::channel(DEFAULT_EVENT_BUFFER);
    tokio::spawn(async move { start_agent(state, request, sink).await });
    event_stream(events).into_response()
}

async fn start_agent(state: AppState, request: AgentRunRequest, sink: EventSink<AgentEvent>) {
    let fail = |message: String| AgentEvent::Error { message };

    if request.task.trim().is_empty() {
        sink.emit(fail("task is empty".to_string())).await;
        return;
    }
    let model = match state.factory.build(&request.profile()) {
        Ok(model) => model,
        Err(e) => {
            warn!(provider = %request.provider, error = %e, "rejected agent profile");
            sink.emit(fail(e.to_string())).await;
            return;
        }
    };

    let name = request
        .agent_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "agent".to_string());
    let max_iterations = state.agents.config().iteration_ceiling(request.max_iterations);

    let mut session = match AgentSession::new(name, model, request.conversation, max_iterations) {
        Ok(session) => session.with_system_prompt(request.system_prompt),
        Err(e) => {
            sink.emit(fail(format!("could not create session workdir: {e}"))).await;
            return;
        }
    };

    let outcome = state.agents.run(&mut session, &request.task, &sink).await;
    info!(
        session_id = %session.id,
        reason = outcome.reason.as_str(),
        iterations = outcome.iterations,
        "agent stream finished"
    );
}

pub(crate) async fn run_orchestration(
    State(state): State<AppState>,
    Json(request): Json<OrchestrationRequest>,
) -> Response {
    if let Err(rejected) = state.admit("orchestrations") {
        return rejected;
    }
    let (sink, events) = EventSink::<OrchestratorEvent>::channel(DEFAULT_EVENT_BUFFER);
    tokio::spawn(async move {
        let outcome = state.orchestrator.run(request, &sink).await;
        info!(
            status = outcome.status.as_str(),
            rounds = outcome.rounds.len(),
            "orchestration stream finished"
        );
    });
    event_stream(events).into_response()
}

/// Decrements the open-stream gauge when the response body is dropped
struct StreamGuard;

impl StreamGuard {
    fn open() -> Self {
        ACTIVE_STREAMS.inc();
        StreamGuard
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        ACTIVE_STREAMS.dec();
    }
}

/// Serialize each event as one `data:` line; ends when the sender is dropped
fn event_stream<T>(events: mpsc::Receiver<T>) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    let guard = StreamGuard::open();
    let stream = ReceiverStream::new(events).filter_map(move |event| {
        let _open = &guard;
        match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(Event::default().data(data))),
            Err(e) => {
                warn!(error = %e, "failed to serialize stream event");
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
