//! Shared fakes for integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Barrier};

use agentvisor::agent::{AgentConfig, AgentLoop};
use agentvisor::llm::{
    AgentProfile, ChatError, ChatModel, ChatRequest, ConversationTurn, ModelFactory, ModelReply,
    Provider,
};
use agentvisor::sandbox::{HostBackend, SandboxExecutor, SandboxPolicy};
use agentvisor::tools::ToolRegistry;

/// A chat model that replays canned replies in order
pub struct ScriptedModel {
    name: String,
    replies: Mutex<VecDeque<Result<ModelReply, ChatError>>>,
    fallback: Option<String>,
    barrier: Option<Arc<Barrier>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ConversationTurn>>>,
    systems: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(name: &str, replies: Vec<&str>) -> Arc<Self> {
        Self::build(name, replies.into_iter().map(|r| Ok(ModelReply::text(r))).collect(), None, None)
    }

    pub fn with_replies(name: &str, replies: Vec<Result<ModelReply, ChatError>>) -> Arc<Self> {
        Self::build(name, replies, None, None)
    }

    /// Answers every call with the same text
    pub fn repeating(name: &str, reply: &str) -> Arc<Self> {
        Self::build(name, Vec::new(), Some(reply.to_string()), None)
    }

    /// Waits on `barrier` before answering each call
    pub fn gated(name: &str, replies: Vec<&str>, barrier: Arc<Barrier>) -> Arc<Self> {
        Self::build(
            name,
            replies.into_iter().map(|r| Ok(ModelReply::text(r))).collect(),
            None,
            Some(barrier),
        )
    }

    /// Sleeps for `delay` before answering each call
    pub fn slow(name: &str, replies: Vec<&str>, delay: Duration) -> Arc<Self> {
        let model = Self {
            delay: Some(delay),
            ..Self::fields(name, replies.into_iter().map(|r| Ok(ModelReply::text(r))).collect(), None, None)
        };
        Arc::new(model)
    }

    fn build(
        name: &str,
        replies: Vec<Result<ModelReply, ChatError>>,
        fallback: Option<String>,
        barrier: Option<Arc<Barrier>>,
    ) -> Arc<Self> {
        Arc::new(Self::fields(name, replies, fallback, barrier))
    }

    fn fields(
        name: &str,
        replies: Vec<Result<ModelReply, ChatError>>,
        fallback: Option<String>,
        barrier: Option<Arc<Barrier>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(replies.into()),
            fallback,
            barrier,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            systems: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Conversation passed to each call
    pub fn requests(&self) -> Vec<Vec<ConversationTurn>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn system_prompts(&self) -> Vec<String> {
        self.systems.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn model(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelReply, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.turns.to_vec());
        self.systems.lock().unwrap().push(request.system.to_string());

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(text)) => Ok(ModelReply::text(text.clone())),
            (None, None) => Err(ChatError::EmptyResponse(Provider::Ollama)),
        }
    }
}

/// Hands out scripted models by profile model name
#[derive(Default)]
pub struct ScriptedFactory {
    models: HashMap<String, Arc<ScriptedModel>>,
}

impl ScriptedFactory {
    pub fn with(mut self, model: Arc<ScriptedModel>) -> Self {
        self.models.insert(model.name.clone(), model);
        self
    }
}

impl ModelFactory for ScriptedFactory {
    fn build(&self, profile: &AgentProfile) -> Result<Arc<dyn ChatModel>, ChatError> {
        profile.provider()?;
        let model: Arc<dyn ChatModel> = self
            .models
            .get(&profile.model)
            .unwrap_or_else(|| panic!("no scripted model named {}", profile.model))
            .clone();
        Ok(model)
    }
}

pub fn profile(model: &str) -> AgentProfile {
    AgentProfile {
        provider: "ollama".to_string(),
        model: model.to_string(),
        ..AgentProfile::default()
    }
}

/// Host-backed tool registry with a short timeout
pub fn host_registry(persistent_dir: &std::path::Path) -> Arc<ToolRegistry> {
    let policy = SandboxPolicy {
        timeout: Duration::from_secs(10),
        ..SandboxPolicy::default()
    };
    let executor = SandboxExecutor::new(Arc::new(HostBackend::new(persistent_dir)), policy);
    Arc::new(ToolRegistry::new(Arc::new(executor), false))
}

pub fn host_loop(persistent_dir: &std::path::Path, max_iterations: usize) -> Arc<AgentLoop> {
    Arc::new(AgentLoop::new(
        host_registry(persistent_dir),
        AgentConfig {
            max_iterations,
            ..AgentConfig::default()
        },
    ))
}

/// Text-protocol block calling run_shell
pub fn shell_call(command: &str) -> String {
    format!(
        "<tool_call>\n<tool_name>run_shell</tool_name>\n<parameters>\n<command>{command}</command>\n</parameters>\n</tool_call>"
    )
}

pub fn drain<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
