//! Model providers
//!
//! Every provider is reached over HTTP with `reqwest` and normalized to one
//! shape: a [`ChatRequest`] (system prompt, conversation, tool specs) in and
//! a [`ModelReply`] (text plus an optional native tool call) out.
//!
//! ```text
//! AgentProfile ──► ModelFactory::build ──► Arc<dyn ChatModel>
//!                                            │
//!                    ┌───────────┬───────────┼───────────┐
//!                    ▼           ▼           ▼           ▼
//!                 Ollama      OpenAI     Anthropic     Gemini
//!               /api/chat  /v1/chat/…  /v1/messages  :generateContent
//! ```

pub mod anthropic;
pub mod gemini;
pub mod message;
pub mod ollama;
pub mod openai;
pub mod provider;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::tools::{ToolInvocation, ToolSpec};

pub use message::{Conversation, ConversationTurn, Role};
pub use provider::{AgentProfile, ModelFactory, Provider, ProviderFactory, ProviderUrls};

/// Error type for model calls
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{provider} API returned {status}: {body}")]
    Api {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("empty response from {0}")]
    EmptyResponse(Provider),

    #[error("{0} requires an API key")]
    MissingApiKey(Provider),

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
}

/// One model call
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub turns: &'a [ConversationTurn],
    /// Tools offered natively; empty for single-shot calls
    pub tools: &'a [ToolSpec],
}

/// A model's answer, normalized across providers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    /// Tool call returned through the provider's function-calling channel
    pub native_call: Option<ToolInvocation>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            native_call: None,
        }
    }
}

/// A chat model bound to one provider, model id and credential
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelReply, ChatError>;
}

/// Decode a JSON response body, turning non-2xx statuses into [`ChatError::Api`]
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T, ChatError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ChatError::Api {
            provider,
            status: status.as_u16(),
            body: crate::protocol::truncate_output(text.trim(), 2048),
        });
    }
    if text.trim().is_empty() {
        return Err(ChatError::EmptyResponse(provider));
    }
    Ok(serde_json::from_str(&text)?)
}
