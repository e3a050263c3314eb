//! Ollama Chat API with tool calling support
//!
//! Client for Ollama's `/api/chat` endpoint. Tools are offered in the
//! OpenAI `function` format, which Ollama accepts as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{read_json, ChatError, ChatModel, ChatRequest, ModelReply, Provider};
use crate::tools::ToolInvocation;

/// A message in an Ollama chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant"
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: None,
        }
    }
}

/// A tool call from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

/// Client for Ollama's /api/chat endpoint
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn body(&self, request: &ChatRequest<'_>) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system.is_empty() {
            messages.push(ChatMessage::new("system", request.system));
        }
        messages.extend(
            request
                .turns
                .iter()
                .map(|t| ChatMessage::new(t.role.as_str(), &t.content)),
        );

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": 0.0
            }
        });
        if !request.tools.is_empty() {
            body["tools"] = request.tools.iter().map(|t| t.to_openai()).collect();
        }
        body
    }
}

impl From<ChatResponse> for ModelReply {
    fn from(response: ChatResponse) -> Self {
        let native_call = response
            .message
            .tool_calls
            .and_then(|calls| calls.into_iter().next())
            .map(|call| ToolInvocation::from_json(call.function.name, &call.function.arguments));
        ModelReply {
            text: response.message.content,
            native_call,
        }
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelReply, ChatError> {
        let endpoint = format!("{}/api/chat", self.base_url);
        let response = self.http.post(&endpoint).json(&self.body(&request)).send().await?;
        let chat: ChatResponse = read_json(Provider::Ollama, response).await?;
        Ok(chat.into())
    }
}
