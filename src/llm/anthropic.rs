//! Anthropic Messages API client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::message::coalesce;
use super::{read_json, ChatError, ChatModel, ChatRequest, ModelReply, Provider};
use crate::tools::ToolInvocation;

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

/// Client for `POST /v1/messages`
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn body(&self, request: &ChatRequest<'_>) -> serde_json::Value {
        // The API requires strictly alternating roles.
        let messages: Vec<_> = coalesce(request.turns)
            .into_iter()
            .map(|t| json!({"role": t.role.as_str(), "content": t.content}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages,
        });
        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }
        if !request.tools.is_empty() {
            body["tools"] = request.tools.iter().map(|t| t.to_anthropic()).collect();
        }
        body
    }
}

impl From<MessagesResponse> for ModelReply {
    fn from(response: MessagesResponse) -> Self {
        let mut text = String::new();
        let mut native_call = None;
        for block in response.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(&t),
                ContentBlock::ToolUse { name, input } if native_call.is_none() => {
                    native_call = Some(ToolInvocation::from_json(name, &input));
                }
                _ => {}
            }
        }
        ModelReply { text, native_call }
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelReply, ChatError> {
        let endpoint = format!("{}/v1/messages", self.base_url);
        let response = self
            .http
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.body(&request))
            .send()
            .await?;
        let messages: MessagesResponse = read_json(Provider::Anthropic, response).await?;
        Ok(messages.into())
    }
}
