//! Gemini `generateContent` client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::message::coalesce;
use super::{read_json, ChatError, ChatModel, ChatRequest, ModelReply, Provider, Role};
use crate::tools::ToolInvocation;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Client for `POST /v1beta/models/{model}:generateContent`
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
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
        let contents: Vec<_> = coalesce(request.turns)
            .into_iter()
            .map(|t| {
                let role = match t.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({"role": role, "parts": [{"text": t.content}]})
            })
            .collect();

        let mut body = json!({ "contents": contents });
        if !request.system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": request.system}]});
        }
        if !request.tools.is_empty() {
            let declarations: Vec<_> = request.tools.iter().map(|t| t.to_gemini()).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        body
    }
}

fn into_reply(response: GenerateResponse) -> Result<ModelReply, ChatError> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or(ChatError::EmptyResponse(Provider::Gemini))?;

    let mut reply = ModelReply::default();
    for part in content.parts {
        if let Some(text) = part.text {
            reply.text.push_str(&text);
        }
        if reply.native_call.is_none() {
            if let Some(call) = part.function_call {
                reply.native_call = Some(ToolInvocation::from_json(call.name, &call.args));
            }
        }
    }
    Ok(reply)
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelReply, ChatError> {
        let endpoint = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.body(&request))
            .send()
            .await?;
        into_reply(read_json(Provider::Gemini, response).await?)
    }
}
