//! OpenAI chat completions client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{read_json, ChatError, ChatModel, ChatRequest, ModelReply, Provider};
use crate::tools::ToolInvocation;

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    arguments: String,
}

/// Client for `POST /v1/chat/completions`
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
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
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        for turn in request.turns {
            messages.push(json!({"role": turn.role.as_str(), "content": turn.content}));
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = request.tools.iter().map(|t| t.to_openai()).collect();
            body["parallel_tool_calls"] = json!(false);
        }
        body
    }
}

fn into_reply(response: CompletionResponse) -> Result<ModelReply, ChatError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ChatError::EmptyResponse(Provider::OpenAi))?;
    let native_call = match choice.message.tool_calls.into_iter().next() {
        Some(call) => {
            let args: serde_json::Value = if call.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.function.arguments)?
            };
            Some(ToolInvocation::from_json(call.function.name, &args))
        }
        None => None,
    };
    Ok(ModelReply {
        text: choice.message.content.unwrap_or_default(),
        native_call,
    })
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelReply, ChatError> {
        let endpoint = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await?;
        into_reply(read_json(Provider::OpenAi, response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_arguments_are_decoded() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[
                {"id":"c1","type":"function","function":{"name":"read_file","arguments":"{\"path\":\"a.txt\"}"}}
            ]}}]}"#,
        )
        .unwrap();
        let reply = into_reply(response).unwrap();
        assert_eq!(reply.text, "");
        assert_eq!(reply.native_call.unwrap().arg("path"), Some("a.txt"));
    }

    #[test]
    fn test_no_choices_is_empty_response() {
        let response: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(into_reply(response), Err(ChatError::EmptyResponse(Provider::OpenAi))));
    }
}
