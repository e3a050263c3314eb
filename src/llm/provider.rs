//! Provider selection and client construction

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::anthropic::AnthropicClient;
use super::gemini::GeminiClient;
use super::ollama::OllamaClient;
use super::openai::OpenAiClient;
use super::{ChatError, ChatModel};

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(ChatError::UnknownProvider(other.to_string())),
        }
    }
}

/// Default endpoints per provider, overridable per profile
#[derive(Debug, Clone)]
pub struct ProviderUrls {
    pub ollama: String,
    pub openai: String,
    pub anthropic: String,
    pub gemini: String,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            ollama: "http://localhost:11434".to_string(),
            openai: "https://api.openai.com".to_string(),
            anthropic: "https://api.anthropic.com".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl ProviderUrls {
    pub fn for_provider(&self, provider: Provider) -> &str {
        match provider {
            Provider::Ollama => &self.ollama,
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::Gemini => &self.gemini,
        }
    }
}

/// Which model an agent talks to, and with what credential
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentProfile {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl AgentProfile {
    pub fn provider(&self) -> Result<Provider, ChatError> {
        self.provider.parse()
    }
}

/// Builds chat models from profiles
pub trait ModelFactory: Send + Sync {
    fn build(&self, profile: &AgentProfile) -> Result<Arc<dyn ChatModel>, ChatError>;
}

/// Factory producing real HTTP clients
#[derive(Clone)]
pub struct ProviderFactory {
    http: reqwest::Client,
    urls: ProviderUrls,
}

impl ProviderFactory {
    pub fn new(urls: ProviderUrls, request_timeout: Duration) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, urls })
    }
}

impl ModelFactory for ProviderFactory {
    fn build(&self, profile: &AgentProfile) -> Result<Arc<dyn ChatModel>, ChatError> {
        let provider = profile.provider()?;
        let base_url = profile
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.urls.for_provider(provider))
            .trim_end_matches('/')
            .to_string();
        let api_key = profile
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty());
        if provider.requires_api_key() && api_key.is_none() {
            return Err(ChatError::MissingApiKey(provider));
        }
        let api_key = api_key.unwrap_or_default();
        let http = self.http.clone();
        let model = profile.model.clone();

        Ok(match provider {
            Provider::Ollama => Arc::new(OllamaClient::new(http, base_url, model)),
            Provider::OpenAi => Arc::new(OpenAiClient::new(http, base_url, model, api_key)),
            Provider::Anthropic => Arc::new(AnthropicClient::new(http, base_url, model, api_key)),
            Provider::Gemini => Arc::new(GeminiClient::new(http, base_url, model, api_key)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(provider: &str, key: Option<&str>) -> AgentProfile {
        AgentProfile {
            provider: provider.to_string(),
            model: "m".to_string(),
            api_key: key.map(String::from),
            ..AgentProfile::default()
        }
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!(matches!(
            "mistral".parse::<Provider>(),
            Err(ChatError::UnknownProvider(p)) if p == "mistral"
        ));
    }

    #[test]
    fn test_factory_checks_credentials() {
        let factory = ProviderFactory::new(ProviderUrls::default(), Duration::from_secs(5)).unwrap();
        assert!(factory.build(&profile("ollama", None)).is_ok());
        assert!(matches!(
            factory.build(&profile("openai", None)),
            Err(ChatError::MissingApiKey(Provider::OpenAi))
        ));
        let model = factory.build(&profile("gemini", Some("k"))).unwrap();
        assert_eq!(model.provider(), Provider::Gemini);
        assert_eq!(model.model(), "m");
    }
}
