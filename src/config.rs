//! Server configuration
//!
//! Every option is a CLI flag with an `AGENTVISOR_*` environment fallback.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::agent::AgentConfig;
use crate::llm::ProviderUrls;
use crate::orchestrator::OrchestratorConfig;
use crate::sandbox::{
    DockerBackend, DockerConfig, HostBackend, IsolationBackend, Language, ResourceLimits,
    SandboxPolicy,
};

/// Isolation layer used by the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Docker containers (production)
    Docker,
    /// Plain host processes, no isolation (development only)
    Host,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid image override '{0}', expected LANGUAGE=IMAGE")]
    ImageOverride(String),

    #[error("unknown language '{0}' in image override")]
    UnknownLanguage(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{default} ({value}) exceeds {limit} ({cap})")]
    AboveLimit {
        default: &'static str,
        value: usize,
        limit: &'static str,
        cap: usize,
    },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "agentvisor")]
#[command(about = "Multi-agent LLM runtime with sandboxed tool execution")]
#[command(version)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[arg(long, env = "AGENTVISOR_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Isolation backend for code execution
    #[arg(long, env = "AGENTVISOR_BACKEND", value_enum, default_value_t = BackendKind::Docker)]
    pub backend: BackendKind,

    /// Docker binary
    #[arg(long, env = "AGENTVISOR_DOCKER_BIN", default_value = "docker")]
    pub docker_bin: String,

    /// Image overrides, e.g. `--image python=python:3.11-slim`
    #[arg(long = "image", env = "AGENTVISOR_IMAGES", value_delimiter = ',')]
    pub images: Vec<String>,

    /// Container name of the persistent isolate
    #[arg(long, env = "AGENTVISOR_PERSISTENT_NAME", default_value = "agentvisor-persistent")]
    pub persistent_name: String,

    /// Volume mounted at /workspace in the persistent isolate
    #[arg(long, env = "AGENTVISOR_PERSISTENT_VOLUME", default_value = "agentvisor-workspace")]
    pub persistent_volume: String,

    /// Directory backing the persistent isolate of the host backend
    #[arg(long, env = "AGENTVISOR_HOST_WORKSPACE")]
    pub host_workspace: Option<PathBuf>,

    /// Disable the persistent isolate; every run is ephemeral
    #[arg(long, env = "AGENTVISOR_NO_PERSISTENT", default_value_t = false)]
    pub no_persistent: bool,

    /// Wall-clock limit per execution, in seconds
    #[arg(long, env = "AGENTVISOR_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Memory ceiling per isolate, in MiB
    #[arg(long, env = "AGENTVISOR_MEMORY_MB", default_value_t = 512)]
    pub memory_mb: u64,

    /// CPU share per isolate, in cores
    #[arg(long, env = "AGENTVISOR_CPUS", default_value_t = 1.0)]
    pub cpus: f64,

    /// Process ceiling per isolate
    #[arg(long, env = "AGENTVISOR_PIDS", default_value_t = 128)]
    pub pids: u32,

    /// Give isolates network access
    #[arg(long, env = "AGENTVISOR_NETWORK", default_value_t = false)]
    pub network: bool,

    /// Register the fetch_url tool
    #[arg(long, env = "AGENTVISOR_NETWORK_TOOLS", default_value_t = false)]
    pub network_tools: bool,

    /// Sandbox output cap, in bytes
    #[arg(long, env = "AGENTVISOR_MAX_OUTPUT_BYTES", default_value_t = 32 * 1024)]
    pub max_output_bytes: usize,

    /// Default iteration ceiling for agent runs
    #[arg(long, env = "AGENTVISOR_MAX_ITERATIONS", default_value_t = 10)]
    pub max_iterations: usize,

    /// Default round budget for orchestrations
    #[arg(long, env = "AGENTVISOR_MAX_ROUNDS", default_value_t = 3)]
    pub max_rounds: usize,

    /// Largest iteration ceiling a request may ask for
    #[arg(long, env = "AGENTVISOR_ITERATION_LIMIT", default_value_t = 50)]
    pub iteration_limit: usize,

    /// Largest round budget a request may ask for
    #[arg(long, env = "AGENTVISOR_ROUND_LIMIT", default_value_t = 10)]
    pub round_limit: usize,

    /// Do not offer tools through provider function-calling APIs
    #[arg(long, env = "AGENTVISOR_TEXT_TOOLS_ONLY", default_value_t = false)]
    pub text_tools_only: bool,

    /// Model request timeout, in seconds
    #[arg(long, env = "AGENTVISOR_LLM_TIMEOUT_SECS", default_value_t = 300)]
    pub llm_timeout_secs: u64,

    #[arg(long, env = "AGENTVISOR_OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    #[arg(long, env = "AGENTVISOR_OPENAI_URL", default_value = "https://api.openai.com")]
    pub openai_url: String,

    #[arg(long, env = "AGENTVISOR_ANTHROPIC_URL", default_value = "https://api.anthropic.com")]
    pub anthropic_url: String,

    #[arg(
        long,
        env = "AGENTVISOR_GEMINI_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_url: String,

    /// Run-endpoint burst size
    #[arg(long, env = "AGENTVISOR_RATE_BURST", default_value_t = 20)]
    pub rate_burst: u64,

    /// Run-endpoint sustained rate, per second
    #[arg(long, env = "AGENTVISOR_RATE_PER_SEC", default_value_t = 2.0)]
    pub rate_per_sec: f64,

    /// OTLP collector endpoint; traces are only exported when set
    #[arg(long, env = "AGENTVISOR_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "AGENTVISOR_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Zero("timeout-secs"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Zero("max-iterations"));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::Zero("max-rounds"));
        }
        if self.max_iterations > self.iteration_limit {
            return Err(ConfigError::AboveLimit {
                default: "max-iterations",
                value: self.max_iterations,
                limit: "iteration-limit",
                cap: self.iteration_limit,
            });
        }
        if self.max_rounds > self.round_limit {
            return Err(ConfigError::AboveLimit {
                default: "max-rounds",
                value: self.max_rounds,
                limit: "round-limit",
                cap: self.round_limit,
            });
        }
        self.image_overrides()?;
        Ok(())
    }

    fn image_overrides(&self) -> Result<Vec<(Language, String)>, ConfigError> {
        self.images
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|entry| {
                let (lang, image) = entry
                    .split_once('=')
                    .ok_or_else(|| ConfigError::ImageOverride(entry.clone()))?;
                let language = Language::parse(lang)
                    .ok_or_else(|| ConfigError::UnknownLanguage(lang.to_string()))?;
                Ok((language, image.trim().to_string()))
            })
            .collect()
    }

    pub fn sandbox_policy(&self) -> SandboxPolicy {
        SandboxPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            limits: ResourceLimits::custom(self.cpus, self.memory_mb, self.pids),
            network: self.network,
            max_output_bytes: self.max_output_bytes,
            persistent: !self.no_persistent,
        }
    }

    pub fn isolation_backend(&self) -> Result<Arc<dyn IsolationBackend>, ConfigError> {
        Ok(match self.backend {
            BackendKind::Docker => {
                let mut docker = DockerConfig {
                    docker_bin: self.docker_bin.clone(),
                    persistent_name: self.persistent_name.clone(),
                    persistent_volume: self.persistent_volume.clone(),
                    ..DockerConfig::default()
                };
                for (language, image) in self.image_overrides()? {
                    if language == Language::DEFAULT {
                        docker.persistent_image = image.clone();
                    }
                    docker.images.insert(language, image);
                }
                Arc::new(DockerBackend::new(docker))
            }
            BackendKind::Host => {
                let dir = self
                    .host_workspace
                    .clone()
                    .unwrap_or_else(|| std::env::temp_dir().join("agentvisor-workspace"));
                Arc::new(HostBackend::new(dir))
            }
        })
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations,
            iteration_limit: self.iteration_limit,
            native_tools: !self.text_tools_only,
            ..AgentConfig::default()
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_rounds: self.max_rounds,
            round_limit: self.round_limit,
            agent_max_iterations: self.max_iterations,
            ..OrchestratorConfig::default()
        }
    }

    pub fn provider_urls(&self) -> ProviderUrls {
        ProviderUrls {
            ollama: self.ollama_url.clone(),
            openai: self.openai_url.clone(),
            anthropic: self.anthropic_url.clone(),
            gemini: self.gemini_url.clone(),
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            BackendKind::Docker => "docker",
            BackendKind::Host => "host",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["agentvisor"]);
        assert_eq!(config.backend, BackendKind::Docker);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_rounds, 3);
        assert!(config.validate().is_ok());

        let policy = config.sandbox_policy();
        assert!(!policy.network);
        assert!(policy.persistent);
        assert_eq!(policy.max_output_bytes, 32 * 1024);
    }

    #[test]
    fn test_image_overrides() {
        let config = ServerConfig::parse_from([
            "agentvisor",
            "--image",
            "py=python:3.11-slim",
            "--image",
            "node=node:22",
        ]);
        let overrides = config.image_overrides().unwrap();
        assert_eq!(overrides[0], (Language::Python, "python:3.11-slim".to_string()));
        assert_eq!(overrides[1].0, Language::JavaScript);

        let bad = ServerConfig::parse_from(["agentvisor", "--image", "cobol=x"]);
        assert!(matches!(bad.validate(), Err(ConfigError::UnknownLanguage(_))));
    }

    #[test]
    fn test_default_above_limit_rejected() {
        let config = ServerConfig::parse_from(["agentvisor", "--max-rounds", "20", "--round-limit", "5"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AboveLimit { default: "max-rounds", cap: 5, .. })
        ));

        let config = ServerConfig::parse_from(["agentvisor", "--iteration-limit", "25"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.agent_config().iteration_limit, 25);
        assert_eq!(config.orchestrator_config().round_limit, 10);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ServerConfig::parse_from(["agentvisor", "--timeout-secs", "0", "--backend", "host"]);
        assert!(matches!(config.validate(), Err(ConfigError::Zero(_))));
    }
}
