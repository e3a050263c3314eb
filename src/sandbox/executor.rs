//! Sandbox Executor - the single entry point tool calls resolve to
//!
//! The executor picks a strategy per language, makes sure the persistent
//! isolate is up when needed, and turns whatever happened into a
//! [`SandboxResult`]. It never returns an error: unsupported languages,
//! timeouts, non-zero exits and isolation failures are all ordinary results
//! the calling agent can read on its next turn.
//!
//! # Persistent isolate sharing
//!
//! The persistent isolate is one shared, mutable resource. Only the
//! check-and-start step is serialized (so two callers never start it twice);
//! executions inside it are not, and concurrent runs may interleave writes in
//! `/workspace`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};

use super::backend::{IsolationBackend, SandboxError, SandboxRequest};
use super::language::Language;
use super::limits::SandboxPolicy;
use super::process::RawOutput;
use crate::metrics::{SANDBOX_DURATION, SANDBOX_EXECUTIONS};
use crate::protocol::truncate_output;

/// Shown instead of an empty string when a run printed nothing
pub const NO_OUTPUT_MARKER: &str = "(no output)";

/// Extra bytes captured past the output cap so overflow can be detected
const CAPTURE_SLACK: usize = 1024;

/// Metric label for language tags that did not parse
pub const UNSUPPORTED_LABEL: &str = "unsupported";

/// Which kind of isolate ran the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Ephemeral,
    Persistent,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Ephemeral => "ephemeral",
            Strategy::Persistent => "persistent",
        }
    }
}

/// Classification of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxOutcome {
    Success,
    NonzeroExit,
    Timeout,
    UnsupportedLanguage,
    LaunchFailure,
}

impl SandboxOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxOutcome::Success => "success",
            SandboxOutcome::NonzeroExit => "nonzero-exit",
            SandboxOutcome::Timeout => "timeout",
            SandboxOutcome::UnsupportedLanguage => "unsupported-language",
            SandboxOutcome::LaunchFailure => "launch-failure",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, SandboxOutcome::Success)
    }
}

/// Result of one sandbox execution
#[derive(Debug, Clone, Serialize)]
pub struct SandboxResult {
    pub outcome: SandboxOutcome,
    /// Combined stdout then stderr (truncated), or a failure description
    pub output: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub language: Option<Language>,
    pub strategy: Option<Strategy>,
    pub duration_ms: f64,
}

impl SandboxResult {
    fn unsupported(tag: &str) -> Self {
        Self {
            outcome: SandboxOutcome::UnsupportedLanguage,
            output: format!(
                "unsupported language '{}'. Supported languages: {}",
                tag,
                Language::supported_list()
            ),
            exit_code: None,
            timed_out: false,
            language: None,
            strategy: None,
            duration_ms: 0.0,
        }
    }

    fn launch_failure(language: Language, strategy: Strategy, error: &SandboxError, started: Instant) -> Self {
        Self {
            outcome: SandboxOutcome::LaunchFailure,
            output: error.to_string(),
            exit_code: None,
            timed_out: false,
            language: Some(language),
            strategy: Some(strategy),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Text an agent sees for this result
    pub fn render(&self, timeout_secs: u64) -> String {
        match self.outcome {
            SandboxOutcome::Success => self.output.clone(),
            SandboxOutcome::NonzeroExit => format!(
                "Exit code: {}\n{}",
                self.exit_code.unwrap_or(-1),
                self.output
            ),
            SandboxOutcome::Timeout => format!(
                "Execution timed out after {}s (process killed)\n{}",
                timeout_secs, self.output
            ),
            SandboxOutcome::UnsupportedLanguage => format!("Error: {}", self.output),
            SandboxOutcome::LaunchFailure => format!("Error: sandbox could not start: {}", self.output),
        }
    }
}

/// Merge stdout and stderr (stdout first), truncate, and mark empty output
pub fn merge_output(stdout: &str, stderr: &str, max_bytes: usize) -> String {
    let mut merged = String::with_capacity(stdout.len() + stderr.len() + 1);
    merged.push_str(stdout);
    if !stdout.is_empty() && !stderr.is_empty() && !stdout.ends_with('\n') {
        merged.push('\n');
    }
    merged.push_str(stderr);

    let merged = truncate_output(merged.trim_end(), max_bytes);
    if merged.trim().is_empty() {
        NO_OUTPUT_MARKER.to_string()
    } else {
        merged
    }
}

/// Runs code through an isolation backend under a fixed policy
pub struct SandboxExecutor {
    backend: Arc<dyn IsolationBackend>,
    policy: SandboxPolicy,
    persistent_start: Mutex<()>,
}

impl SandboxExecutor {
    pub fn new(backend: Arc<dyn IsolationBackend>, policy: SandboxPolicy) -> Self {
        Self {
            backend,
            policy,
            persistent_start: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Strategy a language will be routed to under this policy
    pub fn strategy_for(&self, language: Language) -> Strategy {
        if self.policy.persistent && language.uses_persistent() {
            Strategy::Persistent
        } else {
            Strategy::Ephemeral
        }
    }

    /// Execute `source` written in `language_tag`
    ///
    /// # Arguments
    /// * `language_tag` - Language name or alias ("python", "sh", ...)
    /// * `source` - Program text
    /// * `workdir` - Agent working directory exposed to ephemeral isolates
    pub async fn execute(&self, language_tag: &str, source: &str, workdir: Option<&Path>) -> SandboxResult {
        let Some(language) = Language::parse(language_tag) else {
            warn!(language = language_tag, "unsupported sandbox language");
            SANDBOX_EXECUTIONS
                .with_label_values(&[UNSUPPORTED_LABEL, SandboxOutcome::UnsupportedLanguage.as_str()])
                .inc();
            return SandboxResult::unsupported(language_tag);
        };

        let strategy = self.strategy_for(language);
        let span = info_span!(
            "sandbox_exec",
            backend = self.backend.name(),
            language = %language,
            strategy = strategy.as_str(),
            source_len = source.len(),
        );

        let result = self
            .execute_resolved(language, strategy, source, workdir)
            .instrument(span)
            .await;

        SANDBOX_EXECUTIONS
            .with_label_values(&[language.as_str(), result.outcome.as_str()])
            .inc();
        SANDBOX_DURATION
            .with_label_values(&[strategy.as_str()])
            .observe(result.duration_ms / 1000.0);

        result
    }

    async fn execute_resolved(
        &self,
        language: Language,
        strategy: Strategy,
        source: &str,
        workdir: Option<&Path>,
    ) -> SandboxResult {
        let started = Instant::now();
        let request = SandboxRequest {
            language,
            source: source.to_string(),
            timeout: self.policy.timeout,
            limits: self.policy.limits.clone(),
            network: self.policy.network,
            workdir: workdir.map(Path::to_path_buf),
            capture_limit: self.policy.max_output_bytes + CAPTURE_SLACK,
        };

        let raw = match strategy {
            Strategy::Ephemeral => self.backend.run_ephemeral(&request).await,
            Strategy::Persistent => match self.ensure_persistent().await {
                Ok(()) => self.backend.run_persistent(&request).await,
                Err(e) => Err(e),
            },
        };

        match raw {
            Ok(raw) => self.classify(language, strategy, raw),
            Err(e) => {
                warn!(error = %e, "sandbox launch failed");
                SandboxResult::launch_failure(language, strategy, &e, started)
            }
        }
    }

    /// Start the persistent isolate if it is not running
    async fn ensure_persistent(&self) -> Result<(), SandboxError> {
        let _guard = self.persistent_start.lock().await;
        if self.backend.persistent_running().await {
            return Ok(());
        }
        info!(backend = self.backend.name(), "persistent isolate not running, starting it");
        self.backend
            .start_persistent(&self.policy.limits, self.policy.network)
            .await
    }

    fn classify(&self, language: Language, strategy: Strategy, raw: RawOutput) -> SandboxResult {
        let output = merge_output(&raw.stdout, &raw.stderr, self.policy.max_output_bytes);
        let outcome = if raw.timed_out {
            SandboxOutcome::Timeout
        } else if raw.exit_code == Some(0) {
            SandboxOutcome::Success
        } else {
            SandboxOutcome::NonzeroExit
        };

        info!(
            outcome = outcome.as_str(),
            exit_code = ?raw.exit_code,
            duration_ms = raw.duration.as_secs_f64() * 1000.0,
            "sandbox execution finished"
        );

        SandboxResult {
            outcome,
            output,
            exit_code: raw.exit_code,
            timed_out: raw.timed_out,
            language: Some(language),
            strategy: Some(strategy),
            duration_ms: raw.duration.as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_order_and_empty_marker() {
        assert_eq!(merge_output("out", "err", 1024), "out\nerr");
        assert_eq!(merge_output("out\n", "err\n", 1024), "out\nerr");
        assert_eq!(merge_output("", "", 1024), NO_OUTPUT_MARKER);
        assert_eq!(merge_output("  \n", "", 1024), NO_OUTPUT_MARKER);
    }

    #[test]
    fn test_merge_truncates() {
        let big = "a".repeat(10_000);
        assert!(merge_output(&big, "", 500).len() <= 500);
    }

    #[test]
    fn test_render_labels_timeouts_distinctly() {
        let timeout = SandboxResult {
            outcome: SandboxOutcome::Timeout,
            output: NO_OUTPUT_MARKER.to_string(),
            exit_code: None,
            timed_out: true,
            language: Some(Language::Python),
            strategy: Some(Strategy::Ephemeral),
            duration_ms: 1.0,
        };
        assert!(timeout.render(30).starts_with("Execution timed out after 30s"));

        let failed = SandboxResult {
            outcome: SandboxOutcome::NonzeroExit,
            exit_code: Some(2),
            timed_out: false,
            ..timeout.clone()
        };
        assert!(failed.render(30).starts_with("Exit code: 2\n"));
    }

    #[test]
    fn test_unsupported_lists_languages() {
        let result = SandboxResult::unsupported("cobol");
        assert_eq!(result.outcome, SandboxOutcome::UnsupportedLanguage);
        assert!(result.render(30).contains("python, javascript"));
    }
}
