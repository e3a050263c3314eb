//! Tool Registry - the fixed tool set and its dispatch
//!
//! ```text
//! ToolInvocation ──► dispatch ──┬─► execute_code ─► SandboxExecutor (language)
//!                               ├─► run_shell ────► SandboxExecutor (shell)
//!                               ├─► read_file / write_file / list_files
//!                               │                   (agent working directory)
//!                               └─► fetch_url ────► reqwest (if enabled)
//! ```
//!
//! Dispatch never fails: every problem, including unknown tools and missing
//! parameters, comes back as a [`ToolResult`] with `is_error` set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info_span, warn, Instrument};

use super::fs;
use super::invocation::{ToolInvocation, ToolResult};
use super::spec::{ParamType, ToolParam, ToolSpec};
use super::ToolError;
use crate::metrics::TOOL_CALLS;
use crate::protocol::truncate_output;
use crate::sandbox::{Language, SandboxExecutor};

pub const EXECUTE_CODE: &str = "execute_code";
pub const RUN_SHELL: &str = "run_shell";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_FILES: &str = "list_files";
pub const FETCH_URL: &str = "fetch_url";

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-dispatch context
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Private working directory of the calling agent
    pub workdir: PathBuf,
}

impl ToolContext {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

/// The tool set available to every agent
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    executor: Arc<SandboxExecutor>,
    http: Option<reqwest::Client>,
}

impl ToolRegistry {
    /// Build the standard registry
    ///
    /// # Arguments
    /// * `executor` - Sandbox used by `execute_code` and `run_shell`
    /// * `network_tools` - Whether to register `fetch_url`
    pub fn new(executor: Arc<SandboxExecutor>, network_tools: bool) -> Self {
        let mut specs = builtin_specs();
        let http = if network_tools {
            specs.push(fetch_url_spec());
            reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .map_err(|e| warn!(error = %e, "http client unavailable, fetch_url disabled"))
                .ok()
        } else {
            None
        };
        if network_tools && http.is_none() {
            specs.retain(|s| s.name != FETCH_URL);
        }
        Self {
            specs,
            executor,
            http,
        }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn executor(&self) -> &Arc<SandboxExecutor> {
        &self.executor
    }

    /// Text manual describing every tool, for the system prompt
    pub fn manual(&self) -> String {
        self.specs
            .iter()
            .map(ToolSpec::manual_entry)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run one invocation
    pub async fn dispatch(&self, ctx: &ToolContext, invocation: &ToolInvocation) -> ToolResult {
        let span = info_span!("tool_call", tool = %invocation.name);
        let result = match self.dispatch_inner(ctx, invocation).instrument(span).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(format!("Error: {e}")),
        };

        let status = if result.is_error { "error" } else { "ok" };
        let label = if self.get(&invocation.name).is_some() {
            invocation.name.as_str()
        } else {
            "unknown"
        };
        TOOL_CALLS.with_label_values(&[label, status]).inc();
        result
    }

    async fn dispatch_inner(
        &self,
        ctx: &ToolContext,
        invocation: &ToolInvocation,
    ) -> Result<ToolResult, ToolError> {
        let spec = self
            .get(&invocation.name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: invocation.name.clone(),
                available: self.specs.iter().map(|s| s.name.clone()).collect::<Vec<_>>().join(", "),
            })?;

        for required in spec.required_params() {
            if invocation.arg(required).is_none() {
                return Err(ToolError::MissingParameter {
                    tool: spec.name.clone(),
                    param: required.to_string(),
                });
            }
        }

        let workdir = ctx.workdir.as_path();
        let timeout_secs = self.executor.policy().timeout.as_secs();
        match spec.name.as_str() {
            EXECUTE_CODE => {
                let language = invocation
                    .arg("language")
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or(Language::DEFAULT.as_str());
                let code = required_arg(invocation, "code")?;
                if code.trim().is_empty() {
                    return Err(ToolError::InvalidArgument("code is empty".to_string()));
                }
                let result = self.executor.execute(language, code, Some(workdir)).await;
                Ok(ToolResult::from_sandbox(&result, timeout_secs))
            }
            RUN_SHELL => {
                let command = required_arg(invocation, "command")?;
                if command.trim().is_empty() {
                    return Err(ToolError::InvalidArgument("command is empty".to_string()));
                }
                let result = self
                    .executor
                    .execute(Language::Shell.as_str(), command, Some(workdir))
                    .await;
                Ok(ToolResult::from_sandbox(&result, timeout_secs))
            }
            READ_FILE => {
                let path = required_arg(invocation, "path")?;
                fs::read_file(workdir, path).await.map(ToolResult::ok)
            }
            WRITE_FILE => {
                let path = required_arg(invocation, "path")?;
                let content = required_arg(invocation, "content")?;
                fs::write_file(workdir, path, content).await.map(ToolResult::ok)
            }
            LIST_FILES => {
                let path = invocation.arg("path").unwrap_or("");
                fs::list_files(workdir, path).await.map(ToolResult::ok)
            }
            FETCH_URL => {
                let url = required_arg(invocation, "url")?;
                self.fetch(url).await
            }
            other => Err(ToolError::UnknownTool {
                name: other.to_string(),
                available: String::new(),
            }),
        }
    }

    async fn fetch(&self, url: &str) -> Result<ToolResult, ToolError> {
        let client = self
            .http
            .as_ref()
            .ok_or_else(|| ToolError::Network("network tools are disabled".to_string()))?;
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolError::InvalidArgument(format!("unsupported URL '{url}'")));
        }

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;
        let status = response.status();

        // Stop reading one byte past the cap so truncation is still visible
        let cap = self.executor.policy().max_output_bytes;
        let limit = cap.saturating_add(1);
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ToolError::Network(e.to_string()))?;
            let room = limit.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= limit {
                debug!(url, cap, "response body exceeded cap, dropping the rest");
                break;
            }
        }
        let body = truncate_output(&String::from_utf8_lossy(&body), cap);

        let output = format!("HTTP {}\n{}", status.as_u16(), body);
        if status.is_success() {
            Ok(ToolResult::ok(output))
        } else {
            Ok(ToolResult::error(output))
        }
    }
}

fn required_arg<'a>(invocation: &'a ToolInvocation, key: &str) -> Result<&'a str, ToolError> {
    invocation.arg(key).ok_or_else(|| ToolError::MissingParameter {
        tool: invocation.name.clone(),
        param: key.to_string(),
    })
}

fn builtin_specs() -> Vec<ToolSpec> {
    let languages: Vec<&str> = Language::ALL.iter().map(Language::as_str).collect();
    vec![
        ToolSpec::new(
            EXECUTE_CODE,
            "Execute a program in an isolated sandbox and return its combined stdout and stderr. \
             Python runs share a persistent workspace; other languages start fresh in your working directory.",
            vec![
                ToolParam::optional("language", ParamType::String, "Programming language (default: python)")
                    .one_of(languages),
                ToolParam::required("code", ParamType::String, "Complete source code to run"),
            ],
        ),
        ToolSpec::new(
            RUN_SHELL,
            "Run a shell command in the sandbox and return its output.",
            vec![ToolParam::required("command", ParamType::String, "Shell command line")],
        ),
        ToolSpec::new(
            READ_FILE,
            "Read a text file from your working directory.",
            vec![ToolParam::required("path", ParamType::String, "Relative path of the file")],
        ),
        ToolSpec::new(
            WRITE_FILE,
            "Create or overwrite a file in your working directory. Parent directories are created.",
            vec![
                ToolParam::required("path", ParamType::String, "Relative path of the file"),
                ToolParam::required("content", ParamType::String, "Full file content"),
            ],
        ),
        ToolSpec::new(
            LIST_FILES,
            "List the entries of a directory in your working directory. Directories end with '/'.",
            vec![ToolParam::optional("path", ParamType::String, "Relative directory (default: the working directory)")],
        ),
    ]
}

fn fetch_url_spec() -> ToolSpec {
    ToolSpec::new(
        FETCH_URL,
        "Fetch a URL over HTTP(S) and return the status line and response body.",
        vec![ToolParam::required("url", ParamType::String, "Absolute http:// or https:// URL")],
    )
}
