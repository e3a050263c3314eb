//! Host process backend
//!
//! Runs interpreters directly on the host, each in its own process group.
//! There is no kernel isolation here: it exists for development machines
//! without Docker and for tests. The "persistent isolate" is a long-lived
//! directory used as the working directory of every persistent run; it is
//! recreated if something removes it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::backend::{IsolationBackend, SandboxError, SandboxRequest};
use super::limits::ResourceLimits;
use super::process::{run_with_deadline, RawOutput};

/// Backend that runs code as plain host processes
#[derive(Debug, Clone)]
pub struct HostBackend {
    persistent_dir: PathBuf,
}

impl HostBackend {
    /// Create a host backend whose persistent state lives in `persistent_dir`
    pub fn new(persistent_dir: impl Into<PathBuf>) -> Self {
        Self {
            persistent_dir: persistent_dir.into(),
        }
    }

    /// Directory shared by persistent runs
    pub fn persistent_dir(&self) -> &Path {
        &self.persistent_dir
    }

    fn base_command(program: &str, cwd: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.current_dir(cwd)
            .env("HOME", cwd)
            .env("TMPDIR", std::env::temp_dir())
            .env("PYTHONDONTWRITEBYTECODE", "1");
        cmd
    }
}

#[async_trait]
impl IsolationBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    async fn run_ephemeral(&self, request: &SandboxRequest) -> Result<RawOutput, SandboxError> {
        let scratch = tempfile::Builder::new().prefix("agentvisor-run-").tempdir()?;
        let source_path = scratch.path().join(request.language.file_name());
        tokio::fs::write(&source_path, &request.source).await?;

        let cwd = request.workdir.as_deref().unwrap_or_else(|| scratch.path());
        let interpreter = request.language.interpreter();
        let mut cmd = Self::base_command(interpreter[0], cwd);
        cmd.args(&interpreter[1..]).arg(&source_path);
        if request.language == super::Language::Go {
            cmd.env("GOCACHE", scratch.path().join("gocache"));
        }

        debug!(language = %request.language, cwd = %cwd.display(), "host ephemeral run");
        let output = run_with_deadline(cmd, None, request.timeout, request.capture_limit)
            .await
            .map_err(|e| SandboxError::Launch(format!("{}: {}", interpreter[0], e)))?;

        // scratch (and the source file) is removed here
        drop(scratch);
        Ok(output)
    }

    async fn persistent_running(&self) -> bool {
        tokio::fs::metadata(&self.persistent_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn start_persistent(
        &self,
        _limits: &ResourceLimits,
        _network: bool,
    ) -> Result<(), SandboxError> {
        tokio::fs::create_dir_all(&self.persistent_dir)
            .await
            .map_err(|e| SandboxError::Launch(format!("{}: {}", self.persistent_dir.display(), e)))?;
        info!(dir = %self.persistent_dir.display(), "host persistent workspace ready");
        Ok(())
    }

    async fn run_persistent(&self, request: &SandboxRequest) -> Result<RawOutput, SandboxError> {
        let interpreter = request
            .language
            .stdin_interpreter()
            .ok_or(SandboxError::NotPersistent {
                language: request.language,
            })?;

        let mut cmd = Self::base_command(interpreter[0], &self.persistent_dir);
        cmd.args(&interpreter[1..]);

        run_with_deadline(
            cmd,
            Some(&request.source),
            request.timeout,
            request.capture_limit,
        )
        .await
        .map_err(|e| SandboxError::Launch(format!("{}: {}", interpreter[0], e)))
    }
}
