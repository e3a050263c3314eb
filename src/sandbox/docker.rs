//! Docker isolation backend
//!
//! Drives the `docker` CLI. Ephemeral runs get a fresh `--rm` container per
//! call with the source mounted read-only; the persistent isolate is one
//! named container kept alive with `sleep infinity` and a named volume at
//! `/workspace`.
//!
//! ```text
//! ephemeral:   docker run --rm --name agentvisor-<uuid> <limits>
//!                  -v <src>:/sandbox:ro [-v <workdir>:/workspace]
//!                  <image> python3 -u /sandbox/main.py
//!
//! persistent:  docker run -d --name <name> <limits> -v <volume>:/workspace
//!                  <image> sleep infinity                      (once)
//!              docker exec -i -w /workspace <name>
//!                  timeout -s KILL <secs> python3 -u -         (per call)
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::{IsolationBackend, SandboxError, SandboxRequest};
use super::language::Language;
use super::limits::ResourceLimits;
use super::process::{run_with_deadline, RawOutput};

/// `docker run` exits with 125 when the daemon could not create the container
const DOCKER_RUN_FAILURE: i32 = 125;

/// Deadline for docker housekeeping commands (inspect, rm, kill)
const CONTROL_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings for the Docker backend
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path or name of the docker binary
    pub docker_bin: String,
    /// Image per language for ephemeral runs
    pub images: HashMap<Language, String>,
    /// Container name of the persistent isolate
    pub persistent_name: String,
    /// Named volume mounted at /workspace in the persistent isolate
    pub persistent_volume: String,
    /// Image of the persistent isolate (must provide python3 and sh)
    pub persistent_image: String,
}

impl DockerConfig {
    pub fn default_images() -> HashMap<Language, String> {
        HashMap::from([
            (Language::Python, "python:3.12-slim".to_string()),
            (Language::JavaScript, "node:20-slim".to_string()),
            (Language::Shell, "bash:5.2".to_string()),
            (Language::Ruby, "ruby:3.3-slim".to_string()),
            (Language::Go, "golang:1.22-alpine".to_string()),
        ])
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            images: Self::default_images(),
            persistent_name: "agentvisor-persistent".to_string(),
            persistent_volume: "agentvisor-workspace".to_string(),
            persistent_image: "python:3.12-slim".to_string(),
        }
    }
}

/// Backend that runs code in Docker containers
#[derive(Debug, Clone)]
pub struct DockerBackend {
    config: DockerConfig,
}

impl DockerBackend {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    fn docker(&self) -> Command {
        Command::new(&self.config.docker_bin)
    }

    fn image_for(&self, language: Language) -> Result<&str, SandboxError> {
        self.config
            .images
            .get(&language)
            .map(String::as_str)
            .ok_or_else(|| SandboxError::Launch(format!("no image configured for {language}")))
    }

    /// Run a short docker housekeeping command, returning its output
    async fn control(&self, args: &[&str]) -> Result<RawOutput, SandboxError> {
        let mut cmd = self.docker();
        cmd.args(args);
        run_with_deadline(cmd, None, CONTROL_TIMEOUT, 64 * 1024)
            .await
            .map_err(|e| SandboxError::Launch(format!("{}: {}", self.config.docker_bin, e)))
    }

    /// Remove a container regardless of state; failures are only logged
    async fn force_remove(&self, name: &str) {
        match self.control(&["rm", "-f", name]).await {
            Ok(out) if out.exit_code == Some(0) => debug!(container = name, "container removed"),
            Ok(out) => debug!(container = name, stderr = %out.stderr.trim(), "container rm reported failure"),
            Err(e) => warn!(container = name, error = %e, "failed to remove container"),
        }
    }
}

fn launch_failure(output: &RawOutput) -> SandboxError {
    let detail = output.stderr.trim();
    SandboxError::Launch(if detail.is_empty() {
        format!("docker exited with {:?}", output.exit_code)
    } else {
        detail.to_string()
    })
}

#[async_trait]
impl IsolationBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn run_ephemeral(&self, request: &SandboxRequest) -> Result<RawOutput, SandboxError> {
        let image = self.image_for(request.language)?;
        let source_dir = tempfile::Builder::new().prefix("agentvisor-src-").tempdir()?;
        tokio::fs::write(source_dir.path().join(request.language.file_name()), &request.source).await?;

        let name = format!("agentvisor-{}", Uuid::now_v7());
        let mut cmd = self.docker();
        cmd.args(["run", "--rm", "--name", name.as_str()])
            .args(request.limits.docker_args(request.network))
            .arg("-v")
            .arg(format!("{}:/sandbox:ro", source_dir.path().display()));

        match &request.workdir {
            Some(workdir) => {
                cmd.arg("-v")
                    .arg(format!("{}:/workspace", workdir.display()))
                    .args(["-w", "/workspace"]);
            }
            None => {
                cmd.args(["-w", "/tmp"]);
            }
        }

        cmd.args(["-e", "HOME=/tmp", "-e", "GOCACHE=/tmp/gocache"])
            .arg(image)
            .args(request.language.interpreter())
            .arg(format!("/sandbox/{}", request.language.file_name()));

        debug!(container = %name, image, language = %request.language, "docker ephemeral run");
        let output = run_with_deadline(cmd, None, request.timeout, request.capture_limit)
            .await
            .map_err(|e| SandboxError::Launch(format!("{}: {}", self.config.docker_bin, e)))?;

        if output.timed_out {
            // Killing the client does not stop the container.
            self.force_remove(&name).await;
        } else if output.exit_code == Some(DOCKER_RUN_FAILURE) {
            return Err(launch_failure(&output));
        }

        Ok(output)
    }

    async fn persistent_running(&self) -> bool {
        match self
            .control(&[
                "inspect",
                "-f",
                "{{.State.Running}}",
                self.config.persistent_name.as_str(),
            ])
            .await
        {
            Ok(out) => out.exit_code == Some(0) && out.stdout.trim() == "true",
            Err(_) => false,
        }
    }

    async fn start_persistent(
        &self,
        limits: &ResourceLimits,
        network: bool,
    ) -> Result<(), SandboxError> {
        // A stopped container with the same name blocks `docker run --name`.
        self.force_remove(&self.config.persistent_name).await;

        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            self.config.persistent_name.clone(),
        ];
        args.extend(limits.docker_args(network));
        args.extend([
            "-v".into(),
            format!("{}:/workspace", self.config.persistent_volume),
            "-w".into(),
            "/workspace".into(),
            "-e".into(),
            "HOME=/workspace".into(),
            self.config.persistent_image.clone(),
            "sleep".into(),
            "infinity".into(),
        ]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let out = self.control(&args).await?;
        if out.exit_code != Some(0) {
            return Err(launch_failure(&out));
        }

        info!(
            container = %self.config.persistent_name,
            volume = %self.config.persistent_volume,
            "persistent isolate started"
        );
        Ok(())
    }

    async fn run_persistent(&self, request: &SandboxRequest) -> Result<RawOutput, SandboxError> {
        let interpreter = request
            .language
            .stdin_interpreter()
            .ok_or(SandboxError::NotPersistent {
                language: request.language,
            })?;

        // The in-container `timeout` reaps the process; our own deadline
        // (one second later) only has to kill the exec client.
        let inner_secs = request.timeout.as_secs().max(1).to_string();
        let mut cmd = self.docker();
        cmd.args(["exec", "-i", "-w", "/workspace"])
            .arg(&self.config.persistent_name)
            .args(["timeout", "-s", "KILL", inner_secs.as_str()])
            .args(interpreter);

        let output = run_with_deadline(
            cmd,
            Some(&request.source),
            request.timeout + Duration::from_secs(1),
            request.capture_limit,
        )
        .await
        .map_err(|e| SandboxError::Launch(format!("{}: {}", self.config.docker_bin, e)))?;

        // timeout(1) killed by SIGKILL exits with 137
        if !output.timed_out && output.exit_code == Some(137) && output.duration >= request.timeout {
            return Ok(RawOutput {
                timed_out: true,
                ..output
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_images_cover_every_language() {
        let config = DockerConfig::default();
        for language in Language::ALL {
            assert!(config.images.contains_key(&language), "{language} has no image");
        }
    }

    #[tokio::test]
    async fn test_missing_docker_binary_is_launch_failure() {
        let backend = DockerBackend::new(DockerConfig {
            docker_bin: "/nonexistent/docker-xyz".to_string(),
            ..DockerConfig::default()
        });
        let request = SandboxRequest {
            language: Language::Python,
            source: "print(1)".to_string(),
            timeout: Duration::from_secs(1),
            limits: ResourceLimits::small(),
            network: false,
            workdir: None,
            capture_limit: 1024,
        };
        let err = backend.run_ephemeral(&request).await.unwrap_err();
        assert!(matches!(err, SandboxError::Launch(_)));
        assert!(!backend.persistent_running().await);
    }
}
