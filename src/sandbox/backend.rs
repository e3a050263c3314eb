//! Isolation backend abstraction
//!
//! A backend knows how to turn a [`SandboxRequest`] into a running isolate.
//! It offers two strategies:
//!
//! ```text
//!             ┌────────────── ephemeral ───────────────┐
//! request ──► │ fresh isolate → run → destroy          │ ──► RawOutput
//!             └────────────────────────────────────────┘
//!             ┌────────────── persistent ──────────────┐
//! request ──► │ long-lived isolate (started lazily)    │ ──► RawOutput
//!             │ files in /workspace survive across runs│
//!             └────────────────────────────────────────┘
//! ```
//!
//! Backends only report raw process results; classification into outcomes
//! happens in the executor.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::language::Language;
use super::limits::ResourceLimits;
use super::process::RawOutput;

/// One execution request, fully resolved against the policy
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub language: Language,
    pub source: String,
    pub timeout: Duration,
    pub limits: ResourceLimits,
    pub network: bool,
    /// Agent working directory made available to ephemeral isolates
    pub workdir: Option<PathBuf>,
    /// Per-stream capture cap
    pub capture_limit: usize,
}

/// Failures of the isolation layer itself
///
/// A program that runs and fails is not a `SandboxError`; it is a normal
/// result with a non-zero exit code.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("isolation layer failed to start: {0}")]
    Launch(String),

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{language} cannot run in the persistent isolate")]
    NotPersistent { language: Language },
}

/// An isolation layer capable of running code
#[async_trait]
pub trait IsolationBackend: Send + Sync {
    /// Short backend name for logs and metrics ("docker", "host")
    fn name(&self) -> &'static str;

    /// Run the request in a throwaway isolate
    async fn run_ephemeral(&self, request: &SandboxRequest) -> Result<RawOutput, SandboxError>;

    /// Whether the persistent isolate is currently up
    async fn persistent_running(&self) -> bool;

    /// (Re)start the persistent isolate
    async fn start_persistent(
        &self,
        limits: &ResourceLimits,
        network: bool,
    ) -> Result<(), SandboxError>;

    /// Run the request inside the already-running persistent isolate
    async fn run_persistent(&self, request: &SandboxRequest) -> Result<RawOutput, SandboxError>;
}
