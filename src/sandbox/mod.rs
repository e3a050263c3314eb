//! Isolated code execution
//!
//! Tool calls that run code end up here. The [`SandboxExecutor`] routes each
//! request to an ephemeral or persistent isolate provided by an
//! [`IsolationBackend`] and classifies the outcome.
//!
//! # Backends
//!
//! * [`DockerBackend`] - one container per ephemeral call, a named
//!   long-lived container for the persistent isolate
//! * [`HostBackend`] - plain host processes in their own process group,
//!   for development and tests

pub mod backend;
pub mod docker;
pub mod executor;
pub mod host;
pub mod language;
pub mod limits;
pub mod process;

pub use backend::{IsolationBackend, SandboxError, SandboxRequest};
pub use docker::{DockerBackend, DockerConfig};
pub use executor::{
    SandboxExecutor, SandboxOutcome, SandboxResult, Strategy, NO_OUTPUT_MARKER, UNSUPPORTED_LABEL,
};
pub use host::HostBackend;
pub use language::Language;
pub use limits::{ResourceLimits, SandboxPolicy};
pub use process::RawOutput;
