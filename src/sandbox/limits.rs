//! Resource ceilings for sandboxed executions
//!
//! Limits are expressed the same way regardless of backend and translated
//! into whatever the isolation layer understands. For Docker that is the
//! cgroup-backed `--cpus`/`--memory`/`--pids-limit` flags:
//!
//! ```text
//! ResourceLimits { cpu_cores: 0.5, memory_bytes: 256M, pids: 64 }
//!         │
//!         ▼
//! docker run --cpus 0.5 --memory 268435456b --memory-swap 268435456b
//!            --pids-limit 64 --read-only --tmpfs /tmp:rw,exec,size=...
//! ```
//!
//! `--memory-swap` equal to `--memory` means the isolate cannot swap its way
//! past the ceiling.

use std::time::Duration;

/// Default wall-clock deadline for one execution
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on combined stdout/stderr returned to the caller
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 32 * 1024;

/// Resource limits for a single isolate
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLimits {
    /// Number of CPU cores (can be fractional, e.g., 0.5 for half a core)
    pub cpu_cores: f64,
    /// Memory limit in bytes
    pub memory_bytes: u64,
    /// Maximum number of processes/threads
    pub pids: u32,
    /// Size of the writable scratch area in bytes
    pub scratch_bytes: u64,
}

impl ResourceLimits {
    /// Half a core, 256MB, 64 processes
    pub fn small() -> Self {
        Self {
            cpu_cores: 0.5,
            memory_bytes: 256 * 1024 * 1024,
            pids: 64,
            scratch_bytes: 64 * 1024 * 1024,
        }
    }

    /// Create custom limits
    pub fn custom(cpu_cores: f64, memory_mb: u64, pids: u32) -> Self {
        Self {
            cpu_cores,
            memory_bytes: memory_mb * 1024 * 1024,
            pids,
            ..Self::small()
        }
    }

    /// Docker flags enforcing these limits and the isolation baseline
    pub fn docker_args(&self, network: bool) -> Vec<String> {
        let mut args = vec![
            "--cpus".to_string(),
            format!("{}", self.cpu_cores),
            "--memory".to_string(),
            format!("{}b", self.memory_bytes),
            "--memory-swap".to_string(),
            format!("{}b", self.memory_bytes),
            "--pids-limit".to_string(),
            self.pids.to_string(),
            "--read-only".to_string(),
            "--tmpfs".to_string(),
            format!("/tmp:rw,exec,size={}", self.scratch_bytes),
            "--cap-drop".to_string(),
            "ALL".to_string(),
            "--security-opt".to_string(),
            "no-new-privileges".to_string(),
        ];
        if !network {
            args.push("--network".to_string());
            args.push("none".to_string());
        }
        args
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::small()
    }
}

/// Execution policy applied to every sandbox request
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    /// Wall-clock deadline after which the process is killed
    pub timeout: Duration,
    /// Resource ceilings
    pub limits: ResourceLimits,
    /// Allow network access from inside the isolate
    pub network: bool,
    /// Cap on combined output returned to the caller
    pub max_output_bytes: usize,
    /// Route persistent-capable languages to the long-lived isolate
    pub persistent: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            limits: ResourceLimits::default(),
            network: false,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            persistent: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_small() {
        let limits = ResourceLimits::default();
        assert_eq!(limits, ResourceLimits::small());
        assert_eq!(limits.cpu_cores, 0.5);
        assert_eq!(limits.memory_bytes, 256 * 1024 * 1024);
    }

    #[test]
    fn test_custom_limits() {
        let custom = ResourceLimits::custom(1.5, 300, 32);
        assert_eq!(custom.cpu_cores, 1.5);
        assert_eq!(custom.memory_bytes, 300 * 1024 * 1024);
        assert_eq!(custom.pids, 32);
    }

    #[test]
    fn test_docker_args_isolate_network_by_default() {
        let args = ResourceLimits::small().docker_args(false);
        let joined = args.join(" ");
        assert!(joined.contains("--network none"));
        assert!(joined.contains("--pids-limit 64"));
        assert!(joined.contains("--read-only"));
        assert!(joined.contains("--cap-drop ALL"));

        let with_net = ResourceLimits::small().docker_args(true).join(" ");
        assert!(!with_net.contains("--network"));
    }

    #[test]
    fn test_policy_defaults() {
        let policy = SandboxPolicy::default();
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert!(!policy.network);
        assert!(policy.persistent);
    }
}
