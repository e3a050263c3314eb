//! Deadline-bounded child processes
//!
//! Every backend ends up spawning a process (an interpreter, or the docker
//! client). This runs it in its own process group with piped output and a
//! wall-clock deadline. On timeout the whole group is SIGKILLed so shell
//! children like `sleep` die with their parent.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to wait for pipes to drain once the process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Raw result of one process run, before classification
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; signal deaths are reported as 128 + signal number
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

/// Run `cmd` to completion or until `deadline` elapses
///
/// # Arguments
/// * `cmd` - Fully configured command (program, args, cwd, env)
/// * `stdin` - Optional input written to the child's stdin, then closed
/// * `deadline` - Wall-clock limit for the whole run
/// * `capture_limit` - Maximum bytes kept per stream; the rest is drained
///
/// Only spawn failures are errors. A timeout is reported in the output.
pub async fn run_with_deadline(
    mut cmd: Command,
    stdin: Option<&str>,
    deadline: Duration,
    capture_limit: usize,
) -> io::Result<RawOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .process_group(0);

    let start = Instant::now();
    let mut child = cmd.spawn()?;
    let pid = child.id();

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let input = input.to_owned();
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(input.as_bytes()).await {
                debug!(error = %e, "child closed stdin early");
            }
        });
    }

    let stdout_task = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(read_capped(pipe, capture_limit)));
    let stderr_task = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(read_capped(pipe, capture_limit)));

    let (exit_code, timed_out) = match tokio::time::timeout(deadline, child.wait()).await {
        Ok(status) => {
            let status = status?;
            let code = status
                .code()
                .or_else(|| status.signal().map(|sig| 128 + sig));
            (code, false)
        }
        Err(_) => {
            warn!(pid = ?pid, deadline_secs = deadline.as_secs_f64(), "process exceeded deadline, killing");
            kill_group(pid);
            if let Err(e) = child.kill().await {
                debug!(error = %e, "child already exited");
            }
            (None, true)
        }
    };

    // Stray background children keep the pipes open; take them down too.
    kill_group(pid);

    let stdout = collect(stdout_task).await;
    let stderr = collect(stderr_task).await;

    Ok(RawOutput {
        stdout,
        stderr,
        exit_code,
        timed_out,
        duration: start.elapsed(),
    })
}

fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // ESRCH just means the group is already gone.
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    buf
}

async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };
    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            warn!(error = %e, "output reader task failed");
            String::new()
        }
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}
