//! Execution step
//!
//! Runs a built artifact (or an interpreter on the source) with optional
//! sandbox wrapping and a wall clock deadline. Output is drained while the
//! program runs so partial stdout/stderr survives a deadline kill.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, instrument, warn};

use crate::runner::ExecuteError;
use crate::sandbox::{self, SandboxCommand};
use crate::types::{ExecutionResult, ExitStatus, RunLimits};

/// Grace period between SIGTERM and SIGKILL on a deadline kill
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Fully-resolved request for one program run.
///
/// Constructed per invocation and never persisted.
#[derive(Debug)]
pub struct ExecutionRequest {
    /// Explicit argument vector; never passed through a shell
    pub command: Vec<String>,

    /// Environment variables set for the program
    pub env: HashMap<String, String>,

    /// Working directory; None inherits the caller's
    pub working_dir: Option<PathBuf>,

    /// Resource limits and sandbox request
    pub limits: RunLimits,
}

/// Run a program and classify the outcome.
#[instrument(skip(request), fields(program = request.command.first().map(String::as_str).unwrap_or("")))]
pub async fn execute(request: ExecutionRequest) -> Result<ExecutionResult, ExecuteError> {
    let mut argv = request.command;

    // Sandboxing is best-effort: degrade with a warning rather than block
    if request.limits.sandbox {
        match sandbox::detect() {
            Some(tool) => {
                debug!(%tool, "wrapping command in sandbox");
                argv = SandboxCommand::new(tool)
                    .memory_limit_bytes(request.limits.memory_limit_bytes())
                    .build(argv);
            }
            None => {
                warn!("sandbox requested but no sandbox tool is installed, running unsandboxed");
            }
        }
    } else if request.limits.memory_limit_bytes().is_some() {
        // Memory limiting is delegated to the sandbox layer
        warn!("memory limit has no effect without a sandbox, ignoring");
    }

    let program = argv.first().ok_or(ExecuteError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(&argv[1..])
        .envs(&request.env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(ref dir) = request.working_dir {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    debug!(?argv, "spawning program");

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(ExecuteError::Spawn)?;
    let pid = child.id();

    let stdout_task = drain_stdout(child.stdout.take());
    let stderr_task = drain_stderr(child.stderr.take());

    let status = match request.limits.timeout_duration() {
        Some(deadline) => match tokio::time::timeout(deadline, child.wait()).await {
            Ok(status) => ExitStatus::from_process_status(status?),
            Err(_) => {
                debug!(?deadline, "deadline elapsed, terminating process group");
                terminate(pid, &mut child).await?;
                ExitStatus::TimedOut
            }
        },
        None => ExitStatus::from_process_status(child.wait().await?),
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let duration = start.elapsed();

    debug!(?status, ?duration, "execution complete");

    Ok(ExecutionResult {
        status,
        stdout,
        stderr,
        duration,
    })
}

/// TERM the process group, wait out the grace period, then KILL.
async fn terminate(pid: Option<u32>, child: &mut Child) -> Result<(), ExecuteError> {
    if let Some(pid) = pid {
        signal_group(pid, libc::SIGTERM);
    }

    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
        return Ok(());
    }

    if let Some(pid) = pid {
        signal_group(pid, libc::SIGKILL);
    }
    let _ = child.kill().await;
    child.wait().await?;
    Ok(())
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: i32) {
    // The child leads its own process group, so the negative pid reaches
    // every process it spawned as well
    unsafe {
        libc::kill(-(pid as i32), signal);
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: i32) {}

fn drain_stdout(pipe: Option<ChildStdout>) -> tokio::task::JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

fn drain_stderr(pipe: Option<ChildStderr>) -> tokio::task::JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &[&str], limits: RunLimits) -> ExecutionRequest {
        ExecutionRequest {
            command: command.iter().map(|s| (*s).to_owned()).collect(),
            env: HashMap::new(),
            working_dir: None,
            limits,
        }
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let result = execute(request(&[], RunLimits::new())).await;
        assert!(matches!(result, Err(ExecuteError::EmptyCommand)));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let result = execute(request(
            &["/nonexistent/program-xyz"],
            RunLimits::new(),
        ))
        .await;
        assert!(matches!(result, Err(ExecuteError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_captures_stdout() {
        let result = execute(request(&["sh", "-c", "echo hello"], RunLimits::new()))
            .await
            .unwrap();
        assert_eq!(result.status, ExitStatus::Success);
        assert_eq!(result.stdout, b"hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_classified_with_code() {
        let result = execute(request(&["sh", "-c", "exit 7"], RunLimits::new()))
            .await
            .unwrap();
        assert_eq!(result.status, ExitStatus::NonZeroExit(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_is_captured_separately() {
        let result = execute(request(
            &["sh", "-c", "echo out; echo err >&2"],
            RunLimits::new(),
        ))
        .await
        .unwrap();
        assert_eq!(result.stdout, b"out\n");
        assert_eq!(result.stderr, b"err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn deadline_kill_classifies_as_timed_out() {
        let started = Instant::now();
        let result = execute(request(
            &["sh", "-c", "sleep 30"],
            RunLimits::new().with_timeout(1),
        ))
        .await
        .unwrap();
        assert_eq!(result.status, ExitStatus::TimedOut);
        // 1s deadline plus at most the 2s grace period
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn partial_output_survives_deadline_kill() {
        let result = execute(request(
            &["sh", "-c", "echo before; sleep 30"],
            RunLimits::new().with_timeout(1),
        ))
        .await
        .unwrap();
        assert_eq!(result.status, ExitStatus::TimedOut);
        assert_eq!(result.stdout, b"before\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_kill_outside_timeout_is_classified_signaled() {
        let result = execute(request(
            &["sh", "-c", "kill -9 $$"],
            RunLimits::new(),
        ))
        .await
        .unwrap();
        assert_eq!(result.status, ExitStatus::Signaled(9));
    }
}
