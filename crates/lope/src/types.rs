use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunLimits {
    /// Wall clock timeout in seconds. None means unbounded.
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Memory limit in megabytes. None means unbounded.
    ///
    /// Only enforced when a sandbox tool is active; unsandboxed runs are not
    /// memory-limited by the executor itself.
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,

    /// Whether to wrap the program in a sandbox tool if one is available
    #[serde(default)]
    pub sandbox: bool,
}

impl RunLimits {
    /// Create new limits with all fields unbounded and no sandbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wall clock timeout in seconds
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Set the memory limit in megabytes
    pub fn with_memory_limit_mb(mut self, mb: u64) -> Self {
        self.memory_limit_mb = Some(mb);
        self
    }

    /// Request sandboxed execution
    pub fn with_sandbox(mut self, enable: bool) -> Self {
        self.sandbox = enable;
        self
    }

    /// Timeout as a Duration, if bounded
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// Memory limit in bytes, if bounded
    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_mb.map(|mb| mb * 1024 * 1024)
    }
}

/// Classification of how a program run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Program exited with code 0
    #[serde(rename = "ok")]
    Success,

    /// Program exited with a nonzero code
    #[serde(rename = "exit")]
    NonZeroExit(i32),

    /// Program was terminated because the wall clock deadline elapsed
    #[serde(rename = "timeout")]
    TimedOut,

    /// Program was killed by a signal outside the timeout path
    #[serde(rename = "signal")]
    Signaled(i32),
}

impl ExitStatus {
    /// Classify a finished child process status.
    ///
    /// The timeout path never reaches this function; a deadline kill is
    /// classified as [`ExitStatus::TimedOut`] by the executor before the
    /// child status is inspected.
    pub fn from_process_status(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(0) => ExitStatus::Success,
            Some(code) => ExitStatus::NonZeroExit(code),
            None => Self::from_signal(status),
        }
    }

    #[cfg(unix)]
    fn from_signal(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::Signaled(status.signal().unwrap_or(0))
    }

    #[cfg(not(unix))]
    fn from_signal(_status: std::process::ExitStatus) -> Self {
        ExitStatus::Signaled(0)
    }

    /// Check if the run succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    /// Map the classification to a process exit code.
    ///
    /// Success and nonzero exits propagate the program's own code verbatim.
    /// Timeouts use 124, matching the timeout(1) convention. Signals use the
    /// shell convention of 128 plus the signal number.
    pub fn exit_code(&self) -> i32 {
        match *self {
            ExitStatus::Success => 0,
            ExitStatus::NonZeroExit(code) => code,
            ExitStatus::TimedOut => 124,
            ExitStatus::Signaled(sig) => 128 + sig,
        }
    }
}

/// Result of one program execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// How the run ended
    pub status: ExitStatus,

    /// Captured standard output, including partial output from killed runs
    pub stdout: Vec<u8>,

    /// Captured standard error, including partial output from killed runs
    pub stderr: Vec<u8>,

    /// Wall clock duration of the run
    pub duration: Duration,
}

impl ExecutionResult {
    /// Check if the execution was successful (exited with code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Progress and terminal states reported to the presentation layer.
///
/// The CLI consumes only this enum, the captured output, and the final exit
/// code; it never influences control flow in the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Compiler is being invoked
    Compiling,
    /// A cached artifact satisfied the build step
    UsingCache,
    /// Target program is running
    Executing,
    /// Run finished with exit code 0
    Success,
    /// Compiler exited nonzero or produced no artifacts
    CompileFailed,
    /// Program exited nonzero
    Failed,
    /// Program hit the wall clock deadline
    TimedOut,
    /// Program was killed by a signal
    Signaled,
}

impl RunStatus {
    /// Terminal status for an execution classification
    pub fn from_exit_status(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => RunStatus::Success,
            ExitStatus::NonZeroExit(_) => RunStatus::Failed,
            ExitStatus::TimedOut => RunStatus::TimedOut,
            ExitStatus::Signaled(_) => RunStatus::Signaled,
        }
    }
}
