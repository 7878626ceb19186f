//! Best-effort sandbox wrapping
//!
//! Sandboxing shells out to whichever pre-existing isolation tool is
//! installed. Detection walks an ordered preference list; when nothing is
//! available the executor degrades to unsandboxed execution with a warning.
//! The concrete per-tool flags live in [`command`] and are swappable without
//! touching the rest of the runner.

use tracing::debug;

pub use crate::sandbox::command::SandboxCommand;

mod command;

/// Known sandbox technologies, most restrictive first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxTool {
    /// nsjail: namespace and rlimit based jail
    Nsjail,
    /// firejail: SUID namespace sandbox
    Firejail,
    /// systemd-run: transient scope unit with resource properties
    SystemdRun,
}

/// Detection order: most restrictive capable tool first
const PREFERENCE: [SandboxTool; 3] = [
    SandboxTool::Nsjail,
    SandboxTool::Firejail,
    SandboxTool::SystemdRun,
];

impl SandboxTool {
    /// Executable name probed on PATH
    pub fn binary_name(&self) -> &'static str {
        match self {
            SandboxTool::Nsjail => "nsjail",
            SandboxTool::Firejail => "firejail",
            SandboxTool::SystemdRun => "systemd-run",
        }
    }
}

impl std::fmt::Display for SandboxTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Find the first available sandbox tool from the preference list.
pub fn detect() -> Option<SandboxTool> {
    let found = PREFERENCE
        .iter()
        .copied()
        .find(|tool| which::which(tool.binary_name()).is_ok());
    debug!(?found, "sandbox detection");
    found
}
