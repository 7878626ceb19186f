//! Command wrapping for sandbox tools
//!
//! Builds the wrapped argument vector for a detected sandbox tool. Memory
//! limits are passed through to the tool; nothing here enforces them
//! directly.

use crate::sandbox::SandboxTool;

/// Builder for a sandboxed command line
#[derive(Debug)]
pub struct SandboxCommand {
    tool: SandboxTool,
    memory_limit_bytes: Option<u64>,
}

impl SandboxCommand {
    /// Create a wrapper for the given tool
    pub fn new(tool: SandboxTool) -> Self {
        Self {
            tool,
            memory_limit_bytes: None,
        }
    }

    /// Pass a memory limit through to the tool
    pub fn memory_limit_bytes(mut self, limit: Option<u64>) -> Self {
        self.memory_limit_bytes = limit;
        self
    }

    /// Build the wrapped argument vector.
    ///
    /// The inner command is always separated with `--` so program arguments
    /// can never be parsed as tool options.
    pub fn build(self, command: Vec<String>) -> Vec<String> {
        let mut args: Vec<String> = Vec::with_capacity(command.len() + 8);

        match self.tool {
            SandboxTool::Nsjail => {
                args.push("nsjail".to_owned());
                args.push("-Mo".to_owned());
                args.push("-q".to_owned());
                if let Some(bytes) = self.memory_limit_bytes {
                    // nsjail takes the address space limit in megabytes
                    args.push("--rlimit_as".to_owned());
                    args.push((bytes / (1024 * 1024)).max(1).to_string());
                }
            }
            SandboxTool::Firejail => {
                args.push("firejail".to_owned());
                args.push("--quiet".to_owned());
                if let Some(bytes) = self.memory_limit_bytes {
                    args.push(format!("--rlimit-as={bytes}"));
                }
            }
            SandboxTool::SystemdRun => {
                args.push("systemd-run".to_owned());
                args.push("--user".to_owned());
                args.push("--scope".to_owned());
                args.push("--quiet".to_owned());
                if let Some(bytes) = self.memory_limit_bytes {
                    args.push("-p".to_owned());
                    args.push(format!("MemoryMax={bytes}"));
                }
            }
        }

        args.push("--".to_owned());
        args.extend(command);
        args
    }
}
