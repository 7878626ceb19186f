//! A library for running source files with compilation caching and resource
//! limits.
//!
//! Lope resolves a source file's language from a data-driven registry,
//! compiles it when the language needs it, caches build artifacts keyed by
//! source content, compiler path and flags, and executes the result under a
//! wall clock deadline with optional best-effort sandboxing.
//!
//! # Features
//!
//! - **Zero configuration** — a built-in language table covers common
//!   compiled and interpreted languages; extending it is pure TOML.
//! - **Compilation caching** — content-addressed artifact store with atomic
//!   writes, lazy eviction and a once-per-process sweep. The cache is
//!   advisory: any cache failure degrades to a fresh build.
//! - **Resource controls** — wall clock timeout with TERM-then-KILL process
//!   group semantics; memory limits passed through to a detected sandbox
//!   tool.
//! - **Best-effort sandboxing** — wraps execution in nsjail, firejail or
//!   systemd-run when available, and degrades with a warning when not.

pub use cache::{ArtifactKind, CacheError, CacheKey, CacheStore};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language, Strategy};
pub use runner::{
    BuildOutput, BuiltArtifact, CompileError, ExecuteError, ExecutionRequest, RunError,
    RunOutcome, Runner, Toolchain,
};
pub use sandbox::{SandboxCommand, SandboxTool};
pub use types::{ExecutionResult, ExitStatus, RunLimits, RunStatus};

pub mod cache;
pub mod config;
pub mod runner;
pub mod sandbox;
pub mod types;
