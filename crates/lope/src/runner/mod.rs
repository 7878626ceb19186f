//! High-level runner
//!
//! Ties the language registry, cache store, builder and executor together:
//! resolve the language, probe the cache, build on a miss, persist the
//! artifact, execute, and classify the result.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use crate::runner::compile::{BuildOutput, BuiltArtifact, Toolchain, build};
pub use crate::runner::execute::{ExecutionRequest, execute};

mod compile;
mod execute;

use crate::cache::{ArtifactKind, CacheKey, CacheStore};
use crate::config::{CommandVars, Config, ConfigError, Language, Strategy};
use crate::types::{ExecutionResult, RunLimits, RunStatus};

/// Errors that occur during compilation
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compiler '{0}' not found in PATH")]
    CompilerNotFound(String),

    #[error("compilation failed with exit code {exit_code}:\n{output}")]
    Failed { exit_code: i32, output: String },

    #[error("compiler reported success but produced no artifacts")]
    NoArtifacts,

    #[error("language does not use a compile step")]
    NotCompiled,

    #[error("failed to start compiler: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur during execution, before the program produces an outcome
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to start program: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur during a full run
///
/// Preserves which phase failed. Cache failures never appear here; they are
/// recovered internally and at most logged.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot access source file {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error("execution error: {0}")]
    Execute(#[from] ExecuteError),
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunOutcome {
    /// Terminal status for presentation
    pub status: RunStatus,

    /// The program's execution result
    pub execution: ExecutionResult,

    /// Whether a cached artifact satisfied the build step
    pub cache_hit: bool,

    /// Compiler diagnostics from a fresh build (warnings), if any
    pub compiler_output: Option<String>,
}

/// High-level runner for source files
#[derive(Debug)]
pub struct Runner {
    config: Config,
    cache: Option<CacheStore>,
}

impl Runner {
    /// Create a new runner with the given configuration.
    ///
    /// A cache store that cannot be opened only disables caching; it never
    /// fails runner construction.
    pub fn new(config: Config) -> Self {
        let cache = if config.cache.enabled {
            match CacheStore::open(&config.cache) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("cache unavailable, continuing without it: {e}");
                    None
                }
            }
        } else {
            None
        };
        Self { config, cache }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the cache store, if caching is active
    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// Run a source file, resolving its language from the file extension.
    pub async fn run_file(
        &self,
        source: &Path,
        args: &[String],
        limits: &RunLimits,
    ) -> Result<RunOutcome, RunError> {
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        let language = self.config.resolve_extension(extension)?;
        self.run_language(language, source, args, limits).await
    }

    /// Run a source file with an already-resolved language.
    ///
    /// Used when shebang sniffing overrides the file extension.
    #[instrument(skip_all, fields(language = %language.name, source = %source.display()))]
    pub async fn run_language(
        &self,
        language: &Language,
        source: &Path,
        args: &[String],
        limits: &RunLimits,
    ) -> Result<RunOutcome, RunError> {
        let source = std::fs::canonicalize(source).map_err(|e| RunError::Source {
            path: source.to_path_buf(),
            source: e,
        })?;

        match language.strategy {
            Strategy::Direct => self.run_direct(language, &source, args, limits).await,
            Strategy::Compile | Strategy::CompileToRuntime => {
                self.run_compiled(language, &source, args, limits).await
            }
        }
    }

    /// Interpreter runs the source directly; the build step is a no-op.
    async fn run_direct(
        &self,
        language: &Language,
        source: &Path,
        args: &[String],
        limits: &RunLimits,
    ) -> Result<RunOutcome, RunError> {
        let run = language
            .run
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid(format!("language '{}' has no run command", language.name)))?;

        let source_str = source.to_string_lossy();
        let vars = CommandVars {
            source: &source_str,
            ..Default::default()
        };
        let mut command = Language::expand_command(&run.command, &vars);
        command.extend(args.iter().cloned());

        info!(status = ?RunStatus::Executing, "executing");
        let execution = execute(ExecutionRequest {
            command,
            env: run.env.clone(),
            working_dir: None,
            limits: limits.clone(),
        })
        .await?;

        Ok(outcome(execution, false, None))
    }

    async fn run_compiled(
        &self,
        language: &Language,
        source: &Path,
        args: &[String],
        limits: &RunLimits,
    ) -> Result<RunOutcome, RunError> {
        let compile_cfg = language.compile.as_ref().ok_or_else(|| {
            ConfigError::Invalid(format!("language '{}' has no compile command", language.name))
        })?;

        let toolchain = Toolchain::resolve(compile_cfg)?;
        let source_bytes = std::fs::read(source).map_err(|e| RunError::Source {
            path: source.to_path_buf(),
            source: e,
        })?;
        let key = CacheKey::compute(&source_bytes, &toolchain.compiler, &toolchain.flags);
        debug!(%key, compiler = %toolchain.compiler.display(), "computed cache key");

        // The workdir outlives execution: fresh binaries and restored
        // bundles both run from it
        let workdir = tempfile::Builder::new()
            .prefix("lope-")
            .tempdir()
            .map_err(CompileError::Io)?;

        let (command, env, cache_hit, compiler_output) = match language.strategy {
            Strategy::Compile => {
                let (binary, cache_hit, compiler_output) = self
                    .acquire_binary(language, &toolchain, &key, source, workdir.path())
                    .await?;

                let mut command = match language.run {
                    Some(ref run) => {
                        let binary_str = binary.to_string_lossy();
                        let vars = CommandVars {
                            output: &binary_str,
                            ..Default::default()
                        };
                        Language::expand_command(&run.command, &vars)
                    }
                    None => vec![binary.to_string_lossy().into_owned()],
                };
                command.extend(args.iter().cloned());

                let env = language
                    .run
                    .as_ref()
                    .map(|run| run.env.clone())
                    .unwrap_or_default();
                (command, env, cache_hit, compiler_output)
            }
            Strategy::CompileToRuntime => {
                let (entry, cache_hit, compiler_output) = self
                    .acquire_runtime_set(language, &toolchain, &key, source, workdir.path())
                    .await?;

                let run = language.run.as_ref().ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "language '{}' has no run command",
                        language.name
                    ))
                })?;

                let dir_str = workdir.path().to_string_lossy();
                let vars = CommandVars {
                    dir: &dir_str,
                    entry: &entry,
                    ..Default::default()
                };
                let mut command = Language::expand_command(&run.command, &vars);
                command.extend(args.iter().cloned());
                (command, run.env.clone(), cache_hit, compiler_output)
            }
            Strategy::Direct => unreachable!("run_compiled called for Direct strategy"),
        };

        info!(status = ?RunStatus::Executing, "executing");
        let execution = execute(ExecutionRequest {
            command,
            env,
            working_dir: None,
            limits: limits.clone(),
        })
        .await?;

        Ok(outcome(execution, cache_hit, compiler_output))
    }

    /// Produce a runnable binary: cache hit, or fresh build plus best-effort
    /// store.
    async fn acquire_binary(
        &self,
        language: &Language,
        toolchain: &Toolchain,
        key: &CacheKey,
        source: &Path,
        workdir: &Path,
    ) -> Result<(PathBuf, bool, Option<String>), RunError> {
        if let Some(entry) = self.cache_probe(key, ArtifactKind::Binary) {
            info!(status = ?RunStatus::UsingCache, "using cached artifact");
            return Ok((entry, true, None));
        }

        info!(status = ?RunStatus::Compiling, "compiling");
        let built = build(language, toolchain, source, workdir).await?;
        let binary = match built.artifact {
            BuiltArtifact::Binary(path) => path,
            BuiltArtifact::RuntimeSet { .. } => {
                return Err(RunError::Compile(CompileError::NoArtifacts));
            }
        };

        if let Some(store) = &self.cache
            && let Err(e) = store.store_binary(key, &binary)
        {
            debug!("failed to cache binary, skipping: {e}");
        }

        Ok((binary, false, Some(built.compiler_output)))
    }

    /// Produce a runnable intermediate file set in the workdir and return
    /// the runtime entry point name.
    async fn acquire_runtime_set(
        &self,
        language: &Language,
        toolchain: &Toolchain,
        key: &CacheKey,
        source: &Path,
        workdir: &Path,
    ) -> Result<(String, bool, Option<String>), RunError> {
        let entry_name = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_owned());

        if let Some(entry) = self.cache_probe(key, ArtifactKind::Bundle) {
            match self
                .cache
                .as_ref()
                .map(|store| store.restore_bundle(&entry, workdir))
            {
                Some(Ok(())) => {
                    info!(status = ?RunStatus::UsingCache, "using cached artifact");
                    return Ok((entry_name, true, None));
                }
                Some(Err(e)) => debug!("failed to restore cached bundle, rebuilding: {e}"),
                None => {}
            }
        }

        info!(status = ?RunStatus::Compiling, "compiling");
        let built = build(language, toolchain, source, workdir).await?;
        let files = match built.artifact {
            BuiltArtifact::RuntimeSet { files, .. } => files,
            BuiltArtifact::Binary(_) => {
                return Err(RunError::Compile(CompileError::NoArtifacts));
            }
        };

        if let Some(store) = &self.cache
            && let Err(e) = store.store_bundle(key, workdir, &files)
        {
            debug!("failed to cache bundle, skipping: {e}");
        }

        Ok((entry_name, false, Some(built.compiler_output)))
    }

    /// Sweep once, then probe the cache. Every failure is a miss.
    fn cache_probe(&self, key: &CacheKey, kind: ArtifactKind) -> Option<PathBuf> {
        let store = self.cache.as_ref()?;

        if let Err(e) = store.sweep() {
            debug!("cache sweep failed: {e}");
        }

        match store.lookup(key, kind) {
            Ok(hit) => hit,
            Err(e) => {
                debug!("cache lookup failed, treating as miss: {e}");
                None
            }
        }
    }
}

fn outcome(
    execution: ExecutionResult,
    cache_hit: bool,
    compiler_output: Option<String>,
) -> RunOutcome {
    RunOutcome {
        status: RunStatus::from_exit_status(execution.status),
        execution,
        cache_hit,
        compiler_output,
    }
}
