//! Compilation step
//!
//! Invokes the configured compiler in an isolated working directory and
//! classifies the result. Compilation is never subject to the user timeout;
//! the toolchain is assumed to bound its own runtime.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::{CommandVars, CompileConfig, ConfigError, Language, Strategy};
use crate::runner::{CompileError, RunError};

/// Resolved compiler invocation inputs.
///
/// The compiler path is canonical and absolute so that two differently
/// installed compiler versions never share a cache key. Flags come from the
/// language's override environment variable when set, otherwise from its
/// default flags, tokenized without shell interpretation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compiler: PathBuf,
    pub flags: Vec<String>,
}

impl Toolchain {
    pub fn resolve(compile: &CompileConfig) -> Result<Self, RunError> {
        let program = compile
            .command
            .first()
            .ok_or_else(|| ConfigError::Invalid("empty compile command".to_owned()))
            .map_err(RunError::Config)?;

        let compiler = which::which(program)
            .map_err(|_| RunError::Compile(CompileError::CompilerNotFound(program.clone())))?;
        let compiler = std::fs::canonicalize(&compiler).unwrap_or(compiler);

        let raw_flags = compile
            .flags_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_else(|| compile.default_flags.clone());

        let flags = shell_words::split(&raw_flags).map_err(|e| {
            RunError::Config(ConfigError::Invalid(format!(
                "malformed compiler flags '{raw_flags}': {e}"
            )))
        })?;

        Ok(Self { compiler, flags })
    }
}

/// What a successful build produced
#[derive(Debug)]
pub enum BuiltArtifact {
    /// A single native executable
    Binary(PathBuf),

    /// A set of intermediate files under `dir`, executed through a runtime
    RuntimeSet {
        dir: PathBuf,
        files: Vec<PathBuf>,
        entry: String,
    },
}

/// Successful build result, including any compiler warnings
#[derive(Debug)]
pub struct BuildOutput {
    pub artifact: BuiltArtifact,
    pub compiler_output: String,
}

/// Compile a source file into the given working directory.
///
/// The working directory is always a fresh, caller-owned temp directory;
/// the user's source directory is never written to, and concurrent builds
/// of the same source cannot collide.
#[instrument(skip(language, toolchain), fields(language = %language.name))]
pub async fn build(
    language: &Language,
    toolchain: &Toolchain,
    source: &Path,
    workdir: &Path,
) -> Result<BuildOutput, CompileError> {
    let compile = language
        .compile
        .as_ref()
        .ok_or(CompileError::NotCompiled)?;

    let entry = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_owned());
    let output_path = workdir.join(&entry);

    let source_str = source.to_string_lossy();
    let output_str = output_path.to_string_lossy();
    let workdir_str = workdir.to_string_lossy();
    let vars = CommandVars {
        source: &source_str,
        output: &output_str,
        dir: &workdir_str,
        entry: &entry,
        flags: toolchain.flags.clone(),
    };

    let mut argv = Language::expand_command(&compile.command, &vars);
    match argv.first_mut() {
        Some(program) => *program = toolchain.compiler.to_string_lossy().into_owned(),
        None => {
            return Err(CompileError::Spawn(std::io::Error::other(
                "compile command expanded to nothing",
            )));
        }
    }

    debug!(?argv, "invoking compiler");

    let output = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(CompileError::Spawn)?;

    let compiler_output = combine_output(&output.stdout, &output.stderr);

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(1);
        debug!(exit_code, "compilation failed");
        return Err(CompileError::Failed {
            exit_code,
            output: compiler_output,
        });
    }

    let artifact = match language.strategy {
        Strategy::Compile => {
            // A zero exit with no binary reflects an inconsistent toolchain
            if !output_path.is_file() {
                return Err(CompileError::NoArtifacts);
            }
            BuiltArtifact::Binary(output_path)
        }
        Strategy::CompileToRuntime => {
            let ext = compile.artifact_ext.as_deref().unwrap_or_default();
            let files = generated_files(workdir, ext)?;
            if files.is_empty() {
                return Err(CompileError::NoArtifacts);
            }
            BuiltArtifact::RuntimeSet {
                dir: workdir.to_path_buf(),
                files,
                entry,
            }
        }
        Strategy::Direct => return Err(CompileError::NotCompiled),
    };

    debug!("compilation complete");
    Ok(BuildOutput {
        artifact,
        compiler_output,
    })
}

/// Enumerate intermediate files the compiler generated in the workdir.
fn generated_files(workdir: &Path, extension: &str) -> Result<Vec<PathBuf>, CompileError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(workdir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == extension)
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Combined stdout and stderr for compiler diagnostics
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !combined.is_empty() && !stderr.is_empty() {
        combined.push('\n');
    }
    combined.push_str(&stderr);
    combined
}
