use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// How a language's source files become something runnable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Interpreter runs the source file directly, no compile step
    Direct,

    /// Compiler produces a single native executable
    Compile,

    /// Compiler produces intermediate files executed by a separate runtime
    /// (e.g. bytecode plus a VM)
    CompileToRuntime,
}

/// Configuration for a programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C (GCC)")
    pub name: String,

    /// File extension
    pub extension: FileExtension,

    /// Execution strategy
    pub strategy: Strategy,

    /// Compilation configuration (required for Compile and CompileToRuntime)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration (required for Direct and CompileToRuntime)
    #[serde(default)]
    pub run: Option<RunConfig>,
}

impl Language {
    /// Check if the language needs a compile step
    pub fn is_compiled(&self) -> bool {
        matches!(self.strategy, Strategy::Compile | Strategy::CompileToRuntime)
    }

    /// Expand placeholders in the given command.
    ///
    /// `{source}`, `{output}`, `{dir}` and `{entry}` are substituted inside
    /// each argument. An argument that is exactly `{flags}` is spliced into
    /// the already-tokenized flag list, so a flag never travels through a
    /// shell or gets re-split.
    pub fn expand_command(command: &[String], vars: &CommandVars<'_>) -> Vec<String> {
        let mut out = Vec::with_capacity(command.len() + vars.flags.len());
        for arg in command {
            if arg == "{flags}" {
                out.extend(vars.flags.iter().cloned());
                continue;
            }
            out.push(
                arg.replace("{source}", vars.source)
                    .replace("{output}", vars.output)
                    .replace("{binary}", vars.output)
                    .replace("{dir}", vars.dir)
                    .replace("{entry}", vars.entry),
            );
        }
        out
    }
}

/// Substitution values for [`Language::expand_command`]
#[derive(Debug, Default)]
pub struct CommandVars<'a> {
    /// Path to the source file
    pub source: &'a str,
    /// Path of the produced executable
    pub output: &'a str,
    /// Directory holding runtime intermediate files
    pub dir: &'a str,
    /// Runtime entry point name (source file stem)
    pub entry: &'a str,
    /// Tokenized compiler flags, spliced at `{flags}`
    pub flags: Vec<String>,
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {flags}, {source}, {output}
    pub command: Vec<String>,

    /// Flags used when the override environment variable is unset
    #[serde(default)]
    pub default_flags: String,

    /// Environment variable whose value, when set, replaces default_flags
    #[serde(default)]
    pub flags_env: Option<String>,

    /// Extension of intermediate files generated by a CompileToRuntime
    /// compiler (e.g. "class")
    #[serde(default)]
    pub artifact_ext: Option<String>,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {binary}, {dir}, {entry}
    pub command: Vec<String>,

    /// Environment variables to set for the program
    #[serde(default)]
    pub env: HashMap<String, String>,
}
