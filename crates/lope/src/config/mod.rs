use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{
    CommandVars, CompileConfig, FileExtension, Language, RunConfig, Strategy,
};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../lope.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("unsupported file extension '{0}'")]
    UnsupportedExtension(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Cache behavior settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Whether build artifacts are cached at all
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Entries older than this many days are evicted
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,

    /// Cache directory override (defaults to the platform cache home)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_days: default_max_age_days(),
            dir: None,
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_max_age_days() -> u64 {
    7
}

/// Config for lope
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            cache: CacheConfig::default(),
            languages: HashMap::new(),
        }
    }

    /// Look up the language responsible for a file extension.
    ///
    /// Pure lookup over the validated table; extensions are unique across
    /// languages, enforced at load time.
    pub fn resolve_extension(&self, extension: &str) -> Result<&Language, ConfigError> {
        self.languages
            .values()
            .find(|lang| lang.extension.as_str() == extension)
            .ok_or_else(|| ConfigError::UnsupportedExtension(extension.to_owned()))
    }

    /// Look up a Direct-strategy language by its interpreter name.
    ///
    /// Used for shebang sniffing: the basename of the shebang interpreter
    /// (e.g. "python3") is matched against the basename of each interpreted
    /// language's runner command.
    pub fn resolve_interpreter(&self, interpreter: &str) -> Option<&Language> {
        self.languages.values().find(|lang| {
            lang.strategy == Strategy::Direct
                && lang.run.as_ref().is_some_and(|run| {
                    run.command.first().is_some_and(|cmd| {
                        std::path::Path::new(cmd)
                            .file_name()
                            .is_some_and(|name| name == interpreter)
                    })
                })
        })
    }

    /// Sorted list of supported extensions, for error reporting
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .languages
            .values()
            .map(|lang| lang.extension.to_string())
            .collect();
        extensions.sort();
        extensions
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}
