//! Configuration file loading for lope
//!
//! Handles loading and parsing configuration files using the config crate.

use std::collections::HashMap;
use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError, Strategy};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_extensions: HashMap<&str, &str> = HashMap::new();

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty extension"
                )));
            }
            if let Some(other) = seen_extensions.insert(lang.extension.as_str(), id) {
                return Err(ConfigError::Invalid(format!(
                    "extension '{}' is claimed by both '{other}' and '{id}'",
                    lang.extension
                )));
            }

            match lang.strategy {
                Strategy::Direct => {
                    if lang.run.is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "direct language '{id}' has no run command"
                        )));
                    }
                }
                Strategy::Compile => {
                    if lang.compile.is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "compiled language '{id}' has no compile command"
                        )));
                    }
                }
                Strategy::CompileToRuntime => {
                    let compile = lang.compile.as_ref().ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "runtime language '{id}' has no compile command"
                        ))
                    })?;
                    if compile.artifact_ext.is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "runtime language '{id}' has no artifact_ext"
                        )));
                    }
                    if lang.run.is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "runtime language '{id}' has no run command"
                        )));
                    }
                }
            }

            if let Some(ref compile) = lang.compile
                && compile.command.is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty compile command"
                )));
            }
            if let Some(ref run) = lang.run
                && run.command.is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
        }

        Ok(())
    }
}
