//! Configuration file loading for the Halcyon IDE
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

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
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compiler.validate()?;

        if self.sandbox.namespace.is_empty() {
            return Err(ConfigError::Invalid(
                "sandbox namespace is empty".to_owned(),
            ));
        }
        if let Some(ref entry) = self.sandbox.entry_point
            && entry.is_empty()
        {
            return Err(ConfigError::Invalid(
                "sandbox entry_point is empty".to_owned(),
            ));
        }
        if self.sandbox.limits.max_memory_pages == Some(0) {
            return Err(ConfigError::Invalid(
                "max_memory_pages must be at least 1".to_owned(),
            ));
        }
        if self.sandbox.limits.max_output_lines == Some(0) {
            return Err(ConfigError::Invalid(
                "max_output_lines must be at least 1".to_owned(),
            ));
        }
        if self.console.history_limit == Some(0) {
            return Err(ConfigError::Invalid(
                "console history_limit must be at least 1".to_owned(),
            ));
        }

        Ok(())
    }
}
