use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

const INVALID_FILE_NAME_PARTS: [&str; 2] = ["/", ".."];

/// Configuration for the external compiler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {output}
    pub command: Vec<String>,

    /// File name the source text is written to (e.g., "main.hc")
    pub source_name: String,

    /// File name the compiler writes the module to (e.g., "main.wasm")
    pub output_name: String,

    /// Environment variables to set for the compiler process
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl CompilerConfig {
    /// Expand placeholders in the configured command
    pub fn expanded_command(&self) -> Vec<String> {
        expand_command(&self.command, &self.source_name, &self.output_name)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.command.is_empty() || self.command[0].is_empty() {
            return Err(ConfigError::Invalid(
                "compiler command is empty".to_owned(),
            ));
        }
        validate_file_name("source_name", &self.source_name)?;
        validate_file_name("output_name", &self.output_name)?;
        if self.source_name == self.output_name {
            return Err(ConfigError::Invalid(format!(
                "compiler source_name and output_name are both '{}'",
                self.source_name
            )));
        }
        Ok(())
    }
}

/// Expand placeholders in the given command
pub fn expand_command(command: &[String], source: &str, output: &str) -> Vec<String> {
    command
        .iter()
        .map(|arg| arg.replace("{source}", source).replace("{output}", output))
        .collect()
}

fn validate_file_name(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Invalid(format!("compiler {field} is empty")));
    }
    if INVALID_FILE_NAME_PARTS.iter().any(|part| name.contains(part)) {
        return Err(ConfigError::InvalidFileName(name.to_owned()));
    }
    Ok(())
}
