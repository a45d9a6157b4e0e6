use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::toolchain::{CompilerConfig, expand_command};
use crate::types::SandboxLimits;

mod loader;
pub mod toolchain;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../halcyon.example.toml");

/// Default namespace the sandbox registers its host imports under
pub const DEFAULT_NAMESPACE: &str = "sys";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid file name '{0}': must not contain '/' or '..'")]
    InvalidFileName(String),

    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for the Halcyon IDE pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External compiler invocation
    pub compiler: CompilerConfig,

    /// Execution sandbox settings
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Console buffer settings
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Configuration for the execution sandbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Import module name for `memory` and `print_string`
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Exported `() -> ()` function called after the start function.
    ///
    /// When unset, running a program means instantiating it, which runs
    /// its start function only.
    #[serde(default)]
    pub entry_point: Option<String>,

    /// Resource caps applied to every run
    #[serde(default)]
    pub limits: SandboxLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            entry_point: None,
            limits: SandboxLimits::default(),
        }
    }
}

/// Configuration for the console line buffer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Number of lines kept before the oldest are dropped (unbounded if unset)
    #[serde(default)]
    pub history_limit: Option<usize>,
}

impl Config {
    /// Create a new config from the embedded defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config around the given compiler with every other setting at its default
    pub fn with_compiler(compiler: CompilerConfig) -> Self {
        Self {
            compiler,
            sandbox: SandboxConfig::default(),
            console: ConsoleConfig::default(),
        }
    }

    /// Merge sandbox limits with the configured ones
    pub fn effective_limits(&self, overrides: Option<&SandboxLimits>) -> SandboxLimits {
        match overrides {
            Some(limits) => self.sandbox.limits.with_overrides(limits),
            None => self.sandbox.limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}
