use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// An immutable binary module produced by a successful compile
///
/// Cloning is cheap: the bytes are shared and never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check whether two handles share the same underlying buffer
    pub fn ptr_eq(&self, other: &Artifact) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl From<Vec<u8>> for Artifact {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    /// Upper bound on linear memory, in 64 KiB pages
    #[serde(default)]
    pub max_memory_pages: Option<u32>,

    /// Maximum number of console lines a single run may emit
    #[serde(default)]
    pub max_output_lines: Option<usize>,
}

impl SandboxLimits {
    /// Size of a WebAssembly page in bytes
    pub const PAGE_SIZE: usize = 64 * 1024;

    /// Create limits with every cap unset
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = Some(pages);
        self
    }

    pub fn with_max_output_lines(mut self, lines: usize) -> Self {
        self.max_output_lines = Some(lines);
        self
    }

    /// Apply overrides from another SandboxLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &SandboxLimits) -> SandboxLimits {
        SandboxLimits {
            max_memory_pages: overrides.max_memory_pages.or(self.max_memory_pages),
            max_output_lines: overrides.max_output_lines.or(self.max_output_lines),
        }
    }

    /// Memory cap in bytes, if any
    pub fn max_memory_bytes(&self) -> Option<usize> {
        self.max_memory_pages
            .map(|pages| (pages as usize).saturating_mul(Self::PAGE_SIZE))
    }
}

/// Outcome of a run that completed without crashing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Lines forwarded to the console by `print_string`
    pub lines_written: usize,

    /// Wall clock time spent instantiating and running the module
    pub wall_time: Duration,
}

/// Report returned by a successful Run action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Whether the action had to compile before executing
    pub compiled: bool,

    pub execution: ExecutionSummary,
}

impl RunReport {
    pub fn lines_written(&self) -> usize {
        self.execution.lines_written
    }
}
