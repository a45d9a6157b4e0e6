//! Compiler gateway
//!
//! The Halcyon compiler is an external black box with a single entry point,
//! `compile(source) -> bytes`, that signals failure with a string payload.
//! This module defines that boundary ([`Compiler`]) and the gateway that turns
//! every failure into a [`Diagnostic`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, instrument};

pub use crate::compiler::command::{CommandCompiler, resolve_program};
use crate::types::Artifact;

mod command;

/// Errors that occur while preparing a compiler backend
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("compiler command is empty")]
    EmptyCommand,

    #[error("compiler '{0}' not found in PATH")]
    NotFound(String),

    #[error("compiler path {0} is not a file")]
    NotAFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure signal raised by a compiler backend
///
/// Carries the raw, newline-delimited message exactly as the backend produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    payload: String,
}

impl CompileFailure {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

impl From<String> for CompileFailure {
    fn from(payload: String) -> Self {
        Self::new(payload)
    }
}

impl From<&str> for CompileFailure {
    fn from(payload: &str) -> Self {
        Self::new(payload)
    }
}

/// External compiler entry point
pub trait Compiler {
    fn compile(&self, source: &str) -> Result<Vec<u8>, CompileFailure>;
}

impl<F> Compiler for F
where
    F: Fn(&str) -> Result<Vec<u8>, CompileFailure>,
{
    fn compile(&self, source: &str) -> Result<Vec<u8>, CompileFailure> {
        self(source)
    }
}

/// Compiler error message split into display lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    lines: Vec<String>,
}

impl Diagnostic {
    /// Line used when the compiler fails without saying why
    pub const FALLBACK: &'static str = "compilation failed";

    /// Build a diagnostic from a newline-delimited payload
    ///
    /// Trailing empty lines are dropped; the result always has at least one
    /// non-empty line.
    pub fn from_payload(payload: &str) -> Self {
        let mut lines: Vec<String> = payload
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_owned())
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        if lines.iter().all(|line| line.trim().is_empty()) {
            lines = vec![Self::FALLBACK.to_owned()];
        }
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

/// Synchronous adapter over a [`Compiler`] backend
///
/// Performs no caching; every call reaches the backend.
pub struct CompilerGateway {
    backend: Box<dyn Compiler + Send>,
    invocations: u64,
}

impl CompilerGateway {
    pub fn new(backend: impl Compiler + Send + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            invocations: 0,
        }
    }

    /// Number of times the backend has been invoked
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Compile `source`, translating every backend failure into a [`Diagnostic`]
    #[instrument(skip_all, fields(source_len = source.len()))]
    pub fn compile(&mut self, source: &str) -> Result<Artifact, Diagnostic> {
        self.invocations += 1;

        let backend = &self.backend;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.compile(source)));

        let result = match outcome {
            Ok(Ok(bytes)) if bytes.is_empty() => Err(Diagnostic::from_payload(
                "compiler produced an empty artifact",
            )),
            Ok(Ok(bytes)) => Ok(Artifact::from(bytes)),
            Ok(Err(failure)) => Err(Diagnostic::from_payload(failure.payload())),
            Err(panic) => Err(Diagnostic::from_payload(&format!(
                "compiler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        match &result {
            Ok(artifact) => debug!(len = artifact.len(), "compiler succeeded"),
            Err(diagnostic) => debug!(lines = diagnostic.lines().len(), "compiler failed"),
        }

        result
    }
}

impl fmt::Debug for CompilerGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerGateway")
            .field("invocations", &self.invocations)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
