//! Compile and run pipeline for the Halcyon IDE.
//!
//! Halcyon IDE takes Halcyon source text from an editor, compiles it with an
//! external compiler into a WebAssembly module, and runs the module in an
//! in-process sandbox whose only capability is printing to a console.
//!
//! # Features
//!
//! - **Compile action**: Diagnostics rendered line by line on failure.
//! - **Run action**: Compiles on demand and streams program output as it is printed.
//! - **Artifact cache**: One artifact per editor text, dropped on every edit.
//! - **Sandboxed execution**: Fresh wasmi store per run with memory and output caps.
//! - **TOML configuration**: Compiler command, host namespace, and limits.

pub use cache::{ArtifactCache, Cached};
pub use compiler::{
    CommandCompiler, CompileFailure, Compiler, CompilerError, CompilerGateway, Diagnostic,
};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG};
pub use console::{Console, ConsoleRenderer};
pub use pipeline::{Editor, Failure, InitError, Pipeline, PipelineState, TextBuffer};
pub use sandbox::{CrashKind, CrashReport, Sandbox};
pub use types::{Artifact, ExecutionSummary, RunReport, SandboxLimits};

pub mod cache;
pub mod compiler;
pub mod config;
pub mod console;
pub mod pipeline;
pub mod sandbox;
pub mod types;
