//! Compile and run orchestration
//!
//! [`Pipeline`] owns the editor, the compiler gateway, the artifact cache, the
//! sandbox and the console, and implements the two user actions, Compile and
//! Run, as a small state machine. Actions take `&mut self`, so one action
//! always finishes before the next begins.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument};

pub use crate::pipeline::editor::{Editor, TextBuffer};
use crate::cache::{ArtifactCache, Cached};
use crate::compiler::{CommandCompiler, Compiler, CompilerError, CompilerGateway, Diagnostic};
use crate::config::{Config, ConfigError};
use crate::console::Console;
use crate::sandbox::{CrashReport, Sandbox};
use crate::types::{Artifact, RunReport};

mod editor;

/// Console line written after a successful compile
pub const COMPILE_SUCCESS: &str = "Compiled Successfully";

/// Errors that prevent the pipeline from becoming ready
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to prepare compiler: {0}")]
    Compiler(#[from] CompilerError),
}

/// Why the last action failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The compiler rejected the source
    Diagnostic(Diagnostic),
    /// The program crashed while running
    Crash(CrashReport),
}

impl Failure {
    /// Lines shown on the console for this failure
    pub fn console_lines(&self) -> Vec<String> {
        match self {
            Failure::Diagnostic(diagnostic) => diagnostic.lines().to_vec(),
            Failure::Crash(crash) => crash.console_lines(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Diagnostic(diagnostic) => write!(f, "compilation failed: {diagnostic}"),
            Failure::Crash(crash) => write!(f, "program crashed: {crash}"),
        }
    }
}

impl std::error::Error for Failure {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Compiling,
    Compiled,
    Running,
    Failed(Failure),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Compiling => "compiling",
            PipelineState::Compiled => "compiled",
            PipelineState::Running => "running",
            PipelineState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback invoked with `(from, to)` on every state change
pub type TransitionObserver = Box<dyn FnMut(&PipelineState, &PipelineState) + Send>;

/// The compile/run controller
///
/// A pipeline only exists once its environment is ready, so holding one means
/// Compile and Run are available.
pub struct Pipeline<E: Editor = TextBuffer> {
    editor: E,
    gateway: CompilerGateway,
    cache: ArtifactCache,
    sandbox: Sandbox,
    console: Console,
    state: PipelineState,
    observers: Vec<TransitionObserver>,
}

impl<E: Editor> Pipeline<E> {
    /// Prepare the configured external compiler and build a ready pipeline
    #[instrument(skip_all)]
    pub async fn initialize(config: &Config, editor: E, console: Console) -> Result<Self, InitError> {
        config.validate()?;
        let compiler = CommandCompiler::prepare(&config.compiler).await?;
        info!(compiler = %compiler.program().display(), "pipeline ready");
        Ok(Self::with_compiler(config, compiler, editor, console))
    }

    /// Build a pipeline over an already prepared compiler
    pub fn with_compiler(
        config: &Config,
        compiler: impl Compiler + Send + 'static,
        editor: E,
        console: Console,
    ) -> Self {
        Self {
            editor,
            gateway: CompilerGateway::new(compiler),
            cache: ArtifactCache::new(),
            sandbox: Sandbox::new(&config.sandbox),
            console,
            state: PipelineState::Idle,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn sandbox_mut(&mut self) -> &mut Sandbox {
        &mut self.sandbox
    }

    /// The cached artifact, if the current text has been compiled
    pub fn artifact(&self) -> Option<&Artifact> {
        self.cache.get()
    }

    /// Number of times the external compiler has been invoked
    pub fn compile_invocations(&self) -> u64 {
        self.gateway.invocations()
    }

    /// Register a callback for state changes
    pub fn on_transition(
        &mut self,
        observer: impl FnMut(&PipelineState, &PipelineState) + Send + 'static,
    ) {
        self.observers.push(Box::new(observer));
    }

    /// Change the editor contents and fire the edit event
    pub fn edit<R>(&mut self, change: impl FnOnce(&mut E) -> R) -> R {
        let result = change(&mut self.editor);
        self.notify_edit();
        result
    }

    /// Edit event for editors changed outside of [`Pipeline::edit`]
    pub fn notify_edit(&mut self) {
        self.cache.invalidate();
        if self.state == PipelineState::Compiled {
            self.transition(PipelineState::Idle);
        }
    }

    /// The Compile action
    ///
    /// Reuses the cached artifact when the text has not changed since the
    /// last successful compile.
    #[instrument(skip(self))]
    pub fn compile(&mut self) -> Result<Artifact, Diagnostic> {
        self.console.clear();
        self.compile_current().map(Cached::into_artifact)
    }

    /// The Run action
    ///
    /// Compiles first when no artifact is cached. A crash leaves the artifact
    /// cached so it can be run again.
    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<RunReport, Failure> {
        self.console.clear();

        let (artifact, compiled) = match self.cache.get().cloned() {
            Some(artifact) => (artifact, false),
            None => {
                let cached = self.compile_current().map_err(Failure::Diagnostic)?;
                (cached.into_artifact(), true)
            }
        };

        self.transition(PipelineState::Running);
        match self.sandbox.execute(&artifact, &self.console) {
            Ok(execution) => {
                self.transition(PipelineState::Compiled);
                Ok(RunReport {
                    compiled,
                    execution,
                })
            }
            Err(crash) => {
                debug!(kind = %crash.kind(), "program crashed");
                self.console.write_lines(crash.console_lines());
                let failure = Failure::Crash(crash);
                self.transition(PipelineState::Failed(failure.clone()));
                Err(failure)
            }
        }
    }

    fn compile_current(&mut self) -> Result<Cached, Diagnostic> {
        let source = self.editor.text();
        self.transition(PipelineState::Compiling);

        match self.cache.get_or_compile(&mut self.gateway, &source) {
            Ok(cached) => {
                self.console.write_line(COMPILE_SUCCESS);
                self.transition(PipelineState::Compiled);
                Ok(cached)
            }
            Err(diagnostic) => {
                self.cache.invalidate();
                self.console.write_lines(diagnostic.lines().iter().cloned());
                self.transition(PipelineState::Failed(Failure::Diagnostic(
                    diagnostic.clone(),
                )));
                Err(diagnostic)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        let previous = std::mem::replace(&mut self.state, next);
        debug!(from = %previous, to = %self.state, "pipeline transition");
        for observer in &mut self.observers {
            observer(&previous, &self.state);
        }
    }
}

impl<E: Editor> fmt::Debug for Pipeline<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("cached", &self.cache.get().is_some())
            .field("gateway", &self.gateway)
            .field("sandbox", &self.sandbox)
            .finish_non_exhaustive()
    }
}
