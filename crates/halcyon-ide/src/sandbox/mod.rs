//! Execution sandbox
//!
//! Runs compiled artifacts with wasmi. Each run gets its own store, linear
//! memory and linker, so nothing leaks from one run into the next. The only
//! capability a program receives is writing text to the console.

use std::fmt;
use std::time::Instant;

use tracing::{debug, instrument};
use wasmi::{Engine, ExternType, Linker, Memory, MemoryType, Module, Store, StoreLimitsBuilder};

pub use crate::sandbox::host::{
    MEMORY_IMPORT, OutOfBounds, PRINT_STRING_IMPORT, output_lines, read_range,
};
use crate::config::SandboxConfig;
use crate::console::Console;
use crate::sandbox::host::HostState;
use crate::types::{Artifact, ExecutionSummary, SandboxLimits};

mod host;

/// First console line of a rendered crash
pub const CRASH_HEADER: &str = "The program has crashed with the message:";

/// What went wrong during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashKind {
    /// The artifact is not a valid module
    InvalidArtifact,
    /// Imports could not be satisfied
    Link,
    /// The program trapped in its start function or entry point
    Trap,
    /// `print_string` was asked for bytes outside linear memory
    MemoryAccess,
    /// The program printed more lines than allowed
    OutputLimit,
    /// The configured entry point is not exported as `() -> ()`
    MissingEntry,
}

impl fmt::Display for CrashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrashKind::InvalidArtifact => "invalid artifact",
            CrashKind::Link => "link error",
            CrashKind::Trap => "trap",
            CrashKind::MemoryAccess => "memory access out of bounds",
            CrashKind::OutputLimit => "output limit exceeded",
            CrashKind::MissingEntry => "missing entry point",
        };
        f.write_str(name)
    }
}

/// A failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    kind: CrashKind,
    message: String,
}

impl CrashReport {
    pub fn new(kind: CrashKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> CrashKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Lines shown on the console for this crash
    pub fn console_lines(&self) -> Vec<String> {
        std::iter::once(CRASH_HEADER.to_owned())
            .chain(self.message.lines().map(str::to_owned))
            .collect()
    }
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CrashReport {}

/// Executes artifacts in isolated wasmi stores
pub struct Sandbox {
    engine: Engine,
    namespace: String,
    entry_point: Option<String>,
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            engine: Engine::default(),
            namespace: config.namespace.clone(),
            entry_point: config.entry_point.clone(),
            limits: config.limits.clone(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Replace the resource caps applied to subsequent runs
    pub fn set_limits(&mut self, limits: SandboxLimits) {
        self.limits = limits;
    }

    /// Instantiate and run `artifact`, streaming its output to `console`
    ///
    /// Output written before a crash stays on the console.
    #[instrument(skip_all, fields(artifact_len = artifact.len()))]
    pub fn execute(
        &self,
        artifact: &Artifact,
        console: &Console,
    ) -> Result<ExecutionSummary, CrashReport> {
        let started = Instant::now();

        let module = Module::new(&self.engine, artifact.as_bytes())
            .map_err(|e| CrashReport::new(CrashKind::InvalidArtifact, e.to_string()))?;
        let memory_type = self.memory_import(&module)?;

        let mut store_limits = StoreLimitsBuilder::new();
        if let Some(bytes) = self.limits.max_memory_bytes() {
            store_limits = store_limits.memory_size(bytes);
        }
        let state = HostState::new(
            console.clone(),
            store_limits.build(),
            self.limits.max_output_lines,
        );
        let mut store = Store::new(&self.engine, state);
        store.limiter(|state| &mut state.limits);

        let memory = Memory::new(&mut store, memory_type).map_err(|e| {
            CrashReport::new(
                CrashKind::Link,
                format!("failed to create linear memory: {e}"),
            )
        })?;
        // Programs always start with at least one page, even when they declare zero
        if memory.size(&store) == 0 {
            memory.grow(&mut store, 1).map_err(|e| {
                CrashReport::new(
                    CrashKind::Link,
                    format!("linear memory cannot hold the required page: {e}"),
                )
            })?;
        }
        store.data_mut().memory = Some(memory);

        let mut linker = <Linker<HostState>>::new(&self.engine);
        linker
            .define(&self.namespace, MEMORY_IMPORT, memory)
            .map_err(|e| CrashReport::new(CrashKind::Link, e.to_string()))?;
        host::define_print_string(&mut linker, &self.namespace)?;

        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .map_err(|e| classify(&mut store, e, CrashKind::Link))?;

        if let Some(entry) = &self.entry_point {
            let func = instance
                .get_typed_func::<(), ()>(&store, entry)
                .map_err(|e| {
                    CrashReport::new(
                        CrashKind::MissingEntry,
                        format!("entry point '{entry}' is not an exported () -> () function: {e}"),
                    )
                })?;
            func.call(&mut store, ())
                .map_err(|e| classify(&mut store, e, CrashKind::Trap))?;
        }

        let summary = ExecutionSummary {
            lines_written: store.data().lines_written,
            wall_time: started.elapsed(),
        };
        debug!(
            lines = summary.lines_written,
            wall_time = ?summary.wall_time,
            "execution complete"
        );
        Ok(summary)
    }

    /// Find the module's `<namespace>.memory` import
    fn memory_import(&self, module: &Module) -> Result<MemoryType, CrashReport> {
        for import in module.imports() {
            if import.module() != self.namespace || import.name() != MEMORY_IMPORT {
                continue;
            }
            return match import.ty() {
                ExternType::Memory(ty) => Ok(*ty),
                other => Err(CrashReport::new(
                    CrashKind::Link,
                    format!(
                        "import {}.{MEMORY_IMPORT} must be a memory, found {other:?}",
                        self.namespace
                    ),
                )),
            };
        }
        Err(CrashReport::new(
            CrashKind::Link,
            format!(
                "module does not import its linear memory as {}.{MEMORY_IMPORT}",
                self.namespace
            ),
        ))
    }
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("namespace", &self.namespace)
            .field("entry_point", &self.entry_point)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Turn a wasmi error into a crash, preferring the reason a host call recorded
fn classify(store: &mut Store<HostState>, error: wasmi::Error, fallback: CrashKind) -> CrashReport {
    if let Some(fault) = store.data_mut().fault.take() {
        return fault;
    }
    let kind = if error.as_trap_code().is_some() {
        CrashKind::Trap
    } else {
        fallback
    };
    CrashReport::new(kind, error.to_string())
}
