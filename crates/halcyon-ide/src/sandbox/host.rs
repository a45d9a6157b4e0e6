//! Host import surface
//!
//! Programs get exactly one host function, `print_string(offset, length)`,
//! plus the linear memory it reads from. Every range the program hands us is
//! untrusted and checked against the current memory size.

use std::fmt;

use tracing::trace;
use wasmi::{Caller, Linker, Memory, StoreLimits};

use crate::console::Console;
use crate::sandbox::{CrashKind, CrashReport};

/// Name of the imported linear memory
pub const MEMORY_IMPORT: &str = "memory";

/// Name of the imported output function
pub const PRINT_STRING_IMPORT: &str = "print_string";

/// Per-run state owned by the store
pub(crate) struct HostState {
    pub(crate) console: Console,
    pub(crate) memory: Option<Memory>,
    pub(crate) limits: StoreLimits,
    pub(crate) max_output_lines: Option<usize>,
    pub(crate) lines_written: usize,
    pub(crate) fault: Option<CrashReport>,
}

impl HostState {
    pub(crate) fn new(
        console: Console,
        limits: StoreLimits,
        max_output_lines: Option<usize>,
    ) -> Self {
        Self {
            console,
            memory: None,
            limits,
            max_output_lines,
            lines_written: 0,
            fault: None,
        }
    }

    /// Record why a host call aborted the program and build the trap for it
    fn abort(&mut self, kind: CrashKind, message: String) -> wasmi::Error {
        let error = wasmi::Error::new(message.clone());
        self.fault = Some(CrashReport::new(kind, message));
        error
    }
}

/// A byte range outside the current linear memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub offset: u64,
    pub length: u64,
    pub memory_size: usize,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "print_string: range of {} bytes at offset {} is outside linear memory of {} bytes",
            self.length, self.offset, self.memory_size
        )
    }
}

/// Borrow `length` bytes at `offset` from `memory`, if the whole range is in bounds
pub fn read_range(memory: &[u8], offset: u64, length: u64) -> Result<&[u8], OutOfBounds> {
    let out_of_bounds = OutOfBounds {
        offset,
        length,
        memory_size: memory.len(),
    };
    let end = offset.checked_add(length).ok_or(out_of_bounds)?;
    if end > memory.len() as u64 {
        return Err(out_of_bounds);
    }
    let start = usize::try_from(offset).map_err(|_| out_of_bounds)?;
    let end = usize::try_from(end).map_err(|_| out_of_bounds)?;
    Ok(&memory[start..end])
}

/// Split printed text into console lines, skipping empty ones
pub fn output_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').filter(|line| !line.is_empty())
}

/// Register `print_string` under `namespace`
pub(crate) fn define_print_string(
    linker: &mut Linker<HostState>,
    namespace: &str,
) -> Result<(), CrashReport> {
    linker
        .func_wrap(
            namespace,
            PRINT_STRING_IMPORT,
            |mut caller: Caller<'_, HostState>, offset: i64, length: i64| {
                // The ABI passes unsigned 64-bit values in i64 slots
                print_string(&mut caller, offset as u64, length as u64)
            },
        )
        .map_err(|e| CrashReport::new(CrashKind::Link, e.to_string()))?;
    Ok(())
}

fn print_string(
    caller: &mut Caller<'_, HostState>,
    offset: u64,
    length: u64,
) -> Result<(), wasmi::Error> {
    let Some(memory) = caller.data().memory else {
        return Err(caller
            .data_mut()
            .abort(CrashKind::Link, "no linear memory is attached".to_owned()));
    };

    let text = read_range(memory.data(&*caller), offset, length)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
    let text = match text {
        Ok(text) => text,
        Err(out_of_bounds) => {
            return Err(caller
                .data_mut()
                .abort(CrashKind::MemoryAccess, out_of_bounds.to_string()));
        }
    };

    let state = caller.data_mut();
    for line in output_lines(&text) {
        if let Some(limit) = state.max_output_lines
            && state.lines_written >= limit
        {
            return Err(state.abort(
                CrashKind::OutputLimit,
                format!("output limit of {limit} lines exceeded"),
            ));
        }
        trace!(line, "program output");
        state.console.write_line(line);
        state.lines_written += 1;
    }
    Ok(())
}
