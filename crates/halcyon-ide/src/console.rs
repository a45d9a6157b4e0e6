//! Line-oriented console sink
//!
//! Collects compiler diagnostics and program output. The buffer is shared
//! behind a cloneable handle so that the sandbox's host functions can stream
//! lines into it while a program runs.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Display collaborator that mirrors the console, e.g. a terminal widget
pub trait ConsoleRenderer: Send {
    fn clear(&mut self);

    fn write_line(&mut self, line: &str);
}

/// Append-only line buffer with a full reset
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<ConsoleInner>>,
}

struct ConsoleInner {
    lines: VecDeque<String>,
    history_limit: Option<usize>,
    renderer: Option<Box<dyn ConsoleRenderer>>,
}

impl Console {
    /// Create a console that keeps every line
    pub fn new() -> Self {
        Self::with_history_limit(None)
    }

    /// Create a console that keeps at most `limit` lines, dropping the oldest first
    pub fn with_history_limit(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConsoleInner {
                lines: VecDeque::new(),
                history_limit: limit,
                renderer: None,
            })),
        }
    }

    /// Attach the display that receives every clear and line as it happens
    pub fn set_renderer(&self, renderer: impl ConsoleRenderer + 'static) {
        self.lock().renderer = Some(Box::new(renderer));
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.lines.clear();
        if let Some(renderer) = inner.renderer.as_mut() {
            renderer.clear();
        }
    }

    pub fn write_line(&self, line: impl Into<String>) {
        let line = line.into();
        let mut inner = self.lock();
        if let Some(renderer) = inner.renderer.as_mut() {
            renderer.write_line(&line);
        }
        if let Some(limit) = inner.history_limit {
            // A zero limit keeps nothing but still mirrors to the renderer
            if limit == 0 {
                return;
            }
            while inner.lines.len() >= limit {
                inner.lines.pop_front();
            }
        }
        inner.lines.push_back(line);
    }

    /// Write each line in order
    pub fn write_lines<I>(&self, lines: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for line in lines {
            self.write_line(line);
        }
    }

    /// Snapshot of the buffered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleInner> {
        // A panicking renderer must not take the console down with it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Console")
            .field("lines", &inner.lines.len())
            .field("history_limit", &inner.history_limit)
            .field("renderer", &inner.renderer.is_some())
            .finish()
    }
}
