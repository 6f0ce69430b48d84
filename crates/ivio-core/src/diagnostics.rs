//! Diagnostics reported while reading or writing scene files.
//!
//! Parse problems are rarely fatal. The engine reports them here and keeps
//! going wherever the stream structure allows it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational, e.g. a format note.
    Info,
    /// Recoverable problem, the value was replaced or the item dropped.
    Warning,
    /// Read error; the current item could not be parsed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// One reported problem, with the stream position it was found at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity of the problem.
    pub severity: Severity,
    /// Human readable message.
    pub message: String,
    /// Name of the stream: a path, `<stdin>` or `<memory>`.
    pub file: String,
    /// Line number in ASCII streams.
    pub line: usize,
    /// Byte offset, set for binary streams where lines carry no meaning.
    pub offset: Option<u64>,
}

impl Diagnostic {
    /// Create a diagnostic for an ASCII stream position.
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<String>,
        line: usize,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            file: file.into(),
            line,
            offset: None,
        }
    }

    /// Attach a binary byte offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The position part of the message, e.g. `Occurred at line   3 in a.iv`.
    pub fn location(&self) -> String {
        match self.offset {
            Some(offset) => format!("Occurred at position {} in binary file {}", offset, self.file),
            None => format!("Occurred at line {:>3} in {}", self.line, self.file),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}\n    {}", self.severity, self.message, self.location())
    }
}

/// Receiver for diagnostics.
pub trait DiagnosticSink: Send {
    /// Record one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl<F> DiagnosticSink for F
where
    F: FnMut(Diagnostic) + Send,
{
    fn report(&mut self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

/// Sink that forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => log::info!("{}", diagnostic),
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
    }
}

/// Sink that keeps every diagnostic in a shared list.
///
/// Clones share the same list, so a clone can be handed to a session while
/// the original is inspected afterwards.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl CollectingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all diagnostics so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Number of diagnostics so far.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop everything collected so far.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }
}
