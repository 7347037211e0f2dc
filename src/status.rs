//! Accumulated diagnostics for one refactoring invocation.
//!
//! Modeled after the status object refactoring frameworks hand back to
//! their UI layer: every phase appends entries, fatal entries stop edit
//! construction, and the caller inspects the final list before applying
//! anything. No severity is ever raised by throwing.

use serde::{Deserialize, Serialize};

use crate::ast::Span;

/// Severity of a single status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Edits may be produced; the user is informed.
    Warning,
    /// The extraction is still attempted, but flagged.
    Error,
    /// The invocation aborts with zero edits.
    Fatal,
}

/// One diagnostic produced while planning a refactoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Severity of this entry.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Source range the message refers to, when one exists.
    pub context: Option<Span>,
}

/// Ordered collection of diagnostics for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefactoringStatus {
    /// All entries, in the order they were recorded.
    pub entries: Vec<StatusEntry>,
}

impl RefactoringStatus {
    /// Create an empty status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn add_warning(&mut self, message: impl Into<String>, context: Option<Span>) {
        self.push(Severity::Warning, message, context);
    }

    /// Record a non-fatal error.
    pub fn add_error(&mut self, message: impl Into<String>, context: Option<Span>) {
        self.push(Severity::Error, message, context);
    }

    /// Record a fatal entry; callers stop building edits once one exists.
    pub fn add_fatal(&mut self, message: impl Into<String>, context: Option<Span>) {
        self.push(Severity::Fatal, message, context);
    }

    fn push(&mut self, severity: Severity, message: impl Into<String>, context: Option<Span>) {
        self.entries.push(StatusEntry {
            severity,
            message: message.into(),
            context,
        });
    }

    /// Append every entry of `other`.
    pub fn merge(&mut self, other: RefactoringStatus) {
        self.entries.extend(other.entries);
    }

    /// True if any fatal entry was recorded.
    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Fatal)
    }

    /// Highest severity recorded, if any entry exists.
    pub fn max_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|e| e.severity).max()
    }

    /// True if nothing was recorded.
    pub fn is_ok(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages of all entries at the given severity.
    pub fn messages_at(&self, severity: Severity) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.as_str())
            .collect()
    }
}
