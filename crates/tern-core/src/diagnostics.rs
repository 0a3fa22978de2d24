//! Diagnostic log for recoverable backend failures.
//!
//! The backend never prints and never aborts on a user-fixable condition:
//! it appends a [`Diagnostic`] to the caller-owned [`Diagnostics`] log and
//! keeps going, so one invocation surfaces every problem it can find.

use std::collections::VecDeque;
use std::fmt;

use crate::SourcePos;

/// Stable diagnostic codes emitted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A call referenced a function no linked module defines.
    UnresolvedSymbol,
    /// A method body's encoded size exceeded the format ceiling.
    MethodTooLarge,
    /// A code unit's combined data exceeded the format ceiling.
    UnitTooLarge,
    /// An external function has no registered native implementation.
    InvalidExternalBinding,
}

impl DiagnosticCode {
    /// The stable code string reported to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnresolvedSymbol => "TCE0401",
            DiagnosticCode::MethodTooLarge => "TCE0402",
            DiagnosticCode::UnitTooLarge => "TCE0403",
            DiagnosticCode::InvalidExternalBinding => "TCE0404",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The condition makes the produced artifact incomplete.
    Error,
    /// The condition is suspicious but does not invalidate the artifact.
    Warning,
}

/// A single diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity.
    pub kind: DiagnosticKind,
    /// Stable code.
    pub code: DiagnosticCode,
    /// Human-readable message. When no source position exists, the message
    /// names the synthetic unit the problem was found in.
    pub message: String,
    /// Source position, if the offending construct has one.
    pub pos: Option<SourcePos>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
        };
        match &self.pos {
            Some(pos) => write!(f, "{pos}: {kind} [{}]: {}", self.code, self.message),
            None => write!(f, "{kind} [{}]: {}", self.code, self.message),
        }
    }
}

/// An accumulating collection of diagnostics.
///
/// Owned by the invoking pipeline and passed into each emission call; the
/// caller decides whether accumulated errors abort the overall build.
#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: VecDeque<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        if diagnostic.kind == DiagnosticKind::Error {
            self.error_count += 1;
        }
        self.diagnostics.push_back(diagnostic);
    }

    /// Append an error diagnostic.
    pub fn error(&mut self, pos: Option<SourcePos>, code: DiagnosticCode, message: impl Into<String>) {
        self.add(Diagnostic {
            kind: DiagnosticKind::Error,
            code,
            message: message.into(),
            pos,
        });
    }

    /// Whether any error-severity diagnostic has been recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Total number of diagnostics.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Iterate over all diagnostics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Iterate over error-severity diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Error)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
