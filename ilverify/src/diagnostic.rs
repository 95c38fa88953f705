//! Diagnostics as values (§7, design note §9): verification never
//! writes text, it returns [`Diagnostic`]s through a [`DiagSink`].

use std::fmt;

use thiserror::Error;

/// Diagnostic severity (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Structured error codes for the exception-handling analyser (§6.1).
/// Other checkers report through [`Diagnostic::message`] alone; these
/// are the codes spec.md calls out by name because callers branch on
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorCode {
    #[error("handler stack underflow")]
    EhStackUnderflow,
    #[error("handler stack leak")]
    EhStackLeak,
    #[error("resume token missing")]
    EhResumeTokenMissing,
    #[error("resume.label target is not a valid post-dominator")]
    EhResumeLabelInvalidTarget,
    #[error("handler block is not dominant over its covered region")]
    EhHandlerNotDominant,
    #[error("handler block is unreachable")]
    EhHandlerUnreachable,
}

/// One verification finding (§6.1 `Diagnostic`).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub code: Option<ErrorCode>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            code: None,
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            code: None,
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// `<file>:<line>:<col>: <severity>: <message>` (§7). Renders `?` for
/// an absent position field; rendering the positioned text itself is
/// out of scope (§1) — this `Display` impl is the contract surface a
/// renderer built against this crate would call.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file.as_deref().unwrap_or("?");
        let line = self
            .line
            .map(|l| l.to_string())
            .unwrap_or_else(|| "?".to_string());
        let col = self
            .column
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());
        write!(f, "{file}:{line}:{col}: {}: {}", self.severity, self.message)
    }
}

/// Decouples diagnostic collection from control flow (design note §9).
pub trait DiagSink {
    /// Record a diagnostic. Returns `false` if the sink wants
    /// verification to stop immediately (fail-fast sinks return
    /// `false` on the first error).
    fn report(&mut self, diag: Diagnostic) -> bool;

    fn has_error(&self) -> bool;
}

/// Collects every diagnostic, warnings included; never stops early.
#[derive(Debug, Default)]
pub struct VecSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagSink for VecSink {
    fn report(&mut self, diag: Diagnostic) -> bool {
        self.diagnostics.push(diag);
        true
    }

    fn has_error(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Stops at the first error; keeps any warnings reported before it.
/// Used internally by [`crate::pipeline::verify`], whose public result
/// is `Result<(), Diagnostic>` — only the first failure matters there.
#[derive(Debug, Default)]
pub struct FailFastSink {
    pub diagnostics: Vec<Diagnostic>,
    stopped: bool,
}

impl DiagSink for FailFastSink {
    fn report(&mut self, diag: Diagnostic) -> bool {
        let is_error = diag.is_error();
        self.diagnostics.push(diag);
        if is_error {
            self.stopped = true;
        }
        !self.stopped
    }

    fn has_error(&self) -> bool {
        self.stopped
    }
}

impl FailFastSink {
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_error())
    }
}
