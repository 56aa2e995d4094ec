//! Plain data shared by the front end, the runner and the batch.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ScriptError;
use crate::writer::generated;

/// Position of a token or node inside a script. `line` and `column` are
/// 0-based; they are shifted to 1-based only when printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One compiler finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Set when a warning was elevated by `warnings_as_errors`.
    pub warning_as_error: bool,
    pub code: &'static str,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            warning_as_error: false,
            code,
            span,
            message: message.into(),
            help: None,
        }
    }

    pub fn warning(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, span, message)
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Errors, and warnings promoted to errors, stop a script from running.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error || self.warning_as_error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.is_blocking() { "error" } else { "warning" };
        write!(f, "{}: {level}[{}]: {}", self.span, self.code, self.message)
    }
}

/// One frame of a script exception's trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub path: PathBuf,
    pub span: Span,
}

/// An exception raised while a compiled script was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    pub message: String,
    /// Innermost frame first. Empty when the fault did not come from script
    /// code (for example a failed output write).
    pub stack: Vec<Frame>,
}

impl ScriptException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Vec::new(),
        }
    }

    pub fn at(message: impl Into<String>, path: &Path, span: Span) -> Self {
        Self {
            message: message.into(),
            stack: vec![Frame {
                path: path.to_path_buf(),
                span,
            }],
        }
    }

    /// Where the exception was raised, when known.
    pub fn origin(&self) -> Option<Span> {
        self.stack.first().map(|frame| frame.span)
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for frame in &self.stack {
            write!(f, "\n   at {}:{}", frame.path.display(), frame.span)?;
        }
        Ok(())
    }
}

/// A script picked up by the batch: its path, source and derived output.
#[derive(Debug, Clone)]
pub struct ScriptUnit {
    pub path: PathBuf,
    pub source: String,
    pub output_path: PathBuf,
}

impl ScriptUnit {
    pub fn read(path: &Path, output_extension: &str) -> Result<Self, ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::ReadScript {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            source,
            output_path: generated::output_path(path, output_extension),
        })
    }
}
