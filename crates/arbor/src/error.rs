// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for routing, compilation and rendering.
//!
//! This module defines [`ArborError`], the main error enum, and the helper
//! types the dispatcher needs to classify and present failures.
//!
//! # Error Categories
//!
//! - **Compilation errors**: a source module failed to produce an artifact
//! - **Render errors**: a component raised a [`Fault`] while producing markup
//! - **Method not allowed**: no API export matches the request method
//! - **Module errors**: an artifact loaded but lacks the expected exports
//! - **Discovery / IO errors**: the route scan could not read the tree
//!
//! Redirect and not-found are *not* errors. They travel as
//! [`Outcome`](crate::render::Outcome) variants.

use serde_json::Value as JsonValue;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source context for enhanced error messages.
///
/// Captures a snippet of source code around an error location,
/// used by the development overlay to show the failing lines.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the source file.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed, 0 when unknown).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from source code and error location.
    ///
    /// Captures 3 lines before and after the error line for context.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(3).max(1);
        let snippet_end = (line + 3).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Reads `path` and builds a context around `line`.
    ///
    /// Returns `None` when the file cannot be read or the line is out of range.
    pub fn from_file(path: &Path, line: usize, column: usize) -> Option<Self> {
        let source = std::fs::read_to_string(path).ok()?;
        let context = Self::from_source(&source, line, column);
        if line == 0 || line > context.lines.len() {
            return None;
        }
        Some(context)
    }

    /// Returns `(line_number, text, is_error_line)` for every line of the window.
    pub fn window(&self) -> impl Iterator<Item = (usize, &str, bool)> + '_ {
        (self.snippet_start..=self.snippet_end)
            .filter(move |n| *n >= 1 && *n <= self.lines.len())
            .map(move |n| (n, self.lines[n - 1].as_str(), n == self.error_line))
    }

    /// Formats the source snippet with line numbers and error indicator.
    ///
    /// Returns a string like:
    /// ```text
    ///    4 | local user = ctx.params.id
    ///    5 | error("boom")
    ///      | ^
    ///    6 | return user
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for (line_num, line, is_error_line) in self.window() {
            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if is_error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// A value raised by module code that is neither a redirect nor a not-found
/// signal.
///
/// Carries the conventional status fields (`statusCode`, `status`, `code`)
/// that [`Fault::classify_status`] inspects.
#[derive(Debug, Clone, Default)]
pub struct Fault {
    /// Human-readable error message.
    pub message: String,
    /// Stack trace or traceback, if the runtime provided one.
    pub stack: Option<String>,
    /// Source file the fault originated from.
    pub file: Option<PathBuf>,
    /// Line in `file` (1-indexed).
    pub line: Option<usize>,
    /// Column in `file` (1-indexed).
    pub column: Option<usize>,
    /// Explicit `statusCode` field.
    pub status_code: Option<u16>,
    /// Explicit `status` field.
    pub status: Option<u16>,
    /// Free-form `code` field; only numeric values take part in classification.
    pub code: Option<JsonValue>,
}

impl Fault {
    /// Creates a fault with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Sets the `statusCode` field.
    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Records where the fault was raised.
    pub fn at(mut self, file: impl Into<PathBuf>, line: Option<usize>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }

    /// Attaches a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Derives an HTTP status from `statusCode`, then `status`, then a
    /// numeric `code`. Anything outside 400..=599 is ignored; the default
    /// is 500.
    pub fn classify_status(&self) -> u16 {
        let numeric_code = self.code.as_ref().and_then(|code| match code {
            JsonValue::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            JsonValue::String(s) => s.trim().parse::<u16>().ok(),
            _ => None,
        });

        [self.status_code, self.status, numeric_code]
            .into_iter()
            .flatten()
            .find(|status| (400..=599).contains(status))
            .unwrap_or(500)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} ({}:{})", self.message, file.display(), line),
            (Some(file), None) => write!(f, "{} ({})", self.message, file.display()),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Fault {}

/// A source module failed to produce an executable artifact.
#[derive(Error, Debug, Clone)]
#[error("Compilation failed for {}: {message}", source_path.display())]
pub struct CompilationError {
    /// The module that failed to compile.
    pub source_path: PathBuf,
    /// Compiler output.
    pub message: String,
    /// Line of the offending construct, if the compiler reported one.
    pub line: Option<usize>,
    /// Column of the offending construct, if the compiler reported one.
    pub column: Option<usize>,
    /// True when the failure was caused by resource exhaustion (disk full).
    pub resource_exhausted: bool,
}

/// The main error type for arbor operations.
#[derive(Error, Debug)]
pub enum ArborError {
    /// A module could not be compiled.
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// The rendering engine raised while producing markup.
    #[error("Render error: {0}")]
    Render(Fault),

    /// No API export matches the request method.
    #[error("Method {method} not allowed")]
    MethodNotAllowed {
        /// The rejected method.
        method: String,
        /// Methods the handler module does export.
        allowed: Vec<String>,
    },

    /// A compiled module could not be loaded or lacks required exports.
    #[error("Module error in {}: {message}", path.display())]
    Module {
        /// Source path of the module.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Route discovery failed during filesystem scanning.
    #[error("Route discovery failed: {0}")]
    Discovery(String),

    /// Configuration could not be used.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lua runtime error outside of component execution.
    #[cfg(feature = "lua")]
    #[error("Lua execution error: {0}")]
    Lua(#[from] mlua::Error),
}

impl ArborError {
    /// Creates a [`ArborError::Module`] error.
    pub fn module(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Module {
            path: path.into(),
            message: message.into(),
        }
    }

    /// HTTP status this error maps to when it reaches the client.
    pub fn status(&self) -> u16 {
        match self {
            Self::Render(fault) => fault.classify_status(),
            Self::MethodNotAllowed { .. } => 405,
            _ => 500,
        }
    }
}

/// Convenience type alias for Results with [`ArborError`].
pub type Result<T> = std::result::Result<T, ArborError>;
