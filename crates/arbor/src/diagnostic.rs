// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Failure diagnostics and their presentation.
//!
//! A [`Diagnostic`] captures what went wrong (message, stack, file, line and
//! a source window). An [`ErrorPresenter`] turns it into a response; the
//! presenter is chosen by [`Mode`] and may be replaced by the embedder.

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Mode;
use crate::error::{ArborError, CompilationError, Fault, SourceContext};
use crate::response::Response;

/// Which stage produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A module failed to compile.
    Compilation,
    /// A page, layout or error page raised while rendering.
    Render,
    /// An API handler raised.
    Api,
    /// The root middleware raised.
    Middleware,
    /// A module could not be loaded.
    Module,
}

impl DiagnosticKind {
    fn title(self) -> &'static str {
        match self {
            DiagnosticKind::Compilation => "Compilation Error",
            DiagnosticKind::Render => "Render Error",
            DiagnosticKind::Api => "API Handler Error",
            DiagnosticKind::Middleware => "Middleware Error",
            DiagnosticKind::Module => "Module Error",
        }
    }
}

/// Everything known about a failure.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Failing stage.
    pub kind: DiagnosticKind,
    /// HTTP status to send.
    pub status: u16,
    /// Error message.
    pub message: String,
    /// Stack trace, if any.
    pub stack: Option<String>,
    /// Source file involved.
    pub file: Option<PathBuf>,
    /// Line in `file`.
    pub line: Option<usize>,
    /// Lines around `line`.
    pub code_window: Option<SourceContext>,
}

impl Diagnostic {
    /// Creates a bare diagnostic.
    pub fn new(kind: DiagnosticKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            stack: None,
            file: None,
            line: None,
            code_window: None,
        }
    }

    /// Points the diagnostic at a source location and loads the code window.
    pub fn at(mut self, file: Option<PathBuf>, line: Option<usize>, column: Option<usize>) -> Self {
        self.code_window = match (&file, line) {
            (Some(path), Some(line)) => SourceContext::from_file(path, line, column.unwrap_or(0)),
            _ => None,
        };
        self.file = file;
        self.line = line;
        self
    }

    /// Diagnostic for a failed compile.
    pub fn from_compilation(err: &CompilationError) -> Self {
        Self::new(DiagnosticKind::Compilation, 500, err.message.clone()).at(
            Some(err.source_path.clone()),
            err.line,
            err.column,
        )
    }

    /// Diagnostic for a raised fault; status comes from the fault's fields.
    pub fn from_fault(kind: DiagnosticKind, fault: &Fault) -> Self {
        let mut diagnostic = Self::new(kind, fault.classify_status(), fault.message.clone())
            .at(fault.file.clone(), fault.line, fault.column);
        diagnostic.stack = fault.stack.clone();
        diagnostic
    }

    /// Diagnostic for any dispatcher error.
    pub fn from_error(kind: DiagnosticKind, err: &ArborError) -> Self {
        match err {
            ArborError::Compilation(e) => Self::from_compilation(e),
            ArborError::Render(fault) => Self::from_fault(kind, fault),
            ArborError::Module { path, message } => {
                Self::new(DiagnosticKind::Module, 500, message.clone()).at(Some(path.clone()), None, None)
            }
            other => Self::new(kind, other.status(), other.to_string()),
        }
    }
}

/// Renders diagnostics for clients.
pub trait ErrorPresenter: Send + Sync {
    /// Response for a page request.
    fn page(&self, diagnostic: &Diagnostic) -> Response;

    /// Response for an API request.
    fn api(&self, diagnostic: &Diagnostic) -> Response;
}

/// Detailed overlay for development.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevelopmentOverlay;

impl ErrorPresenter for DevelopmentOverlay {
    fn page(&self, d: &Diagnostic) -> Response {
        let mut details = String::new();
        if let Some(file) = &d.file {
            let location = match d.line {
                Some(line) => format!("{}:{}", file.display(), line),
                None => file.display().to_string(),
            };
            details.push_str(&format!(
                "    <p class=\"file\">{}</p>\n",
                html_escape(&location)
            ));
        }
        if let Some(window) = &d.code_window {
            details.push_str(&format!(
                "    <pre class=\"code\">{}</pre>\n",
                html_escape(&window.format_snippet())
            ));
        }
        if let Some(stack) = &d.stack {
            details.push_str(&format!(
                "    <pre class=\"stack\">{}</pre>\n",
                html_escape(stack)
            ));
        }

        Response::html(
            d.status,
            format!(
                r#"<!DOCTYPE html>
<html>
<head>
    <title>{title} - Arbor</title>
    <style>
        body {{ font-family: system-ui, sans-serif; padding: 2rem; background: #1a1a2e; color: #eee; }}
        .error {{ background: #16213e; border-left: 4px solid #e94560; padding: 1rem; border-radius: 4px; }}
        pre {{ background: #0f0f1a; padding: 1rem; overflow-x: auto; border-radius: 4px; }}
        .file {{ color: #9aa5ce; font-family: monospace; }}
    </style>
</head>
<body>
    <h1>{title} ({status})</h1>
    <div class="error">
    <pre>{message}</pre>
{details}    </div>
</body>
</html>"#,
                title = d.kind.title(),
                status = d.status,
                message = html_escape(&d.message),
                details = details,
            ),
        )
    }

    fn api(&self, d: &Diagnostic) -> Response {
        Response::json(
            d.status,
            &json!({
                "error": d.message,
                "kind": d.kind.title(),
                "file": d.file.as_ref().map(|f| f.display().to_string()),
                "line": d.line,
                "stack": d.stack,
            }),
        )
    }
}

/// Generic pages that reveal nothing about the failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionPresenter;

impl ErrorPresenter for ProductionPresenter {
    fn page(&self, d: &Diagnostic) -> Response {
        let reason = reason_phrase(d.status);
        Response::html(
            d.status,
            format!(
                "<!DOCTYPE html>\n<html>\n<head><title>{status} {reason}</title></head>\n<body><h1>{status} {reason}</h1></body>\n</html>",
                status = d.status,
                reason = reason,
            ),
        )
    }

    fn api(&self, d: &Diagnostic) -> Response {
        Response::json_error(d.status, reason_phrase(d.status))
    }
}

/// Default presenter for `mode`.
pub fn presenter_for(mode: Mode) -> Arc<dyn ErrorPresenter> {
    match mode {
        Mode::Development => Arc::new(DevelopmentOverlay),
        Mode::Production => Arc::new(ProductionPresenter),
    }
}

/// Minimal literal page for a 404 without a not-found route.
pub fn not_found_page() -> Response {
    Response::html(
        404,
        "<!DOCTYPE html>\n<html>\n<head><title>404 Not Found</title></head>\n<body><h1>404 Not Found</h1></body>\n</html>",
    )
}

pub(crate) fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        400..=499 => "Client Error",
        _ => "Server Error",
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_compilation_diagnostic_has_code_window() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("page.lua");
        fs::write(&source, "local a = 1\nlocal b = \nreturn {}\n").unwrap();

        let err = CompilationError {
            source_path: source.clone(),
            message: "unexpected symbol near 'return'".into(),
            line: Some(2),
            column: None,
            resource_exhausted: false,
        };
        let d = Diagnostic::from_compilation(&err);
        assert_eq!(d.kind, DiagnosticKind::Compilation);
        assert_eq!(d.status, 500);
        assert_eq!(d.file.as_deref(), Some(source.as_path()));
        assert!(d.code_window.unwrap().format_snippet().contains("   2 | local b ="));
    }

    #[test]
    fn test_fault_diagnostic_status() {
        let fault = Fault::new("forbidden").with_status_code(403);
        let d = Diagnostic::from_fault(DiagnosticKind::Render, &fault);
        assert_eq!(d.status, 403);
        assert!(d.code_window.is_none());
    }

    #[test]
    fn test_development_overlay_escapes() {
        let d = Diagnostic::new(DiagnosticKind::Render, 500, "<script>alert(1)</script>");
        let resp = DevelopmentOverlay.page(&d);
        assert_eq!(resp.status, 500);
        let body = resp.body_str();
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>alert"));
    }

    #[test]
    fn test_production_hides_details() {
        let mut d = Diagnostic::new(DiagnosticKind::Render, 500, "db password is hunter2");
        d.stack = Some("at secret.lua:1".into());

        let page = ProductionPresenter.page(&d);
        assert!(!page.body_str().contains("hunter2"));
        assert!(page.body_str().contains("500 Internal Server Error"));

        let api = ProductionPresenter.api(&d);
        assert_eq!(api.body_str(), r#"{"error":"Internal Server Error"}"#);
    }

    #[test]
    fn test_development_api_includes_details() {
        let d = Diagnostic::new(DiagnosticKind::Api, 502, "upstream failed");
        let resp = presenter_for(Mode::Development).api(&d);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["error"], "upstream failed");
        assert_eq!(resp.status, 502);
    }
}
