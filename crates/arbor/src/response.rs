// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP response abstraction for the dispatcher.
//!
//! [`Response`] is what [`Dispatcher::dispatch`](crate::Dispatcher::dispatch)
//! returns; adapters convert it to their platform type. [`ResponseWriter`] is
//! the mutable handle API handlers may write to instead of returning a value.

use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, MutexGuard};

/// `text/html; charset=utf-8`
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";
/// `application/json`
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `text/plain; charset=utf-8`
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// A platform-agnostic HTTP response.
///
/// Headers are kept as an ordered list so repeated headers such as
/// `Set-Cookie` survive.
///
/// # Example
///
/// ```rust
/// use arbor::Response;
///
/// let html = Response::html(200, "<h1>Hello</h1>");
/// let json = Response::json(200, &serde_json::json!({"success": true}));
/// let redirect = Response::redirect("/login", 307);
/// assert_eq!(redirect.header("location"), Some("/login"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// HTTP headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates an HTML response.
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", CONTENT_TYPE_HTML)
            .with_body(body.into())
    }

    /// Creates a JSON response.
    pub fn json(status: u16, body: &JsonValue) -> Self {
        Self::new(status)
            .with_header("content-type", CONTENT_TYPE_JSON)
            .with_body(body.to_string())
    }

    /// Creates a plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", CONTENT_TYPE_TEXT)
            .with_body(body.into())
    }

    /// Creates a redirect response without body.
    pub fn redirect(location: impl Into<String>, status: u16) -> Self {
        Self::new(status).with_header("location", location)
    }

    /// Creates a JSON error body: `{"error": message}`.
    pub fn json_error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &serde_json::json!({ "error": message.into() }))
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Sets a header, replacing any previous value with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        self.headers.retain(|(n, _)| *n != name);
        self.headers.push((name, value.into()));
    }

    /// Appends a header, keeping earlier values with the same name.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .push((name.into().to_ascii_lowercase(), value.into()));
    }

    /// First value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8, lossily.
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Returns true if this is a success response (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if this is a redirect response (3xx).
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Returns true if this is an error response (4xx or 5xx).
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}

#[derive(Debug, Default)]
struct WriterState {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    committed: bool,
}

/// Mutable response handle passed to API handlers.
///
/// `status` and `header` only stage values. `send`, `json` and `redirect`
/// commit the writer; a committed writer takes precedence over whatever the
/// handler returns. Staged values of an uncommitted writer are merged into
/// the response built from the return value.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    inner: Arc<Mutex<WriterState>>,
}

impl ResponseWriter {
    /// Creates an untouched writer.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, WriterState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stages the status code.
    pub fn status(&self, status: u16) {
        self.state().status = Some(status);
    }

    /// Stages a header.
    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let mut state = self.state();
        state.headers.retain(|(n, _)| *n != name);
        state.headers.push((name, value.into()));
    }

    /// Commits a raw body. Defaults the content type to HTML.
    pub fn send(&self, body: impl Into<Vec<u8>>) {
        let mut state = self.state();
        if !state.headers.iter().any(|(n, _)| n == "content-type") {
            state
                .headers
                .push(("content-type".to_string(), CONTENT_TYPE_HTML.to_string()));
        }
        state.body = Some(body.into());
        state.committed = true;
    }

    /// Commits a JSON body.
    pub fn json(&self, value: &JsonValue) {
        self.header("content-type", CONTENT_TYPE_JSON);
        let mut state = self.state();
        state.body = Some(value.to_string().into_bytes());
        state.committed = true;
    }

    /// Commits a redirect.
    pub fn redirect(&self, location: impl Into<String>, status: Option<u16>) {
        self.header("location", location);
        let mut state = self.state();
        state.status = Some(status.unwrap_or(302));
        state.body = None;
        state.committed = true;
    }

    /// Returns true once `send`, `json` or `redirect` was called.
    pub fn is_committed(&self) -> bool {
        self.state().committed
    }

    /// The committed response, if any.
    pub fn committed_response(&self) -> Option<Response> {
        let state = self.state();
        if !state.committed {
            return None;
        }
        Some(Response {
            status: state.status.unwrap_or(200),
            headers: state.headers.clone(),
            body: state.body.clone().unwrap_or_default(),
        })
    }

    /// Applies staged status and headers to `response`.
    pub fn merge_into(&self, mut response: Response) -> Response {
        let state = self.state();
        if let Some(status) = state.status {
            response.status = status;
        }
        for (name, value) in &state.headers {
            response.set_header(name.clone(), value.clone());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_response() {
        let resp = Response::html(200, "<h1>Hello</h1>");
        assert_eq!(resp.status, 200);
        assert!(resp.is_success());
        assert_eq!(resp.header("Content-Type"), Some(CONTENT_TYPE_HTML));
        assert_eq!(resp.body_str(), "<h1>Hello</h1>");
    }

    #[test]
    fn test_redirect_has_no_body() {
        let resp = Response::redirect("/login", 307);
        assert!(resp.is_redirect());
        assert_eq!(resp.header("location"), Some("/login"));
        assert!(resp.body.is_empty());
    }

    #[test]
    fn test_append_header_keeps_duplicates() {
        let mut resp = Response::new(200);
        resp.append_header("Set-Cookie", "a=1");
        resp.append_header("Set-Cookie", "b=2");
        let cookies: Vec<&str> = resp.header_all("set-cookie").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_writer_stage_only_is_not_committed() {
        let writer = ResponseWriter::new();
        writer.status(201);
        writer.header("X-Id", "7");
        assert!(!writer.is_committed());
        assert!(writer.committed_response().is_none());

        let merged = writer.merge_into(Response::json(200, &json!({"ok": true})));
        assert_eq!(merged.status, 201);
        assert_eq!(merged.header("x-id"), Some("7"));
    }

    #[test]
    fn test_writer_json_commits() {
        let writer = ResponseWriter::new();
        writer.status(202);
        writer.json(&json!({"queued": true}));

        let resp = writer.committed_response().unwrap();
        assert_eq!(resp.status, 202);
        assert_eq!(resp.header("content-type"), Some(CONTENT_TYPE_JSON));
        assert_eq!(resp.body_str(), r#"{"queued":true}"#);
    }

    #[test]
    fn test_writer_redirect() {
        let writer = ResponseWriter::new();
        writer.redirect("/done", None);
        let resp = writer.committed_response().unwrap();
        assert_eq!(resp.status, 302);
        assert_eq!(resp.header("location"), Some("/done"));
    }
}
