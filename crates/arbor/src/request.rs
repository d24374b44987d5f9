// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP request abstraction for the dispatcher.
//!
//! Adapters (the axum server, tests, embedders) convert their native request
//! into a [`Request`] before handing it to
//! [`Dispatcher::dispatch`](crate::Dispatcher::dispatch).

use std::collections::HashMap;

/// A platform-agnostic HTTP request.
///
/// Header names are stored lowercased.
///
/// # Example
///
/// ```rust
/// use arbor::Request;
///
/// let request = Request::new("GET", "/blog/hello")
///     .with_header("Accept-Language", "de-CH,de;q=0.9")
///     .with_query([("page".into(), "1".into())].into());
/// assert_eq!(request.header("accept-language"), Some("de-CH,de;q=0.9"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (e.g., "GET", "POST").
    pub method: String,

    /// The request path without query string (e.g., "/blog/hello").
    pub path: String,

    /// HTTP headers, lowercased names.
    pub headers: HashMap<String, String>,

    /// Request body.
    pub body: Option<Vec<u8>>,

    /// Query parameters.
    pub query: HashMap<String, String>,

    /// Incoming cookies.
    pub cookies: HashMap<String, String>,
}

impl Request {
    /// Creates a new request with the given method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            query: HashMap::new(),
            cookies: HashMap::new(),
        }
    }

    /// Sets one header. A `Cookie` header also fills [`Request::cookies`].
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        if name == "cookie" {
            self.cookies.extend(parse_cookie_header(&value));
        }
        self.headers.insert(name, value);
        self
    }

    /// Sets several headers.
    pub fn with_headers(self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        headers
            .into_iter()
            .fold(self, |req, (name, value)| req.with_header(name, value))
    }

    /// Adds a body to the request.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds query parameters to the request.
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Adds cookies to the request.
    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns a cookie value.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns the body as a string, if present and valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Returns the body parsed as JSON, if present and valid.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        self.body_str().and_then(|s| serde_json::from_str(s).ok())
    }

    /// Returns the Content-Type header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Checks if this is a JSON request.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false)
    }

    /// Uppercased method.
    pub fn method_upper(&self) -> String {
        self.method.to_ascii_uppercase()
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new("GET", "/")
    }
}

/// Parses a `Cookie` header (`a=1; b=2`).
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}
