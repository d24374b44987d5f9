// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Per-request context handed to components, layouts and handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::locale::Dictionaries;
use crate::router::Params;

/// Attributes of an outgoing cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// `Path` attribute (default `/`).
    pub path: String,
    /// `Max-Age` in seconds.
    pub max_age: Option<i64>,
    /// `HttpOnly` flag.
    pub http_only: bool,
    /// `Secure` flag.
    pub secure: bool,
    /// `SameSite` value.
    pub same_site: Option<String>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            max_age: None,
            http_only: false,
            secure: false,
            same_site: Some("Lax".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct OutgoingCookie {
    name: String,
    value: String,
    options: CookieOptions,
}

impl OutgoingCookie {
    fn header_value(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.options.path);
        if let Some(max_age) = self.options.max_age {
            header.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.options.http_only {
            header.push_str("; HttpOnly");
        }
        if self.options.secure {
            header.push_str("; Secure");
        }
        if let Some(same_site) = &self.options.same_site {
            header.push_str(&format!("; SameSite={}", same_site));
        }
        header
    }
}

/// Incoming cookies plus the `Set-Cookie` values produced during the request.
///
/// Clones share the outgoing list, so a cookie set inside a component shows
/// up on the final response.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    incoming: Arc<HashMap<String, String>>,
    outgoing: Arc<Mutex<Vec<OutgoingCookie>>>,
}

impl CookieJar {
    /// Wraps the request's cookies.
    pub fn new(incoming: HashMap<String, String>) -> Self {
        Self {
            incoming: Arc::new(incoming),
            outgoing: Arc::default(),
        }
    }

    fn outgoing(&self) -> MutexGuard<'_, Vec<OutgoingCookie>> {
        self.outgoing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current value: the last cookie set during this request, else the incoming one.
    pub fn get(&self, name: &str) -> Option<String> {
        let outgoing = self.outgoing();
        if let Some(cookie) = outgoing.iter().rev().find(|c| c.name == name) {
            return match cookie.options.max_age {
                Some(age) if age <= 0 => None,
                _ => Some(cookie.value.clone()),
            };
        }
        self.incoming.get(name).cloned()
    }

    /// Queues a `Set-Cookie`.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>, options: CookieOptions) {
        self.outgoing().push(OutgoingCookie {
            name: name.into(),
            value: value.into(),
            options,
        });
    }

    /// Queues an expiring `Set-Cookie`.
    pub fn delete(&self, name: impl Into<String>) {
        self.set(
            name,
            "",
            CookieOptions {
                max_age: Some(0),
                ..CookieOptions::default()
            },
        );
    }

    /// `Set-Cookie` header values in the order they were set.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.outgoing().iter().map(OutgoingCookie::header_value).collect()
    }
}

/// Everything a component needs to know about the current request.
///
/// Built once per request by the dispatcher and passed explicitly; never
/// stored in process-wide state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Active locale.
    pub locale: String,
    /// Shared translation tables.
    pub dictionaries: Arc<Dictionaries>,
    /// Matched path parameters.
    pub params: Params,
    /// Path with any locale prefix removed.
    pub pathname: String,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Request cookies and outgoing `Set-Cookie` values.
    pub cookies: CookieJar,
}

impl RequestContext {
    /// Creates a context for `pathname`.
    pub fn new(
        pathname: impl Into<String>,
        locale: impl Into<String>,
        dictionaries: Arc<Dictionaries>,
    ) -> Self {
        Self {
            locale: locale.into(),
            dictionaries,
            params: Params::new(),
            pathname: pathname.into(),
            query: HashMap::new(),
            cookies: CookieJar::default(),
        }
    }

    /// Sets the matched parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the query parameters.
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Sets the cookie jar.
    pub fn with_cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    /// Returns a path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Translates `key` in the active locale.
    pub fn t(&self, key: &str) -> String {
        self.dictionaries.translate(&self.locale, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cookie_jar_get_prefers_outgoing() {
        let jar = CookieJar::new([("theme".to_string(), "light".to_string())].into());
        assert_eq!(jar.get("theme").as_deref(), Some("light"));

        jar.set("theme", "dark", CookieOptions::default());
        assert_eq!(jar.get("theme").as_deref(), Some("dark"));

        jar.delete("theme");
        assert_eq!(jar.get("theme"), None);
    }

    #[test]
    fn test_set_cookie_header_format() {
        let jar = CookieJar::default();
        jar.set(
            "session",
            "abc",
            CookieOptions {
                max_age: Some(3600),
                http_only: true,
                secure: true,
                ..CookieOptions::default()
            },
        );
        assert_eq!(
            jar.set_cookie_headers(),
            vec!["session=abc; Path=/; Max-Age=3600; HttpOnly; Secure; SameSite=Lax"]
        );
    }

    #[test]
    fn test_clones_share_outgoing() {
        let jar = CookieJar::default();
        let clone = jar.clone();
        clone.set("a", "1", CookieOptions::default());
        assert_eq!(jar.set_cookie_headers().len(), 1);
    }

    #[test]
    fn test_context_translate() {
        let mut dicts = Dictionaries::new("en");
        dicts.insert("en", &json!({ "greeting": "Hello" }));
        dicts.insert("de", &json!({ "greeting": "Hallo" }));

        let ctx = RequestContext::new("/", "de", Arc::new(dicts));
        assert_eq!(ctx.t("greeting"), "Hallo");
        assert_eq!(ctx.t("farewell"), "farewell");
    }
}
