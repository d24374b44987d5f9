// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Types for the file-convention routing system.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::segment::extract_params;

/// Path parameters bound by a match, keyed by name.
pub type Params = HashMap<String, String>;

/// What a route resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// A page rendered through layouts and the render engine.
    Page,
    /// An API handler module.
    Api,
    /// A not-found page, registered at `<prefix>/not-found`.
    NotFound,
}

/// A discovered route. Immutable once discovery finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// URL pattern (e.g., "/blog/:slug", "/docs/*path").
    pub path_pattern: String,

    /// Source file that handles the route.
    pub handler: PathBuf,

    /// True when the pattern has no dynamic or catch-all segment.
    pub is_exact: bool,

    /// True when the pattern binds at least one parameter.
    pub is_dynamic: bool,

    /// Parameter names in pattern order.
    pub param_names: Vec<String>,

    /// True when the trailing catch-all may match zero segments.
    pub catch_all_optional: bool,

    /// Page, API or not-found.
    pub kind: RouteKind,

    /// Root of the scanned subtree; layout collection stops here.
    pub root: PathBuf,
}

impl Route {
    /// Builds a route and derives the pattern-dependent fields.
    pub fn new(
        path_pattern: impl Into<String>,
        handler: impl Into<PathBuf>,
        kind: RouteKind,
        root: impl Into<PathBuf>,
    ) -> Self {
        let path_pattern = path_pattern.into();
        let param_names = extract_params(&path_pattern);
        Self {
            is_exact: param_names.is_empty(),
            is_dynamic: !param_names.is_empty(),
            param_names,
            path_pattern,
            handler: handler.into(),
            catch_all_optional: false,
            kind,
            root: root.into(),
        }
    }

    /// Marks the trailing catch-all as optional.
    pub fn with_optional_catch_all(mut self, optional: bool) -> Self {
        self.catch_all_optional = optional;
        self
    }

    /// Returns true for API routes.
    pub fn is_api_route(&self) -> bool {
        self.kind == RouteKind::Api
    }

    /// Returns true for page and not-found routes.
    pub fn is_page_route(&self) -> bool {
        matches!(self.kind, RouteKind::Page | RouteKind::NotFound)
    }
}

/// Result of matching a URL to a route.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The matched route.
    pub route: &'a Route,

    /// URL parameters extracted from the path.
    pub params: Params,
}

impl<'a> RouteMatch<'a> {
    /// Get a parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Ordered page and API routes. First match wins within each sequence.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    /// Page and not-found routes in discovery order.
    pub page_routes: Vec<Route>,

    /// API routes in discovery order.
    pub api_routes: Vec<Route>,

    /// Root middleware module, if present.
    pub middleware: Option<PathBuf>,
}

impl RouteTable {
    /// Total number of routes.
    pub fn len(&self) -> usize {
        self.page_routes.len() + self.api_routes.len()
    }

    /// Returns true when nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.page_routes.is_empty() && self.api_routes.is_empty()
    }

    /// Finds a page route by its exact pattern.
    pub fn page(&self, pattern: &str) -> Option<&Route> {
        self.page_routes.iter().find(|r| r.path_pattern == pattern)
    }

    /// Returns true when `path` is the handler of any route or the middleware.
    pub fn references(&self, path: &Path) -> bool {
        self.middleware.as_deref() == Some(path)
            || self
                .page_routes
                .iter()
                .chain(self.api_routes.iter())
                .any(|r| r.handler == path)
    }
}

/// Shared, atomically replaceable route table.
///
/// Readers take an `Arc` snapshot and keep it for the whole request;
/// re-discovery swaps in a new table without blocking them.
#[derive(Debug, Clone)]
pub struct RouteTableHandle {
    inner: Arc<ArcSwap<RouteTable>>,
}

impl RouteTableHandle {
    /// Wraps an initial table.
    pub fn new(table: RouteTable) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<RouteTable> {
        self.inner.load_full()
    }

    /// Replaces the table wholesale.
    pub fn replace(&self, table: RouteTable) {
        self.inner.store(Arc::new(table));
    }
}

impl Default for RouteTableHandle {
    fn default() -> Self {
        Self::new(RouteTable::default())
    }
}
