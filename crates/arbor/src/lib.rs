// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]
#![allow(clippy::result_large_err)]

//! # Arbor
//!
//! File-convention routing and render orchestration for server-rendered web
//! applications.
//!
//! Arbor discovers routes from a project's directory layout, matches request
//! paths against them, resolves the request locale, compiles route modules
//! through a cached [`Compiler`], wraps pages in their ancestor layouts and
//! turns the outcome into a [`Response`].
//!
//! ## Features
//!
//! - `app/` convention routing with dynamic, catch-all and grouped segments
//! - `pages/` flat routing, with a `src/` fallback
//! - Ordered, first-match route matching
//! - URL / cookie / `Accept-Language` locale resolution
//! - Mtime-keyed compilation cache with disk-full recovery
//! - Nested layouts, not-found and error pages
//! - Lua modules out of the box (feature `lua`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use arbor::{ArborConfig, CompilationCache, Dispatcher, LuaCompiler, LuaRuntime, Request, RouteTable, RouteTableHandle};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = ArborConfig::default();
//! let routes = RouteTableHandle::new(RouteTable::discover(Path::new("./my-app"), &config.routing)?);
//! let cache = Arc::new(CompilationCache::new("./my-app/.arbor/cache", Arc::new(LuaCompiler::new())));
//! let dispatcher = Dispatcher::from_config("./my-app", &config, routes, cache, Arc::new(LuaRuntime::new()?))?;
//!
//! let response = dispatcher.dispatch(Request::new("GET", "/blog/hello")).await;
//! ```

/// Compiled artifact caching.
pub mod cache;
/// Project configuration.
pub mod config;
/// Per-request context.
pub mod context;
/// Failure diagnostics and presenters.
pub mod diagnostic;
/// Request dispatcher.
pub mod dispatcher;
/// Error types and reporting.
pub mod error;
/// Layout collection.
pub mod layout;
/// Locale resolution and dictionaries.
pub mod locale;
/// Route module exports and loader interface.
pub mod module;
/// Render tree and engine interface.
pub mod render;
/// HTTP request abstraction.
pub mod request;
/// HTTP response abstraction.
pub mod response;
/// File-convention routing.
pub mod router;

/// Lua compiler and module runtime.
#[cfg(feature = "lua")]
pub mod lua;

pub use cache::{cache_key, Artifact, CompilationCache, CompileFailure, CompileOptions, Compiler};
pub use config::{ArborConfig, CacheConfig, I18nConfig, Mode, RoutingConfig};
pub use context::{CookieJar, CookieOptions, RequestContext};
pub use diagnostic::{
    presenter_for, DevelopmentOverlay, Diagnostic, DiagnosticKind, ErrorPresenter, ProductionPresenter,
};
pub use dispatcher::{Dispatcher, TITLE_HEADER};
pub use error::{ArborError, CompilationError, Fault, Result, SourceContext};
pub use locale::{Dictionaries, LocaleResolver};
pub use module::{
    ApiHandler, ApiModule, Component, HandlerResult, HandlerValue, Middleware, MiddlewareOutcome,
    ModuleLoader, PageModule, RenderResult,
};
pub use render::{Element, Outcome, Redirect, RenderEngine, TreeRenderer, DEFAULT_REDIRECT_STATUS};
pub use request::Request;
pub use response::{Response, ResponseWriter};
pub use router::{
    discover, match_route, Params, Route, RouteKind, RouteManifest, RouteMatch, RouteTable, RouteTableHandle,
};

#[cfg(feature = "lua")]
pub use lua::{LuaCompiler, LuaRuntime};
