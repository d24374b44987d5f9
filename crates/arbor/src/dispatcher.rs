// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Request dispatcher and render orchestrator.
//!
//! Every request walks the same states:
//!
//! ```text
//! Middleware -> RouteMatch -> ApiHandle | PageRender | NotFound -> Sent
//!                    \______________ Error ______________/
//! ```
//!
//! Control-flow signals (redirect, not found) move between states; faults
//! move to `Error`, which tries the project's error pages before falling back
//! to the [`ErrorPresenter`].

use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::CompilationCache;
use crate::config::{ArborConfig, RoutingConfig};
use crate::context::{CookieJar, RequestContext};
use crate::diagnostic::{
    not_found_page, presenter_for, Diagnostic, DiagnosticKind, DevelopmentOverlay, ErrorPresenter,
};
use crate::error::{ArborError, Result};
use crate::layout;
use crate::locale::{Dictionaries, LocaleResolver};
use crate::module::{ApiModule, Middleware, MiddlewareOutcome, ModuleLoader, PageModule};
use crate::render::{Element, Outcome, Redirect, RenderEngine, TreeRenderer};
use crate::request::Request;
use crate::response::{Response, ResponseWriter};
use crate::router::{Params, Route, RouteTable, RouteTableHandle};

/// Header carrying the page's `metadata.title`.
pub const TITLE_HEADER: &str = "x-arbor-title";

/// Drives a request from middleware to a finished [`Response`].
pub struct Dispatcher {
    project_root: PathBuf,
    routes: RouteTableHandle,
    cache: Arc<CompilationCache>,
    loader: Arc<dyn ModuleLoader>,
    engine: Arc<dyn RenderEngine>,
    locales: LocaleResolver,
    dictionaries: Arc<Dictionaries>,
    presenter: Arc<dyn ErrorPresenter>,
    extensions: Vec<String>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("project_root", &self.project_root)
            .field("routes", &self.routes.load().len())
            .field("cache", &self.cache)
            .field("locales", &self.locales)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Per-request state shared by every stage.
struct Flight {
    request: Request,
    method: String,
    locale: String,
    pathname: String,
    table: Arc<RouteTable>,
    cookies: CookieJar,
}

enum State {
    Middleware,
    RouteMatch(String),
    ApiHandle {
        route: Route,
        params: Params,
        path: String,
    },
    PageRender {
        route: Route,
        params: Params,
        path: String,
    },
    NotFound {
        path: String,
        api: bool,
    },
    Error {
        kind: DiagnosticKind,
        error: ArborError,
        path: String,
        api: bool,
    },
    Sent(Response),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Middleware => "middleware",
            State::RouteMatch(_) => "route_match",
            State::ApiHandle { .. } => "api_handle",
            State::PageRender { .. } => "page_render",
            State::NotFound { .. } => "not_found",
            State::Error { .. } => "error",
            State::Sent(_) => "sent",
        }
    }
}

impl Dispatcher {
    /// Creates a dispatcher with the default engine, locale settings and the
    /// development presenter.
    pub fn new(
        project_root: impl Into<PathBuf>,
        routes: RouteTableHandle,
        cache: Arc<CompilationCache>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            routes,
            cache,
            loader,
            engine: Arc::new(TreeRenderer),
            locales: LocaleResolver::default(),
            dictionaries: Arc::new(Dictionaries::new("en")),
            presenter: Arc::new(DevelopmentOverlay),
            extensions: RoutingConfig::default().extensions,
        }
    }

    /// Creates a dispatcher configured from `config`, loading dictionaries
    /// from the project.
    pub fn from_config(
        project_root: impl Into<PathBuf>,
        config: &ArborConfig,
        routes: RouteTableHandle,
        cache: Arc<CompilationCache>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Result<Self> {
        let project_root = project_root.into();
        let dictionaries = Dictionaries::load(
            &project_root.join(&config.i18n.dictionaries_dir),
            &config.i18n.default_locale,
        )?;

        let mut locales = LocaleResolver::from_config(&config.i18n);
        if config.i18n.locales.is_empty() {
            let mut found: Vec<&str> = dictionaries.locales().collect();
            found.sort_unstable();
            locales = locales.with_supported(found);
        }

        Ok(Self::new(project_root, routes, cache, loader)
            .with_locales(locales)
            .with_dictionaries(Arc::new(dictionaries))
            .with_presenter(presenter_for(config.mode))
            .with_extensions(config.routing.extensions.clone()))
    }

    /// Replaces the render engine.
    pub fn with_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the locale resolver.
    pub fn with_locales(mut self, locales: LocaleResolver) -> Self {
        self.locales = locales;
        self
    }

    /// Replaces the translation tables.
    pub fn with_dictionaries(mut self, dictionaries: Arc<Dictionaries>) -> Self {
        self.dictionaries = dictionaries;
        self
    }

    /// Replaces the error presenter.
    pub fn with_presenter(mut self, presenter: Arc<dyn ErrorPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Sets the module extensions used for layout lookup.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The shared route table.
    pub fn routes(&self) -> &RouteTableHandle {
        &self.routes
    }

    /// The compilation cache.
    pub fn cache(&self) -> &Arc<CompilationCache> {
        &self.cache
    }

    /// The locale resolver.
    pub fn locales(&self) -> &LocaleResolver {
        &self.locales
    }

    /// Handles one request. Never fails: every error becomes a response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let started = Instant::now();

        let cookie = request.cookie(self.locales.cookie_name()).map(str::to_string);
        let locale = self.locales.resolve(
            &request.path,
            cookie.as_deref(),
            request.header("accept-language"),
        );
        let pathname = self.locales.strip_locale_from_path(&request.path);

        let flight = Flight {
            method: request.method_upper(),
            cookies: CookieJar::new(request.cookies.clone()),
            table: self.routes.load(),
            locale,
            pathname,
            request,
        };
        debug!(
            method = %flight.method,
            path = %flight.request.path,
            locale = %flight.locale,
            pathname = %flight.pathname,
            "Dispatching request"
        );

        let mut state = State::Middleware;
        let mut response = loop {
            debug!(state = state.name(), "Dispatcher state");
            state = match state {
                State::Middleware => self.run_middleware(&flight).await,
                State::RouteMatch(path) => self.route_match(&flight, path),
                State::ApiHandle {
                    route,
                    params,
                    path,
                } => self.handle_api(&flight, &route, params, path).await,
                State::PageRender {
                    route,
                    params,
                    path,
                } => self.handle_page(&flight, &route, params, path).await,
                State::NotFound { path, api } => self.handle_not_found(&flight, path, api).await,
                State::Error {
                    kind,
                    error,
                    path,
                    api,
                } => self.handle_error(&flight, kind, error, path, api).await,
                State::Sent(response) => break response,
            };
        };

        for cookie in flight.cookies.set_cookie_headers() {
            response.append_header("set-cookie", cookie);
        }
        if flight.method == "HEAD" {
            response.body.clear();
        }

        info!(
            method = %flight.method,
            path = %flight.request.path,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    fn context(&self, flight: &Flight, path: &str, params: Params) -> RequestContext {
        RequestContext::new(path, flight.locale.clone(), self.dictionaries.clone())
            .with_params(params)
            .with_query(flight.request.query.clone())
            .with_cookies(flight.cookies.clone())
    }

    async fn load_page(&self, source: &Path) -> Result<PageModule> {
        let artifact = self.cache.resolve(source).await?;
        self.loader.load_page(&artifact).await
    }

    async fn load_api(&self, source: &Path) -> Result<ApiModule> {
        let artifact = self.cache.resolve(source).await?;
        self.loader.load_api(&artifact).await
    }

    async fn load_middleware(&self, source: &Path) -> Result<Middleware> {
        let artifact = self.cache.resolve(source).await?;
        self.loader.load_middleware(&artifact).await
    }

    async fn run_middleware(&self, flight: &Flight) -> State {
        let path = flight.pathname.clone();
        let Some(source) = flight.table.middleware.as_deref() else {
            return State::RouteMatch(path);
        };

        let middleware = match self.load_middleware(source).await {
            Ok(middleware) => middleware,
            Err(error) => {
                return State::Error {
                    kind: DiagnosticKind::Middleware,
                    error,
                    api: is_api_path(&path),
                    path,
                }
            }
        };

        let ctx = self.context(flight, &path, Params::new());
        match middleware.call(flight.request.clone(), ctx).await {
            Ok(MiddlewareOutcome::Next) => State::RouteMatch(path),
            Ok(MiddlewareOutcome::Rewrite(target)) => {
                let target = target.split('?').next().unwrap_or_default();
                let target = if target.starts_with('/') {
                    target.to_string()
                } else {
                    format!("/{}", target)
                };
                let target = self.locales.strip_locale_from_path(&target);
                debug!(from = %path, to = %target, "Middleware rewrite");
                State::RouteMatch(target)
            }
            Ok(MiddlewareOutcome::Redirect(redirect)) => State::Sent(redirect_response(&redirect)),
            Ok(MiddlewareOutcome::Respond(response)) => State::Sent(response),
            Err(fault) => State::Error {
                kind: DiagnosticKind::Middleware,
                error: ArborError::Render(fault),
                api: is_api_path(&path),
                path,
            },
        }
    }

    fn route_match(&self, flight: &Flight, path: String) -> State {
        if let Some(matched) = flight.table.match_api(&path) {
            debug!(pattern = %matched.route.path_pattern, "Matched API route");
            return State::ApiHandle {
                route: matched.route.clone(),
                params: matched.params,
                path,
            };
        }
        if is_api_path(&path) {
            return State::NotFound { path, api: true };
        }
        if let Some(matched) = flight.table.match_page(&path) {
            debug!(pattern = %matched.route.path_pattern, "Matched page route");
            return State::PageRender {
                route: matched.route.clone(),
                params: matched.params,
                path,
            };
        }
        State::NotFound { path, api: false }
    }

    async fn handle_api(&self, flight: &Flight, route: &Route, params: Params, path: String) -> State {
        let module = match self.load_api(&route.handler).await {
            Ok(module) => module,
            Err(error) => {
                return State::Error {
                    kind: DiagnosticKind::Api,
                    error,
                    path,
                    api: true,
                }
            }
        };

        let Some(handler) = module.handler_for(&flight.method) else {
            let allowed = module.allowed_methods();
            let error = ArborError::MethodNotAllowed {
                method: flight.method.clone(),
                allowed: allowed.clone(),
            };
            warn!(path = %path, method = %flight.method, "{}", error);
            return State::Sent(
                Response::json_error(405, error.to_string()).with_header("allow", allowed.join(", ")),
            );
        };

        let writer = ResponseWriter::new();
        let ctx = self.context(flight, &path, params);
        match handler.call(flight.request.clone(), writer.clone(), ctx).await {
            Ok(Outcome::Done(value)) => State::Sent(
                writer
                    .committed_response()
                    .unwrap_or_else(|| writer.merge_into(value.into_response())),
            ),
            Ok(Outcome::Redirect(redirect)) => State::Sent(redirect_response(&redirect)),
            Ok(Outcome::NotFound) => State::NotFound { path, api: true },
            Err(fault) => State::Error {
                kind: DiagnosticKind::Api,
                error: ArborError::Render(fault),
                path,
                api: true,
            },
        }
    }

    async fn handle_page(&self, flight: &Flight, route: &Route, params: Params, path: String) -> State {
        let ctx = self.context(flight, &path, params);
        match self.render_route(route, &ctx, page_props(&ctx), 200).await {
            Ok(Outcome::Done(response)) => State::Sent(response),
            Ok(Outcome::Redirect(redirect)) => State::Sent(redirect_response(&redirect)),
            Ok(Outcome::NotFound) => State::NotFound { path, api: false },
            Err(error) => State::Error {
                kind: DiagnosticKind::Render,
                error,
                path,
                api: false,
            },
        }
    }

    /// Compiles and loads the route module and its layouts, composes the
    /// tree and renders it.
    async fn render_route(
        &self,
        route: &Route,
        ctx: &RequestContext,
        props: JsonValue,
        status: u16,
    ) -> Result<Outcome<Response>> {
        let page = self.load_page(&route.handler).await?;

        let layout_paths = layout::collect(&route.handler, &route.root, &self.extensions);
        let mut layouts = Vec::with_capacity(layout_paths.len());
        for path in &layout_paths {
            layouts.push(self.load_page(path).await?.component);
        }

        let tree = Element::compose(
            ctx.locale.clone(),
            ctx.dictionaries.clone(),
            layouts,
            page.component.clone(),
            props,
        );
        debug!(
            pattern = %route.path_pattern,
            layouts = tree.layout_depth(),
            "Rendering page"
        );

        let outcome = self.engine.render(&tree, ctx).await?;
        Ok(outcome.map(|html| {
            let mut response = Response::html(status, html);
            if let Some(title) = page.title() {
                response.set_header(TITLE_HEADER, title);
            }
            response
        }))
    }

    async fn handle_not_found(&self, flight: &Flight, path: String, api: bool) -> State {
        if api {
            debug!(path = %path, "No API route");
            return State::Sent(Response::json_error(404, "Not Found"));
        }

        let Some((route, params)) = closest_not_found(&flight.table, &path) else {
            debug!(path = %path, "No not-found route, sending plain 404");
            return State::Sent(not_found_page());
        };

        debug!(path = %path, pattern = %route.path_pattern, "Rendering not-found route");
        let ctx = self.context(flight, &path, params);
        match self.render_route(&route, &ctx, page_props(&ctx), 404).await {
            Ok(Outcome::Done(response)) => State::Sent(response),
            Ok(Outcome::Redirect(redirect)) => State::Sent(redirect_response(&redirect)),
            Ok(Outcome::NotFound) => State::Sent(not_found_page()),
            Err(error) => {
                warn!(
                    pattern = %route.path_pattern,
                    error = %error,
                    "Not-found route failed, sending plain 404"
                );
                State::Sent(not_found_page())
            }
        }
    }

    async fn handle_error(
        &self,
        flight: &Flight,
        kind: DiagnosticKind,
        err: ArborError,
        path: String,
        api: bool,
    ) -> State {
        let diagnostic = Diagnostic::from_error(kind, &err);
        error!(
            path = %path,
            status = diagnostic.status,
            kind = ?diagnostic.kind,
            "{}",
            err
        );

        if api {
            return State::Sent(self.presenter.api(&diagnostic));
        }

        if !matches!(err, ArborError::Compilation(_)) {
            if let Some(response) = self.render_error_page(flight, &diagnostic, &path).await {
                return State::Sent(response);
            }
        }

        State::Sent(self.presenter.page(&diagnostic))
    }

    /// Renders the first registered error page for the diagnostic's status.
    async fn render_error_page(
        &self,
        flight: &Flight,
        diagnostic: &Diagnostic,
        path: &str,
    ) -> Option<Response> {
        let status = diagnostic.status;
        let route = error_page_candidates(status)
            .iter()
            .find_map(|candidate| flight.table.page(candidate))?;

        let ctx = self.context(flight, path, Params::new());
        let mut props = page_props(&ctx);
        props["error"] = json!({
            "message": diagnostic.message,
            "status": status,
            "statusCode": status,
        });

        match self.render_route(route, &ctx, props, status).await {
            Ok(Outcome::Done(response)) => Some(response),
            Ok(Outcome::Redirect(redirect)) => Some(redirect_response(&redirect)),
            Ok(Outcome::NotFound) => None,
            Err(err) => {
                warn!(
                    pattern = %route.path_pattern,
                    error = %err,
                    "Error page failed, falling back to presenter"
                );
                None
            }
        }
    }
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn redirect_response(redirect: &Redirect) -> Response {
    debug!(location = %redirect.location, status = redirect.status, "Redirect");
    Response::redirect(redirect.location.clone(), redirect.status)
}

fn page_props(ctx: &RequestContext) -> JsonValue {
    json!({
        "params": ctx.params,
        "locale": ctx.locale,
        "pathname": ctx.pathname,
        "query": ctx.query,
    })
}

/// Error page patterns to try, in order, for `status`.
///
/// `/<status>` and `/error` apply to every status. `/404` and `/not-found`
/// are only tried for 404, and `/500` only for 5xx statuses.
fn error_page_candidates(status: u16) -> Vec<String> {
    let mut candidates = vec![format!("/{}", status)];
    if status == 404 {
        candidates.push("/404".to_string());
        candidates.push("/not-found".to_string());
    }
    if (500..=599).contains(&status) {
        candidates.push("/500".to_string());
    }
    candidates.push("/error".to_string());
    candidates.dedup();
    candidates
}

/// The not-found route nearest to `path`: `<prefix>/not-found` is matched
/// from the full path down to `/not-found`.
fn closest_not_found(table: &RouteTable, path: &str) -> Option<(Route, Params)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    (0..=segments.len()).rev().find_map(|depth| {
        let mut candidate = String::from("/");
        for segment in &segments[..depth] {
            candidate.push_str(segment);
            candidate.push('/');
        }
        candidate.push_str("not-found");

        table
            .match_not_found(&candidate)
            .map(|matched| (matched.route.clone(), matched.params))
    })
}
