// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Exported callables of route modules and the loader that produces them.
//!
//! A page, layout, not-found or error module exports a [`Component`]. An API
//! module exports one [`ApiHandler`] per HTTP method plus an optional
//! `default`. The root middleware module exports a [`Middleware`].

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::Artifact;
use crate::context::RequestContext;
use crate::error::{Fault, Result};
use crate::render::{Outcome, Redirect};
use crate::request::Request;
use crate::response::{Response, ResponseWriter, CONTENT_TYPE_TEXT};

/// Outcome of a component call.
pub type RenderResult = std::result::Result<Outcome<String>, Fault>;

type SyncRenderFn = dyn Fn(&JsonValue, &RequestContext) -> RenderResult + Send + Sync;
type AsyncRenderFn =
    dyn Fn(JsonValue, RequestContext) -> BoxFuture<'static, RenderResult> + Send + Sync;

/// A renderable export: props and context in, markup out.
#[derive(Clone)]
pub enum Component {
    /// Produces markup immediately.
    Sync(Arc<SyncRenderFn>),
    /// Produces markup after awaiting.
    Async(Arc<AsyncRenderFn>),
}

impl Component {
    /// Wraps a synchronous render function.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&JsonValue, &RequestContext) -> RenderResult + Send + Sync + 'static,
    {
        Component::Sync(Arc::new(f))
    }

    /// Wraps an asynchronous render function.
    pub fn asynchronous<F>(f: F) -> Self
    where
        F: Fn(JsonValue, RequestContext) -> BoxFuture<'static, RenderResult> + Send + Sync + 'static,
    {
        Component::Async(Arc::new(f))
    }

    /// Renders, awaiting when the component is asynchronous.
    pub async fn call(&self, props: JsonValue, ctx: &RequestContext) -> RenderResult {
        match self {
            Component::Sync(f) => f(&props, ctx),
            Component::Async(f) => f(props, ctx.clone()).await,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Sync(_) => f.write_str("Component::Sync"),
            Component::Async(_) => f.write_str("Component::Async"),
        }
    }
}

/// A loaded page-like module (page, layout, not-found, error page).
#[derive(Debug, Clone)]
pub struct PageModule {
    /// The default export.
    pub component: Component,
    /// Static `metadata` export.
    pub metadata: Option<JsonValue>,
}

impl PageModule {
    /// A module with only a component.
    pub fn new(component: Component) -> Self {
        Self {
            component,
            metadata: None,
        }
    }

    /// The `metadata.title` string, if exported.
    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("title")?.as_str()
    }
}

/// What an API handler returned.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerValue {
    /// A framework response, sent verbatim.
    Response(Response),
    /// A response-shaped value (`status` / `headers` / `body`).
    ResponseLike {
        /// Status code, 200 when absent.
        status: Option<u16>,
        /// Extra headers.
        headers: Vec<(String, String)>,
        /// Strings are sent as text, anything else as JSON.
        body: Option<JsonValue>,
    },
    /// Any other object or array, sent as JSON.
    Json(JsonValue),
    /// A primitive, sent as `text/plain`.
    Text(String),
    /// Nothing was returned.
    Empty,
}

impl HandlerValue {
    /// Classifies a plain JSON value the way handler returns are interpreted.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => HandlerValue::Empty,
            JsonValue::Object(_) | JsonValue::Array(_) => HandlerValue::Json(value),
            JsonValue::String(s) => HandlerValue::Text(s),
            other => HandlerValue::Text(other.to_string()),
        }
    }

    /// Builds the HTTP response. `Empty` becomes `204 No Content`.
    pub fn into_response(self) -> Response {
        match self {
            HandlerValue::Response(response) => response,
            HandlerValue::ResponseLike {
                status,
                headers,
                body,
            } => {
                let status = status.unwrap_or(200);
                let mut response = match body {
                    None | Some(JsonValue::Null) => Response::new(status),
                    Some(JsonValue::String(text)) => Response::text(status, text),
                    Some(value) => Response::json(status, &value),
                };
                for (name, value) in headers {
                    response.set_header(name, value);
                }
                response
            }
            HandlerValue::Json(value) => Response::json(200, &value),
            HandlerValue::Text(text) => Response::new(200)
                .with_header("content-type", CONTENT_TYPE_TEXT)
                .with_body(text),
            HandlerValue::Empty => Response::new(204),
        }
    }
}

/// Outcome of an API handler call.
pub type HandlerResult = std::result::Result<Outcome<HandlerValue>, Fault>;

type ApiHandlerFn = dyn Fn(Request, ResponseWriter, RequestContext) -> BoxFuture<'static, HandlerResult>
    + Send
    + Sync;

/// One exported API function.
#[derive(Clone)]
pub struct ApiHandler(Arc<ApiHandlerFn>);

impl ApiHandler {
    /// Wraps a handler function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Request, ResponseWriter, RequestContext) -> BoxFuture<'static, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the handler.
    pub async fn call(
        &self,
        request: Request,
        writer: ResponseWriter,
        ctx: RequestContext,
    ) -> HandlerResult {
        (self.0)(request, writer, ctx).await
    }
}

impl fmt::Debug for ApiHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiHandler")
    }
}

/// A loaded API module.
#[derive(Debug, Clone, Default)]
pub struct ApiModule {
    /// Method exports keyed by uppercase method name.
    pub handlers: BTreeMap<String, ApiHandler>,
    /// The `default` export.
    pub default: Option<ApiHandler>,
}

impl ApiModule {
    /// Registers a method export.
    pub fn with_method(mut self, method: &str, handler: ApiHandler) -> Self {
        self.handlers.insert(method.to_ascii_uppercase(), handler);
        self
    }

    /// Registers the `default` export.
    pub fn with_default(mut self, handler: ApiHandler) -> Self {
        self.default = Some(handler);
        self
    }

    /// Picks the export for `method`: exact method, `GET` for `HEAD`, then `default`.
    pub fn handler_for(&self, method: &str) -> Option<&ApiHandler> {
        let method = method.to_ascii_uppercase();
        self.handlers
            .get(&method)
            .or_else(|| {
                (method == "HEAD")
                    .then(|| self.handlers.get("GET"))
                    .flatten()
            })
            .or(self.default.as_ref())
    }

    /// Methods for the `Allow` header.
    pub fn allowed_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        if self.handlers.contains_key("GET") && !self.handlers.contains_key("HEAD") {
            methods.push("HEAD".to_string());
            methods.sort();
        }
        methods
    }
}

/// What the root middleware decided.
#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareOutcome {
    /// Continue to routing.
    Next,
    /// Stop with a redirect.
    Redirect(Redirect),
    /// Route this path instead of the requested one.
    Rewrite(String),
    /// Stop with this response.
    Respond(Response),
}

type MiddlewareFn = dyn Fn(Request, RequestContext) -> BoxFuture<'static, std::result::Result<MiddlewareOutcome, Fault>>
    + Send
    + Sync;

/// The root middleware export.
#[derive(Clone)]
pub struct Middleware(Arc<MiddlewareFn>);

impl Middleware {
    /// Wraps a middleware function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Request, RequestContext) -> BoxFuture<'static, std::result::Result<MiddlewareOutcome, Fault>>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the middleware.
    pub async fn call(
        &self,
        request: Request,
        ctx: RequestContext,
    ) -> std::result::Result<MiddlewareOutcome, Fault> {
        (self.0)(request, ctx).await
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// Turns compiled artifacts into callable exports.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Loads a page, layout, not-found or error module.
    async fn load_page(&self, artifact: &Artifact) -> Result<PageModule>;

    /// Loads an API module.
    async fn load_api(&self, artifact: &Artifact) -> Result<ApiModule>;

    /// Loads the root middleware.
    async fn load_middleware(&self, artifact: &Artifact) -> Result<Middleware>;
}
