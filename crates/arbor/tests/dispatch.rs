// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! End-to-end dispatcher tests with an in-memory module loader.

use arbor::{
    ApiHandler, ApiModule, ArborConfig, Artifact, CompilationCache, CompileFailure, CompileOptions, Compiler,
    Component, CookieOptions, Dispatcher, Fault, HandlerValue, LocaleResolver, Middleware,
    MiddlewareOutcome, ModuleLoader, Outcome, PageModule, ProductionPresenter, Redirect, Request,
    RequestContext, Result, RouteTable, RouteTableHandle, RoutingConfig, TITLE_HEADER,
};
use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Copies sources to artifacts; fails on sources containing "syntax error".
#[derive(Default)]
struct CopyCompiler {
    compiles: AtomicUsize,
}

#[async_trait]
impl Compiler for CopyCompiler {
    async fn compile(
        &self,
        source: &Path,
        output: &Path,
        _options: &CompileOptions,
    ) -> std::result::Result<(), CompileFailure> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let code = tokio::fs::read_to_string(source).await?;
        if code.contains("syntax error") {
            return Err(CompileFailure::new("unexpected symbol near 'error'").at(Some(1), None));
        }
        tokio::fs::write(output, code).await?;
        Ok(())
    }
}

enum Loaded {
    Page(PageModule),
    Api(ApiModule),
    Middleware(Middleware),
}

/// Serves modules registered by source path.
#[derive(Default)]
struct MemoryLoader {
    modules: HashMap<PathBuf, Loaded>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    fn get(&self, artifact: &Artifact) -> Option<&Loaded> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.modules.get(&artifact.source)
    }
}

#[async_trait]
impl ModuleLoader for MemoryLoader {
    async fn load_page(&self, artifact: &Artifact) -> Result<PageModule> {
        match self.get(artifact) {
            Some(Loaded::Page(module)) => Ok(module.clone()),
            _ => Err(arbor::ArborError::module(&artifact.source, "not a page")),
        }
    }

    async fn load_api(&self, artifact: &Artifact) -> Result<ApiModule> {
        match self.get(artifact) {
            Some(Loaded::Api(module)) => Ok(module.clone()),
            _ => Err(arbor::ArborError::module(&artifact.source, "not an API module")),
        }
    }

    async fn load_middleware(&self, artifact: &Artifact) -> Result<Middleware> {
        match self.get(artifact) {
            Some(Loaded::Middleware(middleware)) => Ok(middleware.clone()),
            _ => Err(arbor::ArborError::module(&artifact.source, "not middleware")),
        }
    }
}

struct Fixture {
    dir: TempDir,
    loader: MemoryLoader,
}

struct App {
    dispatcher: Dispatcher,
    compiler: Arc<CopyCompiler>,
    loader: Arc<MemoryLoader>,
    _dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            loader: MemoryLoader::default(),
        }
    }

    fn source(self, rel: &str, contents: &str) -> Self {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        self
    }

    fn register(mut self, rel: &str, loaded: Loaded) -> Self {
        let path = self.dir.path().join(rel);
        self.loader.modules.insert(path, loaded);
        self.source(rel, "return {}")
    }

    fn page(self, rel: &str, module: PageModule) -> Self {
        self.register(rel, Loaded::Page(module))
    }

    fn api(self, rel: &str, module: ApiModule) -> Self {
        self.register(rel, Loaded::Api(module))
    }

    fn middleware(self, middleware: Middleware) -> Self {
        self.register("middleware.lua", Loaded::Middleware(middleware))
    }

    fn build(self) -> App {
        let mut app = self.build_with_config(&ArborConfig::default());
        app.dispatcher = app
            .dispatcher
            .with_locales(LocaleResolver::new("en", vec!["en".into(), "de".into()]));
        app
    }

    /// Builds through `Dispatcher::from_config`, loading dictionaries from
    /// the fixture's `locales/` directory.
    fn build_with_config(self, config: &ArborConfig) -> App {
        let root = self.dir.path().to_path_buf();
        let table = RouteTable::discover(&root, &RoutingConfig::default()).unwrap();
        let compiler = Arc::new(CopyCompiler::default());
        let loader = Arc::new(self.loader);
        let cache = Arc::new(CompilationCache::new(root.join(".arbor/cache"), compiler.clone()));

        let dispatcher = Dispatcher::from_config(
            &root,
            config,
            RouteTableHandle::new(table),
            cache,
            loader.clone(),
        )
        .unwrap();

        App {
            dispatcher,
            compiler,
            loader,
            _dir: self.dir,
        }
    }
}

fn html<F>(render: F) -> PageModule
where
    F: Fn(&JsonValue, &RequestContext) -> String + Send + Sync + 'static,
{
    PageModule::new(Component::sync(move |props, ctx| Ok(Outcome::Done(render(props, ctx)))))
}

fn wrap(tag: &'static str) -> PageModule {
    html(move |props, _| {
        format!(
            "<{tag}>{}</{tag}>",
            props["children"].as_str().unwrap_or_default()
        )
    })
}

fn counted(calls: Arc<AtomicUsize>) -> PageModule {
    html(move |props, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        props["children"].as_str().unwrap_or_default().to_string()
    })
}

fn handler<F>(f: F) -> ApiHandler
where
    F: Fn(&arbor::ResponseWriter) -> arbor::HandlerResult + Send + Sync + 'static,
{
    let f = Arc::new(f);
    ApiHandler::new(move |_, writer, _| {
        let result = f(&writer);
        async move { result }.boxed()
    })
}

async fn get(app: &App, path: &str) -> arbor::Response {
    app.dispatcher.dispatch(Request::new("GET", path)).await
}

#[tokio::test]
async fn test_page_renders_inside_layouts_with_locale() {
    let page = PageModule {
        metadata: Some(json!({ "title": "Post" })),
        ..html(|props, ctx| {
            format!(
                "{}:{}",
                props["params"]["slug"].as_str().unwrap_or_default(),
                ctx.locale
            )
        })
    };
    let app = Fixture::new()
        .page("app/layout.lua", wrap("html"))
        .page("app/blog/layout.lua", wrap("main"))
        .page("app/blog/[slug]/page.lua", page)
        .build();

    let response = get(&app, "/de/blog/hello").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_str(), "<html><main>hello:de</main></html>");
    assert_eq!(response.header(TITLE_HEADER), Some("Post"));
    assert!(response.header("content-type").unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn test_locale_from_accept_language() {
    let app = Fixture::new()
        .page("app/page.lua", html(|_, ctx| ctx.locale.clone()))
        .build();

    let request = Request::new("GET", "/").with_header("Accept-Language", "de-CH,de;q=0.9,en;q=0.5");
    let response = app.dispatcher.dispatch(request).await;
    assert_eq!(response.body_str(), "de");

    let request = Request::new("GET", "/").with_header("Cookie", "locale=en");
    let response = app.dispatcher.dispatch(request).await;
    assert_eq!(response.body_str(), "en");
}

#[tokio::test]
async fn test_dynamic_route_registered_first_wins() {
    let app = Fixture::new()
        .page(
            "app/blog/[slug]/page.lua",
            html(|props, _| format!("slug={}", props["params"]["slug"].as_str().unwrap_or_default())),
        )
        .page("app/blog/featured/page.lua", html(|_, _| "featured".into()))
        .build();

    let response = get(&app, "/blog/featured").await;
    assert_eq!(response.body_str(), "slug=featured");
}

#[tokio::test]
async fn test_catch_all_routes() {
    let app = Fixture::new()
        .page(
            "app/docs/[...path]/page.lua",
            html(|props, _| format!("docs:{}", props["params"]["path"].as_str().unwrap_or_default())),
        )
        .page(
            "app/shop/[[...path]]/page.lua",
            html(|props, _| format!("shop:[{}]", props["params"]["path"].as_str().unwrap_or_default())),
        )
        .build();

    assert_eq!(get(&app, "/docs/a/b/c").await.body_str(), "docs:a/b/c");
    assert_eq!(get(&app, "/shop").await.body_str(), "shop:[]");
    assert_eq!(get(&app, "/shop/x/y").await.body_str(), "shop:[x/y]");
    assert_eq!(get(&app, "/docs").await.status, 404);
}

#[tokio::test]
async fn test_redirect_from_page_skips_markup() {
    let layout_calls = Arc::new(AtomicUsize::new(0));
    let page = PageModule::new(Component::sync(|_, _| {
        Ok(Outcome::Redirect(Redirect::new("/login")))
    }));
    let app = Fixture::new()
        .page("app/layout.lua", counted(layout_calls.clone()))
        .page("app/account/page.lua", page)
        .build();

    let response = get(&app, "/account").await;
    assert_eq!(response.status, 307);
    assert_eq!(response.header("location"), Some("/login"));
    assert!(response.body.is_empty());
    assert_eq!(layout_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_not_found_signal_renders_closest_not_found() {
    let page = PageModule::new(Component::sync(|_, _| Ok(Outcome::NotFound)));
    let app = Fixture::new()
        .page("app/layout.lua", wrap("html"))
        .page("app/not-found.lua", html(|_, _| "root missing".into()))
        .page(
            "app/blog/not-found.lua",
            html(|_, ctx| format!("no post at {}", ctx.pathname)),
        )
        .page("app/blog/[slug]/page.lua", page)
        .build();

    let response = get(&app, "/blog/missing").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body_str(), "<html>no post at /blog/missing</html>");

    let response = get(&app, "/nowhere/at/all").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body_str(), "<html>root missing</html>");
}

#[tokio::test]
async fn test_not_found_route_is_not_directly_routable() {
    let app = Fixture::new()
        .page("app/not-found.lua", html(|_, _| "missing".into()))
        .build();

    let response = get(&app, "/not-found").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body_str(), "missing");
}

#[tokio::test]
async fn test_plain_404_without_not_found_route() {
    let app = Fixture::new()
        .page("app/page.lua", html(|_, _| "home".into()))
        .build();

    let response = get(&app, "/nope").await;
    assert_eq!(response.status, 404);
    assert!(response.body_str().contains("404 Not Found"));
}

#[tokio::test]
async fn test_failing_not_found_route_sends_plain_404() {
    let page = PageModule::new(Component::sync(|_, _| Ok(Outcome::NotFound)));
    let broken = PageModule::new(Component::sync(|_, _| Err(Fault::new("not-found exploded"))));
    let app = Fixture::new()
        .page("app/not-found.lua", broken)
        .page("app/blog/[slug]/page.lua", page)
        .build();

    for path in ["/blog/missing", "/nowhere"] {
        let response = get(&app, path).await;
        assert_eq!(response.status, 404, "path {}", path);
        assert!(response.body_str().contains("404 Not Found"));
        assert!(!response.body_str().contains("not-found exploded"));
    }
}

#[tokio::test]
async fn test_two_letter_segments_route_under_default_locales() {
    let app = Fixture::new()
        .page("app/page.lua", html(|_, _| "home".into()))
        .page(
            "app/go/page.lua",
            html(|_, ctx| format!("go {} {}", ctx.locale, ctx.pathname)),
        )
        .source("locales/en.json", r#"{"hello": "Hello"}"#)
        .source("locales/de.json", r#"{"hello": "Hallo"}"#)
        .build_with_config(&ArborConfig::default());

    assert_eq!(get(&app, "/go").await.body_str(), "go en /go");
    assert_eq!(get(&app, "/de/go").await.body_str(), "go de /go");
    assert_eq!(get(&app, "/en/go").await.body_str(), "go en /go");
    assert_eq!(get(&app, "/fr/go").await.status, 404);
    assert_eq!(get(&app, "/de").await.body_str(), "home");
}

#[tokio::test]
async fn test_api_methods() {
    let users = ApiModule::default()
        .with_method(
            "GET",
            handler(|_| Ok(Outcome::Done(HandlerValue::Json(json!([{ "id": 1 }]))))),
        )
        .with_method(
            "POST",
            handler(|writer| {
                writer.status(201);
                writer.json(&json!({ "id": 2 }));
                Ok(Outcome::Done(HandlerValue::Text("ignored".into())))
            }),
        );
    let app = Fixture::new()
        .api("app/api/users/route.lua", users)
        .build();

    let response = get(&app, "/api/users").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_str(), r#"[{"id":1}]"#);

    let response = app.dispatcher.dispatch(Request::new("POST", "/api/users")).await;
    assert_eq!(response.status, 201);
    assert_eq!(response.body_str(), r#"{"id":2}"#);

    let response = app.dispatcher.dispatch(Request::new("DELETE", "/api/users")).await;
    assert_eq!(response.status, 405);
    assert_eq!(response.header("allow"), Some("GET, HEAD, POST"));

    let response = app.dispatcher.dispatch(Request::new("HEAD", "/api/users")).await;
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_api_staged_headers_merge_into_return_value() {
    let module = ApiModule::default().with_default(handler(|writer| {
        writer.status(202);
        writer.header("X-Trace", "abc");
        Ok(Outcome::Done(HandlerValue::Text("queued".into())))
    }));
    let app = Fixture::new()
        .api("app/api/jobs/route.lua", module)
        .build();

    let response = app.dispatcher.dispatch(Request::new("PUT", "/api/jobs")).await;
    assert_eq!(response.status, 202);
    assert_eq!(response.header("x-trace"), Some("abc"));
    assert_eq!(response.body_str(), "queued");
}

#[tokio::test]
async fn test_empty_api_return_is_no_content() {
    let module =
        ApiModule::default().with_method("GET", handler(|_| Ok(Outcome::Done(HandlerValue::Empty))));
    let app = Fixture::new()
        .api("app/api/ping/route.lua", module)
        .build();

    let response = get(&app, "/api/ping").await;
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_unmatched_api_path_never_falls_back_to_pages() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let catch_all = html(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        "page".into()
    });
    let users =
        ApiModule::default().with_method("GET", handler(|_| Ok(Outcome::Done(HandlerValue::Empty))));
    let app = Fixture::new()
        .page("app/[[...all]]/page.lua", catch_all)
        .api("app/api/users/route.lua", users)
        .build();

    let response = get(&app, "/api/missing").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body_str(), r#"{"error":"Not Found"}"#);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(get(&app, "/anything").await.body_str(), "page");
}

#[tokio::test]
async fn test_api_fault_uses_json_presenter() {
    let module = ApiModule::default().with_method(
        "GET",
        handler(|_| Err(Fault::new("database unavailable").with_status_code(503))),
    );
    let app = Fixture::new()
        .api("app/api/stats/route.lua", module)
        .build();

    let response = get(&app, "/api/stats").await;
    assert_eq!(response.status, 503);
    let body: JsonValue = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"], "database unavailable");
}

#[tokio::test]
async fn test_fault_renders_error_page_with_status() {
    let page = PageModule::new(Component::sync(|_, _| {
        Err(Fault::new("members only").with_status_code(403))
    }));
    let error_page = html(|props, _| {
        format!(
            "{} {}",
            props["error"]["status"],
            props["error"]["message"].as_str().unwrap_or_default()
        )
    });
    let app = Fixture::new()
        .page("app/layout.lua", wrap("html"))
        .page("app/private/page.lua", page)
        .page("app/error/page.lua", error_page)
        .build();

    let response = get(&app, "/private").await;
    assert_eq!(response.status, 403);
    assert_eq!(response.body_str(), "<html>403 members only</html>");
}

#[tokio::test]
async fn test_server_error_prefers_500_page() {
    let page = PageModule::new(Component::sync(|_, _| Err(Fault::new("boom"))));
    let app = Fixture::new()
        .page("app/broken/page.lua", page)
        .page("app/500/page.lua", html(|_, _| "five hundred".into()))
        .page("app/error/page.lua", html(|_, _| "generic".into()))
        .build();

    let response = get(&app, "/broken").await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body_str(), "five hundred");
}

#[tokio::test]
async fn test_fault_without_error_pages_uses_presenter() {
    let page = PageModule::new(Component::sync(|_, _| Err(Fault::new("secret detail"))));
    let app = Fixture::new().page("app/page.lua", page).build();

    let response = get(&app, "/").await;
    assert_eq!(response.status, 500);
    assert!(response.body_str().contains("secret detail"));

    let page = PageModule::new(Component::sync(|_, _| Err(Fault::new("secret detail"))));
    let mut app = Fixture::new().page("app/page.lua", page).build();
    app.dispatcher = app.dispatcher.with_presenter(Arc::new(ProductionPresenter));

    let response = get(&app, "/").await;
    assert_eq!(response.status, 500);
    assert!(!response.body_str().contains("secret detail"));
}

#[tokio::test]
async fn test_failing_error_page_falls_back_to_presenter() {
    let page = PageModule::new(Component::sync(|_, _| {
        Err(Fault::new("members only").with_status_code(403))
    }));
    let error_page = PageModule::new(Component::sync(|_, _| Err(Fault::new("error page exploded"))));
    let app = Fixture::new()
        .page("app/private/page.lua", page)
        .page("app/error/page.lua", error_page)
        .build();

    let response = get(&app, "/private").await;
    assert_eq!(response.status, 403);
    assert!(response.body_str().contains("members only"));
    assert!(!response.body_str().contains("error page exploded"));

    let page = PageModule::new(Component::sync(|_, _| {
        Err(Fault::new("members only").with_status_code(403))
    }));
    let error_page = PageModule::new(Component::sync(|_, _| Err(Fault::new("error page exploded"))));
    let mut app = Fixture::new()
        .page("app/private/page.lua", page)
        .page("app/error/page.lua", error_page)
        .build();
    app.dispatcher = app.dispatcher.with_presenter(Arc::new(ProductionPresenter));

    let response = get(&app, "/private").await;
    assert_eq!(response.status, 403);
    assert!(response.body_str().contains("403 Forbidden"));
    assert!(!response.body_str().contains("members only"));
}

#[tokio::test]
async fn test_failing_500_page_does_not_try_generic_error_page() {
    let page = PageModule::new(Component::sync(|_, _| Err(Fault::new("boom"))));
    let five_hundred = PageModule::new(Component::sync(|_, _| Err(Fault::new("500 page exploded"))));
    let app = Fixture::new()
        .page("app/broken/page.lua", page)
        .page("app/500/page.lua", five_hundred)
        .page("app/error/page.lua", html(|_, _| "generic".into()))
        .build();

    let response = get(&app, "/broken").await;
    assert_eq!(response.status, 500);
    assert!(response.body_str().contains("boom"));
    assert_ne!(response.body_str(), "generic");
}

#[tokio::test]
async fn test_compilation_error_never_loads_module() {
    let app = Fixture::new()
        .page("app/page.lua", html(|_, _| "unreachable".into()))
        .source("app/page.lua", "syntax error here")
        .build();

    let response = get(&app, "/").await;
    assert_eq!(response.status, 500);
    assert!(response.body_str().contains("Compilation Error"));
    assert_eq!(app.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_modules_compile_once() {
    let app = Fixture::new()
        .page("app/layout.lua", wrap("html"))
        .page("app/page.lua", html(|_, _| "home".into()))
        .build();

    get(&app, "/").await;
    assert_eq!(app.compiler.compiles.load(Ordering::SeqCst), 2);

    let response = get(&app, "/").await;
    assert_eq!(response.body_str(), "<html>home</html>");
    assert_eq!(app.compiler.compiles.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_middleware_redirect_and_rewrite() {
    let middleware = Middleware::new(|_, ctx| {
        async move {
            Ok(match ctx.pathname.as_str() {
                "/admin" => MiddlewareOutcome::Redirect(Redirect::new("/login")),
                "/old" => MiddlewareOutcome::Rewrite("/new".into()),
                _ => MiddlewareOutcome::Next,
            })
        }
        .boxed()
    });
    let app = Fixture::new()
        .middleware(middleware)
        .page("app/new/page.lua", html(|_, ctx| format!("new at {}", ctx.pathname)))
        .page("app/old/page.lua", html(|_, _| "old".into()))
        .build();

    let response = get(&app, "/admin").await;
    assert_eq!(response.status, 307);
    assert_eq!(response.header("location"), Some("/login"));

    assert_eq!(get(&app, "/old").await.body_str(), "new at /new");
    assert_eq!(get(&app, "/new").await.body_str(), "new at /new");
}

#[tokio::test]
async fn test_middleware_fault_is_reported() {
    let middleware = Middleware::new(|_, _| {
        async move { Err(Fault::new("middleware exploded")) }.boxed()
    });
    let app = Fixture::new()
        .middleware(middleware)
        .page("app/page.lua", html(|_, _| "home".into()))
        .build();

    let response = get(&app, "/").await;
    assert_eq!(response.status, 500);
    assert!(response.body_str().contains("middleware exploded"));
}

#[tokio::test]
async fn test_cookies_set_during_render_are_sent() {
    let page = html(|_, ctx| {
        ctx.cookies.set("seen", "1", CookieOptions::default());
        "ok".into()
    });
    let app = Fixture::new().page("app/page.lua", page).build();

    let response = get(&app, "/").await;
    let cookies: Vec<&str> = response.header_all("set-cookie").collect();
    assert_eq!(cookies, vec!["seen=1; Path=/; SameSite=Lax"]);
}
