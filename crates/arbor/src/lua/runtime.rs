// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lua module loader.
//!
//! Every module is evaluated once per artifact version in its own
//! environment table that inherits from the shared globals. Exports are the
//! table the chunk returns, or else the globals it defined.

use async_trait::async_trait;
use futures_util::FutureExt;
use mlua::{ChunkMode, Function, Lua, RegistryKey, Table, UserData, UserDataFields, UserDataMethods, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

use super::compiler::chunk_name;
use super::convert::{json_to_lua, lua_to_json, scalar_to_string, string_table, table_to_strings};
use super::signal::{self, fault_from_error, recover};
use crate::cache::Artifact;
use crate::context::{CookieJar, CookieOptions, RequestContext};
use crate::error::{ArborError, Fault, Result};
use crate::module::{
    ApiHandler, ApiModule, Component, HandlerResult, HandlerValue, Middleware, MiddlewareOutcome,
    ModuleLoader, PageModule, RenderResult,
};
use crate::render::{Outcome, Redirect, DEFAULT_REDIRECT_STATUS};
use crate::request::Request;
use crate::response::{Response, ResponseWriter};

const HTTP_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

struct LoadedModule {
    modified: SystemTime,
    exports: Arc<RegistryKey>,
}

/// Loads compiled Lua modules into one shared, sandboxed Lua state.
pub struct LuaRuntime {
    lua: Arc<Lua>,
    modules: Mutex<HashMap<PathBuf, LoadedModule>>,
}

impl std::fmt::Debug for LuaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaRuntime")
            .field("modules", &self.lock().len())
            .finish()
    }
}

impl LuaRuntime {
    /// Creates a sandboxed state with the framework globals installed.
    pub fn new() -> Result<Self> {
        let lua = Lua::new();
        super::sandbox(&lua)?;
        signal::install(&lua)?;
        install_response_global(&lua)?;

        Ok(Self {
            lua: Arc::new(lua),
            modules: Mutex::new(HashMap::new()),
        })
    }

    /// The underlying Lua state.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, LoadedModule>> {
        self.modules.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Evaluates the artifact, reusing the previous evaluation while the
    /// artifact file is unchanged.
    async fn exports(&self, artifact: &Artifact) -> Result<Table> {
        let modified = fs::metadata(&artifact.path).await?.modified()?;

        let known = self
            .lock()
            .get(&artifact.path)
            .filter(|m| m.modified == modified)
            .map(|m| m.exports.clone());
        if let Some(key) = known {
            return Ok(self.lua.registry_value(&key)?);
        }

        let bytecode = fs::read(&artifact.path).await?;
        let exports = self.evaluate(&bytecode, &artifact.source)?;
        let key = Arc::new(self.lua.create_registry_value(exports.clone())?);
        self.lock().insert(
            artifact.path.clone(),
            LoadedModule {
                modified,
                exports: key,
            },
        );
        debug!(source = %artifact.source.display(), "Evaluated Lua module");
        Ok(exports)
    }

    fn evaluate(&self, bytecode: &[u8], source: &Path) -> Result<Table> {
        let env = self.lua.create_table()?;
        let mt = self.lua.create_table()?;
        mt.set("__index", self.lua.globals())?;
        env.set_metatable(Some(mt));

        let returned: Value = self
            .lua
            .load(bytecode)
            .set_name(chunk_name(source))
            .set_mode(ChunkMode::Binary)
            .set_environment(env.clone())
            .eval()
            .map_err(|err| ArborError::Render(fault_from_error(&err, source)))?;

        Ok(match returned {
            Value::Table(exports) => exports,
            _ => env,
        })
    }

    fn export_fn(exports: &Table, names: &[&str]) -> Option<Function> {
        names
            .iter()
            .find_map(|name| exports.raw_get::<Option<Function>>(*name).ok().flatten())
    }

    fn component(&self, function: Function, source: PathBuf) -> Result<Component> {
        let key = Arc::new(self.lua.create_registry_value(function)?);
        let lua = self.lua.clone();
        Ok(Component::sync(move |props, ctx| {
            call_component(&lua, &key, props, ctx, &source)
        }))
    }

    fn api_handler(&self, function: Function, source: PathBuf) -> Result<ApiHandler> {
        let key = Arc::new(self.lua.create_registry_value(function)?);
        let lua = self.lua.clone();
        Ok(ApiHandler::new(move |request, writer, ctx| {
            let result = call_handler(&lua, &key, &request, &writer, &ctx, &source);
            async move { result }.boxed()
        }))
    }
}

#[async_trait]
impl ModuleLoader for LuaRuntime {
    async fn load_page(&self, artifact: &Artifact) -> Result<PageModule> {
        let exports = self.exports(artifact).await?;

        let function = Self::export_fn(&exports, &["default", "render"]).ok_or_else(|| {
            ArborError::module(&artifact.source, "no `default` or `render` function exported")
        })?;
        let metadata = match exports.raw_get::<Value>("metadata")? {
            Value::Nil => None,
            value => Some(lua_to_json(&value)?),
        };

        Ok(PageModule {
            component: self.component(function, artifact.source.clone())?,
            metadata,
        })
    }

    async fn load_api(&self, artifact: &Artifact) -> Result<ApiModule> {
        let exports = self.exports(artifact).await?;

        let mut module = ApiModule::default();
        for method in HTTP_METHODS {
            if let Some(function) = Self::export_fn(&exports, &[*method]) {
                module = module.with_method(method, self.api_handler(function, artifact.source.clone())?);
            }
        }
        if let Some(function) = Self::export_fn(&exports, &["default"]) {
            module = module.with_default(self.api_handler(function, artifact.source.clone())?);
        }
        Ok(module)
    }

    async fn load_middleware(&self, artifact: &Artifact) -> Result<Middleware> {
        let exports = self.exports(artifact).await?;

        let function = Self::export_fn(&exports, &["middleware", "default"]).ok_or_else(|| {
            ArborError::module(&artifact.source, "no `middleware` or `default` function exported")
        })?;
        let key = Arc::new(self.lua.create_registry_value(function)?);
        let lua = self.lua.clone();
        let source = artifact.source.clone();

        Ok(Middleware::new(move |request, ctx| {
            let result = call_middleware(&lua, &key, &request, &ctx, &source);
            async move { result }.boxed()
        }))
    }
}

fn call_component(
    lua: &Lua,
    key: &RegistryKey,
    props: &serde_json::Value,
    ctx: &RequestContext,
    source: &Path,
) -> RenderResult {
    let result = (|| -> mlua::Result<String> {
        let function: Function = lua.registry_value(key)?;
        let props = json_to_lua(lua, props)?;
        let ctx = context_table(lua, ctx)?;
        markup(function.call::<Value>((props, ctx))?)
    })();

    match result {
        Ok(html) => Ok(Outcome::Done(html)),
        Err(err) => recover(err, source),
    }
}

fn call_handler(
    lua: &Lua,
    key: &RegistryKey,
    request: &Request,
    writer: &ResponseWriter,
    ctx: &RequestContext,
    source: &Path,
) -> HandlerResult {
    let result = (|| -> mlua::Result<HandlerValue> {
        let function: Function = lua.registry_value(key)?;
        let req = request_table(lua, request, ctx)?;
        let ctx = context_table(lua, ctx)?;
        handler_value(function.call::<Value>((req, LuaWriter(writer.clone()), ctx))?)
    })();

    match result {
        Ok(value) => Ok(Outcome::Done(value)),
        Err(err) => recover(err, source),
    }
}

fn call_middleware(
    lua: &Lua,
    key: &RegistryKey,
    request: &Request,
    ctx: &RequestContext,
    source: &Path,
) -> std::result::Result<MiddlewareOutcome, Fault> {
    let result = (|| -> mlua::Result<MiddlewareOutcome> {
        let function: Function = lua.registry_value(key)?;
        let req = request_table(lua, request, ctx)?;
        let ctx = context_table(lua, ctx)?;
        middleware_outcome(function.call::<Value>((req, ctx))?)
    })();

    match result {
        Ok(outcome) => Ok(outcome),
        Err(err) => match recover::<()>(err, source)? {
            Outcome::Redirect(redirect) => Ok(MiddlewareOutcome::Redirect(redirect)),
            Outcome::NotFound => Err(Fault::new("Not Found").with_status_code(404)),
            Outcome::Done(()) => Ok(MiddlewareOutcome::Next),
        },
    }
}

/// Component return value as markup.
fn markup(value: Value) -> mlua::Result<String> {
    match value {
        Value::Nil => Ok(String::new()),
        Value::String(s) => Ok(s.to_str()?.to_string()),
        Value::Integer(_) | Value::Number(_) => Ok(scalar_to_string(&value)?.unwrap_or_default()),
        other => Err(mlua::Error::RuntimeError(format!(
            "component must return a string, got {}",
            other.type_name()
        ))),
    }
}

fn handler_value(value: Value) -> mlua::Result<HandlerValue> {
    Ok(match value {
        Value::Nil => HandlerValue::Empty,
        Value::UserData(ud) => {
            let response = ud.borrow::<LuaResponse>()?;
            HandlerValue::Response(response.0.clone())
        }
        Value::Table(table) if is_response_shaped(&table)? => {
            let status = match table.raw_get::<Value>("status")? {
                Value::Integer(n) => u16::try_from(n).ok(),
                _ => None,
            };
            let headers = match table.raw_get::<Option<Table>>("headers")? {
                Some(headers) => table_to_strings(&headers)?,
                None => Vec::new(),
            };
            let body = match table.raw_get::<Value>("body")? {
                Value::Nil => None,
                body => Some(lua_to_json(&body)?),
            };
            HandlerValue::ResponseLike {
                status,
                headers,
                body,
            }
        }
        Value::Table(table) => HandlerValue::Json(lua_to_json(&Value::Table(table))?),
        other => HandlerValue::Text(scalar_to_string(&other)?.unwrap_or_default()),
    })
}

/// A table whose keys are all among `status`, `headers`, `body`, with a
/// numeric `status` when present.
fn is_response_shaped(table: &Table) -> mlua::Result<bool> {
    let mut seen = false;
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let Value::String(key) = key else {
            return Ok(false);
        };
        match &*key.to_str()? {
            "status" if matches!(value, Value::Integer(_)) => {}
            "headers" if matches!(value, Value::Table(_)) => {}
            "body" => {}
            _ => return Ok(false),
        }
        seen = true;
    }
    Ok(seen)
}

fn middleware_outcome(value: Value) -> mlua::Result<MiddlewareOutcome> {
    Ok(match value {
        Value::UserData(ud) => MiddlewareOutcome::Respond(ud.borrow::<LuaResponse>()?.0.clone()),
        Value::Table(table) => {
            if let Some(location) = table.raw_get::<Option<String>>("redirect")? {
                let status = table
                    .raw_get::<Option<u16>>("status")?
                    .unwrap_or(DEFAULT_REDIRECT_STATUS);
                MiddlewareOutcome::Redirect(Redirect::with_status(location, status))
            } else if let Some(path) = table.raw_get::<Option<String>>("rewrite")? {
                MiddlewareOutcome::Rewrite(path)
            } else if is_response_shaped(&table)? {
                MiddlewareOutcome::Respond(handler_value(Value::Table(table))?.into_response())
            } else {
                MiddlewareOutcome::Next
            }
        }
        _ => MiddlewareOutcome::Next,
    })
}

/// The `ctx` table passed to components, handlers and middleware.
fn context_table(lua: &Lua, ctx: &RequestContext) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("locale", ctx.locale.as_str())?;
    table.set("pathname", ctx.pathname.as_str())?;
    table.set("params", string_table(lua, &ctx.params)?)?;
    table.set("query", string_table(lua, &ctx.query)?)?;

    let dictionaries = ctx.dictionaries.clone();
    let locale = ctx.locale.clone();
    let t = lua.create_function(move |_, key: String| Ok(dictionaries.translate(&locale, &key)))?;
    table.set("t", t)?;

    table.set("cookies", cookies_table(lua, &ctx.cookies)?)?;
    Ok(table)
}

fn cookies_table(lua: &Lua, jar: &CookieJar) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let reader = jar.clone();
    table.set(
        "get",
        lua.create_function(move |_, name: String| Ok(reader.get(&name)))?,
    )?;

    let writer = jar.clone();
    table.set(
        "set",
        lua.create_function(move |_, (name, value, options): (String, String, Option<Table>)| {
            writer.set(name, value, cookie_options(options)?);
            Ok(())
        })?,
    )?;

    let deleter = jar.clone();
    table.set(
        "delete",
        lua.create_function(move |_, name: String| {
            deleter.delete(name);
            Ok(())
        })?,
    )?;

    Ok(table)
}

fn cookie_options(options: Option<Table>) -> mlua::Result<CookieOptions> {
    let mut parsed = CookieOptions::default();
    let Some(options) = options else {
        return Ok(parsed);
    };
    if let Some(path) = options.get::<Option<String>>("path")? {
        parsed.path = path;
    }
    parsed.max_age = options.get::<Option<i64>>("max_age")?;
    parsed.http_only = options.get::<Option<bool>>("http_only")?.unwrap_or(false);
    parsed.secure = options.get::<Option<bool>>("secure")?.unwrap_or(false);
    if let Some(same_site) = options.get::<Option<String>>("same_site")? {
        parsed.same_site = Some(same_site);
    }
    Ok(parsed)
}

/// The `req` table passed to handlers and middleware.
fn request_table(lua: &Lua, request: &Request, ctx: &RequestContext) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("method", request.method_upper())?;
    table.set("path", request.path.as_str())?;
    table.set("pathname", ctx.pathname.as_str())?;
    table.set("locale", ctx.locale.as_str())?;
    table.set("params", string_table(lua, &ctx.params)?)?;
    table.set("query", string_table(lua, &request.query)?)?;
    table.set("headers", string_table(lua, &request.headers)?)?;
    table.set("cookies", string_table(lua, &request.cookies)?)?;

    if let Some(body) = request.body_str() {
        table.set("body", body)?;
    }
    if request.is_json() {
        if let Some(json) = request.body_json() {
            table.set("json", json_to_lua(lua, &json)?)?;
        }
    }
    Ok(table)
}

/// The `res` object passed to API handlers.
#[derive(Clone)]
struct LuaWriter(ResponseWriter);

impl UserData for LuaWriter {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("status", |_, this, status: u16| {
            this.0.status(status);
            Ok(this.clone())
        });
        methods.add_method("header", |_, this, (name, value): (String, String)| {
            this.0.header(name, value);
            Ok(this.clone())
        });
        methods.add_method("send", |_, this, body: Value| {
            let body = match body {
                Value::String(s) => s.as_bytes().to_vec(),
                other => scalar_to_string(&other)?.unwrap_or_default().into_bytes(),
            };
            this.0.send(body);
            Ok(())
        });
        methods.add_method("json", |_, this, value: Value| {
            this.0.json(&lua_to_json(&value)?);
            Ok(())
        });
        methods.add_method("redirect", |_, this, (location, status): (String, Option<u16>)| {
            this.0.redirect(location, status);
            Ok(())
        });
    }
}

/// A framework response built in Lua through the `Response` global.
#[derive(Clone)]
pub(crate) struct LuaResponse(pub(crate) Response);

impl UserData for LuaResponse {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("status", |_, this| Ok(this.0.status));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("header", |_, this, (name, value): (String, String)| {
            Ok(LuaResponse(this.0.clone().with_header(name, value)))
        });
    }
}

/// Installs `Response.json`, `Response.text`, `Response.html` and
/// `Response.redirect`.
fn install_response_global(lua: &Lua) -> mlua::Result<()> {
    let response = lua.create_table()?;

    response.set(
        "json",
        lua.create_function(|_, (value, status): (Value, Option<u16>)| {
            Ok(LuaResponse(Response::json(status.unwrap_or(200), &lua_to_json(&value)?)))
        })?,
    )?;
    response.set(
        "text",
        lua.create_function(|_, (body, status): (String, Option<u16>)| {
            Ok(LuaResponse(Response::text(status.unwrap_or(200), body)))
        })?,
    )?;
    response.set(
        "html",
        lua.create_function(|_, (body, status): (String, Option<u16>)| {
            Ok(LuaResponse(Response::html(status.unwrap_or(200), body)))
        })?,
    )?;
    response.set(
        "redirect",
        lua.create_function(|_, (location, status): (String, Option<u16>)| {
            Ok(LuaResponse(Response::redirect(
                location,
                status.unwrap_or(DEFAULT_REDIRECT_STATUS),
            )))
        })?,
    )?;

    lua.globals().set("Response", response)
}
