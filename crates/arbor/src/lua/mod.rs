// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lua-backed default collaborators.
//!
//! [`LuaCompiler`] turns `.lua` modules into bytecode artifacts and
//! [`LuaRuntime`] loads them as pages, API handlers and middleware.
//!
//! # Module contract
//!
//! ```lua
//! -- app/blog/[slug]/page.lua
//! return {
//!   metadata = { title = "Blog" },
//!   default = function(props, ctx)
//!     if props.params.slug == "old" then redirect("/blog/new", 301) end
//!     return "<h1>" .. ctx.t("blog.title") .. ": " .. props.params.slug .. "</h1>"
//!   end,
//! }
//! ```
//!
//! API modules export `GET`, `POST`, ... or `default` as `function(req, res, ctx)`.
//! The root middleware exports `middleware` as `function(req, ctx)`.
//!
//! Globals: `redirect(url, status?)`, `not_found()`, `throw(err)` and
//! `Response.json/text/html/redirect`.

pub mod compiler;
pub mod convert;
pub mod runtime;
pub mod signal;

pub use compiler::LuaCompiler;
pub use runtime::LuaRuntime;
pub use signal::LuaSignal;

use mlua::{Lua, Table};

/// Removes file, process and dynamic-code access from the state.
///
/// Drops `io`, `debug`, `load`, `loadstring`, `loadfile` and `dofile`, and
/// reduces `os` to `date`, `time`, `clock` and `difftime`.
pub fn sandbox(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();

    let os_table: Table = globals.get("os")?;
    let safe_os = lua.create_table()?;
    for name in ["date", "time", "clock", "difftime"] {
        let function: mlua::Function = os_table.get(name)?;
        safe_os.set(name, function)?;
    }

    for name in ["io", "debug", "load", "loadstring", "loadfile", "dofile"] {
        globals.set(name, mlua::Value::Nil)?;
    }
    globals.set("os", safe_os)?;

    Ok(())
}
