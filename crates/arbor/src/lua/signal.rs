// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Control-flow signals raised from Lua and their conversion back to
//! [`Outcome`]s and [`Fault`]s.
//!
//! `redirect()`, `not_found()` and `throw()` raise a [`LuaSignal`] as an
//! external error. It unwinds the Lua stack like any error and is recovered
//! by walking the error chain at the call boundary.

use lazy_static::lazy_static;
use mlua::{Error as LuaError, Lua, Table, Value};
use regex::Regex;
use std::fmt;
use std::path::Path;

use super::convert::{lua_to_json, scalar_to_string};
use crate::error::Fault;
use crate::render::{Outcome, Redirect, DEFAULT_REDIRECT_STATUS};

lazy_static! {
    static ref LINE_IN_MESSAGE: Regex = Regex::new(r":(\d+): ").unwrap();
}

/// A non-local exit requested by module code.
#[derive(Debug, Clone)]
pub enum LuaSignal {
    /// `redirect(url, status?)`
    Redirect(Redirect),
    /// `not_found()`
    NotFound,
    /// `throw(err)`
    Throw(Fault),
}

impl fmt::Display for LuaSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaSignal::Redirect(r) => write!(f, "redirect to {} ({})", r.location, r.status),
            LuaSignal::NotFound => f.write_str("not found"),
            LuaSignal::Throw(fault) => write!(f, "{}", fault.message),
        }
    }
}

impl std::error::Error for LuaSignal {}

/// Finds a [`LuaSignal`] anywhere in the error chain.
pub fn find_signal(err: &LuaError) -> Option<&LuaSignal> {
    match err {
        LuaError::ExternalError(inner) => inner.downcast_ref::<LuaSignal>(),
        LuaError::CallbackError { cause, .. } => find_signal(cause),
        LuaError::WithContext { cause, .. } => find_signal(cause),
        _ => None,
    }
}

/// Maps a Lua call error to a signal outcome or a fault located in `source`.
pub fn recover<T>(err: LuaError, source: &Path) -> Result<Outcome<T>, Fault> {
    match find_signal(&err) {
        Some(LuaSignal::Redirect(redirect)) => Ok(Outcome::Redirect(redirect.clone())),
        Some(LuaSignal::NotFound) => Ok(Outcome::NotFound),
        Some(LuaSignal::Throw(fault)) => {
            let mut fault = fault.clone();
            if fault.file.is_none() {
                fault.file = Some(source.to_path_buf());
            }
            if fault.stack.is_none() {
                fault.stack = traceback(&err);
            }
            Err(fault)
        }
        None => Err(fault_from_error(&err, source)),
    }
}

/// Builds a fault from a plain Lua error.
pub fn fault_from_error(err: &LuaError, source: &Path) -> Fault {
    let text = match innermost(err) {
        LuaError::RuntimeError(message) => message.clone(),
        other => other.to_string(),
    };
    let (message, stack) = match text.split_once("\nstack traceback:") {
        Some((message, rest)) => (message.to_string(), Some(format!("stack traceback:{}", rest))),
        None => (text, traceback(err)),
    };

    let mut fault = Fault::new(message.trim()).at(source, line_of(&message));
    fault.stack = stack;
    fault
}

fn innermost(err: &LuaError) -> &LuaError {
    match err {
        LuaError::CallbackError { cause, .. } => innermost(cause),
        LuaError::WithContext { cause, .. } => innermost(cause),
        other => other,
    }
}

fn traceback(err: &LuaError) -> Option<String> {
    match err {
        LuaError::CallbackError { traceback, .. } => Some(traceback.clone()),
        LuaError::WithContext { cause, .. } => traceback(cause),
        _ => None,
    }
}

/// First `:<line>: ` position in a Lua error message.
pub fn line_of(message: &str) -> Option<usize> {
    LINE_IN_MESSAGE
        .captures(message.lines().next()?)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Converts the value passed to `throw()` into a fault.
pub fn fault_from_value(value: &Value) -> mlua::Result<Fault> {
    let Value::Table(table) = value else {
        let message = scalar_to_string(value)?.unwrap_or_else(|| "error".to_string());
        return Ok(Fault::new(message));
    };

    let message = table
        .get::<Option<String>>("message")?
        .unwrap_or_else(|| "error".to_string());
    let mut fault = Fault::new(message);
    fault.status_code = status_field(table, "statusCode")?;
    fault.status = status_field(table, "status")?;
    let code: Value = table.get("code")?;
    if !code.is_nil() {
        fault.code = Some(lua_to_json(&code)?);
    }
    fault.stack = table.get::<Option<String>>("stack")?;
    Ok(fault)
}

fn status_field(table: &Table, key: &str) -> mlua::Result<Option<u16>> {
    Ok(match table.get::<Value>(key)? {
        Value::Integer(n) => u16::try_from(n).ok(),
        Value::Number(n) if n.fract() == 0.0 && n >= 0.0 && n <= u16::MAX as f64 => Some(n as u16),
        _ => None,
    })
}

/// Installs `redirect`, `not_found` and `throw`.
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();

    let redirect = lua.create_function(|_, (location, status): (String, Option<u16>)| {
        Err::<(), _>(LuaError::external(LuaSignal::Redirect(Redirect::with_status(
            location,
            status.unwrap_or(DEFAULT_REDIRECT_STATUS),
        ))))
    })?;
    globals.set("redirect", redirect)?;

    let not_found = lua.create_function(|_, ()| Err::<(), _>(LuaError::external(LuaSignal::NotFound)))?;
    globals.set("not_found", not_found)?;

    let throw = lua.create_function(|_, value: Value| {
        let fault = fault_from_value(&value)?;
        Err::<(), _>(LuaError::external(LuaSignal::Throw(fault)))
    })?;
    globals.set("throw", throw)?;

    Ok(())
}
