// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! JSON <-> Lua value conversion.

use mlua::{Lua, Result as LuaResult, Table, Value};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Converts a JSON value to a Lua value.
pub fn json_to_lua(lua: &Lua, json: &JsonValue) -> LuaResult<Value> {
    Ok(match json {
        JsonValue::Null => Value::Nil,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Nil, Value::Number),
        },
        JsonValue::String(s) => Value::String(lua.create_string(s)?),
        JsonValue::Array(items) => {
            let items = items
                .iter()
                .map(|item| json_to_lua(lua, item))
                .collect::<LuaResult<Vec<_>>>()?;
            Value::Table(lua.create_sequence_from(items)?)
        }
        JsonValue::Object(fields) => {
            let fields = fields
                .iter()
                .map(|(key, field)| Ok((key.as_str(), json_to_lua(lua, field)?)))
                .collect::<LuaResult<Vec<_>>>()?;
            Value::Table(lua.create_table_from(fields)?)
        }
    })
}

/// Converts a Lua value to JSON.
///
/// Tables whose keys are exactly `1..n` become arrays, other tables objects
/// (integer keys are stringified). Functions and userdata become `null`.
pub fn lua_to_json(value: &Value) -> LuaResult<JsonValue> {
    Ok(match value {
        Value::Nil => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::Number((*i).into()),
        Value::Number(n) => serde_json::Number::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number),
        Value::String(s) => JsonValue::String(s.to_str()?.to_string()),
        Value::Table(t) => table_to_json(t)?,
        _ => JsonValue::Null,
    })
}

fn table_to_json(t: &Table) -> LuaResult<JsonValue> {
    let mut indexed: Vec<(i64, JsonValue)> = Vec::new();
    let mut named = serde_json::Map::new();

    for pair in t.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let value = lua_to_json(&value)?;
        match key {
            Value::Integer(i) if i > 0 => indexed.push((i, value)),
            Value::Integer(i) => {
                named.insert(i.to_string(), value);
            }
            Value::String(s) => {
                named.insert(s.to_str()?.to_string(), value);
            }
            _ => {}
        }
    }

    indexed.sort_unstable_by_key(|(i, _)| *i);
    let is_sequence = indexed.last().map(|(i, _)| *i) == Some(indexed.len() as i64);

    if named.is_empty() && is_sequence {
        return Ok(JsonValue::Array(indexed.into_iter().map(|(_, v)| v).collect()));
    }
    for (i, value) in indexed {
        named.insert(i.to_string(), value);
    }
    Ok(JsonValue::Object(named))
}

/// Builds a flat string table.
pub fn string_table(lua: &Lua, entries: &HashMap<String, String>) -> LuaResult<Table> {
    let table = lua.create_table()?;
    for (key, value) in entries {
        table.set(key.as_str(), value.as_str())?;
    }
    Ok(table)
}

/// Reads a flat string table, skipping entries that are not strings.
pub fn table_to_strings(table: &Table) -> LuaResult<Vec<(String, String)>> {
    let mut entries = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let (Value::String(key), Some(value)) = (key, scalar_to_string(&value)?) else {
            continue;
        };
        entries.push((key.to_str()?.to_string(), value));
    }
    Ok(entries)
}

/// Stringifies strings, numbers and booleans.
pub fn scalar_to_string(value: &Value) -> LuaResult<Option<String>> {
    Ok(match value {
        Value::String(s) => Some(s.to_str()?.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    })
}
