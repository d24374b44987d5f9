// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lua source to bytecode compiler.

use async_trait::async_trait;
use mlua::Lua;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::signal::line_of;
use crate::cache::{CompileFailure, CompileOptions, Compiler};

/// Validates Lua syntax and writes precompiled bytecode.
///
/// With sourcemaps off the bytecode is stripped of debug information, so
/// runtime errors lose their line numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaCompiler;

impl LuaCompiler {
    /// Creates a compiler.
    pub fn new() -> Self {
        Self
    }

    /// Compiles `code` to bytecode in memory.
    pub fn compile_source(
        &self,
        code: &[u8],
        source: &Path,
        options: &CompileOptions,
    ) -> Result<Vec<u8>, CompileFailure> {
        let lua = Lua::new();
        let function = lua
            .load(code)
            .set_name(chunk_name(source))
            .into_function()
            .map_err(|err| {
                let message = match err {
                    mlua::Error::SyntaxError { message, .. } => message,
                    other => other.to_string(),
                };
                let line = line_of(&message);
                CompileFailure::new(message).at(line, None)
            })?;
        Ok(function.dump(!options.sourcemaps))
    }
}

/// Chunk name used in Lua error messages: `@<path>`.
pub fn chunk_name(source: &Path) -> String {
    format!("@{}", source.display())
}

#[async_trait]
impl Compiler for LuaCompiler {
    async fn compile(
        &self,
        source: &Path,
        output: &Path,
        options: &CompileOptions,
    ) -> Result<(), CompileFailure> {
        let code = fs::read(source).await?;
        let bytecode = self.compile_source(&code, source, options)?;
        fs::write(output, &bytecode).await?;

        debug!(
            source = %source.display(),
            bytes = bytecode.len(),
            stripped = !options.sourcemaps,
            "Wrote Lua bytecode"
        );
        Ok(())
    }

    fn artifact_extension(&self) -> &str {
        "luac"
    }
}
