// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project wiring shared by every command.

use arbor::{
    layout, CompilationCache, Dispatcher, LuaCompiler, LuaRuntime, RouteTable, RouteTableHandle,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// A project root with its discovered routes and compilation cache.
pub struct Project {
    /// Absolute project root.
    pub root: PathBuf,
    /// Loaded configuration.
    pub config: Config,
    /// Live route table, swapped on re-discovery.
    pub routes: RouteTableHandle,
    /// Shared compilation cache.
    pub cache: Arc<CompilationCache>,
}

impl Project {
    /// Discovers routes under `root` and prepares the Lua compilation cache.
    pub fn open(root: &Path, config: Config) -> anyhow::Result<Self> {
        let table = RouteTable::discover(root, &config.arbor.routing)?;
        let cache = CompilationCache::new(
            root.join(&config.arbor.cache.dir),
            Arc::new(LuaCompiler::new()),
        )
        .with_sourcemaps(config.arbor.cache.sourcemaps);

        info!(
            root = %root.display(),
            pages = table.page_routes.len(),
            api = table.api_routes.len(),
            "Opened project"
        );

        Ok(Self {
            root: root.to_path_buf(),
            config,
            routes: RouteTableHandle::new(table),
            cache: Arc::new(cache),
        })
    }

    /// Loads `arbor.toml` from `root` and opens the project.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        Self::open(root, Config::load(root)?)
    }

    /// Builds a dispatcher backed by a fresh Lua runtime.
    pub fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        let runtime = Arc::new(LuaRuntime::new()?);
        let dispatcher = Dispatcher::from_config(
            &self.root,
            &self.config.arbor,
            self.routes.clone(),
            self.cache.clone(),
            runtime,
        )?;
        Ok(dispatcher)
    }

    /// Directory served under `/public`.
    pub fn public_dir(&self) -> PathBuf {
        self.root.join(&self.config.server.public_dir)
    }

    /// Every module the current table can load: handlers, their layouts and
    /// the middleware, in a stable order.
    pub fn modules(&self) -> Vec<PathBuf> {
        let table = self.routes.load();
        let extensions = &self.config.arbor.routing.extensions;

        let mut modules = BTreeSet::new();
        for route in &table.page_routes {
            modules.insert(route.handler.clone());
            modules.extend(layout::collect(&route.handler, &route.root, extensions));
        }
        for route in &table.api_routes {
            modules.insert(route.handler.clone());
        }
        if let Some(middleware) = &table.middleware {
            modules.insert(middleware.clone());
        }
        modules.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "return {}").unwrap();
    }

    #[test]
    fn test_modules_include_layouts_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "app/layout.lua");
        touch(root, "app/page.lua");
        touch(root, "app/about/page.lua");
        touch(root, "app/api/users/route.lua");
        touch(root, "middleware.lua");

        let project = Project::open(root, Config::default()).unwrap();
        let modules = project.modules();

        assert_eq!(modules.len(), 5);
        assert!(modules.contains(&root.join("app/layout.lua")));
        assert!(modules.contains(&root.join("middleware.lua")));
    }
}
