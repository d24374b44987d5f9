// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route discovery from the project tree.
//!
//! Discovery walks each configured root depth-first with an explicit
//! worklist. Entries are visited in name order, and the files of a directory
//! are handled before its subdirectories, so the resulting order is stable
//! across platforms. Matching relies on that order: first match wins.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::segment::{join_pattern, DirKind};
use super::types::{Route, RouteKind, RouteTable, RouteTableHandle};
use crate::config::RoutingConfig;
use crate::error::{ArborError, Result};

/// File stems that never become routes on their own.
const RESERVED_STEMS: &[&str] = &["layout", "middleware"];

/// How files inside a scanned root turn into routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStyle {
    /// Only `page.*` files make pages (`app/`, `src/app/`).
    Convention,
    /// Every source file is a route; `index.*` maps to its directory.
    Pages,
}

/// One pending directory on the worklist.
#[derive(Debug)]
struct Frame {
    dir: PathBuf,
    prefix: Vec<String>,
    api: bool,
    after_catch_all: bool,
    optional_catch_all: bool,
}

impl Frame {
    fn child(&self, dir: PathBuf, kind: &DirKind) -> Self {
        let mut prefix = self.prefix.clone();
        if let Some(segment) = kind.to_pattern() {
            prefix.push(segment);
        }
        Self {
            dir,
            prefix,
            api: self.api || *kind == DirKind::Api,
            after_catch_all: self.after_catch_all || kind.is_catch_all(),
            optional_catch_all: self.optional_catch_all
                || matches!(kind, DirKind::OptionalCatchAll(_)),
        }
    }

    fn pattern(&self) -> String {
        join_pattern(&self.prefix)
    }

    fn pattern_with(&self, segment: &str) -> String {
        let mut segments = self.prefix.clone();
        segments.push(segment.to_string());
        join_pattern(&segments)
    }
}

/// Walks the project tree and builds a [`RouteTable`].
pub struct Discovery<'a> {
    project_root: &'a Path,
    config: &'a RoutingConfig,
    table: RouteTable,
}

impl<'a> Discovery<'a> {
    /// Prepares a discovery pass over `project_root`.
    pub fn new(project_root: &'a Path, config: &'a RoutingConfig) -> Self {
        Self {
            project_root,
            config,
            table: RouteTable::default(),
        }
    }

    /// Runs the pass.
    ///
    /// Convention roots are scanned first, then pages roots. When neither
    /// produced a page route, the fallback directory is scanned in pages
    /// style, skipping the roots already visited.
    pub fn run(mut self) -> Result<RouteTable> {
        let mut scanned = Vec::new();

        for dir in &self.config.app_dirs {
            let root = self.project_root.join(dir);
            if root.is_dir() {
                self.scan_root(&root, ScanStyle::Convention, &[])?;
                scanned.push(root);
            }
        }

        for dir in &self.config.pages_dirs {
            let root = self.project_root.join(dir);
            if root.is_dir() {
                self.scan_root(&root, ScanStyle::Pages, &[])?;
                scanned.push(root);
            }
        }

        if self.table.page_routes.is_empty() {
            let fallback = self.project_root.join(&self.config.fallback_dir);
            if fallback.is_dir() {
                debug!(dir = %fallback.display(), "No page routes found, scanning fallback");
                self.scan_root(&fallback, ScanStyle::Pages, &scanned)?;
            }
        }

        self.table.middleware = self.find_middleware();

        info!(
            pages = self.table.page_routes.len(),
            api = self.table.api_routes.len(),
            middleware = self.table.middleware.is_some(),
            "Discovered routes"
        );

        Ok(self.table)
    }

    fn find_middleware(&self) -> Option<PathBuf> {
        let fallback = self.project_root.join(&self.config.fallback_dir);
        [self.project_root.to_path_buf(), fallback]
            .iter()
            .flat_map(|dir| {
                self.config
                    .extensions
                    .iter()
                    .map(move |ext| dir.join(format!("middleware.{}", ext)))
            })
            .find(|path| path.is_file())
    }

    fn scan_root(&mut self, root: &Path, style: ScanStyle, exclude: &[PathBuf]) -> Result<()> {
        let mut stack = vec![Frame {
            dir: root.to_path_buf(),
            prefix: Vec::new(),
            api: false,
            after_catch_all: false,
            optional_catch_all: false,
        }];

        while let Some(frame) = stack.pop() {
            let (files, dirs) = read_sorted(&frame.dir)?;

            for (name, path) in files {
                self.visit_file(&frame, &name, path, style, root);
            }

            // Reversed so the stack pops them in name order.
            for (name, path) in dirs.into_iter().rev() {
                if exclude.contains(&path) {
                    continue;
                }
                let kind = DirKind::parse(&name, &self.config.skip_dirs);
                match kind {
                    DirKind::Hidden | DirKind::Utility => {
                        debug!(dir = %path.display(), "Skipping directory");
                        continue;
                    }
                    DirKind::Group => {}
                    _ if frame.after_catch_all => {
                        warn!(
                            dir = %path.display(),
                            pattern = %frame.pattern(),
                            "Segment after a catch-all is not allowed, skipping subtree"
                        );
                        continue;
                    }
                    _ => {}
                }
                stack.push(frame.child(path, &kind));
            }
        }

        Ok(())
    }

    fn visit_file(&mut self, frame: &Frame, name: &str, path: PathBuf, style: ScanStyle, root: &Path) {
        let Some(stem) = self.config.source_stem(name) else {
            return;
        };
        if stem.starts_with('_') || RESERVED_STEMS.contains(&stem) {
            return;
        }

        if frame.api {
            let pattern = match stem {
                "route" | "index" => frame.pattern(),
                _ if frame.after_catch_all => {
                    warn!(file = %path.display(), "API file after a catch-all, skipping");
                    return;
                }
                _ => frame.pattern_with(stem),
            };
            self.push(frame, pattern, path, RouteKind::Api, root);
            return;
        }

        if stem == "not-found" || stem == "404" {
            if frame.after_catch_all {
                warn!(file = %path.display(), "Not-found page after a catch-all, skipping");
                return;
            }
            let pattern = frame.pattern_with("not-found");
            self.push(frame, pattern, path, RouteKind::NotFound, root);
            return;
        }

        let pattern = match (style, stem) {
            (ScanStyle::Convention, "page") => frame.pattern(),
            (ScanStyle::Convention, _) => return,
            (ScanStyle::Pages, "index") => frame.pattern(),
            (ScanStyle::Pages, _) if frame.after_catch_all => {
                warn!(file = %path.display(), "Page after a catch-all, skipping");
                return;
            }
            (ScanStyle::Pages, _) => frame.pattern_with(stem),
        };
        self.push(frame, pattern, path, RouteKind::Page, root);
    }

    fn push(&mut self, frame: &Frame, pattern: String, handler: PathBuf, kind: RouteKind, root: &Path) {
        let routes = match kind {
            RouteKind::Api => &mut self.table.api_routes,
            RouteKind::Page | RouteKind::NotFound => &mut self.table.page_routes,
        };

        if let Some(existing) = routes.iter().find(|r| r.path_pattern == pattern) {
            warn!(
                pattern = %pattern,
                kept = %existing.handler.display(),
                ignored = %handler.display(),
                "Duplicate route pattern"
            );
            return;
        }

        let optional = frame.optional_catch_all && kind != RouteKind::NotFound;
        let route = Route::new(pattern, handler, kind, root).with_optional_catch_all(optional);
        debug!(
            pattern = %route.path_pattern,
            handler = %route.handler.display(),
            kind = ?route.kind,
            "Discovered route"
        );
        routes.push(route);
    }
}

/// Reads a directory and returns `(files, dirs)`, each sorted by name.
fn read_sorted(dir: &Path) -> Result<(Vec<(String, PathBuf)>, Vec<(String, PathBuf)>)> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ArborError::Discovery(format!("{}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ArborError::Discovery(format!("{}: {}", dir.display(), e)))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let path = entry.path();
        if path.is_dir() {
            dirs.push((name, path));
        } else {
            files.push((name, path));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok((files, dirs))
}

/// Discovers routes under `project_root`.
pub fn discover(project_root: &Path, config: &RoutingConfig) -> Result<RouteTable> {
    Discovery::new(project_root, config).run()
}

impl RouteTable {
    /// Discovers routes under `project_root`.
    pub fn discover(project_root: &Path, config: &RoutingConfig) -> Result<Self> {
        discover(project_root, config)
    }
}

impl RouteTableHandle {
    /// Runs discovery again and swaps the result in.
    ///
    /// On failure the current table stays in place.
    pub fn rediscover(&self, project_root: &Path, config: &RoutingConfig) -> Result<()> {
        let table = discover(project_root, config)?;
        self.replace(table);
        Ok(())
    }
}
