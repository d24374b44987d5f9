// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for the dev server.
//!
//! - Debounced file change events (300ms)
//! - Filters for module extensions, ignoring the artifact directory
//! - Recursive directory watching

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Watches a directory tree for changes to module files.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FileWatcher {
    /// Watches `path` recursively.
    ///
    /// `on_change` receives the absolute paths of changed files whose
    /// extension is in `extensions` and that do not live under `ignore`.
    pub fn new<F>(path: &Path, extensions: Vec<String>, ignore: PathBuf, on_change: F) -> anyhow::Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let mut debouncer = new_debouncer(
            Duration::from_millis(300),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let mut changed: Vec<PathBuf> = events
                        .iter()
                        .flat_map(|e| e.paths.iter())
                        .filter(|p| is_relevant(p, &extensions, &ignore))
                        .cloned()
                        .collect();
                    changed.sort();
                    changed.dedup();

                    if !changed.is_empty() {
                        on_change(changed);
                    }
                }
                Err(errors) => {
                    for error in errors {
                        warn!(error = %error, "File watcher error");
                    }
                }
            },
        )?;

        debouncer.watch(path, RecursiveMode::Recursive)?;

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// Returns true for module files outside `ignore`.
pub fn is_relevant(path: &Path, extensions: &[String], ignore: &Path) -> bool {
    if path.starts_with(ignore) {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}
