// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled artifact caching.
//!
//! [`CompilationCache`] maps a source module to an artifact on disk and
//! recompiles only when the source is newer than the artifact. The actual
//! compilation is delegated to a [`Compiler`].
//!
//! # Invalidation
//!
//! Entries are never evicted on their own. They go away through
//! [`CompilationCache::invalidate`], [`CompilationCache::clear`], or the
//! directory wipe performed when the disk runs full during a compile.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Instant, SystemTime};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{CompilationError, Result};

/// ENOSPC on Linux and macOS.
const ENOSPC: i32 = 28;

/// Options forwarded to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emit debug information / sourcemaps alongside the artifact.
    pub sourcemaps: bool,
}

/// Why a compiler could not produce an artifact.
#[derive(Debug, Clone, Default)]
pub struct CompileFailure {
    /// Compiler output.
    pub message: String,
    /// Line of the offending construct.
    pub line: Option<usize>,
    /// Column of the offending construct.
    pub column: Option<usize>,
    /// Set when the failure was caused by a full disk.
    pub resource_exhausted: bool,
}

impl CompileFailure {
    /// Creates a failure from compiler output.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Records the failing position.
    pub fn at(mut self, line: Option<usize>, column: Option<usize>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// True for ENOSPC or a "no space left" message.
    pub fn is_resource_exhaustion(&self) -> bool {
        self.resource_exhausted
            || self
                .message
                .to_ascii_lowercase()
                .contains("no space left")
    }

    fn into_error(self, source: &Path) -> CompilationError {
        CompilationError {
            source_path: source.to_path_buf(),
            resource_exhausted: self.is_resource_exhaustion(),
            message: self.message,
            line: self.line,
            column: self.column,
        }
    }
}

impl From<std::io::Error> for CompileFailure {
    fn from(err: std::io::Error) -> Self {
        Self {
            resource_exhausted: err.raw_os_error() == Some(ENOSPC),
            message: err.to_string(),
            ..Self::default()
        }
    }
}

/// Turns a source module into an artifact file.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compiles `source` and writes the result to `output`.
    async fn compile(
        &self,
        source: &Path,
        output: &Path,
        options: &CompileOptions,
    ) -> std::result::Result<(), CompileFailure>;

    /// File extension of produced artifacts.
    fn artifact_extension(&self) -> &str {
        "out"
    }
}

/// A compiled module on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The module it was compiled from.
    pub source: PathBuf,
    /// Where the artifact lives.
    pub path: PathBuf,
    /// Cache key (`<stem>-<digest>`).
    pub key: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    artifact: Artifact,
    source_mtime: SystemTime,
}

/// Derives the cache key for `source`: file stem plus a digest of the full path.
///
/// Two files with the same name in different directories get different keys.
pub fn cache_key(source: &Path) -> String {
    let digest = Sha256::digest(source.to_string_lossy().as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module");
    format!("{}-{}", stem, hex)
}

/// Mtime-keyed store of compiled artifacts.
pub struct CompilationCache {
    dir: PathBuf,
    sourcemaps: bool,
    compiler: Arc<dyn Compiler>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl std::fmt::Debug for CompilationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationCache")
            .field("dir", &self.dir)
            .field("sourcemaps", &self.sourcemaps)
            .field("entries", &self.len())
            .finish()
    }
}

impl CompilationCache {
    /// Creates a cache writing artifacts to `dir`.
    pub fn new(dir: impl Into<PathBuf>, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            dir: dir.into(),
            sourcemaps: true,
            compiler,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Enables or disables sourcemaps for regular compiles.
    pub fn with_sourcemaps(mut self, sourcemaps: bool) -> Self {
        self.sourcemaps = sourcemaps;
        self
    }

    /// Artifact directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of known entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when no entry is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where the artifact for `source` is written.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            cache_key(source),
            self.compiler.artifact_extension()
        ))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a fresh artifact for `source`, compiling when needed.
    ///
    /// Concurrent calls for the same stale source may both compile; the last
    /// writer wins.
    pub async fn resolve(&self, source: &Path) -> Result<Artifact> {
        let source_mtime = fs::metadata(source).await?.modified()?;
        let key = cache_key(source);

        let known = self.lock().get(&key).cloned();
        if let Some(entry) = known {
            if entry.source_mtime == source_mtime && fs::metadata(&entry.artifact.path).await.is_ok() {
                debug!(source = %source.display(), "Compilation cache hit");
                return Ok(entry.artifact);
            }
        }

        let artifact = Artifact {
            source: source.to_path_buf(),
            path: self.artifact_path(source),
            key: key.clone(),
        };

        if is_fresh(&artifact.path, source_mtime).await {
            debug!(source = %source.display(), "Adopting artifact from disk");
        } else {
            self.compile(&artifact).await?;
        }

        self.lock().insert(
            key,
            CacheEntry {
                artifact: artifact.clone(),
                source_mtime,
            },
        );
        Ok(artifact)
    }

    async fn compile(&self, artifact: &Artifact) -> Result<()> {
        let source = artifact.source.as_path();
        fs::create_dir_all(&self.dir).await?;

        let started = Instant::now();
        let options = CompileOptions {
            sourcemaps: self.sourcemaps,
        };

        match self.compiler.compile(source, &artifact.path, &options).await {
            Ok(()) => {}
            Err(failure) if failure.is_resource_exhaustion() => {
                warn!(
                    source = %source.display(),
                    dir = %self.dir.display(),
                    "Disk full while compiling, wiping cache and retrying without sourcemaps"
                );
                self.clear().await?;
                fs::create_dir_all(&self.dir).await?;

                let retry = CompileOptions { sourcemaps: false };
                if let Err(failure) = self.compiler.compile(source, &artifact.path, &retry).await {
                    self.forget(&artifact.key);
                    return Err(failure.into_error(source).into());
                }
            }
            Err(failure) => {
                self.forget(&artifact.key);
                return Err(failure.into_error(source).into());
            }
        }

        debug!(
            source = %source.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Compiled module"
        );
        Ok(())
    }

    fn forget(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drops the entry and artifact for `source`, forcing a recompile.
    pub async fn invalidate(&self, source: &Path) {
        let key = cache_key(source);
        self.forget(&key);
        let path = self.artifact_path(source);
        if fs::remove_file(&path).await.is_ok() {
            debug!(source = %source.display(), "Invalidated artifact");
        }
    }

    /// Drops every entry and wipes the artifact directory.
    pub async fn clear(&self) -> Result<()> {
        self.lock().clear();
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn is_fresh(artifact: &Path, source_mtime: SystemTime) -> bool {
    match fs::metadata(artifact).await.and_then(|m| m.modified()) {
        Ok(artifact_mtime) => artifact_mtime >= source_mtime,
        Err(_) => false,
    }
}
