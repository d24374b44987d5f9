// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Arbor configuration.
//!
//! Every field carries a serde default, so an empty document (or a missing
//! section) yields a working configuration.
//!
//! # Example Configuration
//!
//! ```toml
//! mode = "development"
//!
//! [routing]
//! extensions = ["lua"]
//! skip_dirs = ["lib", "styles", "assets", "types"]
//!
//! [i18n]
//! default_locale = "en"
//! locales = ["en", "de", "pt-BR"]
//! cookie_name = "locale"
//! dictionaries_dir = "locales"
//!
//! [cache]
//! dir = ".arbor/cache"
//! sourcemaps = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How failures are presented to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Detailed overlay with message, stack and source window.
    #[default]
    Development,
    /// Generic error page without internals.
    Production,
}

impl Mode {
    /// Returns true in development mode.
    pub fn is_development(self) -> bool {
        matches!(self, Mode::Development)
    }
}

/// Top-level configuration for routing and rendering.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArborConfig {
    /// Presentation mode for errors.
    #[serde(default)]
    pub mode: Mode,
    /// Route discovery settings.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Locale resolution settings.
    #[serde(default)]
    pub i18n: I18nConfig,
    /// Compilation cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Route discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Convention-style roots, relative to the project (default: `app`, `src/app`).
    #[serde(default = "default_app_dirs")]
    pub app_dirs: Vec<String>,

    /// Flat pages-style roots (default: `pages`, `src/pages`).
    #[serde(default = "default_pages_dirs")]
    pub pages_dirs: Vec<String>,

    /// Scanned in pages style when no page route was found (default: `src`).
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: String,

    /// Source file extensions that count as modules (default: `lua`).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Utility directories that never contain routes.
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

fn default_app_dirs() -> Vec<String> {
    vec!["app".to_string(), "src/app".to_string()]
}

fn default_pages_dirs() -> Vec<String> {
    vec!["pages".to_string(), "src/pages".to_string()]
}

fn default_fallback_dir() -> String {
    "src".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["lua".to_string()]
}

fn default_skip_dirs() -> Vec<String> {
    ["lib", "styles", "assets", "types"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            app_dirs: default_app_dirs(),
            pages_dirs: default_pages_dirs(),
            fallback_dir: default_fallback_dir(),
            extensions: default_extensions(),
            skip_dirs: default_skip_dirs(),
        }
    }
}

impl RoutingConfig {
    /// Returns the file stem when `file_name` carries a configured extension.
    pub fn source_stem<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        self.extensions.iter().any(|e| e == ext).then_some(stem)
    }
}

/// Locale configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    /// Locale used when nothing else matches (default: `en`).
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Supported locales. Empty accepts the default locale plus every
    /// locale with a dictionary.
    #[serde(default)]
    pub locales: Vec<String>,

    /// Cookie consulted after the URL prefix (default: `locale`).
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Directory holding `<locale>.json` dictionaries (default: `locales`).
    #[serde(default = "default_dictionaries_dir")]
    pub dictionaries_dir: String,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_cookie_name() -> String {
    "locale".to_string()
}

fn default_dictionaries_dir() -> String {
    "locales".to_string()
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            locales: Vec::new(),
            cookie_name: default_cookie_name(),
            dictionaries_dir: default_dictionaries_dir(),
        }
    }
}

/// Compilation cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Artifact directory, relative to the project (default: `.arbor/cache`).
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Emit debug information alongside artifacts (default: true).
    #[serde(default = "default_sourcemaps")]
    pub sourcemaps: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".arbor/cache")
}

fn default_sourcemaps() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            sourcemaps: default_sourcemaps(),
        }
    }
}
