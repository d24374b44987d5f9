// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Arbor project configuration.
//!
//! Configuration is loaded from `arbor.toml` at the project root. Routing,
//! i18n and cache sections are passed straight to the library.
//!
//! # Example Configuration
//!
//! ```toml
//! mode = "development"
//!
//! [project]
//! name = "my-app"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! public_dir = "public"
//!
//! [i18n]
//! default_locale = "en"
//! locales = ["en", "de"]
//! ```

use arbor::ArborConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "arbor.toml";

/// Main configuration structure loaded from `arbor.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Library settings (`mode`, `[routing]`, `[i18n]`, `[cache]`).
    #[serde(flatten)]
    pub arbor: ArborConfig,
}

/// Project metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project name (default: "unnamed").
    #[serde(default = "default_name")]
    pub name: String,
    /// Project version (default: "0.1.0").
    #[serde(default = "default_version")]
    pub version: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Server host (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Static files served under `/public` (default: "public").
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            public_dir: default_public_dir(),
        }
    }
}

impl Config {
    /// Loads `arbor.toml` from `root`.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("{}: {}", config_path.display(), e))
    }

    /// Parses a TOML document.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
