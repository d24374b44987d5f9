// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `routes.json` manifest.
//!
//! ```json
//! {
//!   "routes": [{ "path": "/blog/:slug", "component": "app/blog/[slug]/page.lua" }],
//!   "apiRoutes": [{ "path": "/api/users", "component": "app/api/users/route.lua" }],
//!   "buildTime": 1767225600000
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use super::types::{Route, RouteTable};
use crate::error::Result;

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRoute {
    /// Route pattern.
    pub path: String,
    /// Handler file, relative to the project root when possible.
    pub component: String,
}

/// Serialized view of a [`RouteTable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteManifest {
    /// Page and not-found routes.
    pub routes: Vec<ManifestRoute>,
    /// API routes.
    pub api_routes: Vec<ManifestRoute>,
    /// Milliseconds since the Unix epoch.
    pub build_time: u64,
}

impl RouteManifest {
    /// Builds a manifest, stamping the current time.
    pub fn from_table(table: &RouteTable, project_root: &Path) -> Self {
        let entry = |route: &Route| ManifestRoute {
            path: route.path_pattern.clone(),
            component: route
                .handler
                .strip_prefix(project_root)
                .unwrap_or(&route.handler)
                .to_string_lossy()
                .replace('\\', "/"),
        };

        let build_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            routes: table.page_routes.iter().map(entry).collect(),
            api_routes: table.api_routes.iter().map(entry).collect(),
            build_time,
        }
    }

    /// Writes the manifest to `path`, replacing any previous file.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::from)?;
        fs::write(path, json)?;
        info!(
            path = %path.display(),
            routes = self.routes.len(),
            api_routes = self.api_routes.len(),
            "Wrote route manifest"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::types::RouteKind;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_shape() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut table = RouteTable::default();
        table.page_routes.push(Route::new(
            "/blog/:slug",
            root.join("app/blog/[slug]/page.lua"),
            RouteKind::Page,
            root.join("app"),
        ));
        table.api_routes.push(Route::new(
            "/api/users",
            root.join("app/api/users/route.lua"),
            RouteKind::Api,
            root.join("app"),
        ));

        let manifest = RouteManifest::from_table(&table, root);
        let out = root.join("dist/routes.json");
        manifest.write(&out).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["routes"][0]["path"], "/blog/:slug");
        assert_eq!(value["routes"][0]["component"], "app/blog/[slug]/page.lua");
        assert_eq!(value["apiRoutes"][0]["path"], "/api/users");
        assert!(value["buildTime"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_manifest_overwrites() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("routes.json");
        fs::write(&out, "stale content that is much longer than the manifest").unwrap();

        RouteManifest::from_table(&RouteTable::default(), dir.path())
            .write(&out)
            .unwrap();

        let parsed: RouteManifest =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert!(parsed.routes.is_empty());
        assert!(parsed.api_routes.is_empty());
    }
}
