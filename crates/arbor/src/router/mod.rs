// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File-convention routing.
//!
//! - `page.<ext>` → page route at the directory's path
//! - `api/**/route.<ext>` → API route
//! - `[param]` directories → dynamic segments (`:param`)
//! - `[...rest]` / `[[...rest]]` → required / optional catch-all (`*rest`)
//! - `(group)` → transparent grouping
//! - `not-found.<ext>` / `404.<ext>` → not-found page
//!
//! Matching is ordered: the first route in discovery order wins.

pub mod discovery;
pub mod manifest;
pub mod matcher;
pub mod segment;
pub mod types;

pub use discovery::{discover, Discovery, ScanStyle};
pub use manifest::{ManifestRoute, RouteManifest};
pub use matcher::match_route;
pub use segment::{extract_params, DirKind, PatternSegment};
pub use types::{Params, Route, RouteKind, RouteMatch, RouteTable, RouteTableHandle};
