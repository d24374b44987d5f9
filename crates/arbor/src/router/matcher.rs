// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Ordered route matching.
//!
//! Routes are tried in discovery order and the first structurally compatible
//! one wins. There is no specificity ranking: a dynamic route registered
//! before a static sibling shadows it.

use super::segment::{pattern_segments, PatternSegment};
use super::types::{Params, Route, RouteKind, RouteMatch, RouteTable};

/// Finds the first route in `routes` matching `pathname`.
pub fn match_route<'a, I>(pathname: &str, routes: I) -> Option<RouteMatch<'a>>
where
    I: IntoIterator<Item = &'a Route>,
{
    let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();

    routes.into_iter().find_map(|route| {
        match_segments(route, &segments).map(|params| RouteMatch { route, params })
    })
}

fn match_segments(route: &Route, path: &[&str]) -> Option<Params> {
    let pattern: Vec<PatternSegment<'_>> = pattern_segments(&route.path_pattern).collect();
    let mut params = Params::new();

    if let Some(PatternSegment::CatchAll(name)) = pattern.last().copied() {
        let prefix = &pattern[..pattern.len() - 1];
        if path.len() < prefix.len() {
            return None;
        }
        bind_prefix(prefix, &path[..prefix.len()], &mut params)?;

        let tail = &path[prefix.len()..];
        if tail.is_empty() && !route.catch_all_optional {
            return None;
        }
        params.insert(name.to_string(), tail.join("/"));
        return Some(params);
    }

    if pattern.len() != path.len() {
        return None;
    }
    bind_prefix(&pattern, path, &mut params)?;
    Some(params)
}

fn bind_prefix(pattern: &[PatternSegment<'_>], path: &[&str], params: &mut Params) -> Option<()> {
    for (segment, value) in pattern.iter().zip(path) {
        match segment {
            PatternSegment::Literal(literal) if literal == value => {}
            PatternSegment::Literal(_) => return None,
            PatternSegment::Param(name) => {
                params.insert(name.to_string(), value.to_string());
            }
            // A catch-all is only valid as the final segment.
            PatternSegment::CatchAll(_) => return None,
        }
    }
    Some(())
}

impl RouteTable {
    /// Matches against the page table. Not-found routes are skipped; they
    /// are only rendered through [`RouteTable::match_not_found`].
    pub fn match_page(&self, pathname: &str) -> Option<RouteMatch<'_>> {
        match_route(
            pathname,
            self.page_routes.iter().filter(|r| r.kind == RouteKind::Page),
        )
    }

    /// Matches against the not-found routes only.
    pub fn match_not_found(&self, pathname: &str) -> Option<RouteMatch<'_>> {
        match_route(
            pathname,
            self.page_routes.iter().filter(|r| r.kind == RouteKind::NotFound),
        )
    }

    /// Matches against the API table.
    pub fn match_api(&self, pathname: &str) -> Option<RouteMatch<'_>> {
        match_route(pathname, &self.api_routes)
    }
}
