// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route table command.

use arbor::{Route, RouteKind, RouteManifest};
use console::style;
use std::path::Path;

use crate::project::Project;

/// Prints the discovered routes in match order.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = Project::load(root)?;
    let table = project.routes.load();

    if json {
        let manifest = RouteManifest::from_table(&table, &project.root);
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!("{}", style("Pages").cyan().bold());
    for route in &table.page_routes {
        println!("  {}", describe(route, &project.root));
    }

    println!("{}", style("API").cyan().bold());
    for route in &table.api_routes {
        println!("  {}", describe(route, &project.root));
    }

    if let Some(middleware) = &table.middleware {
        println!(
            "{} {}",
            style("Middleware").cyan().bold(),
            style(relative(middleware, &project.root)).dim()
        );
    }

    Ok(())
}

fn describe(route: &Route, root: &Path) -> String {
    let mut pattern = route.path_pattern.clone();
    if route.catch_all_optional {
        pattern.push('?');
    }
    let tag = match route.kind {
        RouteKind::NotFound => " (not-found)",
        RouteKind::Page | RouteKind::Api => "",
    };
    format!(
        "{:<32} {}{}",
        pattern,
        style(relative(&route.handler, root)).dim(),
        tag
    )
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
