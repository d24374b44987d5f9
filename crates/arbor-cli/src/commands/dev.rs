// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server command with route and module reloading.

use console::style;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

use crate::project::Project;
use crate::server::http::create_server;
use crate::watcher::FileWatcher;

/// Runs the development server.
pub async fn run(root: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let project = Project::load(root)?;
    let host = host.unwrap_or_else(|| project.config.server.host.clone());
    let port = port.unwrap_or(project.config.server.port);

    print_summary(&project);

    let _watcher = watch(&project)?;

    let addr = format!("{}:{}", host, port);
    println!(
        "{} {}",
        style("Server:").cyan(),
        style(format!("http://{}", addr)).green().bold()
    );
    println!(
        "{} {}",
        style("Status:").cyan(),
        style("Watching for changes...").dim()
    );
    println!();

    create_server(&addr, project.dispatcher()?, &project.public_dir()).await
}

fn print_summary(project: &Project) {
    let table = project.routes.load();
    println!(
        "{} {} page route(s), {} API route(s){}",
        style("Routes:").cyan(),
        table.page_routes.len(),
        table.api_routes.len(),
        if table.middleware.is_some() {
            ", middleware"
        } else {
            ""
        }
    );
}

/// Re-discovers routes and drops stale artifacts whenever a module changes.
fn watch(project: &Project) -> anyhow::Result<FileWatcher> {
    let root = project.root.clone();
    let routing = project.config.arbor.routing.clone();
    let routes = project.routes.clone();
    let cache = project.cache.clone();
    let runtime = tokio::runtime::Handle::current();

    FileWatcher::new(
        &project.root,
        routing.extensions.clone(),
        cache.dir().to_path_buf(),
        move |paths: Vec<PathBuf>| {
            let start = Instant::now();

            match routes.rediscover(&root, &routing) {
                Ok(()) => info!(changed = paths.len(), "Routes re-discovered"),
                Err(e) => error!(error = %e, "Route discovery failed, keeping previous table"),
            }

            let display = paths
                .iter()
                .map(|p| p.strip_prefix(&root).unwrap_or(p).display().to_string())
                .collect::<Vec<_>>()
                .join(", ");

            let cache = cache.clone();
            runtime.spawn(async move {
                for path in &paths {
                    cache.invalidate(path).await;
                }
            });

            println!(
                "  {} {} {}",
                style("✓").green(),
                style(&display).dim(),
                style(format!("{}ms", start.elapsed().as_millis())).dim()
            );
        },
    )
}
