// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build command: precompiles every route module and writes `routes.json`.

use arbor::RouteManifest;
use console::style;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::project::Project;

/// Name of the manifest written to the output directory.
pub const MANIFEST_FILE: &str = "routes.json";

/// What a build produced.
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// Modules compiled (or already fresh).
    pub compiled: usize,
    /// Modules that failed, with their error.
    pub failures: Vec<(PathBuf, String)>,
    /// Manifest path, when written.
    pub manifest: Option<PathBuf>,
}

/// Runs the build command.
pub async fn run(root: &Path, output: &Path) -> anyhow::Result<()> {
    let project = Project::load(root)?;
    let start = Instant::now();

    println!(
        "{} {}",
        style("Building").cyan(),
        style(&project.config.project.name).bold()
    );

    let summary = build(&project, &root.join(output)).await?;

    for (path, message) in &summary.failures {
        eprintln!(
            "  {} {}\n    {}",
            style("✗").red(),
            path.strip_prefix(root).unwrap_or(path).display(),
            style(message).red()
        );
    }
    if !summary.failures.is_empty() {
        anyhow::bail!("{} module(s) failed to compile", summary.failures.len());
    }

    println!(
        "  {} {} module(s) {}",
        style("✓").green(),
        summary.compiled,
        style(format!("{}ms", start.elapsed().as_millis())).dim()
    );
    if let Some(manifest) = &summary.manifest {
        println!("  {} {}", style("✓").green(), manifest.display());
    }
    Ok(())
}

/// Compiles every module the route table can load. The manifest is written
/// to `output` only when all of them compiled.
pub async fn build(project: &Project, output: &Path) -> anyhow::Result<BuildSummary> {
    let mut summary = BuildSummary::default();

    for module in project.modules() {
        match project.cache.resolve(&module).await {
            Ok(_) => summary.compiled += 1,
            Err(e) => summary.failures.push((module, e.to_string())),
        }
    }

    if summary.failures.is_empty() {
        let path = output.join(MANIFEST_FILE);
        RouteManifest::from_table(&project.routes.load(), &project.root).write(&path)?;
        summary.manifest = Some(path);
    }

    Ok(summary)
}
