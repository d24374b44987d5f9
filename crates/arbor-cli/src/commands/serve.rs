// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Production server command.
//!
//! Routes are discovered once, errors are shown as generic pages and
//! artifacts left by `arbor build` are reused.

use arbor::Mode;
use console::style;
use std::path::Path;

use crate::config::Config;
use crate::project::Project;
use crate::server::http::create_server;

/// Runs the production server.
pub async fn run(root: &Path, host: &str, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load(root)?;
    config.arbor.mode = Mode::Production;
    let port = port.unwrap_or(config.server.port);

    let project = Project::open(root, config)?;
    let dispatcher = project.dispatcher()?;

    let addr = format!("{}:{}", host, port);
    println!(
        "{} {} {}",
        style("Serving").cyan(),
        style(&project.config.project.name).bold(),
        style(format!("on http://{}", addr)).green()
    );

    create_server(&addr, dispatcher, &project.public_dir()).await
}
