// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use arbor_cli::commands;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "File-convention routing dev server", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Project directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the development server, recompiling and re-routing on change
    Dev {
        /// Port to run the dev server on (default: from arbor.toml)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (default: from arbor.toml)
        #[arg(long)]
        host: Option<String>,
    },
    /// Serve in production mode (no watcher, generic error pages)
    Serve {
        /// Port to run the server on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Print the discovered route table
    Routes {
        /// Print the routes.json manifest instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Precompile every route module and write routes.json
    Build {
        /// Manifest directory
        #[arg(short, long, default_value = ".arbor")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let root = std::fs::canonicalize(&cli.dir)?;

    match cli.command {
        Commands::Dev { port, host } => commands::dev::run(&root, host, port).await,
        Commands::Serve { port, host } => commands::serve::run(&root, &host, port).await,
        Commands::Routes { json } => commands::routes::run(&root, json),
        Commands::Build { output } => commands::build::run(&root, &output).await,
    }
}
