// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Arbor CLI library.
//!
//! Wires the `arbor` library to an HTTP server, a file watcher and a few
//! project commands.
//!
//! # Usage
//!
//! ```bash
//! arbor dev      # Development server, reloads routes and modules on change
//! arbor serve    # Production server
//! arbor routes   # Print the route table
//! arbor build    # Precompile modules and write routes.json
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `arbor.toml` at the project root.

/// CLI commands (dev, serve, routes, build).
pub mod commands;
/// Project configuration from `arbor.toml`.
pub mod config;
/// A discovered project and its shared collaborators.
pub mod project;
/// HTTP server adapter.
pub mod server;
/// File system watching for the dev server.
pub mod watcher;
