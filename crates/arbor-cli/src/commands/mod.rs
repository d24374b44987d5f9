// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `build`: Precompile route modules and write `routes.json`
//! - `dev`: Development server with route and module reloading
//! - `routes`: Print the route table
//! - `serve`: Production server

/// Precompile command.
pub mod build;
/// Development server command.
pub mod dev;
/// Route table command.
pub mod routes;
/// Production server command.
pub mod serve;
