// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Entry point for the trace store's ingester process: loads
/// configuration, initializes logging, and either serves the RPC
/// surface or just validates the configuration tree.
#[derive(Debug, Parser)]
#[command(name = "trace-store", about = "Per-tenant trace ingester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load configuration, start an ingester and its RPC surface, and
    /// block until a shutdown signal arrives.
    Run {
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
        /// Tenant this process ingests for; a production deployment
        /// runs one process per (tenant, ring-slot) pair.
        #[arg(long, default_value = "default")]
        tenant: String,
    },
    /// Load and validate configuration without starting any I/O.
    CheckConfig {
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },
}
