// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use trace_blob::LocalBlob;
use trace_ingester::{ConfiguredLimiter, Instance};

use trace_server::blobstore::LocalStore;
use trace_server::cli::{Cli, Command};
use trace_server::config::Config;
use trace_server::{lifecycle, logging, rpc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig { config } => {
            match Config::load(&config).await {
                Ok(_) => {
                    println!("configuration at {} is valid", config.display());
                    Ok(())
                }
                Err(e) => {
                    eprintln!("configuration error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run { config, tenant } => run(config, tenant).await,
    }
}

async fn run(config_path: std::path::PathBuf, tenant: String) -> anyhow::Result<()> {
    let cfg = match Config::load(&config_path).await {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't initialized yet; a startup config failure
            // goes straight to stderr and a non-zero exit, per the
            // fatal-error contract.
            eprintln!("fatal: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = logging::setup_logger(&cfg.logging);
    info!(tenant, "starting trace-store ingester");

    let limiter = Arc::new(ConfiguredLimiter {
        max_bytes_per_trace: cfg.ingester.max_bytes_per_trace,
    });
    let store = Arc::new(LocalStore::new(LocalBlob::new(&cfg.blob.store_root)));

    let instance = match Instance::open(tenant.clone(), cfg.blob.local_data_dir.clone(), limiter, store).await {
        Ok(instance) => Arc::new(instance),
        Err(e) => {
            error!(tenant, error = %e, "fatal: failed to open instance");
            std::process::exit(1);
        }
    };

    let lifecycle_handle = tokio::spawn(lifecycle::run(instance.clone(), cfg.ingester.clone()));

    let app = rpc::router(instance.clone(), cfg.server.tenant_header.clone());
    let addr: std::net::SocketAddr = cfg.server.listen_addr.parse()?;
    info!(%addr, "serving ingester RPC surface");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    lifecycle_handle.abort();
    if let Err(e) = instance.shutdown().await {
        error!(tenant = instance.tenant(), error = %e, "error during shutdown cut sequence");
    }
    info!(tenant = instance.tenant(), "trace-store ingester stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install ctrl_c handler");
    }
}
