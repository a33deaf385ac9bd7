// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trace_types::{Error, Result};

/// Per-tenant limits and cut/complete/flush policy for the ingester.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngesterConfig {
    pub max_traces_per_instance: usize,
    pub max_bytes_per_trace: usize,
    pub max_block_bytes: u64,
    pub max_block_duration_secs: u64,
    pub max_idle_time_secs: u64,
    pub complete_block_timeout_secs: u64,
    pub flush_check_period_secs: u64,
}

impl IngesterConfig {
    pub fn max_block_duration(&self) -> Duration {
        Duration::from_secs(self.max_block_duration_secs)
    }

    pub fn max_idle_time(&self) -> Duration {
        Duration::from_secs(self.max_idle_time_secs)
    }

    pub fn complete_block_timeout(&self) -> Duration {
        Duration::from_secs(self.complete_block_timeout_secs)
    }

    pub fn flush_check_period(&self) -> Duration {
        Duration::from_secs(self.flush_check_period_secs)
    }
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            max_traces_per_instance: 1_000_000,
            max_bytes_per_trace: 50 * 1024 * 1024,
            max_block_bytes: 500 * 1024 * 1024,
            max_block_duration_secs: 30 * 60,
            max_idle_time_secs: 10,
            complete_block_timeout_secs: 15,
            flush_check_period_secs: 10,
        }
    }
}

/// Where local block directories and the simulated object store live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlobConfig {
    pub local_data_dir: PathBuf,
    pub store_root: PathBuf,
    pub buffer_size: usize,
    pub max_buffers: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            local_data_dir: PathBuf::from("./data/wal"),
            store_root: PathBuf::from("./data/store"),
            buffer_size: 1024 * 1024,
            max_buffers: 4,
        }
    }
}

/// Fan-out tuning consumed by the querier crate; the binary only loads
/// and validates it, since this process serves one ingester, not the
/// fan-out path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuerierConfig {
    pub extra_query_delay_millis: u64,
    pub max_concurrent_queries: usize,
}

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            extra_query_delay_millis: 0,
            max_concurrent_queries: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging sink selection and verbosity for the layered
/// `tracing-subscriber` setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            log_dir: None,
        }
    }
}

/// The server's listen address, separate from the ambient component
/// configs since it is the one setting operators flip most often.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tenant_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3200".to_string(),
            tenant_header: "x-scope-orgid".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ingester: IngesterConfig,
    pub blob: BlobConfig,
    pub querier: QuerierConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads TOML from `path`, then applies the handful of
    /// environment-variable overrides operators need at deploy time:
    /// `TRACE_STORE_DATA_DIR`, `TRACE_STORE_LISTEN_ADDR`,
    /// `TRACE_STORE_LOG_LEVEL`.
    pub async fn load(path: &std::path::Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let mut cfg: Config = toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("TRACE_STORE_DATA_DIR") {
            self.blob.local_data_dir = PathBuf::from(&dir).join("wal");
            self.blob.store_root = PathBuf::from(&dir).join("store");
        }
        if let Ok(addr) = std::env::var("TRACE_STORE_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(level) = std::env::var("TRACE_STORE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Cheap structural checks surfaced before any component starts,
    /// per the configuration-loading contract.
    pub fn validate(&self) -> Result<()> {
        if self.ingester.max_bytes_per_trace == 0 {
            return Err(Error::Config("ingester.max_bytes_per_trace must be non-zero".into()));
        }
        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(Error::Config(format!("invalid server.listen_addr: {}", self.server.listen_addr)));
        }
        if self.server.tenant_header.is_empty() {
            return Err(Error::Config("server.tenant_header must not be empty".into()));
        }
        Ok(())
    }
}
