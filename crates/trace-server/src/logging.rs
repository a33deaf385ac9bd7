// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Installs the process-wide `tracing` subscriber exactly once. Returns
/// the rolling-file guard when `log_dir` is set; the caller must hold
/// it for the process lifetime or buffered lines are lost on exit.
pub fn setup_logger(cfg: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "trace-store.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);
            match cfg.format {
                LogFormat::Json => builder.json().init(),
                LogFormat::Text => builder.init(),
            }
            Some(guard)
        }
        None => {
            let builder = tracing_subscriber::fmt().with_env_filter(filter);
            match cfg.format {
                LogFormat::Json => builder.json().init(),
                LogFormat::Text => builder.init(),
            }
            None
        }
    }
}
