// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use trace_ingester::Instance;

use crate::config::IngesterConfig;

/// Drives the cut -> complete -> flush -> clear sequence on a timer,
/// the background counterpart to the request-driven `push_bytes` path.
/// Runs until its `tokio::task` is aborted (on shutdown).
pub async fn run(instance: Arc<Instance>, cfg: IngesterConfig) {
    let mut ticker = tokio::time::interval(cfg.flush_check_period());
    loop {
        ticker.tick().await;

        if let Err(e) = instance.cut_complete_traces(cfg.max_idle_time(), false).await {
            error!(tenant = instance.tenant(), error = %e, "cut_complete_traces failed");
        }

        let sealed = match instance.cut_block_if_ready(cfg.max_block_duration(), cfg.max_block_bytes, false).await {
            Ok(sealed) => sealed,
            Err(e) => {
                error!(tenant = instance.tenant(), error = %e, "cut_block_if_ready failed");
                continue;
            }
        };
        if let Some(id) = sealed {
            tokio::time::sleep(cfg.complete_block_timeout()).await;
            if let Err(e) = instance.complete_block(id).await {
                error!(tenant = instance.tenant(), block_id = %id, error = %e, "complete_block failed");
                continue;
            }
            match instance.clear_completing_block(id).await {
                Ok(false) => warn!(tenant = instance.tenant(), block_id = %id, "completing block still referenced, deferring clear"),
                Err(e) => error!(tenant = instance.tenant(), block_id = %id, error = %e, "clear_completing_block failed"),
                Ok(true) => {}
            }
            if let Err(e) = instance.flush_block(id).await {
                warn!(tenant = instance.tenant(), block_id = %id, error = %e, "flush_block failed, will retry next tick");
            }
        }

        match instance.clear_flushed_blocks(Duration::from_secs(0)).await {
            Ok(cleared) if cleared > 0 => tracing::debug!(tenant = instance.tenant(), cleared, "cleared flushed blocks"),
            Err(e) => error!(tenant = instance.tenant(), error = %e, "clear_flushed_blocks failed"),
            _ => {}
        }
    }
}
