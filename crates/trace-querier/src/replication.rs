// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use trace_blob::Context;
use trace_types::{Error, Result};

/// The ordered set of ingester addresses owning one tenant's shard,
/// with quorum parameters. `do_` is the sole place fan-out calls are
/// issued: callers never loop over `addrs` themselves.
#[derive(Debug, Clone)]
pub struct ReplicationSet {
    pub addrs: Vec<String>,
    pub min_success: usize,
    pub max_failure: usize,
}

impl ReplicationSet {
    /// Issues `call` against every address concurrently. `extra_delay`,
    /// when set, staggers calls past the first by `extra_delay * index`
    /// to hedge against a slow non-primary replica without doubling
    /// load on every call. Returns as soon as `min_success` results
    /// succeed, without waiting for stragglers. If `ctx` is cancelled
    /// before quorum is reached, returns the successes collected so far
    /// iff quorum happens to already be met, else an error -- a
    /// cancelled fan-out never silently drops below quorum.
    pub async fn do_<T, F, Fut>(&self, ctx: &Context, extra_delay: Option<Duration>, call: F) -> Result<Vec<T>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut pending: FuturesUnordered<_> = self
            .addrs
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, addr)| {
                let call = &call;
                async move {
                    if let Some(delay) = extra_delay {
                        if i > 0 {
                            tokio::time::sleep(delay * i as u32).await;
                        }
                    }
                    call(addr).await
                }
            })
            .collect();

        let mut oks = Vec::new();
        let mut last_err = None;

        loop {
            tokio::select! {
                next = pending.next() => {
                    match next {
                        Some(Ok(value)) => {
                            oks.push(value);
                            if oks.len() >= self.min_success {
                                return Ok(oks);
                            }
                        }
                        Some(Err(err)) => last_err = Some(err),
                        None => break,
                    }
                }
                _ = ctx.cancelled() => {
                    return if oks.len() >= self.min_success {
                        Ok(oks)
                    } else {
                        Err(Error::Fatal("fan-out cancelled before quorum".into()))
                    };
                }
            }
        }

        if oks.len() >= self.min_success {
            Ok(oks)
        } else {
            Err(last_err.unwrap_or(Error::Fatal("replication set has no addresses".into())))
        }
    }
}
