// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use trace_types::Result;

use crate::{context::Context, keypath::KeyPath, traits::BlobReader};

/// Wraps a reader so every call may race a second, identical request
/// after `hedge_delay` and take whichever completes first. Both
/// requests are idempotent reads, so running two concurrently is safe;
/// this only trims tail latency on a slow replica/disk.
#[derive(Clone)]
pub struct HedgedReader<R> {
    inner: Arc<R>,
    hedge_delay: Duration,
}

impl<R> HedgedReader<R> {
    pub fn new(inner: R, hedge_delay: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            hedge_delay,
        }
    }
}

#[async_trait]
impl<R> BlobReader for HedgedReader<R>
where
    R: BlobReader + 'static,
{
    async fn read(&self, ctx: &Context, name: &str, keypath: &KeyPath) -> Result<Vec<u8>> {
        let primary = self.inner.clone();
        let p_ctx = ctx.clone();
        let p_name = name.to_string();
        let p_keypath = keypath.clone();
        let primary_fut = async move { primary.read(&p_ctx, &p_name, &p_keypath).await };

        let secondary = self.inner.clone();
        let s_ctx = ctx.clone();
        let s_name = name.to_string();
        let s_keypath = keypath.clone();
        let secondary_fut = async move { secondary.read(&s_ctx, &s_name, &s_keypath).await };

        race(primary_fut, secondary_fut, self.hedge_delay).await
    }

    async fn read_range(
        &self,
        ctx: &Context,
        name: &str,
        keypath: &KeyPath,
        offset: u64,
        dest: &mut [u8],
    ) -> Result<usize> {
        // read_range takes a caller-owned destination buffer, so each
        // racer gets its own scratch buffer of the same length; the
        // winner's bytes are copied into the caller's `dest`.
        let len = dest.len();
        let primary = self.inner.clone();
        let p_ctx = ctx.clone();
        let p_name = name.to_string();
        let p_keypath = keypath.clone();
        let primary_fut = async move {
            let mut buf = vec![0u8; len];
            let n = primary.read_range(&p_ctx, &p_name, &p_keypath, offset, &mut buf).await?;
            Ok((buf, n))
        };

        let secondary = self.inner.clone();
        let s_ctx = ctx.clone();
        let s_name = name.to_string();
        let s_keypath = keypath.clone();
        let secondary_fut = async move {
            let mut buf = vec![0u8; len];
            let n = secondary.read_range(&s_ctx, &s_name, &s_keypath, offset, &mut buf).await?;
            Ok((buf, n))
        };

        let (buf, n) = race(primary_fut, secondary_fut, self.hedge_delay).await?;
        dest[..n].copy_from_slice(&buf[..n]);
        Ok(n)
    }

    async fn list(&self, ctx: &Context, keypath: &KeyPath) -> Result<Vec<String>> {
        // Listing is cheap and not latency-sensitive; no need to hedge it.
        self.inner.list(ctx, keypath).await
    }
}

/// Runs `primary` immediately; after `delay`, also starts `secondary`.
/// Returns whichever of the two first resolves `Ok`; if both fail,
/// returns the primary's error.
async fn race<T, F1, F2>(primary: F1, secondary: F2, delay: Duration) -> Result<T>
where
    F1: std::future::Future<Output = Result<T>>,
    F2: std::future::Future<Output = Result<T>>,
{
    tokio::pin!(primary);
    tokio::select! {
        res = &mut primary => res,
        _ = tokio::time::sleep(delay) => {
            debug!("hedging read after {delay:?} delay");
            tokio::pin!(secondary);
            tokio::select! {
                res = &mut primary => res,
                res = &mut secondary => res,
            }
        }
    }
}
