// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use async_trait::async_trait;
use trace_types::{Encoding, Result, SearchMetrics, SearchRequest, SearchResult, TraceId};

/// The object-store side of a read, built by an external
/// compactor/poller this crate does not implement. `Blocks`/`All` query
/// modes consult it in addition to (or instead of) the live ingesters.
#[async_trait]
pub trait Blocklist: Send + Sync {
    async fn find_trace_by_id(
        &self,
        tenant: &str,
        trace_id: TraceId,
        block_start: u64,
        block_end: u64,
    ) -> Result<Vec<(Vec<u8>, Encoding)>>;

    async fn search(
        &self,
        tenant: &str,
        req: &SearchRequest,
        block_start: u64,
        block_end: u64,
    ) -> Result<(Vec<SearchResult>, SearchMetrics)>;
}
