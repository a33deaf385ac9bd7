// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::sync::Arc;
use std::time::Duration;

use trace_blob::Context;
use trace_types::{decode_fragment, encode_fragment, Encoding, Error, ReconstructedTrace, Result, SearchMetrics, SearchRequest, SearchResult, TraceId};

use crate::blocklist::Blocklist;
use crate::client::ClientPool;
use crate::merge;
use crate::ring::{Ring, RingOp};

/// Which collaborators a read should consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Ingesters,
    Blocks,
    All,
}

/// The fan-out entry point: resolves a tenant's replica set from the
/// ring, issues the read against every replica through the pooled
/// clients, optionally consults the blocklist, and merges.
pub struct Querier {
    ring: Arc<dyn Ring>,
    pool: ClientPool,
    blocklist: Option<Arc<dyn Blocklist>>,
    extra_query_delay: Option<Duration>,
}

impl Querier {
    pub fn new(ring: Arc<dyn Ring>, pool: ClientPool, blocklist: Option<Arc<dyn Blocklist>>, extra_query_delay: Option<Duration>) -> Self {
        Self {
            ring,
            pool,
            blocklist,
            extra_query_delay,
        }
    }

    fn queries_ingesters(mode: QueryMode) -> bool {
        matches!(mode, QueryMode::Ingesters | QueryMode::All)
    }

    fn queries_blocks(mode: QueryMode) -> bool {
        matches!(mode, QueryMode::Blocks | QueryMode::All)
    }

    pub async fn find_trace_by_id(
        &self,
        ctx: &Context,
        tenant: &str,
        trace_id: TraceId,
        mode: QueryMode,
        block_start: u64,
        block_end: u64,
    ) -> Result<Option<ReconstructedTrace>> {
        let mut parts: Vec<(Vec<u8>, Encoding)> = Vec::new();

        if Self::queries_ingesters(mode) {
            let set = self.ring.get(tenant, RingOp::Read).await?;
            let pool = &self.pool;
            let replies = set
                .do_(ctx, self.extra_query_delay, |addr| {
                    let client = pool.get(&addr);
                    async move { client.find_trace_by_id(trace_id).await }
                })
                .await?;
            for reply in replies.into_iter().flatten() {
                parts.push((encode_fragment(&reply.fragment, Encoding::Proto)?, Encoding::Proto));
            }
        }

        if Self::queries_blocks(mode) {
            match &self.blocklist {
                Some(blocklist) => {
                    let store_parts = blocklist.find_trace_by_id(tenant, trace_id, block_start, block_end).await?;
                    parts.extend(store_parts);
                }
                None if mode == QueryMode::All => {
                    // A store failure at query_mode=All cannot be covered by replicas.
                    return Err(Error::Fatal("query_mode=All requires a blocklist".into()));
                }
                None => {}
            }
        }

        match merge::merge_by_id(parts)? {
            None => Ok(None),
            Some((bytes, encoding)) => Ok(Some(ReconstructedTrace {
                trace_id,
                fragment: decode_fragment(&bytes, encoding)?,
            })),
        }
    }

    pub async fn search(
        &self,
        ctx: &Context,
        tenant: &str,
        req: SearchRequest,
        mode: QueryMode,
        block_start: u64,
        block_end: u64,
    ) -> Result<(Vec<SearchResult>, SearchMetrics)> {
        let mut responses: Vec<(Vec<SearchResult>, SearchMetrics)> = Vec::new();

        if Self::queries_ingesters(mode) {
            let set = self.ring.get(tenant, RingOp::Read).await?;
            let pool = &self.pool;
            let req_for_call = req.clone();
            let replies = set
                .do_(ctx, self.extra_query_delay, |addr| {
                    let client = pool.get(&addr);
                    let req = req_for_call.clone();
                    async move { client.search(req).await }
                })
                .await?;
            responses.extend(replies);
        }

        if Self::queries_blocks(mode) {
            if let Some(blocklist) = &self.blocklist {
                responses.push(blocklist.search(tenant, &req, block_start, block_end).await?);
            }
        }

        Ok(merge::merge_search(responses, req.limit))
    }

    /// Tag and tag-value enumeration only fans out to the live
    /// ingesters; this subsystem does not define an index over
    /// historical blocks for tag discovery.
    pub async fn search_tags(&self, ctx: &Context, tenant: &str) -> Result<Vec<String>> {
        let set = self.ring.get(tenant, RingOp::Read).await?;
        let pool = &self.pool;
        let replies = set
            .do_(ctx, self.extra_query_delay, |addr| {
                let client = pool.get(&addr);
                async move { client.search_tags().await }
            })
            .await?;
        Ok(merge::merge_string_sets(replies))
    }

    pub async fn search_tag_values(&self, ctx: &Context, tenant: &str, key: &str) -> Result<Vec<String>> {
        let set = self.ring.get(tenant, RingOp::Read).await?;
        let pool = &self.pool;
        let key = key.to_string();
        let replies = set
            .do_(ctx, self.extra_query_delay, |addr| {
                let client = pool.get(&addr);
                let key = key.clone();
                async move { client.search_tag_values(key).await }
            })
            .await?;
        Ok(merge::merge_string_sets(replies))
    }
}
