// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use chrono::{DateTime, Utc};
use trace_types::{decode_search_entry, SearchEntry, SearchMetrics, SearchRequest, SearchResult};
use uuid::Uuid;

use crate::record::WalRecord;

/// Metadata recorded once a completing block is finalized into a
/// complete block: time bounds, trace count, and byte counts.
#[derive(Debug, Clone)]
pub struct BlockMeta {
    pub id: Uuid,
    pub min_time_nanos: u64,
    pub max_time_nanos: u64,
    pub trace_count: usize,
    pub total_bytes: usize,
    pub created_at: DateTime<Utc>,
}

/// Linearly scans `records`' search entries against `req`, matching the
/// live/head/completing stages (no index, every call pays the full
/// decode cost). Stops once `req.limit` hits accumulate unless the
/// request is exhaustive. Reports exactly the raw serialized size of
/// every entry it decodes (`search_bytes.len()`), per the metrics
/// contract for these stages.
pub fn scan_search(records: &[WalRecord], req: &SearchRequest) -> (Vec<SearchResult>, SearchMetrics) {
    let filters = req.match_filters();
    let exhaustive = req.is_exhaustive();
    let mut results = Vec::new();
    let mut metrics = SearchMetrics::default();

    for record in records {
        let Some(search_bytes) = &record.search_entry else {
            continue;
        };
        let Ok(entry) = decode_search_entry(search_bytes) else {
            continue;
        };
        metrics.inspected_traces += 1;
        metrics.inspected_bytes += search_bytes.len() as u64;

        if entry.matches(&filters) && req.duration_matches(&entry) {
            results.push(to_search_result(&entry));
        }

        if !exhaustive && req.limit > 0 && results.len() >= req.limit {
            break;
        }
    }

    (results, metrics)
}

pub fn to_search_result(entry: &SearchEntry) -> SearchResult {
    SearchResult {
        trace_id: entry.trace_id,
        root_service_name: entry.root_service_name.clone(),
        root_span_name: entry.root_span_name.clone(),
        start_time_unix_nano: entry.start_nanos,
        duration_nanos: entry.end_nanos.saturating_sub(entry.start_nanos),
    }
}
