// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use serde::{Deserialize, Serialize};

use crate::TraceId;

/// A reserved tag key that forces the search engine to visit every entry
/// regardless of `limit`, used to compute full inspection metrics.
pub const SECRET_EXHAUSTIVE_SEARCH_TAG: &str = "__exhaustive";

/// A compact, self-describing, immutable search-index record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub trace_id: TraceId,
    pub start_nanos: u64,
    pub end_nanos: u64,
    pub root_service_name: String,
    pub root_span_name: String,
    /// Tag multimap: a key may repeat with different values.
    pub tags: Vec<(String, String)>,
}

impl SearchEntry {
    pub fn matches(&self, filters: &[(String, String)]) -> bool {
        filters.iter().all(|(k, v)| {
            self.tags
                .iter()
                .any(|(tk, tv)| tk == k && tv == v)
        })
    }

    pub fn is_exhaustive_request(filters: &[(String, String)]) -> bool {
        filters.iter().any(|(k, _)| k == SECRET_EXHAUSTIVE_SEARCH_TAG)
    }
}

pub fn encode_search_entry(entry: &SearchEntry) -> Vec<u8> {
    serde_json::to_vec(entry).expect("search entry serialization is infallible")
}

pub fn decode_search_entry(bytes: &[u8]) -> crate::Result<SearchEntry> {
    serde_json::from_slice(bytes)
        .map_err(|e| crate::Error::InvalidInput(format!("bad search entry: {e}")))
}

/// A query against the tag multimap: a conjunction of `key=value`
/// predicates plus duration/time bounds and a result limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub tags: Vec<(String, String)>,
    pub min_duration_nanos: Option<u64>,
    pub max_duration_nanos: Option<u64>,
    pub start_nanos: Option<u64>,
    pub end_nanos: Option<u64>,
    pub limit: usize,
}

impl SearchRequest {
    pub fn is_exhaustive(&self) -> bool {
        SearchEntry::is_exhaustive_request(&self.tags)
    }

    /// The tag predicates with the exhaustive sentinel stripped out --
    /// that key never participates in matching.
    pub fn match_filters(&self) -> Vec<(String, String)> {
        self.tags
            .iter()
            .filter(|(k, _)| k != SECRET_EXHAUSTIVE_SEARCH_TAG)
            .cloned()
            .collect()
    }

    pub fn duration_matches(&self, entry: &SearchEntry) -> bool {
        let duration = entry.end_nanos.saturating_sub(entry.start_nanos);
        if let Some(min) = self.min_duration_nanos {
            if duration < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration_nanos {
            if duration > max {
                return false;
            }
        }
        if let Some(start) = self.start_nanos {
            if entry.end_nanos < start {
                return false;
            }
        }
        if let Some(end) = self.end_nanos {
            if entry.start_nanos > end {
                return false;
            }
        }
        true
    }
}

/// Per-search inspection metrics, accumulated across every stage visited.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchMetrics {
    pub inspected_traces: u64,
    pub inspected_bytes: u64,
    pub inspected_blocks: u64,
    pub skipped_blocks: u64,
}

impl SearchMetrics {
    pub fn merge(&mut self, other: &SearchMetrics) {
        self.inspected_traces += other.inspected_traces;
        self.inspected_bytes += other.inspected_bytes;
        self.inspected_blocks += other.inspected_blocks;
        self.skipped_blocks += other.skipped_blocks;
    }
}

/// One matched trace's worth of search metadata (not the full trace body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub trace_id: TraceId,
    pub root_service_name: String,
    pub root_span_name: String,
    pub start_time_unix_nano: u64,
    pub duration_nanos: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub traces: Vec<SearchResult>,
    pub metrics: SearchMetrics,
}
