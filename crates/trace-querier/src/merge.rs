// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use trace_types::{combine_trace_bytes, Encoding, Result, SearchMetrics, SearchResult};

/// By-ID merge: concatenates every partial trace with
/// `combine_trace_bytes`, so duplicate spans collapse regardless of
/// which replica or block contributed them.
pub fn merge_by_id(parts: Vec<(Vec<u8>, Encoding)>) -> Result<Option<(Vec<u8>, Encoding)>> {
    let mut acc: Option<(Vec<u8>, Encoding)> = None;
    for (bytes, encoding) in parts {
        acc = Some(match acc {
            None => (bytes, encoding),
            Some((acc_bytes, acc_encoding)) => combine_trace_bytes(&acc_bytes, acc_encoding, &bytes, encoding)?,
        });
    }
    Ok(acc)
}

/// Search merge: dedupes by hex trace ID (first occurrence wins),
/// sums metrics across every response, sorts by start time descending,
/// and truncates to `limit` (0 means unlimited).
pub fn merge_search(responses: Vec<(Vec<SearchResult>, SearchMetrics)>, limit: usize) -> (Vec<SearchResult>, SearchMetrics) {
    let mut by_id: BTreeMap<String, SearchResult> = BTreeMap::new();
    let mut metrics = SearchMetrics::default();

    for (results, response_metrics) in responses {
        metrics.merge(&response_metrics);
        for result in results {
            by_id.entry(result.trace_id.to_hex()).or_insert(result);
        }
    }

    let mut merged: Vec<SearchResult> = by_id.into_values().collect();
    merged.sort_by(|a, b| b.start_time_unix_nano.cmp(&a.start_time_unix_nano));
    if limit > 0 {
        merged.truncate(limit);
    }
    (merged, metrics)
}

/// Tag/tag-value merge: union, sorted ascending.
pub fn merge_string_sets(sets: Vec<Vec<String>>) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for values in sets {
        set.extend(values);
    }
    set.into_iter().collect()
}
