// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::HashMap;
use std::time::{Duration, Instant};

use trace_types::{decode_search_entry, Encoding, Result, SearchEntry, SearchMetrics, SearchRequest, SearchResult, TraceId};

use crate::limiter::Limiter;
use crate::live_trace::LiveTrace;

/// The mapping from trace ID to [`LiveTrace`] that every push lands in
/// before it is cut into the head block.
#[derive(Default)]
pub struct TraceBuffer {
    traces: HashMap<TraceId, LiveTrace>,
}

impl TraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn push(
        &mut self,
        trace_id: TraceId,
        payload: Vec<u8>,
        payload_encoding: Encoding,
        search_entry: Option<Vec<u8>>,
        limiter: &dyn Limiter,
    ) -> Result<()> {
        match self.traces.get_mut(&trace_id) {
            Some(existing) => existing.push(&payload, payload_encoding, search_entry, limiter),
            None => {
                limiter.check_trace_size(payload.len())?;
                self.traces
                    .insert(trace_id, LiveTrace::new(trace_id, payload, payload_encoding, search_entry));
                Ok(())
            }
        }
    }

    /// Removes every trace eligible for cutting: all of them if
    /// `immediate`, otherwise those whose `last_received` is at least
    /// `max_idle` in the past.
    pub fn cut_eligible(&mut self, max_idle: Duration, immediate: bool) -> Vec<LiveTrace> {
        let now = Instant::now();
        let ids: Vec<TraceId> = self
            .traces
            .iter()
            .filter(|(_, t)| immediate || now.saturating_duration_since(t.last_received()) >= max_idle)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter_map(|id| self.traces.remove(&id)).collect()
    }

    pub fn find_trace(&self, id: &TraceId) -> Option<(&[u8], Encoding)> {
        self.traces.get(id).map(|t| (t.payload(), t.payload_encoding()))
    }

    pub fn search_entries(&self) -> Vec<SearchEntry> {
        self.traces
            .values()
            .filter_map(|t| t.search_entry())
            .filter_map(|bytes| decode_search_entry(bytes).ok())
            .collect()
    }

    pub fn search(&self, req: &SearchRequest) -> (Vec<SearchResult>, SearchMetrics) {
        let filters = req.match_filters();
        let exhaustive = req.is_exhaustive();
        let mut results = Vec::new();
        let mut metrics = SearchMetrics::default();

        for trace in self.traces.values() {
            let Some(bytes) = trace.search_entry() else {
                continue;
            };
            let Ok(entry) = decode_search_entry(bytes) else {
                continue;
            };
            metrics.inspected_traces += 1;
            metrics.inspected_bytes += bytes.len() as u64;
            if entry.matches(&filters) && req.duration_matches(&entry) {
                results.push(trace_wal::block::to_search_result(&entry));
            }
            if !exhaustive && req.limit > 0 && results.len() >= req.limit {
                break;
            }
        }

        (results, metrics)
    }
}
