// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::time::Instant;

use trace_types::{combine_trace_bytes, Encoding, Result, TraceId};

use crate::limiter::Limiter;

/// The in-memory aggregate for one trace ID that has not yet been cut
/// into the head block. `payload` accumulates via
/// [`combine_trace_bytes`] across pushes; `search_entry` holds the most
/// recently supplied summary (a push with `search_entry == None` still
/// touches `last_received` but leaves the prior summary, if any, in
/// place).
pub struct LiveTrace {
    trace_id: TraceId,
    payload: Vec<u8>,
    payload_encoding: Encoding,
    search_entry: Option<Vec<u8>>,
    last_received: Instant,
}

impl LiveTrace {
    pub fn new(trace_id: TraceId, payload: Vec<u8>, payload_encoding: Encoding, search_entry: Option<Vec<u8>>) -> Self {
        Self {
            trace_id,
            payload,
            payload_encoding,
            search_entry,
            last_received: Instant::now(),
        }
    }

    pub fn push(
        &mut self,
        payload: &[u8],
        payload_encoding: Encoding,
        search_entry: Option<Vec<u8>>,
        limiter: &dyn Limiter,
    ) -> Result<()> {
        let (merged, encoding) = combine_trace_bytes(&self.payload, self.payload_encoding, payload, payload_encoding)?;
        limiter.check_trace_size(merged.len())?;
        self.payload = merged;
        self.payload_encoding = encoding;
        if search_entry.is_some() {
            self.search_entry = search_entry;
        }
        self.last_received = Instant::now();
        Ok(())
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_encoding(&self) -> Encoding {
        self.payload_encoding
    }

    pub fn search_entry(&self) -> Option<&[u8]> {
        self.search_entry.as_deref()
    }

    pub fn last_received(&self) -> Instant {
        self.last_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::ConfiguredLimiter;

    #[test]
    fn push_merges_payload_and_keeps_latest_search_entry() {
        let limiter = ConfiguredLimiter {
            max_bytes_per_trace: 1 << 20,
        };
        let mut trace = LiveTrace::new(TraceId::from_bytes([1; 16]), Vec::new(), Encoding::Proto, None);

        let a = trace_types::encode_fragment(
            &trace_types::TraceFragment::new(vec![span(1)]),
            Encoding::Proto,
        )
        .unwrap();
        trace.push(&a, Encoding::Proto, Some(b"summary-a".to_vec()), &limiter).unwrap();
        assert_eq!(trace.search_entry(), Some(&b"summary-a"[..]));

        let b = trace_types::encode_fragment(
            &trace_types::TraceFragment::new(vec![span(2)]),
            Encoding::Proto,
        )
        .unwrap();
        trace.push(&b, Encoding::Proto, None, &limiter).unwrap();
        // No new search entry supplied: the prior one is kept.
        assert_eq!(trace.search_entry(), Some(&b"summary-a"[..]));

        let merged = trace_types::decode_fragment(trace.payload(), trace.payload_encoding()).unwrap();
        assert_eq!(merged.span_count(), 2);
    }

    #[test]
    fn push_rejects_oversized_merge() {
        let limiter = ConfiguredLimiter { max_bytes_per_trace: 1 };
        let mut trace = LiveTrace::new(TraceId::from_bytes([1; 16]), Vec::new(), Encoding::Proto, None);
        let err = trace.push(b"too big for the limit", Encoding::Proto, None, &limiter).unwrap_err();
        assert!(matches!(err, trace_types::Error::TraceTooLarge));
    }

    fn span(id: u8) -> trace_types::SpanRecord {
        trace_types::SpanRecord {
            span_id: [id; 8],
            parent_span_id: None,
            name: "op".into(),
            service_name: "svc".into(),
            start_nanos: id as u64,
            end_nanos: id as u64 + 1,
        }
    }
}
