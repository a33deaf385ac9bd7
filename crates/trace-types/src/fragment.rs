// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, TraceId};

/// Names the wire encoding of one span payload fragment.
///
/// This subsystem only ever produces [`Encoding::Proto`] (the canonical,
/// self-describing span encoding used end to end here -- the bit-level
/// wire schema is treated as opaque by the rest of the system, so
/// "Proto" names the role, not a literal protobuf schema). `Json` and
/// `Unknown` exist so [`combine_trace_bytes`] has something concrete to
/// reject when two fragments disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Proto,
    Json,
    Unknown(u8),
}

/// One span within a trace fragment, keyed by `span_id` for dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub span_id: [u8; 8],
    pub parent_span_id: Option<[u8; 8]>,
    pub name: String,
    pub service_name: String,
    pub start_nanos: u64,
    pub end_nanos: u64,
}

/// A single serialized trace fragment: the unit `PushBytes` carries and
/// `CombineTraceBytes` reconciles across deliveries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFragment {
    pub spans: Vec<SpanRecord>,
}

impl TraceFragment {
    pub fn new(spans: Vec<SpanRecord>) -> Self {
        Self { spans }
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Spans sorted by ID, used only to make test assertions order-independent.
    pub fn sorted(mut self) -> Self {
        self.spans.sort_by_key(|s| s.span_id);
        self
    }
}

pub fn decode_fragment(bytes: &[u8], encoding: Encoding) -> Result<TraceFragment> {
    match encoding {
        Encoding::Proto | Encoding::Json => serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidInput(format!("bad trace fragment: {e}"))),
        Encoding::Unknown(tag) => Err(Error::InvalidInput(format!(
            "cannot decode unknown encoding {tag}"
        ))),
    }
}

pub fn encode_fragment(fragment: &TraceFragment, encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Proto | Encoding::Json => serde_json::to_vec(fragment)
            .map_err(|e| Error::InvalidInput(format!("cannot encode trace fragment: {e}"))),
        Encoding::Unknown(tag) => Err(Error::InvalidInput(format!(
            "cannot encode unknown encoding {tag}"
        ))),
    }
}

/// Merges two decoded fragments, collapsing duplicate span IDs.
///
/// Associative and commutative up to span order: `combine(a, combine(b,
/// c))` and `combine(combine(a, b), c)` contain the same set of spans.
/// This is the sole primitive that reconciles at-least-once delivery of
/// the same trace ID across pushes, replicas, and block stages.
pub fn combine_trace_protos(a: &TraceFragment, b: &TraceFragment) -> TraceFragment {
    let mut by_id: BTreeMap<[u8; 8], SpanRecord> = BTreeMap::new();
    for span in a.spans.iter().chain(b.spans.iter()) {
        by_id.entry(span.span_id).or_insert_with(|| span.clone());
    }
    TraceFragment {
        spans: by_id.into_values().collect(),
    }
}

/// Byte-level counterpart of [`combine_trace_protos`]: decodes both
/// fragments, rejects mismatched encodings (unless one side is empty),
/// merges, and re-encodes using `enc_a`.
pub fn combine_trace_bytes(
    a: &[u8],
    enc_a: Encoding,
    b: &[u8],
    enc_b: Encoding,
) -> Result<(Vec<u8>, Encoding)> {
    if a.is_empty() {
        return Ok((b.to_vec(), enc_b));
    }
    if b.is_empty() {
        return Ok((a.to_vec(), enc_a));
    }
    if enc_a != enc_b {
        return Err(Error::InvalidInput(format!(
            "cannot combine mismatched encodings {enc_a:?} and {enc_b:?}"
        )));
    }
    let fa = decode_fragment(a, enc_a)?;
    let fb = decode_fragment(b, enc_b)?;
    let merged = combine_trace_protos(&fa, &fb);
    let bytes = encode_fragment(&merged, enc_a)?;
    Ok((bytes, enc_a))
}

/// A fully reconstructed trace returned by `FindTraceByID`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructedTrace {
    pub trace_id: TraceId,
    pub fragment: TraceFragment,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(id: u8) -> SpanRecord {
        SpanRecord {
            span_id: [id; 8],
            parent_span_id: None,
            name: format!("span-{id}"),
            service_name: "svc".into(),
            start_nanos: id as u64,
            end_nanos: id as u64 + 1,
        }
    }

    #[test]
    fn combine_dedups_by_span_id() {
        let a = TraceFragment::new(vec![span(1), span(2)]);
        let b = TraceFragment::new(vec![span(2), span(3)]);
        let merged = combine_trace_protos(&a, &b);
        assert_eq!(merged.span_count(), 3);
    }

    #[test]
    fn combine_is_associative_and_commutative_modulo_order() {
        let a = TraceFragment::new(vec![span(1)]);
        let b = TraceFragment::new(vec![span(2)]);
        let c = TraceFragment::new(vec![span(3)]);

        let left = combine_trace_protos(&a, &combine_trace_protos(&b, &c)).sorted();
        let right = combine_trace_protos(&combine_trace_protos(&a, &b), &c).sorted();
        assert_eq!(left, right);

        let ab = combine_trace_protos(&a, &b).sorted();
        let ba = combine_trace_protos(&b, &a).sorted();
        assert_eq!(ab, ba);
    }

    #[test]
    fn combine_is_idempotent() {
        let a = TraceFragment::new(vec![span(1)]);
        let b = TraceFragment::new(vec![span(1), span(2)]);
        let once = combine_trace_protos(&a, &b).sorted();
        let twice = combine_trace_protos(&a, &combine_trace_protos(&a, &b)).sorted();
        assert_eq!(once, twice);
    }

    #[test]
    fn combine_bytes_rejects_mismatched_encoding() {
        let a = encode_fragment(&TraceFragment::new(vec![span(1)]), Encoding::Proto).unwrap();
        let err = combine_trace_bytes(&a, Encoding::Proto, &a, Encoding::Unknown(7)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn combine_bytes_round_trips() {
        let a = encode_fragment(&TraceFragment::new(vec![span(1)]), Encoding::Proto).unwrap();
        let b = encode_fragment(&TraceFragment::new(vec![span(2)]), Encoding::Proto).unwrap();
        let (merged, enc) = combine_trace_bytes(&a, Encoding::Proto, &b, Encoding::Proto).unwrap();
        assert_eq!(enc, Encoding::Proto);
        let fragment = decode_fragment(&merged, enc).unwrap();
        assert_eq!(fragment.span_count(), 2);
    }
}
