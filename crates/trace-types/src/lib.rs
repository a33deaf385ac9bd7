// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
//! Core data model for the trace store: trace IDs, span fragment
//! encodings, the span-merge primitives, and the search record types.
//!
//! Nothing in this crate touches disk or the network -- it is the shared
//! vocabulary `trace-blob`, `trace-wal`, `trace-ingester` and
//! `trace-querier` all build on.

mod error;
mod fragment;
mod search;
mod trace_id;

pub use error::{Error, Result};
pub use fragment::{
    combine_trace_bytes, combine_trace_protos, decode_fragment, encode_fragment, Encoding,
    ReconstructedTrace, SpanRecord, TraceFragment,
};
pub use search::{
    decode_search_entry, encode_search_entry, SearchEntry, SearchMetrics, SearchRequest,
    SearchResponse, SearchResult, SECRET_EXHAUSTIVE_SEARCH_TAG,
};
pub use trace_id::TraceId;
