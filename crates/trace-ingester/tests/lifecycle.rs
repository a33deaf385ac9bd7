// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use trace_ingester::{ConfiguredLimiter, Instance, Store};
use trace_types::{
    encode_fragment, encode_search_entry, Encoding, Result, SearchEntry, SearchRequest, SpanRecord, TraceFragment, TraceId,
    SECRET_EXHAUSTIVE_SEARCH_TAG,
};
use trace_wal::{BlockMeta, FlushHandle};

#[derive(Default)]
struct RecordingStore {
    writes: Mutex<Vec<String>>,
}

#[async_trait]
impl Store for RecordingStore {
    async fn write_block(&self, tenant: &str, meta: &BlockMeta, _handle: &FlushHandle) -> Result<()> {
        self.writes.lock().push(format!("{tenant}/{}", meta.id));
        Ok(())
    }
}

fn payload_for(n: u8) -> Vec<u8> {
    encode_fragment(
        &TraceFragment::new(vec![SpanRecord {
            span_id: [n; 8],
            parent_span_id: None,
            name: "op".into(),
            service_name: "svc".into(),
            start_nanos: n as u64,
            end_nanos: n as u64 + 1,
        }]),
        Encoding::Proto,
    )
    .unwrap()
}

fn trace_id_for(n: usize) -> TraceId {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&(n as u64).to_be_bytes());
    TraceId::from_bytes(bytes)
}

fn search_entry_for(n: usize, tagged: bool) -> Vec<u8> {
    let tags = if tagged {
        vec![("foo".to_string(), "bar".to_string())]
    } else {
        vec![]
    };
    encode_search_entry(&SearchEntry {
        trace_id: trace_id_for(n),
        start_nanos: n as u64,
        end_nanos: n as u64 + 1,
        root_service_name: "svc".into(),
        root_span_name: "op".into(),
        tags,
    })
}

async fn open_instance(local_root: &std::path::Path) -> (Instance, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    let limiter = Arc::new(ConfiguredLimiter {
        max_bytes_per_trace: 1 << 20,
    });
    let instance = Instance::open("tenant-a".to_string(), local_root.to_path_buf(), limiter, store.clone())
        .await
        .unwrap();
    (instance, store)
}

/// S1: push 500 traces, tag every 5th; search keeps finding exactly
/// 100 matches across every stage until the WAL is replayed into a
/// fresh process without the index having been rebuilt.
#[tokio::test]
async fn push_then_search_survives_cut_and_complete() {
    let dir = tempfile::tempdir().unwrap();
    let (instance, _store) = open_instance(dir.path()).await;

    for n in 0..500usize {
        let tagged = n % 5 == 0;
        instance
            .push_bytes(trace_id_for(n), payload_for(n as u8), Encoding::Proto, Some(search_entry_for(n, tagged)))
            .await
            .unwrap();
    }

    let req = SearchRequest {
        tags: vec![("foo".into(), "bar".into())],
        limit: 1000,
        ..Default::default()
    };
    let (results, _) = instance.search(&req).await;
    assert_eq!(results.len(), 100);

    instance.cut_complete_traces(Duration::ZERO, true).await.unwrap();
    let (results, _) = instance.search(&req).await;
    assert_eq!(results.len(), 100);

    let id = instance.cut_block_if_ready(Duration::ZERO, 0, true).await.unwrap().unwrap();
    let (results, _) = instance.search(&req).await;
    assert_eq!(results.len(), 100);

    instance.complete_block(id).await.unwrap();
    let (results, _) = instance.search(&req).await;
    assert_eq!(results.len(), 100);
}

/// S2: exhaustive metrics across the head/completing/complete cut sequence.
#[tokio::test]
async fn exhaustive_metrics_track_block_count() {
    let dir = tempfile::tempdir().unwrap();
    let (instance, _store) = open_instance(dir.path()).await;

    for n in 0..500usize {
        instance
            .push_bytes(trace_id_for(n), payload_for(n as u8), Encoding::Proto, Some(search_entry_for(n, true)))
            .await
            .unwrap();
    }

    let exhaustive_req = SearchRequest {
        tags: vec![(SECRET_EXHAUSTIVE_SEARCH_TAG.into(), "!".into())],
        limit: 1,
        ..Default::default()
    };

    let (_, metrics) = instance.search(&exhaustive_req).await;
    assert_eq!(metrics.inspected_traces, 500);
    assert_eq!(metrics.inspected_blocks, 1);

    instance.cut_complete_traces(Duration::ZERO, true).await.unwrap();
    let id = instance.cut_block_if_ready(Duration::ZERO, 0, true).await.unwrap().unwrap();
    let (_, metrics) = instance.search(&exhaustive_req).await;
    assert_eq!(metrics.inspected_blocks, 2);
    let bytes_before_complete = metrics.inspected_bytes;

    instance.complete_block(id).await.unwrap();
    let cleared = instance.clear_completing_block(id).await.unwrap();
    assert!(cleared);

    let (_, metrics) = instance.search(&exhaustive_req).await;
    assert_eq!(metrics.inspected_blocks, 2);
    assert!(metrics.inspected_bytes < bytes_before_complete);
}

/// S3: a search started against a completing block must not error out
/// even if `clear_completing_block` is requested (here, sequentially --
/// the search snapshot already holds an `Arc` clone by the time
/// clearing is attempted, so clearing simply reports "still in use").
#[tokio::test]
async fn search_survives_concurrent_clear_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let (instance, _store) = open_instance(dir.path()).await;

    for n in 0..500usize {
        instance
            .push_bytes(trace_id_for(n), payload_for(n as u8), Encoding::Proto, None)
            .await
            .unwrap();
    }
    instance.cut_complete_traces(Duration::ZERO, true).await.unwrap();
    let id = instance.cut_block_if_ready(Duration::ZERO, 0, true).await.unwrap().unwrap();

    let no_match_req = SearchRequest {
        tags: vec![("nope".into(), "never".into())],
        limit: 10,
        ..Default::default()
    };

    let search_fut = instance.search(&no_match_req);
    let clear_fut = instance.clear_completing_block(id);
    let (search_result, clear_result) = tokio::join!(search_fut, clear_fut);

    assert_eq!(search_result.0.len(), 0);
    assert!(clear_result.is_ok());
}

#[tokio::test]
async fn flush_then_clear_removes_complete_block_after_min_age() {
    let dir = tempfile::tempdir().unwrap();
    let (instance, store) = open_instance(dir.path()).await;

    instance
        .push_bytes(trace_id_for(1), payload_for(1), Encoding::Proto, None)
        .await
        .unwrap();
    instance.cut_complete_traces(Duration::ZERO, true).await.unwrap();
    let id = instance.cut_block_if_ready(Duration::ZERO, 0, true).await.unwrap().unwrap();
    instance.complete_block(id).await.unwrap();
    instance.clear_completing_block(id).await.unwrap();

    instance.flush_block(id).await.unwrap();
    assert_eq!(store.writes.lock().len(), 1);

    let cleared = instance.clear_flushed_blocks(Duration::ZERO).await.unwrap();
    assert_eq!(cleared, 1);
}

#[tokio::test]
async fn recovers_head_wal_as_completing_block_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (instance, _store) = open_instance(dir.path()).await;
        instance
            .push_bytes(trace_id_for(1), payload_for(1), Encoding::Proto, None)
            .await
            .unwrap();
        instance.cut_complete_traces(Duration::ZERO, true).await.unwrap();
        // Instance is dropped without sealing the head block -- simulates a crash.
    }

    let (instance, _store) = open_instance(dir.path()).await;
    let found = instance.find_trace_by_id(&trace_id_for(1)).await.unwrap();
    assert!(found.is_some());
}

