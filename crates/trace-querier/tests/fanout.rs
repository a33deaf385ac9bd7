// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use trace_blob::Context;
use trace_querier::{Blocklist, ClientPool, IngesterClient, QueryMode, Querier, ReplicationSet, Ring, RingOp, StaticRing};
use trace_types::{
    Encoding, ReconstructedTrace, Result, SearchMetrics, SearchRequest, SearchResult, SpanRecord, TraceFragment, TraceId,
};

struct FixedIngester {
    trace: Option<ReconstructedTrace>,
    search_results: Vec<SearchResult>,
    search_metrics: SearchMetrics,
}

#[async_trait]
impl IngesterClient for FixedIngester {
    async fn find_trace_by_id(&self, _trace_id: TraceId) -> Result<Option<ReconstructedTrace>> {
        Ok(self.trace.clone())
    }

    async fn search(&self, _req: SearchRequest) -> Result<(Vec<SearchResult>, SearchMetrics)> {
        Ok((self.search_results.clone(), self.search_metrics.clone()))
    }

    async fn search_tags(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn search_tag_values(&self, _key: String) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

fn span(id: u8) -> SpanRecord {
    SpanRecord {
        span_id: [id; 8],
        parent_span_id: None,
        name: "op".into(),
        service_name: "svc".into(),
        start_nanos: id as u64,
        end_nanos: id as u64 + 1,
    }
}

fn pool_for(clients: HashMap<String, Arc<dyn IngesterClient>>) -> ClientPool {
    ClientPool::new(move |addr| clients.get(addr).expect("unregistered address").clone())
}

/// S4: three ingesters return the same trace ID with different
/// `start_time_unix_nano`; the merged result has exactly one entry with
/// the first-seen metadata, and `inspected_traces` sums all three.
#[tokio::test]
async fn search_fan_out_dedupes_same_trace_id_from_three_ingesters() {
    let trace_id = TraceId::from_bytes([0xab; 16]);
    let mut clients: HashMap<String, Arc<dyn IngesterClient>> = HashMap::new();
    for (addr, start) in [("ing-1", 100u64), ("ing-2", 200), ("ing-3", 50)] {
        clients.insert(
            addr.to_string(),
            Arc::new(FixedIngester {
                trace: None,
                search_results: vec![SearchResult {
                    trace_id,
                    root_service_name: "svc".into(),
                    root_span_name: "op".into(),
                    start_time_unix_nano: start,
                    duration_nanos: 5,
                }],
                search_metrics: SearchMetrics {
                    inspected_traces: 1,
                    inspected_bytes: 40,
                    inspected_blocks: 1,
                    skipped_blocks: 0,
                },
            }) as Arc<dyn IngesterClient>,
        );
    }

    let ring: Arc<dyn Ring> = Arc::new(StaticRing::new(vec!["ing-1".into(), "ing-2".into(), "ing-3".into()], 3, 0));
    let querier = Querier::new(ring, pool_for(clients), None, None);

    let (results, metrics) = querier
        .search(&Context::new(), "tenant-a", SearchRequest::default(), QueryMode::Ingesters, 0, 0)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].start_time_unix_nano, 100);
    assert_eq!(metrics.inspected_traces, 3);
}

/// S5: `query_mode=All` with 3 ingester partials and 2 store partials
/// combines into one trace whose span count equals the deduped union.
#[tokio::test]
async fn find_trace_by_id_combines_ingesters_and_store_under_all_mode() {
    let trace_id = TraceId::from_bytes([0x01; 16]);

    let fragment_for = |spans: &[u8]| TraceFragment::new(spans.iter().map(|s| span(*s)).collect());

    let mut clients: HashMap<String, Arc<dyn IngesterClient>> = HashMap::new();
    for (addr, spans) in [("ing-1", &[1u8, 2][..]), ("ing-2", &[2, 3]), ("ing-3", &[3, 4])] {
        clients.insert(
            addr.to_string(),
            Arc::new(FixedIngester {
                trace: Some(ReconstructedTrace {
                    trace_id,
                    fragment: fragment_for(spans),
                }),
                search_results: Vec::new(),
                search_metrics: SearchMetrics::default(),
            }) as Arc<dyn IngesterClient>,
        );
    }

    struct FixedBlocklist {
        parts: Vec<(Vec<u8>, Encoding)>,
    }

    #[async_trait]
    impl Blocklist for FixedBlocklist {
        async fn find_trace_by_id(&self, _tenant: &str, _trace_id: TraceId, _start: u64, _end: u64) -> Result<Vec<(Vec<u8>, Encoding)>> {
            Ok(self.parts.clone())
        }

        async fn search(
            &self,
            _tenant: &str,
            _req: &SearchRequest,
            _start: u64,
            _end: u64,
        ) -> Result<(Vec<SearchResult>, SearchMetrics)> {
            Ok((Vec::new(), SearchMetrics::default()))
        }
    }

    let store_parts = vec![
        (
            trace_types::encode_fragment(&fragment_for(&[4, 5]), Encoding::Proto).unwrap(),
            Encoding::Proto,
        ),
        (
            trace_types::encode_fragment(&fragment_for(&[5, 6]), Encoding::Proto).unwrap(),
            Encoding::Proto,
        ),
    ];

    let ring: Arc<dyn Ring> = Arc::new(StaticRing::new(vec!["ing-1".into(), "ing-2".into(), "ing-3".into()], 3, 0));
    let blocklist: Arc<dyn Blocklist> = Arc::new(FixedBlocklist { parts: store_parts });
    let querier = Querier::new(ring, pool_for(clients), Some(blocklist), None);

    let result = querier
        .find_trace_by_id(&Context::new(), "tenant-a", trace_id, QueryMode::All, 0, u64::MAX)
        .await
        .unwrap()
        .unwrap();

    // spans 1..=6, each appearing in at least one partial, deduped by span ID.
    assert_eq!(result.fragment.span_count(), 6);
}

#[tokio::test]
async fn replication_set_is_exposed_for_direct_use() {
    let set = ReplicationSet {
        addrs: vec!["a".into()],
        min_success: 1,
        max_failure: 0,
    };
    let out = set
        .do_(&Context::new(), None, |addr| async move { Ok::<_, trace_types::Error>(addr) })
        .await
        .unwrap();
    assert_eq!(out, vec!["a".to_string()]);
}

#[tokio::test]
async fn unknown_tenant_surfaces_ring_error() {
    use trace_querier::ring::TenantRing;
    let ring = TenantRing::new(HashMap::new());
    let err = ring.get("missing-tenant", RingOp::Read).await.unwrap_err();
    assert!(matches!(err, trace_types::Error::InvalidInput(_)));
}
