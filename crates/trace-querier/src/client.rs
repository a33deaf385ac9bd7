// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use trace_types::{ReconstructedTrace, Result, SearchMetrics, SearchRequest, SearchResult, TraceId};

/// The read-path surface a querier needs from one ingester replica.
/// Mirrors the `IngesterRpc` wire contract; a production client
/// implements this over the Axum HTTP surface, tests implement it
/// in-process.
#[async_trait]
pub trait IngesterClient: Send + Sync {
    async fn find_trace_by_id(&self, trace_id: TraceId) -> Result<Option<ReconstructedTrace>>;
    async fn search(&self, req: SearchRequest) -> Result<(Vec<SearchResult>, SearchMetrics)>;
    async fn search_tags(&self) -> Result<Vec<String>>;
    async fn search_tag_values(&self, key: String) -> Result<Vec<String>>;
}

/// A cache from ingester address to client, mutated only under its own
/// lock; clients are reused across calls rather than reconnected per
/// request.
pub struct ClientPool {
    clients: parking_lot::RwLock<HashMap<String, Arc<dyn IngesterClient>>>,
    factory: Box<dyn Fn(&str) -> Arc<dyn IngesterClient> + Send + Sync>,
}

impl ClientPool {
    pub fn new(factory: impl Fn(&str) -> Arc<dyn IngesterClient> + Send + Sync + 'static) -> Self {
        Self {
            clients: parking_lot::RwLock::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    pub fn get(&self, addr: &str) -> Arc<dyn IngesterClient> {
        if let Some(client) = self.clients.read().get(addr) {
            return client.clone();
        }
        let client = (self.factory)(addr);
        self.clients.write().insert(addr.to_string(), client.clone());
        client
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trace_types::Error;

    struct StubClient;

    #[async_trait]
    impl IngesterClient for StubClient {
        async fn find_trace_by_id(&self, _trace_id: TraceId) -> Result<Option<ReconstructedTrace>> {
            Err(Error::NotFound)
        }
        async fn search(&self, _req: SearchRequest) -> Result<(Vec<SearchResult>, SearchMetrics)> {
            Ok((Vec::new(), SearchMetrics::default()))
        }
        async fn search_tags(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn search_tag_values(&self, _key: String) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn reuses_client_for_same_address() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_factory = calls.clone();
        let pool = ClientPool::new(move |_addr| {
            calls_for_factory.fetch_add(1, Ordering::SeqCst);
            Arc::new(StubClient) as Arc<dyn IngesterClient>
        });

        let _a = pool.get("10.0.0.1:9095");
        let _b = pool.get("10.0.0.1:9095");
        let _c = pool.get("10.0.0.2:9095");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len(), 2);
    }
}
