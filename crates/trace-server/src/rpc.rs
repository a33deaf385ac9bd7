// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use trace_ingester::Instance;
use trace_types::{Encoding, Error, ReconstructedTrace, Result, SearchMetrics, SearchRequest, SearchResult, TraceId};

/// The RPC surface an ingester serves, independent of transport. The
/// Axum router below is the JSON-over-HTTP binding of this trait; a
/// test double can implement it without standing up a socket.
#[async_trait]
pub trait IngesterRpc: Send + Sync {
    async fn push_bytes(&self, trace_id: TraceId, payload: Vec<u8>, search_entry: Option<Vec<u8>>) -> Result<()>;
    async fn find_trace_by_id(&self, trace_id: TraceId) -> Result<Option<ReconstructedTrace>>;
    async fn search(&self, req: SearchRequest) -> Result<(Vec<SearchResult>, SearchMetrics)>;
    async fn search_tags(&self) -> Result<Vec<String>>;
    async fn search_tag_values(&self, key: String) -> Result<Vec<String>>;
}

#[async_trait]
impl IngesterRpc for Instance {
    async fn push_bytes(&self, trace_id: TraceId, payload: Vec<u8>, search_entry: Option<Vec<u8>>) -> Result<()> {
        Instance::push_bytes(self, trace_id, payload, Encoding::Proto, search_entry).await
    }

    async fn find_trace_by_id(&self, trace_id: TraceId) -> Result<Option<ReconstructedTrace>> {
        Instance::find_trace_by_id(self, &trace_id).await
    }

    async fn search(&self, req: SearchRequest) -> Result<(Vec<SearchResult>, SearchMetrics)> {
        Ok(Instance::search(self, &req).await)
    }

    async fn search_tags(&self) -> Result<Vec<String>> {
        Ok(Instance::search_tags(self).await)
    }

    async fn search_tag_values(&self, key: String) -> Result<Vec<String>> {
        Ok(Instance::search_tag_values(self, &key).await)
    }
}

/// Shared router state: one instance, plus the header name that
/// carries the tenant. Request framing and auth proper are out of
/// scope; this is just the extractor contract.
#[derive(Clone)]
struct AppState {
    instance: Arc<dyn IngesterRpc>,
    tenant_header: String,
}

pub fn router(instance: Arc<dyn IngesterRpc>, tenant_header: String) -> Router {
    let state = AppState { instance, tenant_header };
    Router::new()
        .route("/api/push", post(push_handler))
        .route("/api/traces/:trace_id", get(find_trace_handler))
        .route("/api/search", post(search_handler))
        .route("/api/search/tags", get(tags_handler))
        .route("/api/search/tag/:key/values", get(tag_values_handler))
        .with_state(state)
}

fn tenant_from_headers(headers: &HeaderMap, header_name: &str) -> Result<String> {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("missing {header_name} header")))
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::TraceTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Io(_) | Error::Blob(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Fatal(_) | Error::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

#[derive(Deserialize)]
struct PushRequest {
    trace_id: TraceId,
    payload: Vec<u8>,
    search_entry: Option<Vec<u8>>,
}

async fn push_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PushRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    tenant_from_headers(&headers, &state.tenant_header)?;
    state.instance.push_bytes(req.trace_id, req.payload, req.search_entry).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct TraceByIdResponse {
    trace: Option<ReconstructedTrace>,
}

async fn find_trace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(trace_id): Path<String>,
) -> std::result::Result<Json<TraceByIdResponse>, ApiError> {
    tenant_from_headers(&headers, &state.tenant_header)?;
    let trace_id = TraceId::from_hex(&trace_id)?;
    let trace = state.instance.find_trace_by_id(trace_id).await?;
    Ok(Json(TraceByIdResponse { trace }))
}

#[derive(Serialize)]
struct SearchResponseBody {
    traces: Vec<SearchResult>,
    metrics: SearchMetrics,
}

async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> std::result::Result<Json<SearchResponseBody>, ApiError> {
    tenant_from_headers(&headers, &state.tenant_header)?;
    let (traces, metrics) = state.instance.search(req).await?;
    Ok(Json(SearchResponseBody { traces, metrics }))
}

#[derive(Serialize)]
struct TagNamesResponse {
    tag_names: Vec<String>,
}

async fn tags_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> std::result::Result<Json<TagNamesResponse>, ApiError> {
    tenant_from_headers(&headers, &state.tenant_header)?;
    let tag_names = state.instance.search_tags().await?;
    Ok(Json(TagNamesResponse { tag_names }))
}

#[derive(Serialize)]
struct TagValuesResponse {
    tag_values: Vec<String>,
}

async fn tag_values_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> std::result::Result<Json<TagValuesResponse>, ApiError> {
    tenant_from_headers(&headers, &state.tenant_header)?;
    let tag_values = state.instance.search_tag_values(key).await?;
    Ok(Json(TagValuesResponse { tag_values }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct FixedInstance;

    #[async_trait]
    impl IngesterRpc for FixedInstance {
        async fn push_bytes(&self, _trace_id: TraceId, _payload: Vec<u8>, _search_entry: Option<Vec<u8>>) -> Result<()> {
            Ok(())
        }

        async fn find_trace_by_id(&self, _trace_id: TraceId) -> Result<Option<ReconstructedTrace>> {
            Ok(None)
        }

        async fn search(&self, _req: SearchRequest) -> Result<(Vec<SearchResult>, SearchMetrics)> {
            Ok((Vec::new(), SearchMetrics::default()))
        }

        async fn search_tags(&self) -> Result<Vec<String>> {
            Ok(vec!["env".to_string()])
        }

        async fn search_tag_values(&self, _key: String) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn app() -> Router {
        router(Arc::new(FixedInstance), "x-scope-orgid".to_string())
    }

    #[tokio::test]
    async fn missing_tenant_header_is_rejected() {
        let response = app()
            .oneshot(Request::builder().method("GET").uri("/api/search/tags").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tags_request_with_tenant_header_succeeds() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/search/tags")
                    .header("x-scope-orgid", "tenant-a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
