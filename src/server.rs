//! HTTP server for the remote storage endpoints.
//!
//! - `POST /write`: snappy protobuf `WriteRequest`
//! - `POST /read`: snappy protobuf `ReadRequest`, answered with a snappy
//!   protobuf `ReadResponse`
//! - `GET /healthz`, `GET /readyz`: liveness and readiness probes

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::remote::{self, ReadRequest, WriteRequest};
use crate::storage::{RemoteStorage, StorageError};

/// Content type of remote read responses.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Content encoding of remote read responses.
pub const SNAPPY_ENCODING: &str = "snappy";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn RemoteStorage>,
}

impl AppState {
    pub fn new(storage: impl RemoteStorage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    db: Option<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/write", post(write_handler))
        .route("/read", post(read_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(state)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        db: None,
    })
}

/// Readiness probe that checks store availability.
async fn readyz_handler(State(state): State<AppState>) -> Response {
    match state.storage.health_check().await {
        Ok(()) => Json(HealthResponse {
            status: "ok".to_string(),
            db: Some("ready".to_string()),
        })
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "not_ready".to_string(),
                    db: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Remote write endpoint.
async fn write_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: WriteRequest = match remote::decode_snappy(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected remote write body");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let samples = remote::samples_from_write_request(request);
    tracing::debug!(samples = samples.len(), "Remote write");

    match state.storage.write(&samples).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => storage_error_response("write", e),
    }
}

/// Remote read endpoint.
async fn read_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ReadRequest = match remote::decode_snappy(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected remote read body");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let queries = remote::queries_from_read_request(request);
    let response = match state.storage.read(&queries).await {
        Ok(response) => response,
        Err(e) => return storage_error_response("read", e),
    };

    match remote::encode_snappy(&remote::ReadResponse::from(response)) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE),
                (header::CONTENT_ENCODING, SNAPPY_ENCODING),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode read response");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn storage_error_response(op: &str, err: StorageError) -> Response {
    if err.is_client_error() {
        tracing::warn!(error = %err, "Rejected remote {op}");
        (StatusCode::BAD_REQUEST, err.to_string()).into_response()
    } else {
        tracing::error!(error = %err, "Remote {op} failed");
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Query, ReadResponse, Sample};
    use async_trait::async_trait;
    use axum::http::Request;
    use tower::ServiceExt;

    struct DownStorage;

    #[async_trait]
    impl RemoteStorage for DownStorage {
        async fn write(&self, _samples: &[Sample]) -> Result<(), StorageError> {
            Err(StorageError::Write("store unavailable".to_string()))
        }

        async fn read(&self, _queries: &[Query]) -> Result<ReadResponse, StorageError> {
            Err(StorageError::Decode("bad labels".to_string()))
        }

        async fn health_check(&self) -> Result<(), StorageError> {
            Err(StorageError::Decode("store unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let app = create_router(AppState::new(DownStorage));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_reports_store_failure() {
        let app = create_router(AppState::new(DownStorage));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/readyz")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_write_failure_is_server_error() {
        let body = remote::encode_snappy(&WriteRequest::default()).unwrap();
        let app = create_router(AppState::new(DownStorage));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/write")
                    .body(axum::body::Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unsupported_match_type_is_client_error() {
        let response = storage_error_response(
            "read",
            StorageError::UnsupportedMatchType {
                label: "job".to_string(),
                kind: 5,
            },
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
