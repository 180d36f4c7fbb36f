//! HTTP transport for the blob cache
//!
//! Provides /health and the /v1/cache/{key} entry routes (PUT upload,
//! HEAD probe, GET download). All cache-entry semantics live in
//! `cache-store`; this layer only maps requests to store operations and
//! store outcomes to status codes.

use crate::auth::RequireAuth;
use crate::error::ApiError;
use crate::types::HealthResponse;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use cache_store::{EntryStore, StoreStats};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub store: EntryStore,
    pub auth_token: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(store: EntryStore, auth_token: Option<String>) -> Self {
        Self {
            store,
            auth_token,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/cache/{key}",
            put(put_entry).get(get_entry).head(head_entry),
        )
        .layer(CorsLayer::permissive())
        // Artifacts can be large; Content-Length is validated per request.
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint (unauthenticated)
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let store = match state.store.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "Failed to collect store stats");
            StoreStats::default()
        }
    };
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        store,
    })
}

/// The declared payload size; uploads without one are rejected before any
/// state changes.
fn declared_length(headers: &HeaderMap) -> Result<u64, ApiError> {
    let value = headers
        .get(header::CONTENT_LENGTH)
        .ok_or_else(|| ApiError::BadRequest("Content-Length header is required".to_string()))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid Content-Length header".to_string()))
}

/// PUT /v1/cache/{key} - store an entry, exactly once per key
async fn put_entry(
    _auth: RequireAuth,
    State(state): State<SharedState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let declared = declared_length(&headers)?;
    state.store.create(&key, declared, body.as_ref()).await?;
    Ok(StatusCode::OK)
}

/// HEAD /v1/cache/{key} - existence probe, does not touch entry recency
async fn head_entry(
    _auth: RequireAuth,
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.exists(&key).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound)
    }
}

/// GET /v1/cache/{key} - download an entry
async fn get_entry(
    _auth: RequireAuth,
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let (len, data) = state.store.read(&key).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from(data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn create_test_state(dir: &tempfile::TempDir, auth_token: Option<&str>) -> SharedState {
        let store = EntryStore::new(dir.path());
        store.init().await.unwrap();
        Arc::new(ServerState::new(store, auth_token.map(String::from)))
    }

    fn put_request(key: &str, body: &'static [u8], declared: u64) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/v1/cache/{}", key))
            .header(header::CONTENT_LENGTH, declared)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert!(json["store"]["entries"].as_u64().is_some());
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(put_request("abc", b"hello", 5))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/v1/cache/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "5");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_duplicate_put_conflicts() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(put_request("abc", b"hello", 5))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(put_request("abc", b"other", 5))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_get_missing_entry() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/v1/cache/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_probe() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("HEAD")
                    .uri("/v1/cache/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .clone()
            .oneshot(put_request("abc", b"hello", 5))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .method("HEAD")
                    .uri("/v1/cache/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_requires_content_length() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/v1/cache/abc")
                    .body(Body::from(&b"hello"[..]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/v1/cache/abc")
                    .header(header::CONTENT_LENGTH, "not-a-number")
                    .body(Body::from(&b"hello"[..]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_short_body_leaves_no_entry() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        // Declares 10 bytes but only delivers 2
        let response = router
            .clone()
            .oneshot(put_request("abc", b"hi", 10))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(
                Request::builder()
                    .method("HEAD")
                    .uri("/v1/cache/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .oneshot(put_request("bad.key", b"hello", 5))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_method_not_allowed() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, None).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/cache/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_auth_required_when_token_configured() {
        let dir = tempdir().unwrap();
        let state = create_test_state(&dir, Some("secret")).await;
        let router = create_router(state);

        // No Authorization header
        let response = router
            .clone()
            .oneshot(put_request("abc", b"hello", 5))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Wrong token
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/v1/cache/abc")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Correct token
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/v1/cache/abc")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .header(header::CONTENT_LENGTH, 5)
                    .body(Body::from(&b"hello"[..]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Health stays open
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
