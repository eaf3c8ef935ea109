//! HTTP service
//!
//! ## Endpoint Map
//!
//! | Route          | Description                                      |
//! |----------------|--------------------------------------------------|
//! | `GET /pick`    | Hand out one artifact URL: `{"url": "..."}`      |
//! | `GET /health`  | Liveness probe with pool counts                  |
//! | `GET /<path>`  | Artifact file below the output root              |
//!
//! Handlers only touch the pool catalogs and the disk; generation happens
//! in the maintenance loop.

use crate::error::Error;
use crate::media::content_type_for;
use crate::pool::{PoolManager, PoolStatus};
use axum::{
    body::Body,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PoolManager>,
}

/// Build the complete HTTP application
pub fn build_app(pool: Arc<PoolManager>) -> Router {
    Router::new()
        .route("/pick", get(pick))
        .route("/health", get(health_check))
        .fallback(serve_artifact)
        .with_state(AppState { pool })
        .layer(TraceLayer::new_for_http())
}

/// Serve `app` until `shutdown` fires; in-flight requests are completed.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Serialize)]
struct PickResponse {
    url: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    pool: PoolStatus,
}

/// API error body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn pool_exhausted() -> Self {
        Self::new("POOL_EXHAUSTED", "No artifact available")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

fn error_response(status: StatusCode, error: ApiError) -> Response {
    (status, Json(error)).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /pick
async fn pick(State(state): State<AppState>) -> Response {
    match state.pool.pick().await {
        Ok(picked) => Json(PickResponse { url: picked.url }).into_response(),
        Err(Error::PoolExhausted) => {
            tracing::warn!("Pick requested with an empty pool");
            error_response(StatusCode::NOT_FOUND, ApiError::pool_exhausted())
        }
        Err(e) => {
            tracing::error!(error = %e, "Pick failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal(e.to_string()))
        }
    }
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pool: state.pool.status().await,
    })
}

/// GET /<relative-path>
async fn serve_artifact(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let request_path = uri.path();
    let not_found = || error_response(StatusCode::NOT_FOUND, ApiError::not_found("File not found"));

    let Some(path) = state.pool.store().resolve(request_path).await else {
        return not_found();
    };

    // The file may be reclaimed between resolve and open.
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(path = %request_path, error = %e, "Artifact vanished before read");
            return not_found();
        }
    };
    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::debug!(path = %request_path, error = %e, "Failed to stat artifact");
            return not_found();
        }
    };

    // Streamed in chunks; an unlinked file stays readable through the handle.
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(request_path).to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}
