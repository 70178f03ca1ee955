//! The HTTP façade.
//!
//! REST access to the local store: value bytes in and out of
//! `/v1/cache/:key`, accounting at `/v1/status`. The façade serves the
//! local node only — cluster routing belongs to the binary protocol and
//! its redirect-following client.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::info;

use super::Server;
use crate::cache::Cache;
use crate::error::{Error, Result};

pub struct HttpServer {
    cache: Arc<Cache>,
    address: String,
}

impl HttpServer {
    pub fn new(cache: Arc<Cache>, address: String) -> Self {
        Self { cache, address }
    }

    /// The route table, separated out so tests can drive it without a
    /// socket.
    pub fn router(cache: Arc<Cache>) -> Router {
        Router::new()
            .route(
                "/v1/cache/:key",
                get(handle_get).put(handle_set).delete(handle_delete),
            )
            .route("/v1/status", get(handle_status))
            .layer(Extension(cache))
    }
}

impl Server for HttpServer {
    async fn run(self) -> Result<()> {
        let app = Self::router(self.cache);
        let listener = TcpListener::bind(&self.address).await?;
        info!("http server listening on {}", self.address);
        axum::serve(listener, app).await.map_err(Error::Io)
    }
}

async fn handle_get(
    Extension(cache): Extension<Arc<Cache>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match cache.get(&key).await {
        Some(value) => (StatusCode::OK, value).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn handle_set(
    Extension(cache): Extension<Arc<Cache>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let ttl = match ttl_of(&headers) {
        Ok(ttl) => ttl,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    match cache.set(&key, &body, ttl).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err @ Error::CapacityExceeded) => (
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Error: {err}"),
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {err}")).into_response(),
    }
}

async fn handle_delete(
    Extension(cache): Extension<Arc<Cache>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    cache.delete(&key).await;
    StatusCode::OK
}

async fn handle_status(Extension(cache): Extension<Arc<Cache>>) -> impl IntoResponse {
    Json(cache.status().await)
}

/// Reads the optional `Ttl` header; absent or empty means never expire.
fn ttl_of(headers: &HeaderMap) -> Result<i64> {
    let Some(raw) = headers.get("Ttl") else {
        return Ok(crate::cache::entry::NEVER_EXPIRES);
    };

    raw.to_str()
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| Error::Server("invalid ttl header".to_string()))
}
