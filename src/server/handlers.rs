//! HTTP request handlers for the tile API.
//!
//! # Endpoints
//!
//! - `GET /tile/{*path}` - Serve a tile, the path ends with
//!   `[mosaic/]level/row/column[.ext]`
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{FetchError, IoError, TileError};
use crate::format::content_type;
use crate::io::{gunzip_to_vec, is_gzip, Delegate};
use crate::tile::TileService;

/// Default `Cache-Control` max-age in seconds.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
pub struct AppState<D: Delegate> {
    pub tile_service: Arc<TileService<D>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl<D: Delegate> AppState<D> {
    pub fn new(tile_service: TileService<D>) -> Self {
        Self::with_cache_max_age(tile_service, DEFAULT_CACHE_MAX_AGE)
    }

    pub fn with_cache_max_age(tile_service: TileService<D>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }
}

impl<D: Delegate> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_level")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// 5xx errors are logged at ERROR, 404s at DEBUG and other 4xx at WARN.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::Address(_) => (StatusCode::BAD_REQUEST, "invalid_address"),
            TileError::LevelOutOfRange { .. } => (StatusCode::BAD_REQUEST, "invalid_level"),
            TileError::TileOutOfBounds { .. } => (StatusCode::BAD_REQUEST, "tile_out_of_bounds"),
            TileError::MosaicOutOfRange { .. } => (StatusCode::BAD_REQUEST, "invalid_mosaic"),
            TileError::NotFound => (StatusCode::NOT_FOUND, "not_found"),

            TileError::Fetch(fetch_err) => match fetch_err {
                FetchError::RemoteStatus(404) => (StatusCode::NOT_FOUND, "not_found"),
                FetchError::RemoteStatus(_) => (StatusCode::BAD_GATEWAY, "remote_error"),
                FetchError::RetriesExhausted(_) => (StatusCode::BAD_GATEWAY, "retries_exhausted"),
                FetchError::Decompression(_) => (StatusCode::BAD_GATEWAY, "decompression_error"),
                FetchError::Transport(IoError::InvalidUrl(_)) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
                }
                FetchError::Transport(_) => (StatusCode::BAD_GATEWAY, "connection_error"),
                FetchError::BufferTooSmall { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "tile_too_large")
                }
                FetchError::EmptyRange(_) => (StatusCode::INTERNAL_SERVER_ERROR, "empty_range"),
            },
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Tile not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Conditional Requests
// =============================================================================

/// True if the `If-None-Match` header contains `etag`.
pub fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(etag))
}

/// True if the client listed gzip in `Accept-Encoding`.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /tile/{*path}`
///
/// # Response
///
/// - `200 OK`: tile payload, content type sniffed from its signature
/// - `304 Not Modified`: `If-None-Match` holds the tile's ETag
/// - `400 Bad Request`: malformed address, or level/tile outside the raster
/// - `404 Not Found`: source has no such tile and no empty tile is configured
/// - `502 Bad Gateway`: source failure
///
/// # Headers
///
/// - `ETag`: quoted fingerprint
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `Content-Encoding: gzip` when a gzip payload is passed through
/// - `Vary: Accept-Encoding` when the payload is gzip, whether passed
///   through or inflated
pub async fn tile_handler<D: Delegate + 'static>(
    State(state): State<AppState<D>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, TileError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    let tile = state.tile_service.get_tile(&path, user_agent).await?;
    let etag = tile.fingerprint.quoted();
    let vary = is_gzip(&tile.data);

    if etag_matches(&headers, tile.fingerprint.encode().as_str()) {
        debug!(path = %path, etag = %etag, "not modified");
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        insert_etag(&mut response, &etag);
        if vary {
            insert_vary(&mut response);
        }
        return Ok(response);
    }

    let mut data = tile.data;
    let mut gzipped = vary;
    if gzipped && !accepts_gzip(&headers) {
        let limit = state.tile_service.raster().max_tile_size();
        data = gunzip_to_vec(&data, limit)?.into();
        gzipped = false;
    }

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type(&data).to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
        ],
        Body::from(data),
    )
        .into_response();

    insert_etag(&mut response, &etag);
    if vary {
        insert_vary(&mut response);
    }
    if gzipped {
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }

    Ok(response)
}

fn insert_etag(response: &mut Response, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
}

fn insert_vary(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::VARY, HeaderValue::from_static("accept-encoding"));
}

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
