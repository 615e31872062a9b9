//! HTTP request handlers for the image delivery API.
//!
//! # Endpoints
//!
//! - `GET /o/{path}` - Serve the stored original
//! - `GET /a/{path}` - Serve an `Accept`-negotiated optimized variant
//! - `GET /p/{path}?preset=&format=` - Serve a preset-optimized variant
//! - `GET /metrics` - Prometheus telemetry (config-gated)

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::ServeError;
use crate::metrics;
use crate::optimize::Transcoder;
use crate::service::{ImageService, Resolution};

/// `Retry-After` hint attached to admission rejections, in seconds.
pub const RETRY_AFTER_SECS: u32 = 5;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to all handlers via Axum's State extractor.
pub struct AppState<T: Transcoder> {
    /// The request resolver.
    pub service: Arc<ImageService<T>>,

    /// `Cache-Control` TTLs as (max-age, stale-while-revalidate).
    pub browser_ttl: (u64, u64),
}

impl<T: Transcoder> AppState<T> {
    pub fn new(service: ImageService<T>, browser_ttl: (u64, u64)) -> Self {
        Self {
            service: Arc::new(service),
            browser_ttl,
        }
    }
}

impl<T: Transcoder> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            browser_ttl: self.browser_ttl,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for the preset route.
#[derive(Debug, Deserialize)]
pub struct PresetQueryParams {
    /// Optimization profile identifier. Empty means "no preset".
    #[serde(default)]
    pub preset: String,

    /// Output format literal. Empty means "detect from the source".
    #[serde(default)]
    pub format: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body for statuses that carry one (400, 500, 503; never 404).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable reason (e.g. "unknown_preset", "job_limit_reached").
    pub error: String,

    /// Human-readable error message.
    pub message: String,

    /// HTTP status code (included for convenience).
    pub status: u16,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Resolve pipeline errors to HTTP responses.
///
/// - 404 carries no body.
/// - 503 carries `Retry-After` and deliberately no `Cache-Control`, so
///   intermediaries do not cache the rejection.
/// - 4xx log at WARN (404 at DEBUG), 5xx at ERROR.
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServeError::NotFound(_) => StatusCode::NOT_FOUND,
            ServeError::UnsupportedFormat(_)
            | ServeError::UnknownPreset(_)
            | ServeError::FormatNotAvailable { .. } => StatusCode::BAD_REQUEST,
            ServeError::AdmissionRejected(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServeError::Io(_) | ServeError::Transcode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let reason = self.reason();
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type = reason, status = status.as_u16(), "server error: {message}");
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type = reason, status = status.as_u16(), "asset not found: {message}");
        } else {
            warn!(error_type = reason, status = status.as_u16(), "client error: {message}");
        }

        match status {
            StatusCode::NOT_FOUND => status.into_response(),
            StatusCode::SERVICE_UNAVAILABLE => {
                let body = Json(ErrorResponse {
                    error: reason.to_string(),
                    message,
                    status: status.as_u16(),
                });
                (
                    status,
                    [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                    body,
                )
                    .into_response()
            }
            _ => {
                let body = Json(ErrorResponse {
                    error: reason.to_string(),
                    message,
                    status: status.as_u16(),
                });
                (status, body).into_response()
            }
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle serve-original requests.
///
/// # Endpoint
///
/// `GET /o/{path}`
///
/// # Response
///
/// - `200 OK`: the stored bytes, `Content-Optimized: false`
/// - `304 Not Modified`: empty body when an `If-None-Match` token matches
/// - `404 Not Found` / `500 Internal Server Error`
pub async fn original_handler<T: Transcoder + 'static>(
    State(state): State<AppState<T>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let resolution = state
        .service
        .resolve_original(&path, if_none_match(&headers))
        .await?;

    Ok(resolution_response(resolution, state.browser_ttl, false))
}

/// Handle auto-optimize requests.
///
/// # Endpoint
///
/// `GET /a/{path}`
///
/// The output format is negotiated from the `Accept` header against the
/// server's enabled formats; ineligible requests fall back to the original.
///
/// # Response
///
/// - `200 OK`: optimized (`Content-Optimized: true`, `Source-Type` set) or
///   original bytes; always `Vary: Accept`
/// - `304 Not Modified`
/// - `404` / `500` / `503` (job limit reached, `Retry-After: 5`)
pub async fn auto_handler<T: Transcoder + 'static>(
    State(state): State<AppState<T>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());

    let resolution = state
        .service
        .resolve_auto(&path, accept, if_none_match(&headers))
        .await?;

    Ok(resolution_response(resolution, state.browser_ttl, true))
}

/// Handle preset-optimize requests.
///
/// # Endpoint
///
/// `GET /p/{path}?preset=&format=`
///
/// # Response
///
/// - `200 OK`: optimized bytes, or the original when both parameters are empty
/// - `304 Not Modified`
/// - `400 Bad Request`: unknown format, unknown preset, or a preset without
///   that format (distinct machine-readable reasons)
/// - `404` / `500` / `503`
pub async fn preset_handler<T: Transcoder + 'static>(
    State(state): State<AppState<T>>,
    Path(path): Path<String>,
    Query(query): Query<PresetQueryParams>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let resolution = state
        .service
        .resolve_preset(&path, &query.preset, &query.format, if_none_match(&headers))
        .await?;

    Ok(resolution_response(resolution, state.browser_ttl, false))
}

/// Handle metrics requests.
///
/// # Endpoint
///
/// `GET /metrics` (mounted only when enabled in configuration)
pub async fn metrics_handler<T: Transcoder + 'static>(
    State(state): State<AppState<T>>,
) -> Response {
    let body = metrics::render(
        state.service.limiter().active(),
        state.service.engine_stats(),
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

// =============================================================================
// Response Building
// =============================================================================

fn if_none_match(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
}

/// Build the success response for a resolution.
///
/// Every asset response advertises the fingerprint and the browser TTL; only
/// the `Accept`-branching route adds `Vary`.
fn resolution_response(
    resolution: Resolution,
    browser_ttl: (u64, u64),
    vary_accept: bool,
) -> Response {
    let (max_age, stale) = browser_ttl;
    let etag = format!("\"{}\"", resolution.etag());
    let cache_control = format!("public, max-age={max_age}, stale-while-revalidate={stale}");

    let mut builder = Response::builder()
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, cache_control);
    if vary_accept {
        builder = builder.header(header::VARY, "Accept");
    }

    let response = match resolution {
        Resolution::NotModified { .. } => builder
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty()),
        Resolution::Original {
            data, content_type, ..
        } => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header("Content-Optimized", "false")
            .body(Body::from(data)),
        Resolution::Optimized {
            data,
            format,
            source_mime,
            ..
        } => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, format.mime())
            .header("Content-Optimized", "true")
            .header("Source-Type", source_mime)
            .body(Body::from(data)),
    };

    // All header values above are valid ASCII.
    response.unwrap()
}
