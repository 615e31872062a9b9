//! Router configuration for the image delivery API.
//!
//! # Route Structure
//!
//! ```text
//! /o/{path}    - serve original        (always mounted)
//! /a/{path}    - auto-optimize         (always mounted)
//! /p/{path}    - preset-optimize       (always mounted)
//! /metrics     - Prometheus telemetry  (config-gated)
//! ```

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::config::{DEFAULT_MAX_AGE, DEFAULT_STALE_WHILE_REVALIDATE};
use crate::optimize::Transcoder;
use crate::service::ImageService;

use super::handlers::{
    auto_handler, metrics_handler, original_handler, preset_handler, AppState,
};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Mount the `/metrics` endpoint.
    pub metrics_enabled: bool,

    /// `Cache-Control` TTLs as (max-age, stale-while-revalidate).
    pub browser_ttl: (u64, u64),

    /// Whether to enable request tracing.
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            browser_ttl: (DEFAULT_MAX_AGE, DEFAULT_STALE_WHILE_REVALIDATE),
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the metrics endpoint.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Set the browser cache TTLs.
    pub fn with_browser_ttl(mut self, max_age: u64, stale_while_revalidate: u64) -> Self {
        self.browser_ttl = (max_age, stale_while_revalidate);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
pub fn create_router<T: Transcoder + 'static>(
    service: ImageService<T>,
    config: RouterConfig,
) -> Router {
    let state = AppState::new(service, config.browser_ttl);

    let mut router = Router::new()
        .route("/o/{*path}", get(original_handler::<T>))
        .route("/a/{*path}", get(auto_handler::<T>))
        .route("/p/{*path}", get(preset_handler::<T>));

    if config.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler::<T>));
    }

    let router = router.with_state(state);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

// =============================================================================
// Tests
// =============================================================================
