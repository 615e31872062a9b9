//! HTTP server layer.
//!
//! Handlers stay thin: they extract request parts, hand them to the
//! [`ImageService`](crate::service::ImageService) resolver, and translate the
//! outcome (or error) into a response. The routes module wires them into an
//! Axum router.

pub mod handlers;
pub mod routes;

pub use handlers::{
    auto_handler, metrics_handler, original_handler, preset_handler, AppState, ErrorResponse,
    PresetQueryParams, RETRY_AFTER_SECS,
};
pub use routes::{create_router, RouterConfig};
