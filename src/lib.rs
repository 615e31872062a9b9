//! # optimg
//!
//! An HTTP image delivery server that serves stored originals verbatim or
//! transcoded on the fly into a bandwidth-efficient format and size.
//!
//! ## Features
//!
//! - **Content negotiation**: picks AVIF/WEBP for clients that declare
//!   support via `Accept`, in a configuration-driven priority order
//! - **Named presets**: server-defined {max width, per-format quality}
//!   profiles selected per request
//! - **Conditional caching**: streaming CRC32 fingerprints with full
//!   `If-None-Match` handling
//! - **Admission control**: a bounded job limiter rejects excess transcode
//!   demand immediately instead of queuing it
//!
//! ## Architecture
//!
//! - [`config`] - CLI and YAML/environment configuration
//! - [`mod@format`] - Supported formats and magic-byte detection
//! - [`etag`] - Conditional cache validation
//! - [`limiter`] - Bounded-concurrency admission control
//! - [`optimize`] - Negotiation, profiles, and the transcoding engine
//! - [`service`] - The per-request resolver composing the above
//! - [`server`] - Axum-based HTTP layer
//! - [`metrics`] - Prometheus text exposition
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use optimg::{
//!     create_router, ImageService, ImageTranscoder, JobLimiter, ProfileStore, RouterConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = optimg::Config::load("config.yaml".as_ref()).unwrap();
//!     let service = ImageService::new(
//!         config.originals_base.clone(),
//!         config.auto_optimize.clone(),
//!         Arc::new(ProfileStore::from_config(&config.preset_optimize)),
//!         JobLimiter::new(config.job_limit),
//!         Arc::new(ImageTranscoder::new()),
//!     );
//!     let router = create_router(service, RouterConfig::new());
//!
//!     // Start the server...
//! }
//! ```

pub mod config;
pub mod error;
pub mod etag;
pub mod format;
pub mod limiter;
pub mod metrics;
pub mod optimize;
pub mod server;
pub mod service;

// Re-export commonly used types
pub use config::{Cli, Config};
pub use error::ServeError;
pub use etag::{fingerprint_file, matches_etag, CacheValidation};
pub use format::{detect_source, sniff, ImageFormat, SourceKind};
pub use limiter::{JobGuard, JobLimiter, LimitReached};
pub use optimize::{
    negotiate_auto, ClientSupport, EngineStats, ImageTranscoder, Negotiation, ProfileError,
    ProfileStore, ResolvedProfile, Transcoder, TranscodeError, TranscodeSpec,
};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig, RETRY_AFTER_SECS};
pub use service::{ImageService, Resolution};
