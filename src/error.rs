use thiserror::Error;

use crate::limiter::LimitReached;
use crate::optimize::TranscodeError;

/// Errors produced by the request-resolution pipeline.
///
/// Every variant resolves to exactly one HTTP status at the handler boundary;
/// no internal detail crosses the HTTP boundary unmapped.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Asset missing under the originals root (HTTP 404).
    #[error("asset not found: {0}")]
    NotFound(String),

    /// A format literal outside the supported set, or an undetectable source
    /// where a format was required (HTTP 400).
    #[error("unsupported format: {0:?}")]
    UnsupportedFormat(String),

    /// No profile with the requested identifier (HTTP 400).
    #[error("unknown preset: {0:?}")]
    UnknownPreset(String),

    /// The profile exists but has no enabled entry for the requested format
    /// (HTTP 400, distinct from [`ServeError::UnknownPreset`]).
    #[error("preset {preset:?} has no enabled {format:?} entry")]
    FormatNotAvailable { preset: String, format: String },

    /// The job limiter refused admission (HTTP 503, caller-retryable).
    #[error("transcode rejected: {0}")]
    AdmissionRejected(#[from] LimitReached),

    /// Filesystem failure other than "not found" (HTTP 500).
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    /// The transcoding engine failed on this input (HTTP 500, not retried:
    /// retrying an inherently bad input wastes admission slots).
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}

impl ServeError {
    /// Classify a filesystem error for a given asset path.
    ///
    /// `NotFound` is a client-visible condition; everything else is an
    /// upstream I/O failure.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ServeError::NotFound(path.to_string())
        } else {
            ServeError::Io(err)
        }
    }

    /// Short machine-readable reason string used in error response bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            ServeError::NotFound(_) => "not_found",
            ServeError::UnsupportedFormat(_) => "unsupported_format",
            ServeError::UnknownPreset(_) => "unknown_preset",
            ServeError::FormatNotAvailable { .. } => "format_not_available",
            ServeError::AdmissionRejected(_) => "job_limit_reached",
            ServeError::Io(_) => "io_error",
            ServeError::Transcode(_) => "transcode_error",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
