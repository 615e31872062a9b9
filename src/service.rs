//! Request resolution: the composition root of the delivery pipeline.
//!
//! [`ImageService`] orchestrates the per-route decision for every asset
//! request. All three routes share one skeleton:
//!
//! ```text
//! existence check ─► cache validation ──► 304 (stop)
//!                         │
//!                         ▼
//!                  format decision ─────► serve original (stop)
//!                         │
//!                         ▼
//!                  admission control ───► rejected (stop, 503)
//!                         │
//!                         ▼
//!                  transcode ───────────► bytes or error
//! ```
//!
//! Cache validation strictly precedes any transcode decision, and admission
//! is granted strictly before the transcode call begins. Every path through a
//! granted admission releases the slot exactly once, via the guard's drop.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::config::AutoOptimizeConfig;
use crate::error::ServeError;
use crate::etag;
use crate::format::{detect_source, ImageFormat, SourceKind};
use crate::limiter::JobLimiter;
use crate::optimize::{
    negotiate_auto, ClientSupport, EngineStats, Negotiation, ProfileError, ProfileStore,
    Transcoder, TranscodeSpec,
};

// =============================================================================
// Resolution
// =============================================================================

/// Terminal outcome of resolving an asset request.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The client's cached copy is current; respond 304 with no body.
    NotModified { etag: String },

    /// Serve the stored bytes unchanged.
    Original {
        etag: String,
        data: Bytes,
        content_type: &'static str,
    },

    /// Serve freshly transcoded bytes.
    Optimized {
        etag: String,
        data: Bytes,
        format: ImageFormat,
        source_mime: &'static str,
    },
}

impl Resolution {
    /// The cache-identity token, advertised on every asset response.
    pub fn etag(&self) -> &str {
        match self {
            Resolution::NotModified { etag }
            | Resolution::Original { etag, .. }
            | Resolution::Optimized { etag, .. } => etag,
        }
    }
}

// =============================================================================
// Image Service
// =============================================================================

/// Per-request resolver over an originals directory.
///
/// Holds the immutable profile store, the process-wide job limiter, and the
/// transcoding engine. Cheap to clone via the surrounding `Arc`s; handlers
/// receive it through application state.
pub struct ImageService<T: Transcoder> {
    originals_base: PathBuf,
    auto: AutoOptimizeConfig,
    profiles: Arc<ProfileStore>,
    limiter: Arc<JobLimiter>,
    transcoder: Arc<T>,
}

impl<T: Transcoder + 'static> ImageService<T> {
    pub fn new(
        originals_base: PathBuf,
        auto: AutoOptimizeConfig,
        profiles: Arc<ProfileStore>,
        limiter: Arc<JobLimiter>,
        transcoder: Arc<T>,
    ) -> Self {
        Self {
            originals_base,
            auto,
            profiles,
            limiter,
            transcoder,
        }
    }

    /// The job limiter, for telemetry.
    pub fn limiter(&self) -> &Arc<JobLimiter> {
        &self.limiter
    }

    /// Current engine statistics, for telemetry.
    pub fn engine_stats(&self) -> EngineStats {
        self.transcoder.stats()
    }

    // =========================================================================
    // Route Entry Points
    // =========================================================================

    /// Resolve a serve-original request (`GET /o/{path}`).
    pub async fn resolve_original(
        &self,
        asset: &str,
        if_none_match: Option<&str>,
    ) -> Result<Resolution, ServeError> {
        let (full_path, etag) = match self.precheck(asset, if_none_match).await? {
            Precheck::Proceed { full_path, etag } => (full_path, etag),
            Precheck::NotModified(resolution) => return Ok(resolution),
        };

        self.serve_original(&full_path, asset, etag).await
    }

    /// Resolve an auto-optimize request (`GET /a/{path}`).
    pub async fn resolve_auto(
        &self,
        asset: &str,
        accept: Option<&str>,
        if_none_match: Option<&str>,
    ) -> Result<Resolution, ServeError> {
        let (full_path, etag) = match self.precheck(asset, if_none_match).await? {
            Precheck::Proceed { full_path, etag } => (full_path, etag),
            Precheck::NotModified(resolution) => return Ok(resolution),
        };

        if !self.auto.enable {
            return self.serve_original(&full_path, asset, etag).await;
        }

        // Vector sources are deliberately never raster-transcoded, and an
        // unrecognized source has no negotiable target.
        let source = match self.detect(&full_path, asset).await? {
            SourceKind::Raster(format) => format,
            SourceKind::Vector | SourceKind::Unknown => {
                return self.serve_original(&full_path, asset, etag).await;
            }
        };

        let support = accept.map(ClientSupport::from_accept).unwrap_or_default();

        match negotiate_auto(source, support, &self.auto) {
            Negotiation::ServeOriginal => self.serve_original(&full_path, asset, etag).await,
            Negotiation::Transcode { format, quality } => {
                let spec = TranscodeSpec {
                    source: full_path,
                    format,
                    max_width: self.auto.max_width,
                    quality,
                };
                let data = self.run_transcode(spec).await?;
                Ok(Resolution::Optimized {
                    etag,
                    data,
                    format,
                    source_mime: source.mime(),
                })
            }
        }
    }

    /// Resolve a preset-optimize request (`GET /p/{path}?preset=&format=`).
    pub async fn resolve_preset(
        &self,
        asset: &str,
        preset: &str,
        format: &str,
        if_none_match: Option<&str>,
    ) -> Result<Resolution, ServeError> {
        let (full_path, etag) = match self.precheck(asset, if_none_match).await? {
            Precheck::Proceed { full_path, etag } => (full_path, etag),
            Precheck::NotModified(resolution) => return Ok(resolution),
        };

        if preset.is_empty() && format.is_empty() {
            return self.serve_original(&full_path, asset, etag).await;
        }

        let source = self.detect(&full_path, asset).await?;

        let target = if format.is_empty() {
            match source {
                SourceKind::Raster(detected) => detected,
                SourceKind::Vector | SourceKind::Unknown => {
                    return Err(ServeError::UnsupportedFormat(
                        "source format not detectable".to_string(),
                    ));
                }
            }
        } else {
            ImageFormat::parse(format)
                .ok_or_else(|| ServeError::UnsupportedFormat(format.to_string()))?
        };

        let resolved = self.profiles.resolve(preset, target).map_err(|e| match e {
            ProfileError::UnknownPreset(preset) => ServeError::UnknownPreset(preset),
            ProfileError::FormatNotAvailable { preset, format } => {
                ServeError::FormatNotAvailable {
                    preset,
                    format: format.to_string(),
                }
            }
        })?;

        // Unlike auto-optimization, a preset transcode proceeds even when the
        // target format equals the source: the profile's width and quality
        // bounds still apply.
        let spec = TranscodeSpec {
            source: full_path,
            format: target,
            max_width: Some(resolved.max_width),
            quality: resolved.quality,
        };
        let data = self.run_transcode(spec).await?;

        Ok(Resolution::Optimized {
            etag,
            data,
            format: target,
            source_mime: source.mime(),
        })
    }

    // =========================================================================
    // Shared Skeleton
    // =========================================================================

    /// Existence check plus conditional cache validation.
    async fn precheck(
        &self,
        asset: &str,
        if_none_match: Option<&str>,
    ) -> Result<Precheck, ServeError> {
        let full_path = self.asset_path(asset)?;

        let meta = tokio::fs::metadata(&full_path)
            .await
            .map_err(|e| ServeError::from_io(e, asset))?;
        if !meta.is_file() {
            return Err(ServeError::NotFound(asset.to_string()));
        }

        let validation = etag::validate(&full_path, if_none_match)
            .await
            .map_err(|e| ServeError::from_io(e, asset))?;

        if validation.not_modified {
            debug!(asset, etag = %validation.etag, "conditional hit");
            return Ok(Precheck::NotModified(Resolution::NotModified {
                etag: validation.etag,
            }));
        }

        Ok(Precheck::Proceed {
            full_path,
            etag: validation.etag,
        })
    }

    /// Map a URL asset path onto the originals root.
    ///
    /// Rejects absolute paths and any `..` component so a request can never
    /// escape the root; the rejection is indistinguishable from a missing
    /// asset.
    fn asset_path(&self, asset: &str) -> Result<PathBuf, ServeError> {
        let relative = Path::new(asset);
        let traversal = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if asset.is_empty() || traversal {
            return Err(ServeError::NotFound(asset.to_string()));
        }

        Ok(self.originals_base.join(relative))
    }

    async fn detect(&self, full_path: &Path, asset: &str) -> Result<SourceKind, ServeError> {
        detect_source(full_path)
            .await
            .map_err(|e| ServeError::from_io(e, asset))
    }

    async fn serve_original(
        &self,
        full_path: &Path,
        asset: &str,
        etag: String,
    ) -> Result<Resolution, ServeError> {
        let kind = self.detect(full_path, asset).await?;
        let data = tokio::fs::read(full_path)
            .await
            .map_err(|e| ServeError::from_io(e, asset))?;

        Ok(Resolution::Original {
            etag,
            data: Bytes::from(data),
            content_type: kind.mime(),
        })
    }

    /// Admit a job and run the transcode on the blocking pool.
    ///
    /// The admission guard moves into the blocking closure: if the request
    /// future is dropped mid-transcode the job still completes and the slot is
    /// still released when it does.
    async fn run_transcode(&self, spec: TranscodeSpec) -> Result<Bytes, ServeError> {
        let guard = self.limiter.try_admit()?;
        let transcoder = Arc::clone(&self.transcoder);

        let result = tokio::task::spawn_blocking(move || {
            let result = transcoder.transcode(&spec);
            drop(guard);
            result
        })
        .await
        .map_err(|e| ServeError::Io(std::io::Error::other(e)))?;

        Ok(result?)
    }
}

enum Precheck {
    NotModified(Resolution),
    Proceed { full_path: PathBuf, etag: String },
}

// =============================================================================
// Tests
// =============================================================================
