//! The transcoding engine seam.
//!
//! The request pipeline consumes transcoding as an opaque capability behind
//! the [`Transcoder`] trait: hand it a [`TranscodeSpec`], get encoded bytes or
//! an error. The production implementation is [`ImageTranscoder`], built on
//! the `image` crate; tests substitute their own implementations.
//!
//! Transcoding is CPU-bound and must run under `spawn_blocking`; the trait is
//! deliberately synchronous.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use thiserror::Error;

use crate::format::ImageFormat;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

// =============================================================================
// Spec and Errors
// =============================================================================

/// Everything needed to produce one transcoded output.
///
/// Constructed per request, consumed once, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSpec {
    /// Absolute path of the source asset.
    pub source: PathBuf,

    /// Output format.
    pub format: ImageFormat,

    /// Bound on output width; wider sources are downscaled preserving aspect
    /// ratio.
    pub max_width: Option<u32>,

    /// Output quality (1-100). Ignored by lossless codecs.
    pub quality: u8,
}

/// Failures of the transcoding engine.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The input format cannot be decoded by this engine.
    #[error("unsupported source format: {0}")]
    UnsupportedSource(String),

    /// The source bytes are malformed or corrupt.
    #[error("failed to decode source image: {0}")]
    Decode(String),

    #[error("failed to encode {format} output: {message}")]
    Encode { format: ImageFormat, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Engine Statistics
// =============================================================================

/// Point-in-time memory and file-handle statistics of the engine.
///
/// Exposed on `/metrics` for operational telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Bytes of decoded pixel buffers currently in flight.
    pub mem: u64,

    /// High-water mark of `mem`.
    pub mem_high: u64,

    /// Source files currently open for reading.
    pub files: u64,

    /// Total pixel buffers allocated since startup.
    pub allocs: u64,
}

// =============================================================================
// Transcoder Trait
// =============================================================================

/// An opaque transcoding capability.
pub trait Transcoder: Send + Sync {
    /// Produce the encoded output described by `spec`.
    fn transcode(&self, spec: &TranscodeSpec) -> Result<Bytes, TranscodeError>;

    /// Current engine statistics.
    fn stats(&self) -> EngineStats;
}

// =============================================================================
// Image-crate Engine
// =============================================================================

/// Production transcoder backed by the `image` crate.
///
/// Pipeline: read source, decode, optional width-bounded Lanczos3 downscale,
/// encode at the requested quality. JPEG output drops any alpha channel;
/// WEBP output is lossless (the codec ignores the quality setting).
#[derive(Debug, Default)]
pub struct ImageTranscoder {
    mem: AtomicU64,
    mem_high: AtomicU64,
    files: AtomicU64,
    allocs: AtomicU64,
}

impl ImageTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_source(&self, spec: &TranscodeSpec) -> Result<Vec<u8>, TranscodeError> {
        self.files.fetch_add(1, Ordering::Relaxed);
        let result = std::fs::read(&spec.source);
        self.files.fetch_sub(1, Ordering::Relaxed);
        Ok(result?)
    }

    fn decode(&self, raw: &[u8]) -> Result<DynamicImage, TranscodeError> {
        let reader = ImageReader::new(Cursor::new(raw))
            .with_guessed_format()
            .map_err(TranscodeError::Io)?;

        let Some(format) = reader.format() else {
            return Err(TranscodeError::UnsupportedSource(
                "unrecognized image data".to_string(),
            ));
        };

        reader.decode().map_err(|e| match e {
            image::ImageError::Unsupported(e) => {
                TranscodeError::UnsupportedSource(e.to_string())
            }
            other => TranscodeError::Decode(format!("{format:?}: {other}")),
        })
    }

    fn encode(&self, img: &DynamicImage, spec: &TranscodeSpec) -> Result<Bytes, TranscodeError> {
        let encode_err = |e: image::ImageError| TranscodeError::Encode {
            format: spec.format,
            message: e.to_string(),
        };

        let mut out = Vec::new();
        match spec.format {
            ImageFormat::Jpeg => {
                let rgb = img.to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut out, spec.quality);
                rgb.write_with_encoder(encoder).map_err(encode_err)?;
            }
            ImageFormat::Png => {
                img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
                    .map_err(encode_err)?;
            }
            ImageFormat::Webp => {
                img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::WebP)
                    .map_err(encode_err)?;
            }
            ImageFormat::Avif => {
                let rgba = img.to_rgba8();
                let encoder =
                    AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, spec.quality);
                rgba.write_with_encoder(encoder).map_err(encode_err)?;
            }
        }

        Ok(Bytes::from(out))
    }
}

impl Transcoder for ImageTranscoder {
    fn transcode(&self, spec: &TranscodeSpec) -> Result<Bytes, TranscodeError> {
        let raw = self.read_source(spec)?;
        let mut img = self.decode(&raw)?;
        drop(raw);

        if let Some(max_width) = spec.max_width {
            if img.width() > max_width {
                let height = scaled_height(img.width(), img.height(), max_width);
                img = img.resize_exact(max_width, height, FilterType::Lanczos3);
            }
        }

        let pixel_bytes = img.as_bytes().len() as u64;
        self.allocs.fetch_add(1, Ordering::Relaxed);
        let in_flight = self.mem.fetch_add(pixel_bytes, Ordering::Relaxed) + pixel_bytes;
        self.mem_high.fetch_max(in_flight, Ordering::Relaxed);

        let result = self.encode(&img, spec);
        self.mem.fetch_sub(pixel_bytes, Ordering::Relaxed);
        result
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            mem: self.mem.load(Ordering::Relaxed),
            mem_high: self.mem_high.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            allocs: self.allocs.load(Ordering::Relaxed),
        }
    }
}

/// Height preserving the aspect ratio at the bounded width, never zero.
fn scaled_height(width: u32, height: u32, max_width: u32) -> u32 {
    let scaled = (height as u64 * max_width as u64) / width as u64;
    (scaled as u32).max(1)
}

// =============================================================================
// Tests
// =============================================================================
