//! Test utilities for integration tests.
//!
//! Provides on-disk image fixtures, router construction helpers, and a
//! controllable mock transcoder for admission-control tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use bytes::Bytes;
use image::{Rgb, RgbImage};

use optimg::config::{
    AutoOptimizeConfig, FormatSettings, PresetConfig, PresetOptimizeConfig,
};
use optimg::{
    create_router, EngineStats, ImageFormat, ImageService, ImageTranscoder, JobLimiter,
    ProfileStore, RouterConfig, Transcoder, TranscodeError, TranscodeSpec,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Write a small PNG gradient under `root`.
pub fn write_png(root: &Path, name: &str, width: u32, height: u32) {
    let mut img = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 64]);
    }
    img.save_with_format(root.join(name), image::ImageFormat::Png)
        .unwrap();
}

/// Write a small JPEG under `root`.
pub fn write_jpeg(root: &Path, name: &str, width: u32, height: u32) {
    let mut img = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([(x % 256) as u8, (y % 256) as u8, 200]);
    }
    img.save_with_format(root.join(name), image::ImageFormat::Jpeg)
        .unwrap();
}

// =============================================================================
// Configuration Builders
// =============================================================================

/// Auto-optimize config with AVIF and WEBP enabled, AVIF first.
pub fn auto_config() -> AutoOptimizeConfig {
    AutoOptimizeConfig {
        enable: true,
        max_width: Some(2000),
        priority: vec![ImageFormat::Avif, ImageFormat::Webp],
        formats: HashMap::from([
            (ImageFormat::Avif, FormatSettings { enabled: true, quality: 60 }),
            (ImageFormat::Webp, FormatSettings { enabled: true, quality: 70 }),
        ]),
    }
}

/// A single "thumb" preset: max_width 16, jpeg@75 and webp@70.
pub fn preset_config() -> PresetOptimizeConfig {
    PresetOptimizeConfig {
        presets: HashMap::from([(
            "thumb".to_string(),
            PresetConfig {
                max_width: 16,
                formats: HashMap::from([
                    (ImageFormat::Jpeg, FormatSettings { enabled: true, quality: 75 }),
                    (ImageFormat::Webp, FormatSettings { enabled: true, quality: 70 }),
                ]),
            },
        )]),
    }
}

// =============================================================================
// Router Builders
// =============================================================================

/// Router over `root` backed by the real image transcoder.
pub fn test_router(root: &Path, job_limit: usize, metrics: bool) -> Router {
    router_with_transcoder(root, job_limit, metrics, Arc::new(ImageTranscoder::new()))
}

/// Router over `root` with an arbitrary transcoder implementation.
pub fn router_with_transcoder<T: Transcoder + 'static>(
    root: &Path,
    job_limit: usize,
    metrics: bool,
    transcoder: Arc<T>,
) -> Router {
    let service = ImageService::new(
        root.to_path_buf(),
        auto_config(),
        Arc::new(ProfileStore::from_config(&preset_config())),
        JobLimiter::new(job_limit),
        transcoder,
    );

    let config = RouterConfig::new().with_metrics(metrics).with_tracing(false);
    create_router(service, config)
}

// =============================================================================
// Mock Transcoder
// =============================================================================

/// A transcoder that sleeps for a fixed duration and returns canned bytes.
///
/// Used to hold an admission slot open long enough for a concurrent request
/// to be rejected.
pub struct SlowTranscoder {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowTranscoder {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for SlowTranscoder {
    fn transcode(&self, _spec: &TranscodeSpec) -> Result<Bytes, TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]))
    }

    fn stats(&self) -> EngineStats {
        EngineStats::default()
    }
}

/// Check whether bytes start with the JPEG SOI marker.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8, 0xFF])
}
