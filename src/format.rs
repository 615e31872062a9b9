//! Image format identification.
//!
//! This module provides the set of output formats the server can produce and
//! magic-byte detection of source assets. Detection reads only a small header
//! prefix; it never decodes pixel data. Currently recognized:
//!
//! - **JPEG**, **PNG**, **WEBP**, **AVIF**: raster formats eligible for transcoding
//! - **SVG**: vector format, always served verbatim

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

// =============================================================================
// ImageFormat
// =============================================================================

/// A raster image format the server can emit.
///
/// This is the fixed supported-format set for explicit `format=` query
/// parameters and for negotiated output formats. Anything outside this set is
/// a client error at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl ImageFormat {
    /// Get the canonical lowercase name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
        }
    }

    /// Get the MIME type for the format.
    pub const fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Avif => "image/avif",
        }
    }

    /// Parse a format literal (e.g. from a `format=` query parameter).
    ///
    /// Returns `None` for anything outside the supported set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "avif" => Some(ImageFormat::Avif),
            _ => None,
        }
    }

    /// Whether the format is outside the universally assumed baseline
    /// (JPEG/PNG) and therefore requires client-declared `Accept` support.
    pub const fn is_non_standard(&self) -> bool {
        matches!(self, ImageFormat::Webp | ImageFormat::Avif)
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Source Detection
// =============================================================================

/// Detected kind of a source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A raster image in one of the supported formats.
    Raster(ImageFormat),

    /// A vector image (SVG). Not eligible for raster transcoding.
    Vector,

    /// Magic bytes did not match any known format.
    Unknown,
}

impl SourceKind {
    /// MIME type to advertise when serving the source verbatim.
    pub const fn mime(&self) -> &'static str {
        match self {
            SourceKind::Raster(format) => format.mime(),
            SourceKind::Vector => "image/svg+xml",
            SourceKind::Unknown => "application/octet-stream",
        }
    }
}

/// Number of bytes read from the head of a file for detection.
///
/// Large enough for the RIFF/ftyp containers and a leading `<?xml` prologue.
const SNIFF_LEN: usize = 64;

/// Detect the format of a source asset from its magic bytes.
///
/// Reads at most [`SNIFF_LEN`] bytes. Unrecognized content yields
/// [`SourceKind::Unknown`], not an error; only I/O failures are errors.
pub async fn detect_source(path: &Path) -> std::io::Result<SourceKind> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = [0u8; SNIFF_LEN];

    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(sniff(&header[..filled]))
}

/// Classify a header prefix.
pub fn sniff(header: &[u8]) -> SourceKind {
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return SourceKind::Raster(ImageFormat::Jpeg);
    }
    if header.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return SourceKind::Raster(ImageFormat::Png);
    }
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        return SourceKind::Raster(ImageFormat::Webp);
    }
    if header.len() >= 12
        && &header[4..8] == b"ftyp"
        && (&header[8..12] == b"avif" || &header[8..12] == b"avis")
    {
        return SourceKind::Raster(ImageFormat::Avif);
    }
    if is_svg(header) {
        return SourceKind::Vector;
    }

    SourceKind::Unknown
}

/// SVG has no magic number; accept an `<svg` root or an XML prologue.
fn is_svg(header: &[u8]) -> bool {
    // Skip a UTF-8 BOM and leading whitespace.
    let mut rest = header.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(header);
    while let Some((first, tail)) = rest.split_first() {
        if first.is_ascii_whitespace() {
            rest = tail;
        } else {
            break;
        }
    }
    rest.starts_with(b"<svg") || rest.starts_with(b"<?xml")
}

// =============================================================================
// Tests
// =============================================================================
