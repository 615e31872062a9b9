//! Conditional cache validation.
//!
//! Content fingerprints are a CRC32 over the asset bytes, computed with a
//! streaming accumulator so large originals are never held in memory. The
//! checksum is deliberately non-cryptographic: an unchanged file always
//! produces the same fingerprint and any byte change produces a different
//! one, but collision resistance is not a goal.
//!
//! The fingerprint is computed fresh on every request and always advertised
//! in the response, even when the request carries no `If-None-Match` header.

use std::path::Path;

use tokio::io::AsyncReadExt;

/// Read buffer size for streaming the file through the checksum.
const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of conditional cache validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValidation {
    /// Fingerprint of the current file content, as 8 lowercase hex digits.
    pub etag: String,

    /// Whether the request may short-circuit to an empty 304 response.
    pub not_modified: bool,
}

/// Compute the content fingerprint for a file.
pub async fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:08x}", hasher.finalize()))
}

/// Validate a request against the current file content.
///
/// Computes the fingerprint unconditionally, then checks it against the
/// request's `If-None-Match` tokens (if any).
pub async fn validate(
    path: &Path,
    if_none_match: Option<&str>,
) -> std::io::Result<CacheValidation> {
    let etag = fingerprint_file(path).await?;
    let not_modified = if_none_match.is_some_and(|header| matches_etag(header, &etag));

    Ok(CacheValidation { etag, not_modified })
}

/// Check whether any token in an `If-None-Match` header matches a fingerprint.
///
/// Tokens are comma-separated; each is trimmed of surrounding whitespace and
/// then of surrounding quotes before comparison.
pub fn matches_etag(header: &str, etag: &str) -> bool {
    header
        .split(',')
        .map(|tag| tag.trim().trim_matches('"'))
        .any(|tag| tag == etag)
}

// =============================================================================
// Tests
// =============================================================================
