//! Client capability detection from the `Accept` header.

/// Non-standard formats a client declares support for via `Accept`.
///
/// JPEG and PNG are the universally assumed baseline and are not tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientSupport {
    pub webp: bool,
    pub avif: bool,
}

impl ClientSupport {
    /// Derive support flags from a raw `Accept` header value.
    ///
    /// Media types are split on `,`, `;`-parameters are stripped, and the
    /// subtype is matched against the known non-standard subtypes. Entries
    /// without a `/` are ignored; an empty or garbage header simply yields no
    /// support, never an error.
    pub fn from_accept(header: &str) -> Self {
        let mut support = ClientSupport::default();

        for media_type in header.split(',') {
            let media_type = media_type.split(';').next().unwrap_or(media_type);
            let Some((_, subtype)) = media_type.split_once('/') else {
                continue;
            };

            match subtype {
                "webp" => support.webp = true,
                "avif" => support.avif = true,
                _ => {}
            }
        }

        support
    }

    /// Whether the client declared support for the given format.
    ///
    /// Baseline formats are always supported.
    pub fn supports(&self, format: crate::format::ImageFormat) -> bool {
        use crate::format::ImageFormat;
        match format {
            ImageFormat::Webp => self.webp,
            ImageFormat::Avif => self.avif,
            ImageFormat::Jpeg | ImageFormat::Png => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
