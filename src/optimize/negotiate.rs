//! Output-format negotiation for auto-optimized requests.
//!
//! One negotiation function covers every `Accept`-driven decision; the preset
//! route resolves its format against the profile store instead and never goes
//! through here.

use crate::config::AutoOptimizeConfig;
use crate::format::ImageFormat;

use super::accept::ClientSupport;

/// Outcome of format negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// No eligible target differs from the source; serve the stored bytes.
    ServeOriginal,

    /// Transcode into `format` at `quality`.
    Transcode { format: ImageFormat, quality: u8 },
}

/// Decide the output format for an auto-optimized request.
///
/// Non-standard candidates are tried in the configured priority order; a
/// candidate is eligible when the client declared support for it and its
/// format entry is enabled. With no eligible non-standard candidate, baseline
/// formats are considered: PNG sources prefer PNG then JPEG, everything else
/// prefers JPEG then PNG. A chosen format equal to the source format means no
/// transcode is needed.
pub fn negotiate_auto(
    source: ImageFormat,
    support: ClientSupport,
    config: &AutoOptimizeConfig,
) -> Negotiation {
    let candidate = config
        .priority
        .iter()
        .copied()
        .filter(|format| support.supports(*format))
        .find_map(|format| {
            config
                .enabled_format(format)
                .map(|settings| (format, settings.quality))
        })
        .or_else(|| {
            let baseline = if source == ImageFormat::Png {
                [ImageFormat::Png, ImageFormat::Jpeg]
            } else {
                [ImageFormat::Jpeg, ImageFormat::Png]
            };
            baseline.into_iter().find_map(|format| {
                config
                    .enabled_format(format)
                    .map(|settings| (format, settings.quality))
            })
        });

    match candidate {
        Some((format, _)) if format == source => Negotiation::ServeOriginal,
        Some((format, quality)) => Negotiation::Transcode { format, quality },
        None => Negotiation::ServeOriginal,
    }
}

// =============================================================================
// Tests
// =============================================================================
