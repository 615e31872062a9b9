//! Named optimization profiles for preset-style requests.
//!
//! The store is populated once at startup from validated configuration and is
//! read-only afterwards, so it can be shared across handlers without locking.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::PresetOptimizeConfig;
use crate::format::ImageFormat;

/// A resolved {preset, format} pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub quality: u8,
    pub max_width: u32,
}

/// Lookup failures. Both are client-visible rejections, not server errors,
/// and they surface as distinct 400 reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("unknown preset: {0:?}")]
    UnknownPreset(String),

    #[error("preset {preset:?} has no enabled {format} entry")]
    FormatNotAvailable { preset: String, format: ImageFormat },
}

/// Immutable lookup from profile id and target format to output settings.
#[derive(Debug, Default)]
pub struct ProfileStore {
    presets: HashMap<String, Preset>,
}

#[derive(Debug)]
struct Preset {
    max_width: u32,
    // quality per enabled format; disabled entries are dropped at build time
    formats: HashMap<ImageFormat, u8>,
}

impl ProfileStore {
    /// Build the store from configuration. Disabled format entries behave as
    /// absent from here on.
    pub fn from_config(config: &PresetOptimizeConfig) -> Self {
        let presets = config
            .presets
            .iter()
            .map(|(name, preset)| {
                let formats = preset
                    .formats
                    .iter()
                    .filter(|(_, settings)| settings.enabled)
                    .map(|(format, settings)| (*format, settings.quality))
                    .collect();
                (
                    name.clone(),
                    Preset {
                        max_width: preset.max_width,
                        formats,
                    },
                )
            })
            .collect();

        Self { presets }
    }

    /// Resolve a {preset, format} pair to output settings.
    pub fn resolve(
        &self,
        preset_id: &str,
        format: ImageFormat,
    ) -> Result<ResolvedProfile, ProfileError> {
        let preset = self
            .presets
            .get(preset_id)
            .ok_or_else(|| ProfileError::UnknownPreset(preset_id.to_string()))?;

        let quality = preset.formats.get(&format).copied().ok_or_else(|| {
            ProfileError::FormatNotAvailable {
                preset: preset_id.to_string(),
                format,
            }
        })?;

        Ok(ResolvedProfile {
            quality,
            max_width: preset.max_width,
        })
    }

    /// Number of configured presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Whether no presets are configured.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
