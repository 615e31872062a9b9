//! Configuration management for optimg.
//!
//! Configuration comes from a YAML file (default `config.yaml`) merged with
//! `OPTIMG_`-prefixed environment variables; the CLI only selects the file
//! and the log verbosity.
//!
//! # Example
//!
//! ```yaml
//! bind:
//!   host: 0.0.0.0
//!   port: 8000
//! originals_base: /srv/images
//! metrics: true
//! job_limit: 4
//! auto_optimize:
//!   enable: true
//!   max_width: 2000
//!   priority: [avif, webp]
//!   formats:
//!     avif: { enabled: true, quality: 60 }
//!     webp: { enabled: true, quality: 70 }
//! preset_optimize:
//!   presets:
//!     thumb:
//!       max_width: 300
//!       formats:
//!         jpeg: { quality: 75 }
//!         webp: { quality: 70 }
//! ```
//!
//! Environment overrides use `__` as a section separator, e.g.
//! `OPTIMG_BIND__PORT=9000` or `OPTIMG_JOB_LIMIT=8`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;

use crate::format::ImageFormat;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default `Cache-Control` max-age in seconds (1 day).
pub const DEFAULT_MAX_AGE: u64 = 86400;

/// Default `Cache-Control` stale-while-revalidate window in seconds (2 hours).
pub const DEFAULT_STALE_WHILE_REVALIDATE: u64 = 7200;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "OPTIMG_";

// =============================================================================
// CLI Arguments
// =============================================================================

/// optimg - An HTTP image delivery server.
///
/// Serves stored original images verbatim or transcoded into a
/// bandwidth-efficient format and size, negotiated per request.
#[derive(Parser, Debug, Clone)]
#[command(name = "optimg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml", env = "OPTIMG_CONFIG")]
    pub config: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Configuration Types
// =============================================================================

/// TLS material for the listener.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Listener address configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BindConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// When present, the listener terminates TLS itself.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: None,
        }
    }
}

impl BindConfig {
    /// Get the bind address as "host:port".
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Override for the `Cache-Control` header advertised to browsers.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BrowserTtlConfig {
    pub max_age: u64,
    pub stale_while_revalidate: u64,
}

/// Per-format output settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FormatSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub quality: u8,
}

/// Settings for the `Accept`-driven auto-optimization route.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoOptimizeConfig {
    pub enable: bool,

    /// Upper bound on output width in pixels; larger sources are downscaled.
    #[serde(default)]
    pub max_width: Option<u32>,

    /// Preference order for non-standard target formats. First format both
    /// enabled here and declared supported by the client wins.
    #[serde(default = "default_priority")]
    pub priority: Vec<ImageFormat>,

    /// Target formats keyed by name. Absent formats are never produced.
    #[serde(default)]
    pub formats: HashMap<ImageFormat, FormatSettings>,
}

impl Default for AutoOptimizeConfig {
    fn default() -> Self {
        Self {
            enable: false,
            max_width: None,
            priority: default_priority(),
            formats: HashMap::new(),
        }
    }
}

impl AutoOptimizeConfig {
    /// Settings for a format, if configured and enabled.
    pub fn enabled_format(&self, format: ImageFormat) -> Option<&FormatSettings> {
        self.formats.get(&format).filter(|settings| settings.enabled)
    }
}

/// A named optimization profile for the preset route.
#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    /// Upper bound on output width in pixels.
    pub max_width: u32,

    /// Output formats this preset may produce.
    pub formats: HashMap<ImageFormat, FormatSettings>,
}

/// Settings for the preset-optimization route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetOptimizeConfig {
    #[serde(default)]
    pub presets: HashMap<String, PresetConfig>,
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bind: BindConfig,

    /// Root directory containing the original image assets.
    pub originals_base: PathBuf,

    /// Expose the Prometheus `/metrics` endpoint.
    #[serde(default)]
    pub metrics: bool,

    /// Maximum concurrent transcode jobs (0 = unbounded).
    #[serde(default)]
    pub job_limit: usize,

    /// Browser cache TTL override.
    #[serde(default)]
    pub browser_ttl: Option<BrowserTtlConfig>,

    #[serde(default)]
    pub auto_optimize: AutoOptimizeConfig,

    #[serde(default)]
    pub preset_optimize: PresetOptimizeConfig,
}

impl Config {
    /// Load configuration from a YAML file merged with environment overrides.
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.originals_base.is_dir() {
            return Err(format!(
                "originals_base {:?} is not a directory",
                self.originals_base
            ));
        }

        if let Some(ref tls) = self.bind.tls {
            if !tls.cert_file.is_file() {
                return Err(format!("TLS cert_file {:?} not found", tls.cert_file));
            }
            if !tls.key_file.is_file() {
                return Err(format!("TLS key_file {:?} not found", tls.key_file));
            }
        }

        for format in &self.auto_optimize.priority {
            if !format.is_non_standard() {
                return Err(format!(
                    "auto_optimize.priority may only contain non-standard formats, got {format}"
                ));
            }
        }

        for (format, settings) in &self.auto_optimize.formats {
            validate_quality(settings.quality)
                .map_err(|e| format!("auto_optimize.formats.{format}: {e}"))?;
        }

        for (name, preset) in &self.preset_optimize.presets {
            if preset.max_width == 0 {
                return Err(format!("preset {name:?}: max_width must be greater than 0"));
            }
            for (format, settings) in &preset.formats {
                validate_quality(settings.quality)
                    .map_err(|e| format!("preset {name:?} format {format}: {e}"))?;
            }
        }

        Ok(())
    }

    /// Effective `Cache-Control` TTLs as (max-age, stale-while-revalidate).
    pub fn browser_ttl(&self) -> (u64, u64) {
        match self.browser_ttl {
            Some(ttl) => (ttl.max_age, ttl.stale_while_revalidate),
            None => (DEFAULT_MAX_AGE, DEFAULT_STALE_WHILE_REVALIDATE),
        }
    }
}

fn validate_quality(quality: u8) -> Result<(), String> {
    if quality == 0 || quality > 100 {
        return Err(format!("quality must be between 1 and 100, got {quality}"));
    }
    Ok(())
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_priority() -> Vec<ImageFormat> {
    vec![ImageFormat::Avif, ImageFormat::Webp]
}

// =============================================================================
// Tests
// =============================================================================
