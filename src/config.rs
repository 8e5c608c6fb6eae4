//! Watermark configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Secret key used when none is configured.
pub const DEFAULT_SECRET_KEY: &str = "guardian-view-forensic-wm-v1";
/// Default per-pixel perturbation.
pub const DEFAULT_STRENGTH: u8 = 3;
/// Default number of payload copies.
pub const DEFAULT_REPETITIONS: usize = 7;
/// Default JPEG quality.
pub const DEFAULT_OUTPUT_QUALITY: u8 = 90;
/// Default share of a repetition's carriers that must read back exactly.
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.8;

/// Largest strength that keeps `reference ± strength` inside `0..=255`.
pub const MAX_STRENGTH: u8 = 127;

/// Encoding of the watermarked output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy JPEG at [`WatermarkConfig::output_quality`].
    #[default]
    Jpeg,
    /// Lossless PNG; the watermark survives bit-exactly.
    Png,
}

/// Tunable watermark parameters.
///
/// Embedder and extractor must use the same `secret_key` and `repetitions`.
/// Unknown fields are rejected and missing ones take their defaults when
/// deserializing.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct WatermarkConfig {
    /// Seeds every position derivation.
    pub secret_key: String,
    /// Magnitude of the per-pixel perturbation (1-127).
    pub strength: u8,
    /// Independent copies of the payload, combined by majority vote.
    pub repetitions: usize,
    /// JPEG quality (1-100).
    pub output_quality: u8,
    /// Output encoding.
    pub output_format: OutputFormat,
    /// Share of a repetition's carriers (0.0-1.0) that must sit exactly
    /// `strength` from their reference and agree with the majority decode
    /// for the repetition to count as intact. A watermark is found when a
    /// strict majority of repetitions is intact.
    pub detection_threshold: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            strength: DEFAULT_STRENGTH,
            repetitions: DEFAULT_REPETITIONS,
            output_quality: DEFAULT_OUTPUT_QUALITY,
            output_format: OutputFormat::default(),
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
        }
    }
}

impl fmt::Debug for WatermarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatermarkConfig")
            .field("secret_key", &"<redacted>")
            .field("strength", &self.strength)
            .field("repetitions", &self.repetitions)
            .field("output_quality", &self.output_quality)
            .field("output_format", &self.output_format)
            .field("detection_threshold", &self.detection_threshold)
            .finish()
    }
}

impl WatermarkConfig {
    /// Default configuration with a different secret key.
    pub fn with_secret_key(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    /// Check that every parameter is in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_STRENGTH).contains(&self.strength) {
            return Err(Error::InvalidConfig(format!(
                "strength must be between 1 and {MAX_STRENGTH}, got {}",
                self.strength
            )));
        }
        if self.repetitions == 0 {
            return Err(Error::InvalidConfig(
                "repetitions must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidConfig(format!(
                "output quality must be between 1 and 100, got {}",
                self.output_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            return Err(Error::InvalidConfig(format!(
                "detection threshold must be between 0.0 and 1.0, got {}",
                self.detection_threshold
            )));
        }
        Ok(())
    }
}
