//! Capacity arithmetic.
//!
//! An image can carry a watermark when it has at least one pixel per payload
//! bit per repetition. This is the only capacity constraint.

use crate::config::WatermarkConfig;
use crate::payload::PAYLOAD_BIT_LENGTH;

/// Length in bits of one encoded payload copy.
///
/// Constant for every payload and configuration.
#[must_use]
pub const fn payload_bit_length() -> usize {
    PAYLOAD_BIT_LENGTH
}

/// Pixels needed to embed every repetition under `config`.
#[must_use]
pub fn required_pixel_count(config: &WatermarkConfig) -> usize {
    PAYLOAD_BIT_LENGTH.saturating_mul(config.repetitions)
}

/// Whether a `width` x `height` image can carry a watermark under `config`.
#[must_use]
pub fn has_watermark_capacity(width: u32, height: u32, config: &WatermarkConfig) -> bool {
    width as usize * height as usize >= required_pixel_count(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_needs_2800_pixels() {
        assert_eq!(required_pixel_count(&WatermarkConfig::default()), 2800);
    }

    #[test]
    fn capacity_boundary() {
        let config = WatermarkConfig {
            repetitions: 3,
            ..WatermarkConfig::default()
        };
        // 1200 pixels exactly.
        assert!(has_watermark_capacity(40, 30, &config));
        // 1199 pixels.
        assert!(!has_watermark_capacity(11, 109, &config));
    }

    #[test]
    fn default_scenarios() {
        let config = WatermarkConfig::default();
        assert!(has_watermark_capacity(100, 100, &config));
        assert!(!has_watermark_capacity(50, 50, &config));
        assert!(!has_watermark_capacity(0, 0, &config));
    }
}
