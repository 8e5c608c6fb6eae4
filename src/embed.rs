//! Watermark embedding.
//!
//! Every repetition writes the full payload bit vector into its carrier
//! pixels. A 1 bit sets the blue channel to `reference + strength`, a 0 bit
//! to `reference - strength`, where the reference is the rounded local mean
//! from [`CarrierLayout::reference`]. The extractor reads the sign of the
//! deviation from the exact mean back.

use crate::codec::{self, RawImage};
use crate::config::WatermarkConfig;
use crate::error::Result;
use crate::layout::{CarrierLayout, EMBED_CHANNEL};
use crate::payload::WatermarkPayload;

/// Embed `payload` into a decoded buffer in place.
///
/// The capacity check runs before any pixel is touched, so on error `raw` is
/// unchanged.
///
/// # Errors
///
/// - [`Error::InvalidConfig`](crate::Error::InvalidConfig) if `config` fails validation.
/// - [`Error::ImageTooSmall`](crate::Error::ImageTooSmall) if the image cannot
///   hold every repetition.
pub fn embed_raw(
    raw: &mut RawImage,
    payload: &WatermarkPayload,
    config: &WatermarkConfig,
) -> Result<()> {
    config.validate()?;
    let layout = CarrierLayout::new(raw.width, raw.height, &config.secret_key, config.repetitions)?;
    let bits = payload.to_bits();
    let strength = config.strength;

    for carriers in layout.repetitions() {
        for (&pixel, &bit) in carriers.iter().zip(&bits) {
            let reference = layout.reference(raw, pixel, strength).value();
            let value = if bit == 1 {
                reference + strength
            } else {
                reference - strength
            };
            raw.set_channel(pixel, EMBED_CHANNEL, value);
        }
    }

    tracing::debug!(
        width = raw.width,
        height = raw.height,
        repetitions = config.repetitions,
        strength,
        "Embedded forensic watermark"
    );
    Ok(())
}

/// Decode `image_bytes`, embed `payload` and re-encode without alpha.
///
/// The output format and JPEG quality come from `config`. Only
/// [`OutputFormat::Png`](crate::OutputFormat::Png) output keeps the payload
/// recoverable: JPEG compression at any usual quality erases perturbations
/// of a few levels on single pixels, and [`extract_watermark`] then returns
/// `None`.
///
/// [`extract_watermark`]: crate::extract_watermark
///
/// # Errors
///
/// - [`Error::Image`](crate::Error::Image) if the input cannot be decoded or
///   the output cannot be encoded.
/// - Everything [`embed_raw`] returns.
pub fn embed_watermark(
    image_bytes: &[u8],
    payload: &WatermarkPayload,
    config: &WatermarkConfig,
) -> Result<Vec<u8>> {
    let mut raw = codec::decode_rgba(image_bytes)?;
    embed_raw(&mut raw, payload, config)?;
    codec::encode(&raw, config.output_format, config.output_quality)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::RgbaImage;

    use super::*;
    use crate::error::Error;

    fn flat(width: u32, height: u32, value: u8) -> RawImage {
        RawImage::from_rgba(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([value, value, value, 255]),
        ))
    }

    #[test]
    fn only_carrier_blue_channels_change() {
        let config = WatermarkConfig::default();
        let original = flat(100, 100, 120);
        let mut raw = original.clone();
        embed_raw(&mut raw, &WatermarkPayload::new("v", 1, "s"), &config).unwrap();

        let layout = CarrierLayout::new(100, 100, &config.secret_key, config.repetitions).unwrap();
        for pixel in 0..raw.pixel_count() {
            for ch in 0..4 {
                let before = original.channel(pixel, ch);
                let after = raw.channel(pixel, ch);
                if ch == EMBED_CHANNEL && layout.is_carrier(pixel) {
                    assert_eq!(i32::from(after).abs_diff(120), 3);
                } else {
                    assert_eq!(before, after, "pixel {pixel} ch {ch} changed");
                }
            }
        }
    }

    #[test]
    fn writes_reference_plus_or_minus_strength() {
        let config = WatermarkConfig {
            strength: 5,
            repetitions: 3,
            ..WatermarkConfig::default()
        };
        let payload = WatermarkPayload::new("viewer", 42, "shot");
        let bits = payload.to_bits();
        let mut raw = flat(64, 64, 200);
        embed_raw(&mut raw, &payload, &config).unwrap();

        let layout = CarrierLayout::new(64, 64, &config.secret_key, 3).unwrap();
        for carriers in layout.repetitions() {
            for (&pixel, &bit) in carriers.iter().zip(&bits) {
                let reference = layout.reference(&raw, pixel, 5).value();
                let expected = if bit == 1 { reference + 5 } else { reference - 5 };
                assert_eq!(raw.channel(pixel, EMBED_CHANNEL), expected);
            }
        }
    }

    #[test]
    fn saturated_images_still_move_both_ways() {
        let config = WatermarkConfig::default();
        let mut raw = flat(100, 100, 255);
        embed_raw(&mut raw, &WatermarkPayload::new("v", u64::MAX, "s"), &config).unwrap();
        let values: Vec<u8> = (0..raw.pixel_count())
            .map(|p| raw.channel(p, EMBED_CHANNEL))
            .collect();
        assert!(values.contains(&255));
        assert!(values.contains(&249));
    }

    #[test]
    fn too_small_image_is_left_untouched() {
        let original = flat(50, 50, 77);
        let mut raw = original.clone();
        let err = embed_raw(
            &mut raw,
            &WatermarkPayload::new("v", 1, "s"),
            &WatermarkConfig::default(),
        );
        assert_matches!(err, Err(Error::ImageTooSmall { required: 2800, .. }));
        assert_eq!(raw, original);
    }

    #[test]
    fn invalid_config_is_rejected_before_mutation() {
        let config = WatermarkConfig {
            strength: 0,
            ..WatermarkConfig::default()
        };
        let mut raw = flat(100, 100, 10);
        assert_matches!(
            embed_raw(&mut raw, &WatermarkPayload::new("v", 1, "s"), &config),
            Err(Error::InvalidConfig(_))
        );
    }
}
