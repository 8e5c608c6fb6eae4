//! Watermark extraction by majority vote.
//!
//! The extractor rebuilds the carrier layout from the secret key, reads the
//! deviation of every carrier from its reference, and lets each repetition
//! vote on each bit:
//!
//! - deviation > 0 votes 1
//! - deviation < 0 votes 0
//! - deviation = 0 abstains
//!
//! A bit is 1 only when ones strictly outnumber zeros.
//!
//! Presence is decided per repetition. A repetition is intact when, at or
//! above the detection threshold, both of these hold:
//!
//! - the fraction of its carriers sitting exactly `strength` away from their
//!   reference (saturated carriers are skipped)
//! - the fraction of its votes that agree with the majority-decoded bits
//!
//! A watermark is detected when a strict majority of the configured
//! repetitions is intact. Outvoted repetitions therefore never mask a
//! correct decode, and an unmarked image, whose carriers land exactly on
//! `reference ± strength` only by chance, has no intact repetitions.

use crate::capacity::has_watermark_capacity;
use crate::codec::{self, RawImage};
use crate::config::WatermarkConfig;
use crate::error::Result;
use crate::layout::{CarrierLayout, EMBED_CHANNEL};
use crate::payload::{WatermarkPayload, PAYLOAD_BIT_LENGTH};

/// Outcome of reading a watermark from an image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Payload decoded from the majority-voted bits.
    ///
    /// Meaningless when `detected` is false.
    pub payload: WatermarkPayload,
    /// Fraction of repetitions that are intact, in `[0, 1]`.
    pub confidence: f32,
    /// Whether a strict majority of repetitions is intact.
    pub detected: bool,
    /// Repetitions that were read.
    pub repetitions: usize,
    /// Repetitions that carry an exact, majority-agreeing copy.
    pub intact_repetitions: usize,
}

/// One carrier as seen by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reading {
    vote: Option<u8>,
    /// `None` when the observed value is saturated.
    exact: Option<bool>,
}

impl Reading {
    fn take(layout: &CarrierLayout, raw: &RawImage, pixel: usize, strength: u8) -> Self {
        let reference = layout.reference(raw, pixel, strength);
        let observed = raw.channel(pixel, EMBED_CHANNEL);
        let vote = match reference.deviation(observed).signum() {
            1 => Some(1),
            -1 => Some(0),
            _ => None,
        };
        let exact = (observed != 0 && observed != u8::MAX)
            .then(|| observed.abs_diff(reference.value()) == strength);
        Self { vote, exact }
    }
}

/// Per-bit vote counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    ones: usize,
    zeros: usize,
}

impl Tally {
    fn record(&mut self, vote: Option<u8>) {
        match vote {
            Some(1) => self.ones += 1,
            Some(_) => self.zeros += 1,
            None => {}
        }
    }

    fn bit(self) -> u8 {
        u8::from(self.ones > self.zeros)
    }
}

/// How well one repetition supports the decoded bits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RepetitionScore {
    exact_rate: f32,
    agreement: f32,
}

impl RepetitionScore {
    #[allow(clippy::cast_precision_loss)]
    fn new(readings: &[Reading], bits: &[u8]) -> Self {
        let (hits, evidence) = readings
            .iter()
            .filter_map(|r| r.exact)
            .fold((0usize, 0usize), |(h, n), exact| (h + usize::from(exact), n + 1));
        let agreeing = readings
            .iter()
            .zip(bits)
            .filter(|&(r, &bit)| r.vote == Some(bit))
            .count();

        let exact_rate = if evidence == 0 {
            0.0
        } else {
            hits as f32 / evidence as f32
        };
        let agreement = if bits.is_empty() {
            0.0
        } else {
            agreeing as f32 / bits.len() as f32
        };
        Self {
            exact_rate,
            agreement,
        }
    }

    fn is_intact(self, threshold: f32) -> bool {
        self.exact_rate >= threshold && self.agreement >= threshold
    }
}

/// Majority-vote each bit across repetitions.
fn resolve(readings: &[Vec<Reading>]) -> Vec<u8> {
    let mut tallies = vec![Tally::default(); PAYLOAD_BIT_LENGTH];
    for repetition in readings {
        for (tally, reading) in tallies.iter_mut().zip(repetition) {
            tally.record(reading.vote);
        }
    }
    tallies.iter().map(|t| t.bit()).collect()
}

/// Read the watermark from a decoded buffer.
///
/// Returns `Ok(None)` when the image cannot hold every configured
/// repetition, since no embed could have succeeded on it.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if `config`
/// fails validation.
pub fn detect_raw(raw: &RawImage, config: &WatermarkConfig) -> Result<Option<Detection>> {
    config.validate()?;
    if !has_watermark_capacity(raw.width, raw.height, config) {
        tracing::debug!(
            width = raw.width,
            height = raw.height,
            repetitions = config.repetitions,
            "Image too small to carry a watermark"
        );
        return Ok(None);
    }

    let layout = CarrierLayout::new(raw.width, raw.height, &config.secret_key, config.repetitions)?;
    let readings: Vec<Vec<Reading>> = layout
        .repetitions()
        .iter()
        .map(|carriers| {
            carriers
                .iter()
                .map(|&pixel| Reading::take(&layout, raw, pixel, config.strength))
                .collect()
        })
        .collect();

    let bits = resolve(&readings);
    let intact_repetitions = readings
        .iter()
        .filter(|r| RepetitionScore::new(r, &bits).is_intact(config.detection_threshold))
        .count();

    let repetitions = config.repetitions;
    #[allow(clippy::cast_precision_loss)]
    let confidence = intact_repetitions as f32 / repetitions as f32;
    let detected = intact_repetitions * 2 > repetitions;
    tracing::debug!(
        width = raw.width,
        height = raw.height,
        repetitions,
        intact_repetitions,
        detected,
        "Watermark scan complete"
    );

    Ok(Some(Detection {
        payload: WatermarkPayload::from_bits(&bits),
        confidence,
        detected,
        repetitions,
        intact_repetitions,
    }))
}

/// Decode `image_bytes` and read the watermark.
///
/// # Errors
///
/// Returns [`Error::Image`](crate::Error::Image) if the bytes cannot be
/// decoded, or anything [`detect_raw`] returns.
pub fn detect_watermark(image_bytes: &[u8], config: &WatermarkConfig) -> Result<Option<Detection>> {
    let raw = codec::decode_rgba(image_bytes)?;
    detect_raw(&raw, config)
}

/// The embedded payload, or `None` if no watermark is found under `config`.
///
/// # Errors
///
/// See [`detect_watermark`].
pub fn extract_watermark(
    image_bytes: &[u8],
    config: &WatermarkConfig,
) -> Result<Option<WatermarkPayload>> {
    Ok(detect_watermark(image_bytes, config)?
        .filter(|d| d.detected)
        .map(|d| d.payload))
}

/// Whether the image carries a watermark under `config`.
///
/// # Errors
///
/// See [`detect_watermark`].
pub fn has_watermark(image_bytes: &[u8], config: &WatermarkConfig) -> Result<bool> {
    Ok(detect_watermark(image_bytes, config)?.is_some_and(|d| d.detected))
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use super::*;
    use crate::embed::embed_raw;

    fn textured(width: u32, height: u32) -> RawImage {
        #[allow(clippy::cast_possible_truncation)]
        let img = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 2) as u8, (y * 2) as u8, ((x * 7 + y * 3) % 256) as u8, 255])
        });
        RawImage::from_rgba(img)
    }

    fn reading(vote: Option<u8>, exact: Option<bool>) -> Reading {
        Reading { vote, exact }
    }

    #[test]
    fn tally_majority_and_abstention() {
        let mut t = Tally::default();
        t.record(Some(1));
        t.record(Some(0));
        t.record(None);
        assert_eq!(t.bit(), 0, "ties resolve to 0");
        t.record(Some(1));
        assert_eq!(t.bit(), 1);
    }

    #[test]
    fn repetition_score_skips_saturated_carriers() {
        let readings = [
            reading(Some(1), Some(true)),
            reading(Some(0), None),
            reading(Some(0), Some(false)),
            reading(None, Some(true)),
        ];
        let score = RepetitionScore::new(&readings, &[1, 0, 1, 0]);
        assert!((score.exact_rate - 2.0 / 3.0).abs() < 1e-6);
        assert!((score.agreement - 0.5).abs() < 1e-6);
        assert!(!score.is_intact(0.8));
        assert!(score.is_intact(0.5));
    }

    #[test]
    fn fully_saturated_repetition_is_not_intact() {
        let readings = vec![reading(Some(1), None); 8];
        let score = RepetitionScore::new(&readings, &[1; 8]);
        assert!((score.agreement - 1.0).abs() < f32::EPSILON);
        assert!(!score.is_intact(0.8));
    }

    #[test]
    fn pristine_watermark_reads_back_with_full_confidence() {
        let config = WatermarkConfig::default();
        let payload = WatermarkPayload::new("user123abc", 1_703_001_600_000, "screenshot456");
        let mut raw = textured(100, 100);
        embed_raw(&mut raw, &payload, &config).unwrap();

        let detection = detect_raw(&raw, &config).unwrap().unwrap();
        assert_eq!(detection.payload, payload);
        assert!((detection.confidence - 1.0).abs() < f32::EPSILON);
        assert!(detection.detected);
        assert_eq!(detection.repetitions, 7);
        assert_eq!(detection.intact_repetitions, 7);
    }

    #[test]
    fn flat_unmarked_image_has_no_intact_repetitions() {
        for value in [0u8, 90, 255] {
            let raw = RawImage::from_rgba(RgbaImage::from_pixel(
                100,
                100,
                image::Rgba([value, value, value, 255]),
            ));
            let detection = detect_raw(&raw, &WatermarkConfig::default())
                .unwrap()
                .unwrap();
            assert_eq!(detection.intact_repetitions, 0, "value {value}");
            assert!(!detection.detected);
        }
    }

    #[test]
    fn wrong_key_does_not_detect() {
        let payload = WatermarkPayload::new("viewer", 5, "shot");
        let mut raw = textured(100, 100);
        embed_raw(&mut raw, &payload, &WatermarkConfig::with_secret_key("right")).unwrap();

        let detection = detect_raw(&raw, &WatermarkConfig::with_secret_key("wrong"))
            .unwrap()
            .unwrap();
        assert!(!detection.detected, "confidence {}", detection.confidence);
    }

    #[test]
    fn image_short_of_full_capacity_is_not_read() {
        // 50x50 holds 6 of the 7 default copies, 19x20 not even one.
        for (width, height) in [(50, 50), (19, 20), (25, 20)] {
            let raw = textured(width, height);
            assert!(detect_raw(&raw, &WatermarkConfig::default())
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn single_repetition_round_trips_and_rejects_clean_image() {
        let config = WatermarkConfig {
            repetitions: 1,
            ..WatermarkConfig::default()
        };
        let clean = textured(100, 100);
        let detection = detect_raw(&clean, &config).unwrap().unwrap();
        assert!(!detection.detected);

        let payload = WatermarkPayload::new("one", 1, "copy");
        let mut raw = clean;
        embed_raw(&mut raw, &payload, &config).unwrap();
        let detection = detect_raw(&raw, &config).unwrap().unwrap();
        assert!(detection.detected);
        assert_eq!(detection.payload, payload);
    }

    #[test]
    fn inverted_minority_of_repetitions_is_outvoted() {
        let config = WatermarkConfig::default();
        let payload = WatermarkPayload::new("guardian-0042", 1_700_000_000_123, "shot-99");
        let mut raw = textured(100, 100);
        embed_raw(&mut raw, &payload, &config).unwrap();

        // floor((7 - 1) / 2) = 3 repetitions inverted.
        let layout = CarrierLayout::new(100, 100, &config.secret_key, 7).unwrap();
        for carriers in &layout.repetitions()[..3] {
            for &pixel in carriers {
                let reference = layout.reference(&raw, pixel, config.strength).value();
                let value = raw.channel(pixel, EMBED_CHANNEL);
                let flipped = if value > reference {
                    reference - config.strength
                } else {
                    reference + config.strength
                };
                raw.set_channel(pixel, EMBED_CHANNEL, flipped);
            }
        }

        let detection = detect_raw(&raw, &config).unwrap().unwrap();
        assert_eq!(detection.payload, payload);
        assert!(detection.detected);
        assert_eq!(detection.intact_repetitions, 4);
        assert!((detection.confidence - 4.0 / 7.0).abs() < 1e-6);
    }
}
