//! Key-derived carrier pixel selection.
//!
//! Each repetition of the payload is carried by its own ordered list of
//! pixels, drawn from a [`SequenceGenerator`] seeded with the secret key and
//! the repetition index. Both embedder and extractor derive the lists from
//! the key alone; the payload is never needed.
//!
//! Carrier pixels are compared against a reference value reconstructed from
//! neighbouring pixels that are *not* carriers. Those pixels are never
//! written, so the embedder and extractor always agree on the reference.

use crate::codec::RawImage;
use crate::config::MAX_STRENGTH;
use crate::error::{Error, Result};
use crate::payload::PAYLOAD_BIT_LENGTH;
use crate::sequence::SequenceGenerator;

/// Colour channel that carries the payload (blue).
pub const EMBED_CHANNEL: usize = 2;

/// Reference used when a carrier has no non-carrier pixel within two pixels.
const FALLBACK_REFERENCE: u8 = 128;

/// Seed string of the generator for one repetition.
#[must_use]
pub fn repetition_seed(secret_key: &str, repetition: usize) -> String {
    format!("{secret_key}:{repetition}")
}

/// Draw [`PAYLOAD_BIT_LENGTH`] unclaimed pixel indices and mark them claimed.
///
/// The caller guarantees at least that many unclaimed pixels remain.
fn draw_positions(secret_key: &str, repetition: usize, claimed: &mut [bool]) -> Vec<usize> {
    let last = claimed.len() - 1;
    let mut rng = SequenceGenerator::new(&repetition_seed(secret_key, repetition));
    let mut positions = Vec::with_capacity(PAYLOAD_BIT_LENGTH);
    while positions.len() < PAYLOAD_BIT_LENGTH {
        let pixel = rng.next_int(0, last);
        if !claimed[pixel] {
            claimed[pixel] = true;
            positions.push(pixel);
        }
    }
    positions
}

/// Carrier pixels of a single repetition, as flat indices (`row * width + col`).
///
/// The list has [`PAYLOAD_BIT_LENGTH`] distinct entries and is a pure function
/// of its arguments.
///
/// # Errors
///
/// Returns [`Error::ImageTooSmall`] if the image has fewer pixels than one
/// payload copy needs.
pub fn positions(
    width: u32,
    height: u32,
    secret_key: &str,
    repetition: usize,
) -> Result<Vec<usize>> {
    let total = width as usize * height as usize;
    if total < PAYLOAD_BIT_LENGTH {
        return Err(Error::ImageTooSmall {
            width,
            height,
            required: PAYLOAD_BIT_LENGTH,
        });
    }
    let mut claimed = vec![false; total];
    Ok(draw_positions(secret_key, repetition, &mut claimed))
}

/// Carrier positions of every repetition in one image.
///
/// Repetitions are drawn in order and a pixel claimed by an earlier
/// repetition is skipped by later ones, so no pixel ever carries two bits.
/// Repetition 0 therefore matches [`positions`] exactly.
#[derive(Debug, Clone)]
pub struct CarrierLayout {
    width: usize,
    height: usize,
    repetitions: Vec<Vec<usize>>,
    claimed: Vec<bool>,
}

impl CarrierLayout {
    /// Derive the layout for `repetitions` copies of the payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooSmall`] if `width * height` is below
    /// `PAYLOAD_BIT_LENGTH * repetitions`.
    pub fn new(width: u32, height: u32, secret_key: &str, repetitions: usize) -> Result<Self> {
        let total = width as usize * height as usize;
        let required = PAYLOAD_BIT_LENGTH.saturating_mul(repetitions);
        if total < required {
            return Err(Error::ImageTooSmall {
                width,
                height,
                required,
            });
        }

        let mut claimed = vec![false; total];
        let repetitions = (0..repetitions)
            .map(|r| draw_positions(secret_key, r, &mut claimed))
            .collect();

        Ok(Self {
            width: width as usize,
            height: height as usize,
            repetitions,
            claimed,
        })
    }

    /// Carrier positions, one list per repetition.
    #[must_use]
    pub fn repetitions(&self) -> &[Vec<usize>] {
        &self.repetitions
    }

    /// Whether `pixel` carries a payload bit in any repetition.
    #[must_use]
    pub fn is_carrier(&self, pixel: usize) -> bool {
        self.claimed.get(pixel).copied().unwrap_or(false)
    }

    /// Reference for the carrier at `pixel`.
    ///
    /// Built from the non-carrier pixels in the 3x3 neighbourhood, else the
    /// 5x5 neighbourhood, else a mid-grey constant.
    #[must_use]
    pub fn reference(&self, raw: &RawImage, pixel: usize, strength: u8) -> Reference {
        debug_assert_eq!(raw.pixel_count(), self.claimed.len());
        let row = pixel / self.width;
        let col = pixel % self.width;
        let (sum, count) = self
            .neighbourhood_sum(raw, row, col, 1)
            .or_else(|| self.neighbourhood_sum(raw, row, col, 2))
            .unwrap_or((u32::from(FALLBACK_REFERENCE), 1));
        Reference::new(sum, count, strength)
    }

    fn neighbourhood_sum(
        &self,
        raw: &RawImage,
        row: usize,
        col: usize,
        radius: usize,
    ) -> Option<(u32, u32)> {
        let rows = row.saturating_sub(radius)..=(row + radius).min(self.height - 1);
        let cols = col.saturating_sub(radius)..=(col + radius).min(self.width - 1);

        let mut sum = 0u32;
        let mut count = 0u32;
        for r in rows {
            for c in cols.clone() {
                let p = r * self.width + c;
                if !self.claimed[p] {
                    sum += u32::from(raw.channel(p, EMBED_CHANNEL));
                    count += 1;
                }
            }
        }
        (count > 0).then_some((sum, count))
    }
}

/// Local estimate of a carrier's unmodified channel value.
///
/// The estimate is the mean of the neighbouring non-carrier values, clamped
/// to `[strength, 255 - strength]` so that `value() ± strength` never
/// saturates. Comparisons use the exact rational mean (`target / count`),
/// so a smooth gradient reads as "no deviation" rather than leaning one way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    target: u32,
    count: u32,
}

impl Reference {
    fn new(sum: u32, count: u32, strength: u8) -> Self {
        let strength = u32::from(strength.min(MAX_STRENGTH));
        let lo = strength * count;
        let hi = (u32::from(u8::MAX) - strength) * count;
        Self {
            target: sum.clamp(lo, hi),
            count,
        }
    }

    /// The clamped mean rounded to the nearest channel value.
    #[must_use]
    pub fn value(self) -> u8 {
        let rounded = (self.target + self.count / 2) / self.count;
        // target <= 255 * count, so the rounded mean fits in a u8.
        u8::try_from(rounded).unwrap_or(u8::MAX)
    }

    /// Deviation of `observed` from the clamped mean, in units of `1 / count`.
    ///
    /// Only the sign is meaningful to callers.
    #[must_use]
    pub fn deviation(self, observed: u8) -> i64 {
        i64::from(self.count) * i64::from(observed) - i64::from(self.target)
    }
}
