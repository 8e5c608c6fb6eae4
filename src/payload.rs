//! Fixed-width payload record and its bit encoding.
//!
//! Every payload encodes to exactly [`PAYLOAD_BIT_LENGTH`] bits, regardless of
//! how long its strings are, so the extractor knows how many bits to read
//! without any out-of-band length information.
//!
//! Layout, MSB first:
//!
//! | field           | chars | bits |
//! |-----------------|-------|------|
//! | `viewer_id`     | 28    | 196  |
//! | `view_timestamp`| -     | 64   |
//! | `screenshot_id` | 20    | 140  |

use serde::{Deserialize, Serialize};

/// Fixed character width of the viewer id field.
pub const VIEWER_ID_CHARS: usize = 28;
/// Fixed character width of the screenshot id field.
pub const SCREENSHOT_ID_CHARS: usize = 20;
/// Bits per encoded character (printable ASCII fits in 7 bits).
pub const BITS_PER_CHAR: usize = 7;
/// Bits of the big-endian timestamp field.
pub const TIMESTAMP_BITS: usize = 64;
/// Total encoded payload length in bits.
pub const PAYLOAD_BIT_LENGTH: usize =
    (VIEWER_ID_CHARS + SCREENSHOT_ID_CHARS) * BITS_PER_CHAR + TIMESTAMP_BITS;

/// Code used to pad short string fields. No printable character maps to it.
const PADDING_CODE: u8 = 0;
/// Substitute for characters outside printable ASCII.
const REPLACEMENT: char = '?';

/// The information recovered from a leaked image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkPayload {
    /// Identity of the guardian who viewed the screenshot (up to 28 chars).
    pub viewer_id: String,
    /// View time in milliseconds since the Unix epoch.
    pub view_timestamp: u64,
    /// Identity of the screenshot (up to 20 chars).
    pub screenshot_id: String,
}

impl WatermarkPayload {
    /// Create a payload.
    pub fn new(
        viewer_id: impl Into<String>,
        view_timestamp: u64,
        screenshot_id: impl Into<String>,
    ) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            view_timestamp,
            screenshot_id: screenshot_id.into(),
        }
    }

    /// The payload a lossless embed/extract round trip yields.
    ///
    /// Strings are truncated to their field widths and characters outside
    /// printable ASCII become `?`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self::from_bits(&self.to_bits())
    }

    /// Encode to a bit vector of length [`PAYLOAD_BIT_LENGTH`] (one bit per `u8`).
    #[must_use]
    pub fn to_bits(&self) -> Vec<u8> {
        let mut bits = Vec::with_capacity(PAYLOAD_BIT_LENGTH);
        push_text(&mut bits, &self.viewer_id, VIEWER_ID_CHARS);
        push_uint(&mut bits, self.view_timestamp, TIMESTAMP_BITS);
        push_text(&mut bits, &self.screenshot_id, SCREENSHOT_ID_CHARS);
        debug_assert_eq!(bits.len(), PAYLOAD_BIT_LENGTH);
        bits
    }

    /// Decode a bit vector produced by [`to_bits`](Self::to_bits).
    ///
    /// Never fails: any bits decode to *some* payload. Missing bits read as 0,
    /// any non-zero entry reads as 1. Deciding whether the bits came from a
    /// real watermark is the extractor's job.
    #[must_use]
    pub fn from_bits(bits: &[u8]) -> Self {
        let mut reader = BitReader { bits, offset: 0 };
        let viewer_id = reader.read_text(VIEWER_ID_CHARS);
        let view_timestamp = reader.read_uint(TIMESTAMP_BITS);
        let screenshot_id = reader.read_text(SCREENSHOT_ID_CHARS);
        Self {
            viewer_id,
            view_timestamp,
            screenshot_id,
        }
    }
}

fn char_code(c: char) -> u8 {
    if (' '..='~').contains(&c) {
        // Printable ASCII, guaranteed to fit in a u8.
        c as u8
    } else {
        REPLACEMENT as u8
    }
}

fn push_uint(bits: &mut Vec<u8>, value: u64, width: usize) {
    for shift in (0..width).rev() {
        bits.push(u8::from((value >> shift) & 1 == 1));
    }
}

fn push_text(bits: &mut Vec<u8>, text: &str, width: usize) {
    let codes = text
        .chars()
        .take(width)
        .map(char_code)
        .chain(std::iter::repeat(PADDING_CODE))
        .take(width);
    for code in codes {
        push_uint(bits, u64::from(code), BITS_PER_CHAR);
    }
}

struct BitReader<'a> {
    bits: &'a [u8],
    offset: usize,
}

impl BitReader<'_> {
    fn read_uint(&mut self, width: usize) -> u64 {
        let mut value = 0u64;
        for _ in 0..width {
            let bit = self.bits.get(self.offset).is_some_and(|&b| b != 0);
            value = (value << 1) | u64::from(bit);
            self.offset += 1;
        }
        value
    }

    fn read_text(&mut self, width: usize) -> String {
        let mut codes: Vec<u8> = (0..width)
            .map(|_| {
                #[allow(clippy::cast_possible_truncation)]
                let code = self.read_uint(BITS_PER_CHAR) as u8;
                code
            })
            .collect();
        while codes.last() == Some(&PADDING_CODE) {
            codes.pop();
        }
        codes
            .into_iter()
            .map(|code| {
                let c = char::from(code);
                if (' '..='~').contains(&c) {
                    c
                } else {
                    REPLACEMENT
                }
            })
            .collect()
    }
}
