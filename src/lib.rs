//! Invisible, traceable forensic watermarks for screenshot review.
//!
//! Before a screenshot is shown to a guardian, [`embed_watermark`] hides a
//! fixed-width payload (viewer id, view timestamp, screenshot id) in the blue
//! channel of key-selected pixels. If the image leaks, [`extract_watermark`]
//! recovers the payload using only the shared secret key.
//!
//! # Quick Start
//!
//! ```no_run
//! use forensic_watermark::{
//!     embed_watermark, extract_watermark, OutputFormat, WatermarkConfig, WatermarkPayload,
//! };
//!
//! let config = WatermarkConfig {
//!     output_format: OutputFormat::Png,
//!     ..WatermarkConfig::with_secret_key("per-deployment secret")
//! };
//! let payload = WatermarkPayload::new("user123abc", 1_703_001_600_000, "screenshot456");
//!
//! let original = std::fs::read("screenshot.png").unwrap();
//! let marked = embed_watermark(&original, &payload, &config).unwrap();
//!
//! assert_eq!(extract_watermark(&marked, &config).unwrap(), Some(payload));
//! ```
//!
//! # Scheme
//!
//! - The payload always encodes to [`PAYLOAD_BIT_LENGTH`] bits.
//! - Each of `repetitions` copies is written to its own set of carrier pixels,
//!   derived from the secret key with a portable LCG ([`SequenceGenerator`]).
//! - A bit moves the carrier's blue value `strength` above (1) or below (0)
//!   the mean of its non-carrier neighbours.
//! - Extraction majority-votes every bit across copies. A copy counts as
//!   intact when its carriers sit exactly `strength` from their reference and
//!   agree with the vote; the image is marked when most copies are intact.
//!
//! The watermark only survives lossless output. JPEG (the default) quantizes
//! away single-pixel changes of this size, so use [`OutputFormat::Png`]
//! whenever the image must stay traceable.

#![deny(missing_docs)]

pub mod capacity;
pub mod codec;
pub mod config;
mod embed;
mod engine;
pub mod error;
mod extract;
pub mod layout;
pub mod payload;
pub mod sequence;

pub use capacity::{has_watermark_capacity, payload_bit_length, required_pixel_count};
pub use codec::RawImage;
pub use config::{OutputFormat, WatermarkConfig};
pub use embed::{embed_raw, embed_watermark};
pub use engine::{default_output_path, is_supported_image, ScanResult, Watermarker};
pub use error::{Error, Result};
pub use extract::{
    detect_raw, detect_watermark, extract_watermark, has_watermark, Detection,
};
pub use payload::{WatermarkPayload, PAYLOAD_BIT_LENGTH};
pub use sequence::SequenceGenerator;
