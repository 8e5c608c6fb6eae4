//! Image decode/encode at the boundary of the watermark core.
//!
//! The core works on a flat [`RawImage`] buffer with a fixed RGBA layout.
//! This module converts encoded bytes to that layout and back using the
//! `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::config::OutputFormat;
use crate::error::Result;

/// Channels per pixel in a decoded buffer (RGBA).
pub const RGBA_CHANNELS: usize = 4;

/// A decoded image as a flat, row-major pixel buffer.
///
/// The value of channel `c` at `(row, col)` lives at
/// `(row * width + col) * channels + c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Interleaved channel data.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channels per pixel.
    pub channels: usize,
}

impl RawImage {
    /// Wrap an RGBA image buffer.
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            width,
            height,
            channels: RGBA_CHANNELS,
        }
    }

    /// Number of pixels (`width * height`).
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Read one channel of the pixel at flat index `pixel`.
    #[must_use]
    pub fn channel(&self, pixel: usize, channel: usize) -> u8 {
        self.pixels[pixel * self.channels + channel]
    }

    /// Overwrite one channel of the pixel at flat index `pixel`.
    pub fn set_channel(&mut self, pixel: usize, channel: usize, value: u8) {
        self.pixels[pixel * self.channels + channel] = value;
    }

    /// Copy the colour channels, dropping alpha.
    #[must_use]
    pub fn to_rgb(&self) -> Vec<u8> {
        if self.channels == 3 {
            return self.pixels.clone();
        }
        let mut rgb = Vec::with_capacity(self.pixel_count() * 3);
        for px in self.pixels.chunks_exact(self.channels) {
            rgb.extend_from_slice(&px[..3]);
        }
        rgb
    }
}

/// Decode any supported image format into an RGBA [`RawImage`].
///
/// Alpha is always present in the result, whatever the source format.
///
/// # Errors
///
/// Returns [`Error::Image`](crate::Error::Image) if the bytes cannot be decoded.
pub fn decode_rgba(bytes: &[u8]) -> Result<RawImage> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    Ok(RawImage::from_rgba(image))
}

/// Encode a raw buffer without its alpha channel.
///
/// `quality` (1-100) applies to JPEG output only.
///
/// # Errors
///
/// Returns [`Error::Image`](crate::Error::Image) if encoding fails.
pub fn encode(raw: &RawImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let rgb = raw.to_rgb();
    let mut out = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut out, quality).write_image(
                &rgb,
                raw.width,
                raw.height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut out).write_image(
                &rgb,
                raw.width,
                raw.height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_truncation)]
    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 3) as u8, (y * 5) as u8, ((x + y) * 2) as u8, 200])
        })
    }

    #[test]
    fn flat_indexing_matches_row_major_layout() {
        let img = gradient(7, 5);
        let expected = *img.get_pixel(4, 3);
        let raw = RawImage::from_rgba(img);
        let pixel = 3 * 7 + 4;
        for ch in 0..4 {
            assert_eq!(raw.channel(pixel, ch), expected[ch]);
        }
    }

    #[test]
    fn to_rgb_drops_alpha() {
        let raw = RawImage::from_rgba(gradient(4, 4));
        let rgb = raw.to_rgb();
        assert_eq!(rgb.len(), 4 * 4 * 3);
        assert_eq!(&rgb[..3], &raw.pixels[..3]);
        assert_eq!(&rgb[3..6], &raw.pixels[4..7]);
    }

    #[test]
    fn png_output_is_lossless() {
        let raw = RawImage::from_rgba(gradient(16, 9));
        let bytes = encode(&raw, OutputFormat::Png, 90).unwrap();
        let back = decode_rgba(&bytes).unwrap();
        assert_eq!(back.width, 16);
        assert_eq!(back.height, 9);
        assert_eq!(back.to_rgb(), raw.to_rgb());
        // Alpha is stripped on encode and comes back opaque.
        assert!(back.pixels.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn jpeg_output_decodes_with_same_dimensions() {
        let raw = RawImage::from_rgba(gradient(32, 24));
        let bytes = encode(&raw, OutputFormat::Jpeg, 90).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let back = decode_rgba(&bytes).unwrap();
        assert_eq!((back.width, back.height), (32, 24));
        assert_eq!(back.channels, RGBA_CHANNELS);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_rgba(b"definitely not an image").is_err());
    }
}
