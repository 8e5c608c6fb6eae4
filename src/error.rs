//! Error types for the forensic-watermark crate.

/// Errors that can occur while embedding or extracting a watermark.
///
/// A missing watermark is not an error: extraction reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image has too few pixels to carry every repetition of the payload.
    #[error("image too small ({width}x{height}) for watermark: need {required} pixels")]
    ImageTooSmall {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Pixels required by the payload and repetition count.
        required: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid watermark config: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred while decoding or encoding image bytes.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
