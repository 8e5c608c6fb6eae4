//! File and directory processing on top of the watermark core.

use std::path::{Path, PathBuf};

use crate::capacity;
use crate::config::{OutputFormat, WatermarkConfig};
use crate::embed;
use crate::error::{Error, Result};
use crate::extract::{self, Detection};
use crate::payload::WatermarkPayload;

/// Result of scanning a single image file for a watermark.
#[derive(Debug)]
pub struct ScanResult {
    /// Path of the scanned file.
    pub path: PathBuf,
    /// Whether the file could be read and decoded.
    pub success: bool,
    /// Whether a watermark was found.
    pub detected: bool,
    /// Fraction of repetitions that are intact.
    pub confidence: f32,
    /// Recovered payload, when `detected`.
    pub payload: Option<WatermarkPayload>,
    /// Human-readable status message.
    pub message: String,
}

impl ScanResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            detected: false,
            confidence: 0.0,
            payload: None,
            message: String::new(),
        }
    }
}

/// A validated configuration bound to the embed and extract operations.
///
/// Create once with [`Watermarker::new()`] and reuse for many images. It holds
/// no mutable state and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Watermarker {
    config: WatermarkConfig,
}

impl Watermarker {
    /// Validate `config` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if a
    /// parameter is out of range.
    pub fn new(config: WatermarkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// Whether a `width` x `height` image can carry a watermark.
    #[must_use]
    pub fn has_capacity(&self, width: u32, height: u32) -> bool {
        capacity::has_watermark_capacity(width, height, &self.config)
    }

    /// Embed `payload` into encoded image bytes.
    ///
    /// # Errors
    ///
    /// See [`embed::embed_watermark`].
    pub fn embed(&self, image_bytes: &[u8], payload: &WatermarkPayload) -> Result<Vec<u8>> {
        embed::embed_watermark(image_bytes, payload, &self.config)
    }

    /// Read the watermark with its confidence score.
    ///
    /// # Errors
    ///
    /// See [`extract::detect_watermark`].
    pub fn detect(&self, image_bytes: &[u8]) -> Result<Option<Detection>> {
        extract::detect_watermark(image_bytes, &self.config)
    }

    /// The embedded payload, or `None` if no watermark is found.
    ///
    /// # Errors
    ///
    /// See [`extract::extract_watermark`].
    pub fn extract(&self, image_bytes: &[u8]) -> Result<Option<WatermarkPayload>> {
        extract::extract_watermark(image_bytes, &self.config)
    }

    /// Whether the image carries a watermark.
    ///
    /// # Errors
    ///
    /// See [`extract::has_watermark`].
    pub fn has_watermark(&self, image_bytes: &[u8]) -> Result<bool> {
        extract::has_watermark(image_bytes, &self.config)
    }

    /// Load `input`, embed `payload` and write the result to `output`.
    ///
    /// Missing parent directories of `output` are created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] if `input` does not have a
    /// supported image extension, [`Error::Io`] on read/write failure, or
    /// anything [`Watermarker::embed`] returns.
    pub fn embed_file(&self, input: &Path, output: &Path, payload: &WatermarkPayload) -> Result<()> {
        if !is_supported_image(input) {
            let ext = input
                .extension()
                .map_or_else(String::new, |e| e.to_string_lossy().to_string());
            return Err(Error::UnsupportedFormat(ext));
        }

        let bytes = std::fs::read(input)?;
        let marked = self.embed(&bytes, payload)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(output, marked)?;

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            "Wrote watermarked image"
        );
        Ok(())
    }

    /// Load `path` and extract its payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read, or
    /// anything [`Watermarker::extract`] returns.
    pub fn extract_file(&self, path: &Path) -> Result<Option<WatermarkPayload>> {
        let bytes = std::fs::read(path)?;
        self.extract(&bytes)
    }

    /// Scan a single file for a watermark.
    ///
    /// Never fails; read and decode errors are reported in the result.
    #[must_use]
    pub fn scan_file(&self, path: &Path) -> ScanResult {
        let mut result = ScanResult::new(path);

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                result.message = format!("Failed to read: {e}");
                return result;
            }
        };

        match self.detect(&bytes) {
            Ok(Some(detection)) => {
                result.success = true;
                result.confidence = detection.confidence;
                result.detected = detection.detected;
                if detection.detected {
                    result.payload = Some(detection.payload);
                    result.message = "Watermark found".to_string();
                } else {
                    result.message = format!(
                        "No watermark ({:.0}% confidence)",
                        detection.confidence * 100.0
                    );
                }
            }
            Ok(None) => {
                result.success = true;
                result.message = "Image too small to carry a watermark".to_string();
            }
            Err(e) => {
                result.message = format!("Failed to decode: {e}");
            }
        }

        result
    }

    /// Scan all supported images in a directory.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    /// Results are sorted by path.
    #[must_use]
    pub fn scan_directory(&self, dir: &Path) -> Vec<ScanResult> {
        let paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                let mut result = ScanResult::new(dir);
                result.message = format!("Failed to read directory: {e}");
                return vec![result];
            }
        };

        #[cfg(feature = "cli")]
        let mut results: Vec<ScanResult> = {
            use rayon::prelude::*;
            paths.par_iter().map(|p| self.scan_file(p)).collect()
        };

        #[cfg(not(feature = "cli"))]
        let mut results: Vec<ScanResult> = paths.iter().map(|p| self.scan_file(p)).collect();

        results.sort_by(|a, b| a.path.cmp(&b.path));
        results
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Generate a default output path from an input path.
///
/// The extension follows the output format, since the watermarked image is
/// re-encoded. Example: `"shot.png"` becomes `"shot_watermarked.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    let ext = match format {
        OutputFormat::Jpeg => "jpg",
        OutputFormat::Png => "png",
    };
    parent.join(format!("{stem}_watermarked.{ext}"))
}
