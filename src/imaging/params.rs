//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what to write and where) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`CompressionLevel`]: Encoder effort (0–9). Clamped on construction.
//! - [`OutputFormat`]: Container formats the pipeline can write.
//! - [`ResizeParams`]: Source, output path and exact target dimensions.
//! - [`EncodeParams`]: Re-encode a file into a format with optional quality / effort.
//! - [`ThumbnailParams`]: Source, output, exact thumbnail dimensions, quality, reducing gap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Compression effort, on the familiar zlib-style 0–9 scale.
///
/// Each encoder maps the level onto its own knob:
/// - WebP: the `method` parameter (0–6)
/// - PNG: `Fast` / `Default` / `Best`
/// - JPEG: no effort knob; the level is ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    pub fn new(value: u32) -> Self {
        Self(value.min(9))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// WebP `method` (0 = fastest, 6 = slowest/best).
    pub fn webp_method(self) -> i32 {
        ((self.0 * 6 + 4) / 9) as i32
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(2)
    }
}

/// Container format written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Canonical file extension (no dot).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }

    /// Whether `ext` names this format. Case-insensitive; `jpg` counts as JPEG.
    pub fn matches_extension(self, ext: &str) -> bool {
        match self {
            OutputFormat::Jpeg => {
                ext.eq_ignore_ascii_case("jpeg") || ext.eq_ignore_ascii_case("jpg")
            }
            other => ext.eq_ignore_ascii_case(other.extension()),
        }
    }

    /// Format for a file extension, if it is one we can write.
    pub fn from_extension(ext: &str) -> Option<Self> {
        [OutputFormat::Webp, OutputFormat::Jpeg, OutputFormat::Png]
            .into_iter()
            .find(|f| f.matches_extension(ext))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parameters for a resize to exact dimensions. `source` and `output` may be
/// the same path (resize in place).
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Parameters for decoding `source` and writing it as `format` at `output`.
///
/// With neither `quality` nor `compression`, formats that support it are
/// written losslessly.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub quality: Option<Quality>,
    pub compression: Option<CompressionLevel>,
}

/// Parameters for a thumbnail operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Final dimensions, already fitted to the bounding box.
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
    /// Pre-reduce with a box filter down to `reducing_gap` times the final
    /// size before the bicubic pass. `0.0` disables the pre-reduction.
    pub reducing_gap: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn compression_level_clamps_to_nine() {
        assert_eq!(CompressionLevel::new(12).value(), 9);
        assert_eq!(CompressionLevel::default().value(), 2);
    }

    #[test]
    fn compression_level_maps_to_webp_method() {
        assert_eq!(CompressionLevel::new(0).webp_method(), 0);
        assert_eq!(CompressionLevel::new(2).webp_method(), 1);
        assert_eq!(CompressionLevel::new(9).webp_method(), 6);
    }

    #[test]
    fn output_format_extension_matching() {
        assert!(OutputFormat::Webp.matches_extension("WEBP"));
        assert!(OutputFormat::Jpeg.matches_extension("jpg"));
        assert!(OutputFormat::Jpeg.matches_extension("JPEG"));
        assert!(!OutputFormat::Png.matches_extension("webp"));
        assert_eq!(OutputFormat::from_extension("Jpg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("tiff"), None);
    }

    #[test]
    fn output_format_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: OutputFormat,
        }
        let w: Wrapper = toml::from_str(r#"format = "png""#).unwrap();
        assert_eq!(w.format, OutputFormat::Png);
    }
}
