//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the codec seam: the four pixel operations
//! every backend must support are identify, resize, encode and thumbnail.
//! Everything above it (dimension math, size budgets, file renames) lives in
//! [`operations`](super::operations) and never touches pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{EncodeParams, ResizeParams, ThumbnailParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("Failed to encode {path}: {reason}")]
    Encode { path: String, reason: String },
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

impl BackendError {
    pub fn decode(path: &Path, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn encode(path: &Path, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Pixel dimensions, as displayed (after EXIF orientation is applied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// All writes overwrite their output path. Sizes are never reported by the
/// backend; callers measure the persisted file.
pub trait ImageBackend: Sync {
    /// Get upright image dimensions without a full decode where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize to exact dimensions with a Lanczos-class filter. The result is
    /// written in the output path's format, orientation normalized.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Decode the source and write it in the requested format.
    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError>;

    /// Downscale into a bounded preview and write it.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}
