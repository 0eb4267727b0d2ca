//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take
//! configuration, compute parameters, call the backend, and re-measure the
//! persisted file after every write. No size is ever carried over from a
//! previous step.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{
    bytes_to_kib, calculate_bounded_dimensions, calculate_thumbnail_dimensions,
};
use super::params::{
    CompressionLevel, EncodeParams, OutputFormat, Quality, ResizeParams, ThumbnailParams,
};
use super::reduction::{Reduction, ReductionPolicy, run_reduction};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Size of a file on disk in whole KiB, rounded up.
pub fn file_size_kib(path: &Path) -> Result<u64> {
    Ok(bytes_to_kib(std::fs::metadata(path)?.len()))
}

/// A measured image file. Built fresh from disk; never cached across writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub size_kib: u64,
    /// Lowercased file extension, empty if the file has none.
    pub format: String,
}

/// Identify and stat `path`.
pub fn measure(backend: &impl ImageBackend, path: &Path) -> Result<ImageAsset> {
    let (width, height) = get_dimensions(backend, path)?;
    Ok(ImageAsset {
        path: path.to_path_buf(),
        width,
        height,
        size_kib: file_size_kib(path)?,
        format: path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    Resized {
        width: u32,
        height: u32,
        size_kib: u64,
    },
    /// Both sides already within the limit; the file was not touched.
    Skipped,
}

/// Shrink `path` in place so its longer side is at most `max_dimension`.
pub fn resize_to_max(
    backend: &impl ImageBackend,
    path: &Path,
    max_dimension: u32,
) -> Result<ResizeOutcome> {
    let source = measure(backend, path)?;
    let Some((width, height)) =
        calculate_bounded_dimensions((source.width, source.height), max_dimension)
    else {
        return Ok(ResizeOutcome::Skipped);
    };

    backend.resize(&ResizeParams {
        source: path.to_path_buf(),
        output: path.to_path_buf(),
        width,
        height,
    })?;

    Ok(ResizeOutcome::Resized {
        width,
        height,
        size_kib: file_size_kib(path)?,
    })
}

/// A file after format conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub path: PathBuf,
    pub name: String,
    pub size_kib: u64,
}

/// Re-encode `path` losslessly as `format` next to it, keeping the stem.
///
/// When the extension changes the original file is deleted, so exactly one
/// file remains. The caller decides whether conversion is needed at all.
pub fn convert_format(
    backend: &impl ImageBackend,
    path: &Path,
    format: OutputFormat,
) -> Result<Converted> {
    let new_path = path.with_extension(format.extension());
    backend.encode(&EncodeParams {
        source: path.to_path_buf(),
        output: new_path.clone(),
        format,
        quality: None,
        compression: None,
    })?;

    if new_path != path {
        std::fs::remove_file(path)?;
    }

    Ok(Converted {
        name: new_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size_kib: file_size_kib(&new_path)?,
        path: new_path,
    })
}

/// Single compression pass at `level`, in place. Returns the new size.
pub fn compress(
    backend: &impl ImageBackend,
    path: &Path,
    format: OutputFormat,
    level: CompressionLevel,
) -> Result<u64> {
    backend.encode(&EncodeParams {
        source: path.to_path_buf(),
        output: path.to_path_buf(),
        format,
        quality: None,
        compression: Some(level),
    })?;
    file_size_kib(path)
}

/// Drive `path` under the policy's budget by re-encoding in place at
/// decreasing qualities. `initial_kib` is the size after [`compress`].
pub fn reduce_quality(
    backend: &impl ImageBackend,
    path: &Path,
    format: OutputFormat,
    policy: &ReductionPolicy,
    initial_kib: u64,
) -> Result<Reduction> {
    run_reduction(policy, initial_kib, |quality| {
        backend.encode(&EncodeParams {
            source: path.to_path_buf(),
            output: path.to_path_buf(),
            format,
            quality: Some(quality),
            compression: None,
        })?;
        file_size_kib(path)
    })
}

/// Configuration for thumbnail generation.
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: Quality,
    pub reducing_gap: f32,
    pub format: OutputFormat,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 800,
            quality: Quality::new(80),
            reducing_gap: 2.0,
            format: OutputFormat::Webp,
        }
    }
}

/// Plan a thumbnail operation without executing it.
pub fn plan_thumbnail(
    source: &Path,
    dest: &Path,
    source_dims: (u32, u32),
    config: &ThumbnailConfig,
) -> ThumbnailParams {
    let (width, height) =
        calculate_thumbnail_dimensions(source_dims, (config.max_width, config.max_height));

    ThumbnailParams {
        source: source.to_path_buf(),
        output: dest.to_path_buf(),
        width,
        height,
        format: config.format,
        quality: config.quality,
        reducing_gap: config.reducing_gap,
    }
}

/// Write a bounded preview of `source` to `dest`. Returns its dimensions.
pub fn create_thumbnail(
    backend: &impl ImageBackend,
    source: &Path,
    dest: &Path,
    config: &ThumbnailConfig,
) -> Result<(u32, u32)> {
    let dims = get_dimensions(backend, source)?;
    let params = plan_thumbnail(source, dest, dims, config);
    backend.thumbnail(&params)?;
    Ok((params.width, params.height))
}
