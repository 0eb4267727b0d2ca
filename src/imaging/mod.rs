//! Image processing: the codec seam and everything built on top of it.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageDecoder::dimensions` + EXIF orientation |
//! | **Resize** | Lanczos3, written back in the file's own format |
//! | **Convert / compress / reduce** | `webp` crate (libwebp), `image` JPEG/PNG encoders |
//! | **Thumbnail** | area-averaging pre-reduce + CatmullRom |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and size math (unit testable)
//! - **Reduction**: The quality-reduction loop as an explicit state machine
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
mod reduction;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{bytes_to_kib, calculate_bounded_dimensions, calculate_thumbnail_dimensions};
pub use operations::{
    Converted, ImageAsset, ResizeOutcome, ThumbnailConfig, compress, convert_format,
    create_thumbnail, file_size_kib, get_dimensions, measure, reduce_quality, resize_to_max,
};
pub use params::{
    CompressionLevel, EncodeParams, OutputFormat, Quality, ResizeParams, ThumbnailParams,
};
pub use reduction::{Attempt, Reduction, ReductionPolicy, ReductionState, run_reduction};
pub use rust_backend::RustBackend;
