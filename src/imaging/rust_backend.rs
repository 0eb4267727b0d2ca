//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate, format guessed from content |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `resize_exact` with `Lanczos3` |
//! | Encode → WebP | `webp` crate (libwebp): lossy with quality, lossless otherwise |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (effort via `CompressionType`) |
//! | Thumbnail | `thumbnail_exact` pre-reduction + `CatmullRom` (bicubic) |
//!
//! Every decode applies the EXIF orientation tag and no encoder writes EXIF
//! back, so pixels on disk are always upright after the first write.
//!
//! Writes go to a hidden `.name.partial` sibling and are renamed into place,
//! so a failed encode never leaves a truncated file at the output path.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{
    CompressionLevel, EncodeParams, OutputFormat, Quality, ResizeParams, ThumbnailParams,
};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// JPEG has no lossless mode; "no quality requested" means maximum quality.
const JPEG_MAX_QUALITY: u8 = 100;

/// libwebp defaults, used when the caller leaves a knob unset.
const WEBP_DEFAULT_QUALITY: f32 = 75.0;
const WEBP_DEFAULT_METHOD: i32 = 4;

/// Pure Rust backend using the `image` crate ecosystem plus libwebp.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open_decoder(path: &Path) -> Result<impl ImageDecoder, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| BackendError::decode(path, e))
}

/// Whether applying `orientation` swaps width and height.
fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Load and decode an image from disk, upright.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let mut decoder = open_decoder(path)?;
    // A malformed EXIF block is not worth failing the image over
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| BackendError::decode(path, e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Replace `path` with `bytes` via a sibling temp file and rename.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let tmp = partial_path(path);
    if let Err(e) = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(BackendError::Io(e));
    }
    Ok(())
}

/// Encode `img` as `format` and write it to `path`.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: Option<Quality>,
    compression: Option<CompressionLevel>,
) -> Result<(), BackendError> {
    let bytes = match format {
        OutputFormat::Webp => encode_webp(img, path, quality, compression)?,
        OutputFormat::Jpeg => encode_jpeg(img, path, quality)?,
        OutputFormat::Png => encode_png(img, path, compression)?,
    };
    write_atomically(path, &bytes)
}

/// Save in whatever format the path's extension names, at full quality.
///
/// Used for in-place resizes of working copies that are not yet in the
/// target format (e.g. a `.tiff` that will be converted afterwards).
fn save_as_extension(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if let Some(format) = OutputFormat::from_extension(ext) {
        return save_image(img, path, format, None, None);
    }

    let format = ImageFormat::from_extension(ext)
        .filter(|f| f.writing_enabled())
        .ok_or_else(|| BackendError::UnsupportedFormat(ext.to_string()))?;
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .map_err(|e| BackendError::encode(path, e))?;
    write_atomically(path, buf.get_ref())
}

/// Lossy WebP when a quality is given, lossless otherwise. The compression
/// level maps onto libwebp's `method` (effort).
fn encode_webp(
    img: &DynamicImage,
    path: &Path,
    quality: Option<Quality>,
    compression: Option<CompressionLevel>,
) -> Result<Vec<u8>, BackendError> {
    let rgba;
    let rgb;
    let encoder = if img.color().has_alpha() {
        rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), img.width(), img.height())
    } else {
        rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), img.width(), img.height())
    };

    let mut config = webp::WebPConfig::new()
        .map_err(|()| BackendError::encode(path, "libwebp rejected the default config"))?;
    config.lossless = i32::from(quality.is_none());
    config.quality = quality
        .map(|q| q.value() as f32)
        .unwrap_or(WEBP_DEFAULT_QUALITY);
    config.method = compression
        .map(CompressionLevel::webp_method)
        .unwrap_or(WEBP_DEFAULT_METHOD);

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| BackendError::encode(path, format!("{e:?}")))?;
    Ok(memory.to_vec())
}

fn encode_jpeg(
    img: &DynamicImage,
    path: &Path,
    quality: Option<Quality>,
) -> Result<Vec<u8>, BackendError> {
    let quality = quality
        .map(|q| q.value() as u8)
        .unwrap_or(JPEG_MAX_QUALITY);
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::encode(path, e))?;
    Ok(buf)
}

fn png_compression(level: CompressionLevel) -> CompressionType {
    match level.value() {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode_png(
    img: &DynamicImage,
    path: &Path,
    compression: Option<CompressionLevel>,
) -> Result<Vec<u8>, BackendError> {
    let compression = compression
        .map(png_compression)
        .unwrap_or(CompressionType::Default);
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, compression, PngFilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::encode(path, e))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let mut decoder = open_decoder(path)?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        Ok(if swaps_axes(orientation) {
            Dimensions {
                width: height,
                height: width,
            }
        } else {
            Dimensions { width, height }
        })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_as_extension(&resized, &params.output)
    }

    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        save_image(
            &img,
            &params.output,
            params.format,
            params.quality,
            params.compression,
        )
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;

        // Cheap area-averaging reduce first, then a bicubic pass for the last
        // factor of `reducing_gap`.
        let gap = params.reducing_gap;
        let reduced = if gap >= 1.0 {
            let gap_w = (params.width as f32 * gap).round() as u32;
            let gap_h = (params.height as f32 * gap).round() as u32;
            if img.width() > gap_w && img.height() > gap_h {
                img.thumbnail_exact(gap_w, gap_h)
            } else {
                img
            }
        } else {
            img
        };

        let thumb = reduced.resize_exact(params.width, params.height, FilterType::CatmullRom);
        save_image(
            &thumb,
            &params.output,
            params.format,
            Some(params.quality),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_oriented_jpeg, create_test_jpeg, create_test_png};

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let backend = RustBackend::new();
        let dims = backend.identify(&path).unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn identify_garbage_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = RustBackend::new().identify(&path);
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn orientation_axis_swaps() {
        assert!(swaps_axes(Orientation::Rotate90));
        assert!(swaps_axes(Orientation::Rotate270FlipH));
        assert!(!swaps_axes(Orientation::Rotate180));
        assert!(!swaps_axes(Orientation::FlipHorizontal));
        assert!(!swaps_axes(Orientation::NoTransforms));
    }

    #[test]
    fn identify_reports_displayed_dimensions_for_rotated_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("portrait.jpg");
        // Stored 400x200, Orientation=6: displayed rotated 90 degrees clockwise
        create_oriented_jpeg(&path, 400, 200, 6);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!((dims.width, dims.height), (200, 400));
    }

    #[test]
    fn resize_writes_upright_pixels() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("portrait.jpg");
        let output = tmp.path().join("portrait.png");
        create_oriented_jpeg(&source, 400, 200, 6);

        RustBackend::new()
            .resize(&ResizeParams {
                source,
                output: output.clone(),
                width: 50,
                height: 100,
            })
            .unwrap();

        let img = image::open(&output).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (50, 100));
        // The stored left (red) half ends up on top
        let top = img.get_pixel(25, 5);
        let bottom = img.get_pixel(25, 95);
        assert!(top[0] > 200 && top[2] < 60, "top pixel {top:?}");
        assert!(bottom[2] > 200 && bottom[0] < 60, "bottom pixel {bottom:?}");
    }

    #[test]
    fn resize_in_place_keeps_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");
        create_test_jpeg(&path, 400, 300);

        let backend = RustBackend::new();
        backend
            .resize(&ResizeParams {
                source: path.clone(),
                output: path.clone(),
                width: 200,
                height: 150,
            })
            .unwrap();

        assert_eq!(
            image::ImageFormat::from_path(&path).unwrap(),
            image::ImageFormat::Jpeg
        );
        let dims = backend.identify(&path).unwrap();
        assert_eq!((dims.width, dims.height), (200, 150));
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn encode_png_to_lossless_webp_preserves_pixels() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 64, 48);
        let output = tmp.path().join("source.webp");

        RustBackend::new()
            .encode(&EncodeParams {
                source: source.clone(),
                output: output.clone(),
                format: OutputFormat::Webp,
                quality: None,
                compression: None,
            })
            .unwrap();

        let original = image::open(&source).unwrap().to_rgb8();
        let roundtrip = image::open(&output).unwrap().to_rgb8();
        assert_eq!(original.dimensions(), roundtrip.dimensions());
        assert_eq!(original.as_raw(), roundtrip.as_raw());
    }

    #[test]
    fn lower_webp_quality_is_smaller() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 256, 256);
        let high = tmp.path().join("high.webp");
        let low = tmp.path().join("low.webp");

        let backend = RustBackend::new();
        for (output, q) in [(&high, 95), (&low, 20)] {
            backend
                .encode(&EncodeParams {
                    source: source.clone(),
                    output: output.clone(),
                    format: OutputFormat::Webp,
                    quality: Some(Quality::new(q)),
                    compression: None,
                })
                .unwrap();
        }

        let high_len = std::fs::metadata(&high).unwrap().len();
        let low_len = std::fs::metadata(&low).unwrap().len();
        assert!(low_len < high_len, "q20 {low_len} >= q95 {high_len}");
    }

    #[test]
    fn encode_jpeg_and_png_outputs_decode() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 80, 60);

        let backend = RustBackend::new();
        for (name, format) in [("a.jpeg", OutputFormat::Jpeg), ("a.png", OutputFormat::Png)] {
            let output = tmp.path().join(name);
            backend
                .encode(&EncodeParams {
                    source: source.clone(),
                    output: output.clone(),
                    format,
                    quality: Some(Quality::new(70)),
                    compression: Some(CompressionLevel::new(9)),
                })
                .unwrap();
            let dims = backend.identify(&output).unwrap();
            assert_eq!((dims.width, dims.height), (80, 60));
        }
    }

    #[test]
    fn encode_failure_leaves_no_partial_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.png");
        std::fs::write(&source, b"garbage").unwrap();
        let output = tmp.path().join("broken.webp");

        let result = RustBackend::new().encode(&EncodeParams {
            source,
            output: output.clone(),
            format: OutputFormat::Webp,
            quality: None,
            compression: None,
        });

        assert!(result.is_err());
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn thumbnail_exact_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 1200, 900);
        let output = tmp.path().join("thumb.webp");

        let backend = RustBackend::new();
        backend
            .thumbnail(&ThumbnailParams {
                source: source.clone(),
                output: output.clone(),
                width: 400,
                height: 300,
                format: OutputFormat::Webp,
                quality: Quality::new(80),
                reducing_gap: 2.0,
            })
            .unwrap();

        let dims = backend.identify(&output).unwrap();
        assert_eq!((dims.width, dims.height), (400, 300));
        // Source untouched
        assert_eq!(backend.identify(&source).unwrap().width, 1200);
    }

    #[test]
    fn thumbnail_without_reducing_gap() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 300, 600);
        let output = tmp.path().join("thumb.jpeg");

        let backend = RustBackend::new();
        backend
            .thumbnail(&ThumbnailParams {
                source,
                output: output.clone(),
                width: 100,
                height: 200,
                format: OutputFormat::Jpeg,
                quality: Quality::new(80),
                reducing_gap: 0.0,
            })
            .unwrap();

        let dims = backend.identify(&output).unwrap();
        assert_eq!((dims.width, dims.height), (100, 200));
    }
}
