//! Shared test utilities: synthetic image fixtures.
//!
//! Images are generated with gradients rather than flat colors so encoders
//! have real detail to work with and quality changes move the file size.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! create_test_png(&tmp.path().join("a.png"), 640, 480);
//! create_test_jpeg(&tmp.path().join("b.jpg"), 3000, 2000);
//! ```

use image::{ImageBuffer, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;

// =========================================================================
// Fixture images
// =========================================================================

/// A deterministic RGB gradient with some high-frequency texture.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = ((x ^ y) & 0xff) as u8;
        Rgb([r, g, b])
    })
}

/// Write a gradient PNG of the given size.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

/// Left half red, right half blue. Rotations show up as a color swap.
pub fn split_colors(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    })
}

/// Splice an EXIF APP1 segment holding only an Orientation tag into a JPEG,
/// after SOI and after the JFIF APP0 segment when one is present.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    // Big-endian TIFF header, IFD0 at offset 8 with a single SHORT entry
    let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\x00\x00");
    segment.extend_from_slice(&tiff);

    let mut at = 2;
    if jpeg[2..4] == [0xFF, 0xE0] {
        at += 2 + u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
    }
    let mut out = jpeg[..at].to_vec();
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[at..]);
    out
}

/// Write a [`split_colors`] JPEG as stored, tagged with an EXIF orientation.
pub fn create_oriented_jpeg(path: &Path, width: u32, height: u32, orientation: u16) {
    let mut jpeg = Vec::new();
    split_colors(width, height)
        .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();
    std::fs::write(path, with_exif_orientation(&jpeg, orientation)).unwrap();
}
