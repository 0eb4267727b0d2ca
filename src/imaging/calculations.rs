//! Pure calculation functions for image dimensions and sizes.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions of an image whose longer side must not exceed
/// `max_dimension`.
///
/// Returns `None` when both sides already fit (no resize needed). Otherwise
/// the longer side becomes exactly `max_dimension` and the shorter side is
/// scaled with integer truncation, never below 1 px.
///
/// # Examples
/// ```
/// # use imgprep::imaging::calculate_bounded_dimensions;
/// assert_eq!(calculate_bounded_dimensions((3000, 2000), 1500), Some((1500, 1000)));
/// assert_eq!(calculate_bounded_dimensions((1200, 900), 1500), None);
/// ```
pub fn calculate_bounded_dimensions(source: (u32, u32), max_dimension: u32) -> Option<(u32, u32)> {
    let (width, height) = source;
    if width <= max_dimension && height <= max_dimension {
        return None;
    }

    if width == height {
        return Some((max_dimension, max_dimension));
    }

    let scale_shorter = |shorter: u32, longer: u32| -> u32 {
        let scaled = u64::from(max_dimension) * u64::from(shorter) / u64::from(longer);
        (scaled as u32).max(1)
    };

    if width > height {
        Some((max_dimension, scale_shorter(height, width)))
    } else {
        Some((scale_shorter(width, height), max_dimension))
    }
}

/// Fit `source` inside a `bounds` box, preserving aspect ratio.
///
/// Images that already fit are returned unchanged (never upscaled). The
/// constraining side matches the box exactly; the other side is rounded to
/// the nearest pixel, never below 1 px.
pub fn calculate_thumbnail_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (box_w, box_h) = bounds;

    if src_w <= box_w && src_h <= box_h {
        return source;
    }

    // Compare src_w/src_h against box_w/box_h without floating point.
    if u64::from(src_w) * u64::from(box_h) >= u64::from(src_h) * u64::from(box_w) {
        // Width is the constraining side
        let h = (src_h as f64 * box_w as f64 / src_w as f64).round() as u32;
        (box_w, h.max(1))
    } else {
        let w = (src_w as f64 * box_h as f64 / src_h as f64).round() as u32;
        (w.max(1), box_h)
    }
}

/// Convert a byte count to whole kibibytes, rounding up.
///
/// Every size comparison in the pipeline goes through this, so a 200 KiB
/// budget rejects a file of 204_801 bytes.
pub fn bytes_to_kib(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}
