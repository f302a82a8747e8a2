//! Defect mask derivation.
//!
//! Flat, low-gradient regions are the ones most likely to look artificial
//! after heavy denoising, and the best candidates for texture regeneration.
//! The mask flags them: grayscale -> Laplacian -> |response| thresholded with
//! inverted logic (low gradient = defect) -> median filter to drop isolated
//! flags and smooth the boundary.

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::median_filter;

/// Absolute Laplacian response at or below this is considered flat.
const FLATNESS_THRESHOLD: i32 = 10;
/// Median filter radius (5x5 kernel).
const MEDIAN_RADIUS: u32 = 2;
/// Mask value for flagged (defect) pixels.
const DEFECT: u8 = 255;

/// Compute the defect mask for an image.
///
/// Pure and total. The output has the same dimensions as the input; 255
/// marks a defect pixel, 0 marks a good one.
#[must_use]
pub fn defect_mask(image: &RgbImage) -> GrayImage {
    let gray = to_grayscale(image);
    let flagged = flag_flat_regions(&gray);
    median_filter(&flagged, MEDIAN_RADIUS, MEDIAN_RADIUS)
}

/// Luminance grayscale (0.299 R + 0.587 G + 0.114 B).
fn to_grayscale(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (dst, src) in gray.pixels_mut().zip(image.pixels()) {
        let lum = 0.299 * f32::from(src[0]) + 0.587 * f32::from(src[1]) + 0.114 * f32::from(src[2]);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            *dst = Luma([lum.round().clamp(0.0, 255.0) as u8]);
        }
    }
    gray
}

/// Threshold the absolute 3x3 Laplacian response with inverted binary logic.
///
/// Border samples are replicated, matching the Laplacian's usual edge
/// handling.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn flag_flat_regions(gray: &GrayImage) -> GrayImage {
    let width = gray.width();
    let height = gray.height();
    let mut mask = GrayImage::new(width, height);

    let sample = |x: i64, y: i64| -> i32 {
        let cx = x.clamp(0, i64::from(width) - 1) as u32;
        let cy = y.clamp(0, i64::from(height) - 1) as u32;
        i32::from(gray.get_pixel(cx, cy)[0])
    };

    for y in 0..height {
        for x in 0..width {
            let (xi, yi) = (i64::from(x), i64::from(y));
            // 3x3 Laplacian: 0 1 0 / 1 -4 1 / 0 1 0
            let lap = sample(xi, yi - 1) + sample(xi, yi + 1) + sample(xi - 1, yi)
                + sample(xi + 1, yi)
                - 4 * sample(xi, yi);
            let flag = if lap.abs() > FLATNESS_THRESHOLD { 0 } else { DEFECT };
            mask.put_pixel(x, y, Luma([flag]));
        }
    }

    mask
}
