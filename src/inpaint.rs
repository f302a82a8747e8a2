//! Defect-mask-guided inpainting.
//!
//! A fast-marching-style texture fill: masked pixels are ordered by their
//! BFS distance from the known region and filled front-to-back, each from the
//! already-valid pixels inside a small radius, weighted by inverse squared
//! distance. Filling is all-or-nothing per invocation; any failure leaves the
//! caller with the untouched input.

use std::collections::VecDeque;

use image::{GrayImage, Rgb, RgbImage};

use crate::error::InpaintError;

/// Neighborhood radius (in pixels) that contributes to each filled pixel.
const FILL_RADIUS: i64 = 3;

/// Fill masked regions of an image from surrounding texture.
///
/// The mask uses 255 for defect pixels and 0 for known pixels and must have
/// the image's exact dimensions. A mask with no flagged pixels is a no-op
/// success.
///
/// # Errors
///
/// - [`InpaintError::MaskMismatch`] if the mask dimensions differ.
/// - [`InpaintError::NoKnownPixels`] if the mask flags every pixel.
/// - [`InpaintError::DegenerateFill`] if a pixel ends up with no valid
///   contribution (cannot happen for 4-connected masks, kept as a guard
///   against numerical surprises).
pub fn inpaint(image: &RgbImage, mask: &GrayImage) -> Result<RgbImage, InpaintError> {
    let (width, height) = image.dimensions();
    if mask.dimensions() != (width, height) {
        return Err(InpaintError::MaskMismatch {
            width,
            height,
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }

    let w = width as usize;
    let h = height as usize;
    let mut valid: Vec<bool> = mask.pixels().map(|p| p[0] == 0).collect();
    let unknown = valid.iter().filter(|&&v| !v).count();
    if unknown == 0 {
        return Ok(image.clone());
    }
    if unknown == w * h {
        return Err(InpaintError::NoKnownPixels);
    }

    let order = march_order(&valid, w, h);
    let mut out = image.clone();

    for idx in order {
        let x = (idx % w) as i64;
        let y = (idx / w) as i64;

        let mut sum = [0.0_f32; 3];
        let mut weight_total = 0.0_f32;
        for dy in -FILL_RADIUS..=FILL_RADIUS {
            for dx in -FILL_RADIUS..=FILL_RADIUS {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let nidx = ny as usize * w + nx as usize;
                if !valid[nidx] {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let weight = 1.0 / (dx * dx + dy * dy) as f32;
                let px = out.get_pixel(nx as u32, ny as u32);
                for ch in 0..3 {
                    sum[ch] += weight * f32::from(px[ch]);
                }
                weight_total += weight;
            }
        }

        if weight_total <= 0.0 || !weight_total.is_finite() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Err(InpaintError::DegenerateFill {
                x: x as u32,
                y: y as u32,
            });
        }

        let mut filled = [0_u8; 3];
        for ch in 0..3 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                filled[ch] = (sum[ch] / weight_total).round().clamp(0.0, 255.0) as u8;
            }
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        out.put_pixel(x as u32, y as u32, Rgb(filled));
        valid[idx] = true;
    }

    Ok(out)
}

/// Order masked pixels by multi-source BFS distance from the known region.
///
/// Processing in this order guarantees every pixel sees at least one valid
/// 4-neighbor (its BFS parent) by the time it is filled, which is what makes
/// the front march inward.
fn march_order(valid: &[bool], w: usize, h: usize) -> Vec<usize> {
    let mut dist = vec![u32::MAX; w * h];
    let mut queue = VecDeque::new();

    for (idx, &v) in valid.iter().enumerate() {
        if v {
            dist[idx] = 0;
            queue.push_back(idx);
        }
    }

    while let Some(idx) = queue.pop_front() {
        let x = idx % w;
        let y = idx / w;
        let next = dist[idx] + 1;
        let mut visit = |nidx: usize| {
            if dist[nidx] == u32::MAX {
                dist[nidx] = next;
                queue.push_back(nidx);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - w);
        }
        if y + 1 < h {
            visit(idx + w);
        }
    }

    let mut order: Vec<usize> = (0..w * h).filter(|&i| !valid[i]).collect();
    order.sort_unstable_by_key(|&i| (dist[i], i));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with_hole(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let img = RgbImage::new(20, 20);
        let mask = GrayImage::new(10, 20);
        let err = inpaint(&img, &mask).unwrap_err();
        assert!(matches!(err, InpaintError::MaskMismatch { .. }));
    }

    #[test]
    fn fully_masked_image_is_rejected() {
        let img = RgbImage::new(8, 8);
        let mask = GrayImage::from_pixel(8, 8, Luma([255]));
        let err = inpaint(&img, &mask).unwrap_err();
        assert!(matches!(err, InpaintError::NoKnownPixels));
    }

    #[test]
    fn empty_mask_is_a_no_op() {
        let img = RgbImage::from_pixel(12, 12, Rgb([10, 20, 30]));
        let mask = GrayImage::new(12, 12);
        let out = inpaint(&img, &mask).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn hole_in_constant_region_fills_with_that_color() {
        let img = RgbImage::from_pixel(30, 30, Rgb([80, 160, 240]));
        let mask = mask_with_hole(30, 30, 10, 10, 20, 20);

        let out = inpaint(&img, &mask).unwrap();
        for px in out.pixels() {
            // The weighted average of a constant is the constant.
            assert_eq!(*px, Rgb([80, 160, 240]));
        }
    }

    #[test]
    fn known_pixels_are_never_modified() {
        let mut img = RgbImage::new(20, 20);
        for (x, y, px) in img.enumerate_pixels_mut() {
            #[allow(clippy::cast_possible_truncation)]
            {
                *px = Rgb([(x * 12) as u8, (y * 12) as u8, 77]);
            }
        }
        let mask = mask_with_hole(20, 20, 5, 5, 9, 9);

        let out = inpaint(&img, &mask).unwrap();
        for (x, y, px) in out.enumerate_pixels() {
            if (5..9).contains(&x) && (5..9).contains(&y) {
                continue;
            }
            assert_eq!(px, img.get_pixel(x, y), "known pixel ({x},{y}) changed");
        }
    }

    #[test]
    fn horizontal_gradient_fill_stays_between_its_sides() {
        // Left half dark, right half bright, masked stripe between them:
        // every filled pixel must land between the two sides.
        let mut img = RgbImage::new(21, 11);
        for (x, _, px) in img.enumerate_pixels_mut() {
            let v = if x < 9 { 50 } else if x > 11 { 200 } else { 0 };
            *px = Rgb([v, v, v]);
        }
        let mask = mask_with_hole(21, 11, 9, 0, 12, 11);

        let out = inpaint(&img, &mask).unwrap();
        for y in 0..11 {
            for x in 9..12 {
                let v = out.get_pixel(x, y)[0];
                assert!((50..=200).contains(&v), "filled value {v} out of range");
            }
        }
    }
}
