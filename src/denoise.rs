//! Edge-preserving non-local-means color denoising.
//!
//! Patch similarity is measured on the luma plane; the chroma planes are
//! averaged with their own filter strength. Per-offset integral images of
//! squared luma differences make the patch distance an O(1) box query, so the
//! total cost is O(pixels * search-area) instead of
//! O(pixels * search-area * patch-area). Rows are processed in parallel.

use image::RgbImage;
use rayon::prelude::*;

use crate::enhance::{rgb_to_ycbcr, ycbcr_to_rgb};

/// Filter strength for the luma plane.
const FILTER_STRENGTH_LUMA: f32 = 5.0;
/// Filter strength for the chroma planes.
const FILTER_STRENGTH_COLOR: f32 = 5.0;
/// Side length of the similarity patch.
const TEMPLATE_WINDOW: usize = 7;
/// Side length of the search window around each pixel.
const SEARCH_WINDOW: usize = 21;

/// Accumulator per pixel: weighted Y/Cb/Cr sums plus the two weight totals.
type Accum = [f32; 5];

/// Denoise an image while preserving edges.
///
/// Pure and total. Pixels outside the image are treated as border replicas,
/// so any valid image (including a 1x1 one) is handled.
#[must_use]
pub fn denoise(image: &RgbImage) -> RgbImage {
    let width = image.width() as usize;
    let height = image.height() as usize;
    if width == 0 || height == 0 {
        return image.clone();
    }

    let (y, cb, cr) = rgb_to_ycbcr(image);
    let (dy, dcb, dcr) = nl_means(&y, &cb, &cr, width, height);
    ycbcr_to_rgb(&dy, &dcb, &dcr, image.width(), image.height())
}

/// Non-local-means over pre-split Y/Cb/Cr planes.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]
fn nl_means(
    y: &[f32],
    cb: &[f32],
    cr: &[f32],
    width: usize,
    height: usize,
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let search_radius = (SEARCH_WINDOW / 2) as isize;
    let patch_radius = (TEMPLATE_WINDOW / 2) as isize;
    let inv_h2_luma = 1.0 / (FILTER_STRENGTH_LUMA * FILTER_STRENGTH_LUMA);
    let inv_h2_color = 1.0 / (FILTER_STRENGTH_COLOR * FILTER_STRENGTH_COLOR);

    let stride = width + 1;
    let mut diff2 = vec![0.0_f32; width * height];
    let mut integral = vec![0.0_f64; stride * (height + 1)];
    let mut accum: Vec<Accum> = vec![[0.0; 5]; width * height];

    for off_y in -search_radius..=search_radius {
        for off_x in -search_radius..=search_radius {
            // Squared luma difference against the shifted (border-replicated) image.
            diff2
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(row_y, row)| {
                    let src_y = clamp_coord(row_y as isize + off_y, height);
                    for (x, out) in row.iter_mut().enumerate() {
                        let src_x = clamp_coord(x as isize + off_x, width);
                        let d = y[row_y * width + x] - y[src_y * width + src_x];
                        *out = d * d;
                    }
                });

            // Summed-area table of the squared differences (zero-padded border).
            for row_y in 0..height {
                let mut row_sum = 0.0_f64;
                for x in 0..width {
                    row_sum += f64::from(diff2[row_y * width + x]);
                    integral[(row_y + 1) * stride + x + 1] =
                        row_sum + integral[row_y * stride + x + 1];
                }
            }

            // Accumulate the shifted sample into every pixel, weighted by
            // its mean patch distance.
            let integral_ref = &integral;
            accum
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(row_y, row)| {
                    let src_y = clamp_coord(row_y as isize + off_y, height);
                    let y1 = row_y.saturating_sub(patch_radius as usize);
                    let y2 = (row_y + patch_radius as usize + 1).min(height);
                    for (x, acc) in row.iter_mut().enumerate() {
                        let x1 = x.saturating_sub(patch_radius as usize);
                        let x2 = (x + patch_radius as usize + 1).min(width);
                        let area = ((x2 - x1) * (y2 - y1)) as f32;

                        let sum = integral_ref[y2 * stride + x2]
                            - integral_ref[y1 * stride + x2]
                            - integral_ref[y2 * stride + x1]
                            + integral_ref[y1 * stride + x1];
                        let dist = (sum as f32) / area;

                        let w_luma = (-dist * inv_h2_luma).exp();
                        let w_color = (-dist * inv_h2_color).exp();

                        let src_x = clamp_coord(x as isize + off_x, width);
                        let src = src_y * width + src_x;
                        acc[0] += w_luma * y[src];
                        acc[1] += w_color * cb[src];
                        acc[2] += w_color * cr[src];
                        acc[3] += w_luma;
                        acc[4] += w_color;
                    }
                });
        }
    }

    // The zero offset always contributes weight 1.0, so the totals are
    // strictly positive.
    let out_y: Vec<f32> = accum.par_iter().map(|a| a[0] / a[3]).collect();
    let out_cb: Vec<f32> = accum.par_iter().map(|a| a[1] / a[4]).collect();
    let out_cr: Vec<f32> = accum.par_iter().map(|a| a[2] / a[4]).collect();
    (out_y, out_cb, out_cr)
}

/// Clamp a possibly-negative coordinate into `[0, max)` (border replication).
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn clamp_coord(v: isize, max: usize) -> usize {
    v.clamp(0, max as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Deterministic pseudo-noise so tests never depend on an RNG crate.
    fn lcg_noise(seed: &mut u32) -> i32 {
        *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((*seed >> 24) as i32) - 128
    }

    fn stddev(values: impl Iterator<Item = f32> + Clone) -> f32 {
        let n = values.clone().count() as f32;
        let mean = values.clone().sum::<f32>() / n;
        (values.map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt()
    }

    #[test]
    fn flat_image_stays_flat() {
        let img = RgbImage::from_pixel(24, 18, Rgb([100, 150, 200]));
        let out = denoise(&img);
        assert_eq!(out.dimensions(), (24, 18));
        for px in out.pixels() {
            for ch in 0..3 {
                let diff = (i32::from(px[ch]) - i32::from(img.get_pixel(0, 0)[ch])).abs();
                assert!(diff <= 1, "flat pixel drifted by {diff}");
            }
        }
    }

    #[test]
    fn noise_variance_is_reduced() {
        let mut seed = 7_u32;
        let mut img = RgbImage::new(48, 48);
        for px in img.pixels_mut() {
            let n = lcg_noise(&mut seed) / 8;
            let v = (128 + n).clamp(0, 255);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                *px = Rgb([v as u8, v as u8, v as u8]);
            }
        }

        let out = denoise(&img);

        let before = stddev(img.pixels().map(|p| f32::from(p[0])));
        let after = stddev(out.pixels().map(|p| f32::from(p[0])));
        assert!(
            after < before,
            "expected variance reduction, before={before} after={after}"
        );
    }

    #[test]
    fn one_pixel_image_is_handled() {
        let img = RgbImage::from_pixel(1, 1, Rgb([42, 43, 44]));
        let out = denoise(&img);
        assert_eq!(out.dimensions(), (1, 1));
    }

    #[test]
    fn denoise_is_deterministic() {
        let mut seed = 99_u32;
        let mut img = RgbImage::new(20, 20);
        for px in img.pixels_mut() {
            let v = (128 + lcg_noise(&mut seed) / 4).clamp(0, 255);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                *px = Rgb([v as u8, v as u8, v as u8]);
            }
        }
        assert_eq!(denoise(&img), denoise(&img));
    }
}
