//! Global image-quality enhancement chain.
//!
//! Four fixed steps, each feeding the next:
//!
//! 1. CLAHE on the luma channel (clip limit 2.0, 8x8 tile grid)
//! 2. non-local-means color denoising (see [`crate::denoise`])
//! 3. unsharp masking (Gaussian sigma 1.2, `1.6*img - 0.6*blur`)
//! 4. 2x cubic upscale when `max(w, h) < 800`
//!
//! Contrast runs before denoising so the denoiser sees the noise it has to
//! remove, sharpening runs after so it cannot re-amplify it, and upscaling
//! runs last so every filter works at the original resolution. The whole
//! chain is pure and total: any valid `RgbImage` in, a new `RgbImage` out.

use image::{imageops, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::denoise;

/// CLAHE clip limit, as a multiple of the uniform histogram level.
const CLAHE_CLIP_LIMIT: f32 = 2.0;
/// CLAHE tile grid: 8x8 tiles across the image.
const CLAHE_GRID: usize = 8;
/// Gaussian sigma for the unsharp-mask blur.
const UNSHARP_SIGMA: f32 = 1.2;
/// Unsharp blend: `UNSHARP_AMOUNT * image + UNSHARP_BLUR_WEIGHT * blurred`.
const UNSHARP_AMOUNT: f32 = 1.6;
const UNSHARP_BLUR_WEIGHT: f32 = -0.6;
/// Upscale 2x when the larger dimension is below this.
const UPSCALE_BELOW: u32 = 800;

/// Run the full enhancement chain over an image.
///
/// Pure and total; the input is never mutated. The output dimensions are
/// either the input's or exactly double them (upscale is all-or-nothing and
/// applied at most once).
#[must_use]
pub fn enhance(image: &RgbImage) -> RgbImage {
    let contrasted = equalize_luma(image);
    let denoised = denoise::denoise(&contrasted);
    let sharpened = unsharp_mask(&denoised);
    upscale_if_small(sharpened)
}

/// Apply CLAHE to the luma plane only, leaving chroma untouched.
///
/// Boosts local contrast without shifting colors.
fn equalize_luma(image: &RgbImage) -> RgbImage {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let (y, cb, cr) = rgb_to_ycbcr(image);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let luma: Vec<u8> = y.iter().map(|v| v.round().clamp(0.0, 255.0) as u8).collect();
    let equalized = clahe(&luma, width, height, CLAHE_CLIP_LIMIT, CLAHE_GRID);
    let y: Vec<f32> = equalized.iter().map(|&v| f32::from(v)).collect();

    ycbcr_to_rgb(&y, &cb, &cr, image.width(), image.height())
}

/// Contrast-limited adaptive histogram equalization over a tiled grid.
///
/// Each tile gets a clipped, redistributed histogram and a CDF-based lookup
/// table; pixels are mapped through a bilinear blend of the four surrounding
/// tile tables so tile seams stay invisible.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::needless_range_loop
)]
fn clahe(luma: &[u8], width: usize, height: usize, clip_limit: f32, grid: usize) -> Vec<u8> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let tiles_x = grid.min(width);
    let tiles_y = grid.min(height);
    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;

    // Per-tile histograms.
    let mut hists = vec![[0_u32; 256]; tiles_x * tiles_y];
    let mut areas = vec![0_u32; tiles_x * tiles_y];
    for y in 0..height {
        let tj = ((y as f32 / tile_h) as usize).min(tiles_y - 1);
        for x in 0..width {
            let ti = ((x as f32 / tile_w) as usize).min(tiles_x - 1);
            hists[tj * tiles_x + ti][luma[y * width + x] as usize] += 1;
            areas[tj * tiles_x + ti] += 1;
        }
    }

    // Clip, redistribute the excess uniformly, and build per-tile LUTs.
    let mut luts = vec![[0_u8; 256]; tiles_x * tiles_y];
    for t in 0..tiles_x * tiles_y {
        let area = areas[t];
        if area == 0 {
            continue;
        }
        let clip = (clip_limit * area as f32 / 256.0).max(1.0) as u32;

        let mut hist = hists[t];
        let mut excess = 0_u32;
        for bin in &mut hist {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }
        let bonus = excess / 256;
        for bin in &mut hist {
            *bin += bonus;
        }
        // Spread the residual over evenly stepped bins so concentrated
        // histograms do not skew the low end of the CDF.
        let mut residual = (excess % 256) as usize;
        if residual > 0 {
            let step = (256 / residual).max(1);
            let mut i = 0;
            while residual > 0 && i < 256 {
                hist[i] += 1;
                residual -= 1;
                i += step;
            }
        }

        let mut cdf = 0_u32;
        for i in 0..256 {
            cdf += hist[i];
            luts[t][i] = (cdf as f32 * 255.0 / area as f32).round().clamp(0.0, 255.0) as u8;
        }
    }

    // Map every pixel through the bilinear blend of its four neighbor tiles.
    let mut out = vec![0_u8; width * height];
    for y in 0..height {
        let gy = (y as f32 + 0.5) / tile_h - 0.5;
        let j0 = (gy.floor().max(0.0) as usize).min(tiles_y - 1);
        let j1 = (j0 + 1).min(tiles_y - 1);
        let fy = (gy - j0 as f32).clamp(0.0, 1.0);
        for x in 0..width {
            let gx = (x as f32 + 0.5) / tile_w - 0.5;
            let i0 = (gx.floor().max(0.0) as usize).min(tiles_x - 1);
            let i1 = (i0 + 1).min(tiles_x - 1);
            let fx = (gx - i0 as f32).clamp(0.0, 1.0);

            let v = luma[y * width + x] as usize;
            let top = (1.0 - fx) * f32::from(luts[j0 * tiles_x + i0][v])
                + fx * f32::from(luts[j0 * tiles_x + i1][v]);
            let bottom = (1.0 - fx) * f32::from(luts[j1 * tiles_x + i0][v])
                + fx * f32::from(luts[j1 * tiles_x + i1][v]);
            out[y * width + x] = ((1.0 - fy) * top + fy * bottom).round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

/// Sharpen by subtracting a Gaussian-blurred copy.
///
/// The blend stays in f32 and is clamped only when written back out.
fn unsharp_mask(image: &RgbImage) -> RgbImage {
    let blurred = gaussian_blur_f32(image, UNSHARP_SIGMA);
    let mut out = RgbImage::new(image.width(), image.height());

    for (dst, (src, blur)) in out
        .pixels_mut()
        .zip(image.pixels().zip(blurred.pixels()))
    {
        for ch in 0..3 {
            let v = UNSHARP_AMOUNT * f32::from(src[ch]) + UNSHARP_BLUR_WEIGHT * f32::from(blur[ch]);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                dst[ch] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// Upscale 2x with Catmull-Rom (cubic) interpolation when the image is small.
///
/// A cheap stand-in for learned super-resolution, applied at most once.
fn upscale_if_small(image: RgbImage) -> RgbImage {
    if image.width().max(image.height()) < UPSCALE_BELOW {
        imageops::resize(
            &image,
            image.width() * 2,
            image.height() * 2,
            imageops::FilterType::CatmullRom,
        )
    } else {
        image
    }
}

/// Split an RGB image into full-range BT.601 Y/Cb/Cr planes (JPEG convention).
pub(crate) fn rgb_to_ycbcr(image: &RgbImage) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let len = (image.width() * image.height()) as usize;
    let mut y = Vec::with_capacity(len);
    let mut cb = Vec::with_capacity(len);
    let mut cr = Vec::with_capacity(len);

    for px in image.pixels() {
        let r = f32::from(px[0]);
        let g = f32::from(px[1]);
        let b = f32::from(px[2]);
        y.push(0.299 * r + 0.587 * g + 0.114 * b);
        cb.push(128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b);
        cr.push(128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b);
    }

    (y, cb, cr)
}

/// Recombine Y/Cb/Cr planes into an RGB image, clamping at the output.
pub(crate) fn ycbcr_to_rgb(y: &[f32], cb: &[f32], cr: &[f32], width: u32, height: u32) -> RgbImage {
    let mut out = RgbImage::new(width, height);

    for (i, px) in out.pixels_mut().enumerate() {
        let luma = y[i];
        let cb = cb[i] - 128.0;
        let cr = cr[i] - 128.0;
        let r = luma + 1.402 * cr;
        let g = luma - 0.344_136 * cb - 0.714_136 * cr;
        let b = luma + 1.772 * cb;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            px[0] = r.round().clamp(0.0, 255.0) as u8;
            px[1] = g.round().clamp(0.0, 255.0) as u8;
            px[2] = b.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}
