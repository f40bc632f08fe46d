use image::RgbImage;

use crate::foundation::error::{StoryError, StoryResult};

const CHANNELS: usize = 3;

/// Separable gaussian blur over a tightly packed RGB8 raster.
pub fn blur_rgb8(image: &RgbImage, radius: u32, sigma: f32) -> StoryResult<RgbImage> {
    let (width, height) = image.dimensions();
    if radius == 0 {
        return Ok(image.clone());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let src = image.as_raw();
    let mut tmp = vec![0u8; src.len()];
    let mut out = vec![0u8; src.len()];

    convolve(src, &mut tmp, width, height, &kernel, Axis::Horizontal);
    convolve(&tmp, &mut out, width, height, &kernel, Axis::Vertical);
    RgbImage::from_raw(width, height, out)
        .ok_or_else(|| StoryError::validation("blur output buffer size mismatch"))
}

/// Vertical-only gaussian blur; equivalent to [`blur_rgb8`] when every row is uniform.
pub fn blur_rgb8_vertical(image: &RgbImage, radius: u32, sigma: f32) -> StoryResult<RgbImage> {
    let (width, height) = image.dimensions();
    if radius == 0 {
        return Ok(image.clone());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let src = image.as_raw();
    let mut out = vec![0u8; src.len()];
    convolve(src, &mut out, width, height, &kernel, Axis::Vertical);
    RgbImage::from_raw(width, height, out)
        .ok_or_else(|| StoryError::validation("blur output buffer size mismatch"))
}

/// Sigma used for a blur of `radius` pixels when none is configured.
pub fn default_sigma(radius: u32) -> f32 {
    (radius as f32 / 2.0).max(0.5)
}

/// Unit weight in q16 fixed point.
const Q16_ONE: i64 = 1 << 16;

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> StoryResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![Q16_ONE as u32]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(StoryError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let two_sigma_sq = 2.0 * f64::from(sigma) * f64::from(sigma);
    let weights: Vec<f64> = (-r..=r)
        .map(|i| (-f64::from(i * i) / two_sigma_sq).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(StoryError::validation("gaussian kernel sum is zero"));
    }

    let mut q: Vec<i64> = weights
        .iter()
        .map(|w| ((w / total) * Q16_ONE as f64).round() as i64)
        .collect();
    // Rounding drift goes to the center tap so the kernel sums to exactly one.
    let drift = Q16_ONE - q.iter().sum::<i64>();
    q[radius as usize] = (q[radius as usize] + drift).clamp(0, Q16_ONE);
    Ok(q.into_iter().map(|v| v.clamp(0, Q16_ONE) as u32).collect())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// One 1D convolution pass along `axis`, clamping at the raster edges.
fn convolve(src: &[u8], dst: &mut [u8], width: u32, height: u32, kernel: &[u32], axis: Axis) {
    let (w, h) = (width as usize, height as usize);
    // (lines, samples per line, offset between lines, offset between samples)
    let (lines, len, line_step, step) = match axis {
        Axis::Horizontal => (h, w, w * CHANNELS, CHANNELS),
        Axis::Vertical => (w, h, CHANNELS, w * CHANNELS),
    };
    let radius = kernel.len() / 2;
    for line in 0..lines {
        let base = line * line_step;
        for i in 0..len {
            let mut acc = [0u64; CHANNELS];
            for (ki, &kw) in kernel.iter().enumerate() {
                let s = (i + ki).saturating_sub(radius).min(len - 1);
                let idx = base + s * step;
                for (a, &v) in acc.iter_mut().zip(&src[idx..idx + CHANNELS]) {
                    *a += u64::from(kw) * u64::from(v);
                }
            }
            let out = base + i * step;
            for (d, a) in dst[out..out + CHANNELS].iter_mut().zip(acc) {
                *d = q16_to_u8(a);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + (1 << 15)) >> 16).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_radius_0_is_identity() {
        let img = RgbImage::from_raw(1, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(blur_rgb8(&img, 0, 1.0).unwrap(), img);
        assert_eq!(blur_rgb8_vertical(&img, 0, 1.0).unwrap(), img);
    }

    #[test]
    fn blur_constant_image_is_identity() {
        let img = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        assert_eq!(blur_rgb8(&img, 3, 2.0).unwrap(), img);
    }

    #[test]
    fn blur_spreads_energy_from_single_pixel() {
        let mut img = RgbImage::new(5, 5);
        img.put_pixel(2, 2, image::Rgb([255, 255, 255]));

        let out = blur_rgb8(&img, 2, 1.2).unwrap();

        let nonzero = out.pixels().filter(|px| px[0] != 0).count();
        assert!(nonzero > 1);

        let sum: u32 = out.pixels().map(|px| u32::from(px[0])).sum();
        assert!((sum as i32 - 255).abs() <= 4);
    }

    #[test]
    fn vertical_blur_matches_full_blur_on_uniform_rows() {
        let mut img = RgbImage::new(6, 8);
        for (_, y, px) in img.enumerate_pixels_mut() {
            let v = (y * 30) as u8;
            *px = image::Rgb([v, 255 - v, v / 2]);
        }
        let full = blur_rgb8(&img, 2, 1.0).unwrap();
        let vertical = blur_rgb8_vertical(&img, 2, 1.0).unwrap();
        assert_eq!(full, vertical);
    }

    #[test]
    fn kernel_is_symmetric_and_sums_to_one() {
        let k = gaussian_kernel_q16(4, 2.0).unwrap();
        assert_eq!(k.len(), 9);
        assert_eq!(k.iter().map(|&v| u64::from(v)).sum::<u64>(), 1 << 16);
        assert!((0..4).all(|i| k[i] == k[8 - i] && k[i] <= k[i + 1]));
    }

    #[test]
    fn passes_blur_only_along_their_axis() {
        let mut img = RgbImage::new(5, 5);
        img.put_pixel(2, 2, image::Rgb([255, 255, 255]));
        let kernel = gaussian_kernel_q16(1, 1.0).unwrap();

        let mut h = vec![0u8; img.as_raw().len()];
        convolve(img.as_raw(), &mut h, 5, 5, &kernel, Axis::Horizontal);
        let mut v = vec![0u8; img.as_raw().len()];
        convolve(img.as_raw(), &mut v, 5, 5, &kernel, Axis::Vertical);

        let lit = |buf: &[u8]| -> Vec<(usize, usize)> {
            (0..25)
                .filter(|i| buf[i * 3] != 0)
                .map(|i| (i % 5, i / 5))
                .collect()
        };
        assert_eq!(lit(&h), vec![(1, 2), (2, 2), (3, 2)]);
        assert_eq!(lit(&v), vec![(2, 1), (2, 2), (2, 3)]);
    }

    #[test]
    fn rejects_bad_sigma() {
        let img = RgbImage::new(2, 2);
        assert!(blur_rgb8(&img, 2, 0.0).is_err());
        assert!(blur_rgb8(&img, 2, f32::NAN).is_err());
    }
}
