//! Structural similarity over grayscale images.
//!
//! Uniform (box) window, reflective boundary, sample covariance, 8-bit data
//! range. The mean is taken over the interior, away from the padded border.

use image::GrayImage;

pub const DEFAULT_WINDOW: usize = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Index into `0..n` with half-sample symmetric reflection (`d c b a | a b c d`).
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let mut i = i;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        } else {
            return i as usize;
        }
    }
}

/// Separable box filter of odd `size` over a row-major `width x height` buffer.
fn uniform_filter(data: &[f64], width: usize, height: usize, size: usize) -> Vec<f64> {
    let r = (size / 2) as isize;
    let norm = size as f64;

    let mut rows = vec![0.0; data.len()];
    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 0..width {
            let sum: f64 = (-r..=r)
                .map(|k| row[reflect(x as isize + k, width)])
                .sum();
            rows[y * width + x] = sum / norm;
        }
    }

    let mut out = vec![0.0; data.len()];
    for y in 0..height {
        for x in 0..width {
            let sum: f64 = (-r..=r)
                .map(|k| rows[reflect(y as isize + k, height) * width + x])
                .sum();
            out[y * width + x] = sum / norm;
        }
    }
    out
}

/// Largest odd window not exceeding `preferred` or either image side.
fn effective_window(preferred: usize, width: usize, height: usize) -> usize {
    let limit = preferred.min(width).min(height);
    if limit % 2 == 0 { limit.saturating_sub(1) } else { limit }
}

/// Single SSIM term from means, variances and covariance.
fn ssim_term(ux: f64, uy: f64, vx: f64, vy: f64, vxy: f64) -> f64 {
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);
    let a1 = 2.0 * ux * uy + c1;
    let a2 = 2.0 * vxy + c2;
    let b1 = ux * ux + uy * uy + c1;
    let b2 = vx + vy + c2;
    (a1 * a2) / (b1 * b2)
}

/// SSIM with one window spanning the whole image.
fn global_ssim(x: &[u8], y: &[u8]) -> f64 {
    let n = x.len() as f64;
    let ux = x.iter().map(|&v| v as f64).sum::<f64>() / n;
    let uy = y.iter().map(|&v| v as f64).sum::<f64>() / n;
    // Sample covariance; a single pixel has none.
    let denom = if x.len() > 1 { n - 1.0 } else { 1.0 };
    let (mut vx, mut vy, mut vxy) = (0.0, 0.0, 0.0);
    for (&p, &q) in x.iter().zip(y) {
        let (dx, dy) = (p as f64 - ux, q as f64 - uy);
        vx += dx * dx;
        vy += dy * dy;
        vxy += dx * dy;
    }
    ssim_term(ux, uy, vx / denom, vy / denom, vxy / denom)
}

/// Mean SSIM of two equally sized images.
///
/// Returns 0.0 for mismatched sizes or empty images. Images too small for a
/// 3x3 window are compared with a single window over all pixels.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage, window: usize) -> f64 {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return 0.0;
    }
    let (width, height) = (a.width() as usize, a.height() as usize);
    let win = effective_window(window, width, height);
    if win < 3 {
        return global_ssim(a.as_raw(), b.as_raw());
    }

    let x: Vec<f64> = a.as_raw().iter().map(|&v| v as f64).collect();
    let y: Vec<f64> = b.as_raw().iter().map(|&v| v as f64).collect();
    let xx: Vec<f64> = x.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = y.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = x.iter().zip(&y).map(|(p, q)| p * q).collect();

    let ux = uniform_filter(&x, width, height, win);
    let uy = uniform_filter(&y, width, height, win);
    let uxx = uniform_filter(&xx, width, height, win);
    let uyy = uniform_filter(&yy, width, height, win);
    let uxy = uniform_filter(&xy, width, height, win);

    let np = (win * win) as f64;
    let cov_norm = np / (np - 1.0);

    let pad = (win - 1) / 2;
    let mut total = 0.0;
    let mut count = 0usize;
    for row in pad..height - pad {
        for col in pad..width - pad {
            let i = row * width + col;
            let vx = cov_norm * (uxx[i] - ux[i] * ux[i]);
            let vy = cov_norm * (uyy[i] - uy[i] * uy[i]);
            let vxy = cov_norm * (uxy[i] - ux[i] * uy[i]);
            total += ssim_term(ux[i], uy[i], vx, vy, vxy);
            count += 1;
        }
    }

    if count == 0 { 0.0 } else { total / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x + y) % 2 * 255) as u8]))
    }

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]))
    }

    fn negative(img: &GrayImage) -> GrayImage {
        GrayImage::from_fn(img.width(), img.height(), |x, y| {
            Luma([255 - img.get_pixel(x, y)[0]])
        })
    }

    #[test]
    fn test_reflect() {
        let idx: Vec<usize> = (-3..8).map(|i| reflect(i, 5)).collect();
        assert_eq!(idx, vec![2, 1, 0, 0, 1, 2, 3, 4, 4, 3, 2]);
    }

    #[test]
    fn test_uniform_filter_constant() {
        let data = vec![4.0; 12];
        let out = uniform_filter(&data, 4, 3, 3);
        assert!(out.iter().all(|v| (v - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_identity_is_one() {
        for img in [gradient(32, 24), checkerboard(16, 16)] {
            let s = structural_similarity(&img, &img, DEFAULT_WINDOW);
            assert!((s - 1.0).abs() < 1e-9, "ssim(x, x) = {s}");
        }
    }

    #[test]
    fn test_symmetric() {
        let a = gradient(20, 20);
        let b = checkerboard(20, 20);
        assert_eq!(
            structural_similarity(&a, &b, DEFAULT_WINDOW),
            structural_similarity(&b, &a, DEFAULT_WINDOW)
        );
    }

    #[test]
    fn test_negative_is_not_similar() {
        let img = checkerboard(16, 16);
        assert!(structural_similarity(&img, &negative(&img), DEFAULT_WINDOW) <= 0.0);
    }

    #[test]
    fn test_tiny_images_use_one_window() {
        let tiny = GrayImage::from_raw(2, 2, vec![10, 200, 90, 30]).unwrap();
        assert_eq!(structural_similarity(&tiny, &tiny, DEFAULT_WINDOW), 1.0);
        let strip = gradient(2, 9);
        assert_eq!(structural_similarity(&strip, &strip, DEFAULT_WINDOW), 1.0);
        let single = GrayImage::from_raw(1, 1, vec![77]).unwrap();
        assert_eq!(structural_similarity(&single, &single, DEFAULT_WINDOW), 1.0);

        assert!(structural_similarity(&tiny, &negative(&tiny), DEFAULT_WINDOW) <= 0.0);
        let other = GrayImage::from_raw(2, 2, vec![30, 90, 200, 10]).unwrap();
        assert_eq!(
            structural_similarity(&tiny, &other, DEFAULT_WINDOW),
            structural_similarity(&other, &tiny, DEFAULT_WINDOW)
        );
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(structural_similarity(&GrayImage::new(0, 0), &GrayImage::new(0, 0), DEFAULT_WINDOW), 0.0);
        assert_eq!(
            structural_similarity(&GrayImage::new(8, 8), &GrayImage::new(9, 8), DEFAULT_WINDOW),
            0.0
        );
        // Narrow images fall back to a smaller odd window.
        assert_eq!(effective_window(7, 5, 40), 5);
        assert_eq!(effective_window(7, 4, 40), 3);
    }
}
