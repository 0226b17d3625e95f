//! Gaussian kernel construction and 2D convolution

use crate::core::{Matrix, Result, ScanError};
use image::{GrayImage, Luma};
use std::f64::consts::PI;

/// Build a normalized `size x size` isotropic Gaussian kernel
///
/// Weights are the 2D normal density at integer offsets from `size / 2`,
/// divided by their sum. Even sizes yield a kernel whose peak sits one
/// half-step off center.
pub fn gaussian_kernel(size: usize, sigma: f64) -> Result<Matrix> {
    if size == 0 {
        return Err(ScanError::InvalidParameter(
            "Kernel size must be positive".to_string(),
        ));
    }
    if !(sigma > 0.0) {
        return Err(ScanError::InvalidParameter(format!(
            "Sigma must be positive, got {sigma}"
        )));
    }

    let center = (size / 2) as f64;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let norm = 1.0 / (PI * two_sigma_sq);

    let mut kernel = Matrix::zeros(size, size);
    let mut sum = 0.0;
    for x in 0..size {
        for y in 0..size {
            let dx = x as f64 - center;
            let dy = y as f64 - center;
            let val = norm * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
            kernel.set(x, y, val);
            sum += val;
        }
    }

    for x in 0..size {
        for y in 0..size {
            kernel.set(x, y, kernel.get(x, y) / sum);
        }
    }
    Ok(kernel)
}

/// Convolve with zero padding; output has the input's shape
///
/// Each output pixel is the weighted sum of the window under the kernel,
/// truncated toward zero and saturated into `u8`.
pub fn convolve(image: &GrayImage, kernel: &Matrix) -> GrayImage {
    let (k_h, k_w) = kernel.shape();
    let pad_h = (k_h / 2) as i64;
    let pad_w = (k_w / 2) as i64;
    let (width, height) = image.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0.0;
        for ki in 0..k_h {
            // Row in the padded image is y + ki; shift back into source coordinates.
            let src_y = y as i64 + ki as i64 - pad_h;
            if src_y < 0 || src_y >= height as i64 {
                continue;
            }
            for kj in 0..k_w {
                let src_x = x as i64 + kj as i64 - pad_w;
                if src_x < 0 || src_x >= width as i64 {
                    continue;
                }
                let pixel = image.get_pixel(src_x as u32, src_y as u32)[0];
                acc += kernel.get(ki, kj) * pixel as f64;
            }
        }
        Luma([acc as u8])
    })
}
