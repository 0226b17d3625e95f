//! Gray-Level Co-occurrence Matrix and Haralick texture statistics

use crate::core::Matrix;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Map 8-bit intensities onto `levels` bins: `floor(p / (256 / levels))`
pub fn quantize(image: &GrayImage, levels: usize) -> GrayImage {
    let ratio = 256.0 / levels as f64;
    let top = (levels - 1) as f64;
    let mut quantized = image.clone();
    for pixel in quantized.pixels_mut() {
        pixel[0] = (pixel[0] as f64 / ratio).floor().min(top) as u8;
    }
    quantized
}

/// Normalized co-occurrence matrix for the horizontal offset (dx = 1, dy = 0)
///
/// Counts every (pixel, right neighbor) pair of quantized intensities and
/// divides by the pair count. An image with no horizontal neighbor pair
/// yields an all-zero matrix.
pub fn glcm_matrix(image: &GrayImage, levels: usize) -> Matrix {
    let quantized = quantize(image, levels);
    let (width, height) = quantized.dimensions();
    let mut glcm = Matrix::zeros(levels, levels);

    let mut total = 0usize;
    for y in 0..height {
        for x in 0..width.saturating_sub(1) {
            let i = quantized.get_pixel(x, y)[0] as usize;
            let j = quantized.get_pixel(x + 1, y)[0] as usize;
            glcm.add_at(i, j, 1.0);
            total += 1;
        }
    }

    if total == 0 {
        return glcm;
    }
    let total = total as f64;
    for i in 0..levels {
        for j in 0..levels {
            glcm.set(i, j, glcm.get(i, j) / total);
        }
    }
    glcm
}

/// The four Haralick descriptors used by the feature vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HaralickStats {
    pub contrast: f64,
    pub energy: f64,
    pub homogeneity: f64,
    pub correlation: f64,
}

impl HaralickStats {
    /// Compute from a normalized co-occurrence matrix
    ///
    /// Mean and deviation come from the row-index marginal. Correlation
    /// stays 0 when that deviation is 0.
    pub fn from_glcm(p: &Matrix) -> Self {
        let levels = p.rows();

        let mut mean = 0.0;
        for i in 0..levels {
            for j in 0..levels {
                mean += i as f64 * p.get(i, j);
            }
        }
        let mut variance = 0.0;
        for i in 0..levels {
            for j in 0..levels {
                variance += (i as f64 - mean).powi(2) * p.get(i, j);
            }
        }
        let std = variance.sqrt();

        let mut stats = HaralickStats::default();
        for i in 0..levels {
            for j in 0..levels {
                let val = p.get(i, j);
                let diff = i as f64 - j as f64;
                stats.contrast += diff * diff * val;
                stats.energy += val * val;
                stats.homogeneity += val / (1.0 + diff.abs());
                if std > 0.0 {
                    stats.correlation += (i as f64 - mean) * (j as f64 - mean) * val / (std * std);
                }
            }
        }
        stats
    }

    /// [contrast, energy, homogeneity, correlation]
    pub fn to_array(&self) -> [f64; 4] {
        [self.contrast, self.energy, self.homogeneity, self.correlation]
    }
}

/// Quantize, build the GLCM and reduce it to Haralick statistics
pub fn glcm_features(image: &GrayImage, levels: usize) -> HaralickStats {
    HaralickStats::from_glcm(&glcm_matrix(image, levels))
}
