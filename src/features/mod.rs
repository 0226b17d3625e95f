//! Texture and gradient feature extraction
//!
//! - **GLCM**: horizontal co-occurrence matrix reduced to Haralick statistics
//! - **HOG**: per-cell orientation histograms of central-difference gradients
//!
//! In full mode the vector is laid out as
//! `global GLCM (4) | global HOG | for each 3x3 grid cell: GLCM (4) | HOG`,
//! with grid cells in row-major order.

pub mod glcm;
pub mod hog;

pub use self::glcm::{glcm_features, glcm_matrix, quantize, HaralickStats};
pub use self::hog::{compute_gradients, hog_descriptor, hog_from_gradients, hog_len, GradientField};

use crate::core::{FeatureConfig, FeatureMode, Matrix, Result, ScanError};
use crate::preprocess::resize_nearest;
use image::{imageops, GrayImage};

/// Feature vector plus the intermediate maps worth showing to a user
#[derive(Debug, Clone)]
pub struct FeatureReport {
    pub vector: Vec<f64>,
    /// Global co-occurrence matrix of the preprocessed image
    pub glcm: Matrix,
    /// Haralick statistics of `glcm`
    pub haralick: HaralickStats,
    /// Gradient magnitude of the preprocessed image
    pub gradient_magnitude: Matrix,
}

/// Configured feature extractor
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        if config.levels == 0 || config.levels > 256 {
            return Err(ScanError::InvalidParameter(format!(
                "Quantization levels must be in 1..=256, got {}",
                config.levels
            )));
        }
        if config.bins == 0
            || config.cell_size == 0
            || config.compact_cell_size == 0
            || config.grid == 0
        {
            return Err(ScanError::InvalidParameter(
                "HOG bins, cell sizes and grid must be non-zero".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Expected vector length for a preprocessed image of `image_size` square
    pub fn feature_len(&self, image_size: u32) -> usize {
        let c = &self.config;
        match c.mode {
            FeatureMode::Full => {
                let global = 4 + hog_len(c.global_hog_size, c.global_hog_size, c.cell_size, c.bins);
                let local = 4 + hog_len(c.local_hog_size, c.local_hog_size, c.cell_size, c.bins);
                global + (c.grid * c.grid) as usize * local
            }
            FeatureMode::Compact => {
                4 + hog_len(image_size, image_size, c.compact_cell_size, c.bins)
            }
        }
    }

    /// Extract the configured feature vector
    pub fn extract(&self, image: &GrayImage) -> Vec<f64> {
        match self.config.mode {
            FeatureMode::Full => self.extract_full_features(image),
            FeatureMode::Compact => self.extract_compact_features(image),
        }
    }

    /// Global GLCM + HOG followed by a grid of local GLCM + HOG
    ///
    /// HOG passes run on nearest-neighbor stretched copies (the whole image
    /// at `global_hog_size`, each grid cell at `local_hog_size`) so the
    /// vector length does not depend on the input size.
    pub fn extract_full_features(&self, image: &GrayImage) -> Vec<f64> {
        let c = &self.config;
        let mut features = Vec::new();

        let global_small = resize_nearest(image, c.global_hog_size, c.global_hog_size);
        features.extend(glcm_features(image, c.levels).to_array());
        features.extend(hog_descriptor(&global_small, c.cell_size, c.bins));

        let (width, height) = image.dimensions();
        let step_h = height / c.grid;
        let step_w = width / c.grid;
        for r in 0..c.grid {
            for col in 0..c.grid {
                let cell =
                    imageops::crop_imm(image, col * step_w, r * step_h, step_w, step_h).to_image();
                let cell_small = resize_nearest(&cell, c.local_hog_size, c.local_hog_size);
                features.extend(glcm_features(&cell, c.levels).to_array());
                features.extend(hog_descriptor(&cell_small, c.cell_size, c.bins));
            }
        }

        features
    }

    /// Global GLCM + HOG on the image as-is
    pub fn extract_compact_features(&self, image: &GrayImage) -> Vec<f64> {
        let c = &self.config;
        let mut features = Vec::new();
        features.extend(glcm_features(image, c.levels).to_array());
        features.extend(hog_descriptor(image, c.compact_cell_size, c.bins));
        features
    }

    /// Extract the vector together with its global GLCM and gradient map
    pub fn extract_with_artifacts(&self, image: &GrayImage) -> FeatureReport {
        let glcm = glcm_matrix(image, self.config.levels);
        let haralick = HaralickStats::from_glcm(&glcm);
        let gradient_magnitude = compute_gradients(image).magnitude;
        FeatureReport {
            vector: self.extract(image),
            glcm,
            haralick,
            gradient_magnitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn texture() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| {
            Luma([((x * 13 + y * 29 + (x ^ y) * 7 + (x * y) % 17) % 256) as u8])
        })
    }

    fn extractor(mode: FeatureMode) -> FeatureExtractor {
        FeatureExtractor::new(FeatureConfig {
            mode,
            ..FeatureConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_full_feature_length() {
        let ext = extractor(FeatureMode::Full);
        assert_eq!(ext.feature_len(64), 508);
        assert_eq!(ext.extract(&texture()).len(), 508);
    }

    #[test]
    fn test_full_feature_length_independent_of_size() {
        let ext = extractor(FeatureMode::Full);
        let img = GrayImage::from_fn(100, 37, |x, y| Luma([((x + 3 * y) % 256) as u8]));
        assert_eq!(ext.extract(&img).len(), 508);
    }

    #[test]
    fn test_compact_feature_length() {
        let ext = extractor(FeatureMode::Compact);
        assert_eq!(ext.feature_len(64), 4 + 64 * 9);
        assert_eq!(ext.extract(&texture()).len(), 580);
    }

    #[test]
    fn test_full_features_layout() {
        let ext = extractor(FeatureMode::Full);
        let img = texture();
        let v = ext.extract_full_features(&img);

        let global_glcm = glcm_features(&img, 8).to_array();
        assert_eq!(&v[0..4], &global_glcm);

        // First grid cell sits right after the 4 + 144 global values
        let cell = imageops::crop_imm(&img, 0, 0, 21, 21).to_image();
        assert_eq!(&v[148..152], &glcm_features(&cell, 8).to_array());

        // Last grid cell
        let cell = imageops::crop_imm(&img, 42, 42, 21, 21).to_image();
        assert_eq!(&v[468..472], &glcm_features(&cell, 8).to_array());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let ext = extractor(FeatureMode::Full);
        let img = texture();
        let a = ext.extract_full_features(&img);
        let b = ext.extract_full_features(&img);
        let a_bits: Vec<u64> = a.iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u64> = b.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn test_artifacts_match_vector() {
        let ext = extractor(FeatureMode::Full);
        let report = ext.extract_with_artifacts(&texture());
        assert_eq!(report.vector.len(), 508);
        assert_eq!(report.glcm.shape(), (8, 8));
        assert_eq!(report.gradient_magnitude.shape(), (64, 64));
        assert_eq!(&report.vector[0..4], &report.haralick.to_array());
    }

    #[test]
    fn test_tiny_image_does_not_panic() {
        let ext = extractor(FeatureMode::Full);
        let img = GrayImage::from_fn(2, 2, |x, _| Luma([x as u8 * 200]));
        assert_eq!(ext.extract(&img).len(), 508);
    }

    #[test]
    fn test_invalid_config() {
        let config = FeatureConfig {
            levels: 0,
            ..FeatureConfig::default()
        };
        assert!(FeatureExtractor::new(config).is_err());
    }
}
