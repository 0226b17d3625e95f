//! Pipeline configuration
//!
//! Every stage reads its parameters from here. Defaults reproduce the
//! reference pipeline; a JSON file can override any subset of fields.

use crate::core::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Preprocessing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Side of the square Gaussian kernel (expected odd)
    pub kernel_size: usize,
    /// Gaussian standard deviation
    pub sigma: f64,
    /// Binarization threshold for ROI cropping
    pub roi_threshold: u8,
    /// Side of the square output image
    pub target_size: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            kernel_size: 5,
            sigma: 1.0,
            roi_threshold: 45,
            target_size: 64,
        }
    }
}

/// Layout of the extracted feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    /// Global GLCM + HOG followed by a 3x3 grid of local GLCM + HOG
    Full,
    /// Global GLCM + HOG on the preprocessed image only
    Compact,
}

/// Feature extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub mode: FeatureMode,
    /// GLCM quantization levels
    pub levels: usize,
    /// HOG cell side in full mode
    pub cell_size: usize,
    /// HOG orientation bins over [0, 180)
    pub bins: usize,
    /// Side the image is stretched to before the global HOG pass
    pub global_hog_size: u32,
    /// Side each grid cell is stretched to before its local HOG pass
    pub local_hog_size: u32,
    /// Grid cells per axis
    pub grid: u32,
    /// HOG cell side in compact mode
    pub compact_cell_size: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            mode: FeatureMode::Full,
            levels: 8,
            cell_size: 16,
            bins: 9,
            global_hog_size: 64,
            local_hog_size: 32,
            grid: 3,
            compact_cell_size: 8,
        }
    }
}

/// How many principal components to keep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcaComponents {
    /// Keep exactly this many components
    Fixed(usize),
    /// Keep the fewest components reaching this cumulative variance fraction
    Variance(f64),
}

impl Default for PcaComponents {
    fn default() -> Self {
        PcaComponents::Variance(0.95)
    }
}

impl PcaComponents {
    /// Parse "0.95" as a variance fraction and "40" as a fixed count
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(count) = s.parse::<usize>() {
            return Ok(PcaComponents::Fixed(count));
        }
        s.parse::<f64>()
            .map(PcaComponents::Variance)
            .map_err(|_| ScanError::InvalidParameter(format!("Invalid PCA spec: {s}")))
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            PcaComponents::Fixed(0) => Err(ScanError::InvalidParameter(
                "PCA component count must be at least 1".to_string(),
            )),
            PcaComponents::Variance(f) if !(f > 0.0 && f <= 1.0) => Err(
                ScanError::InvalidParameter(format!("PCA variance fraction must be in (0, 1], got {f}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Linear SVM training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    pub learning_rate: f64,
    /// L2 regularization strength
    pub lambda: f64,
    /// Full passes over the training set
    pub n_iters: usize,
    /// Fit Platt calibration so predictions carry class probabilities
    pub probability: bool,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            lambda: 0.01,
            n_iters: 1000,
            probability: false,
        }
    }
}

impl SvmConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(ScanError::InvalidParameter(format!(
                "Learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.lambda < 0.0 {
            return Err(ScanError::InvalidParameter(format!(
                "Lambda must be non-negative, got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub features: FeatureConfig,
    /// `None` skips dimensionality reduction
    pub pca: Option<PcaComponents>,
    pub svm: SvmConfig,
    pub categories: Vec<String>,
    /// Held-out fraction for evaluation
    pub test_ratio: f64,
    /// Seed for the train/test shuffle
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            features: FeatureConfig::default(),
            pca: None,
            svm: SvmConfig::default(),
            categories: crate::core::DEFAULT_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(ScanError::IoError)?;
        let config: PipelineConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ScanError::SerializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.len() < 2 {
            return Err(ScanError::InvalidParameter(
                "At least 2 categories are required".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.test_ratio) {
            return Err(ScanError::InvalidParameter(format!(
                "Test ratio must be in [0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.features.levels == 0 || self.features.levels > 256 {
            return Err(ScanError::InvalidParameter(format!(
                "Quantization levels must be in 1..=256, got {}",
                self.features.levels
            )));
        }
        if self.features.bins == 0 || self.features.cell_size == 0 || self.features.grid == 0 {
            return Err(ScanError::InvalidParameter(
                "HOG bins, cell size and grid must be non-zero".to_string(),
            ));
        }
        if self.preprocess.target_size == 0 {
            return Err(ScanError::InvalidParameter(
                "Target size must be non-zero".to_string(),
            ));
        }
        if let Some(pca) = &self.pca {
            pca.validate()?;
        }
        self.svm.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.preprocess.target_size, 64);
        assert_eq!(config.preprocess.kernel_size, 5);
        assert_eq!(config.preprocess.roi_threshold, 45);
        assert_eq!(config.features.levels, 8);
        assert_eq!(config.features.cell_size, 16);
        assert_eq!(config.svm.n_iters, 1000);
        assert_eq!(config.svm.learning_rate, 0.001);
        assert_eq!(config.svm.lambda, 0.01);
        assert_eq!(config.categories.len(), 4);
        assert!(config.pca.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pca_components_parse() {
        assert_eq!(PcaComponents::parse("40").unwrap(), PcaComponents::Fixed(40));
        assert_eq!(
            PcaComponents::parse("0.95").unwrap(),
            PcaComponents::Variance(0.95)
        );
        assert!(PcaComponents::parse("lots").is_err());
        assert!(PcaComponents::Fixed(0).validate().is_err());
        assert!(PcaComponents::Variance(1.5).validate().is_err());
    }

    #[test]
    fn test_partial_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"preprocess": {{"target_size": 128}}, "pca": {{"fixed": 20}}, "svm": {{"n_iters": 50}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.preprocess.target_size, 128);
        assert_eq!(config.preprocess.kernel_size, 5);
        assert_eq!(config.pca, Some(PcaComponents::Fixed(20)));
        assert_eq!(config.svm.n_iters, 50);
        assert_eq!(config.svm.lambda, 0.01);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.test_ratio = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.svm.learning_rate = 0.0;
        assert!(config.validate().is_err());
    }
}
