//! Brain MRI tumor classification with classical computer vision
//!
//! Grayscale scans are blurred, cropped to the brain region and resized,
//! described by GLCM texture statistics and HOG gradient histograms, then
//! standardized, optionally projected with PCA, and classified by a
//! one-vs-rest linear SVM.

pub mod api;
pub mod core;
pub mod data;
pub mod features;
pub mod metrics;
pub mod pca;
pub mod persistence;
pub mod preprocess;
pub mod svm;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{Analysis, Diagnosis, InferenceContext, ModelStore, Trainer, TrainingOutcome};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{PipelineConfig, Result, ScanError};
pub use crate::data::{FailedSample, FeatureDataset, ImageFolder, LibSVMDataset};
pub use crate::features::FeatureExtractor;
pub use crate::metrics::EvaluationReport;
pub use crate::pca::Pca;
pub use crate::persistence::ModelArtifacts;
pub use crate::preprocess::Preprocessor;
pub use crate::svm::{Classifier, OneVsRestSvm};
pub use crate::utils::scaling::StandardScaler;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
