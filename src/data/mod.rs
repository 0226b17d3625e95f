//! Data loading and dataset implementations
//!
//! - [`FeatureDataset`]: dense labeled vectors with a seeded train/test split
//! - [`ImageFolder`] / [`extract_folder`]: category directories to features
//! - [`LibSVMDataset`] / [`write_libsvm`]: the feature cache format

pub mod dataset;
pub mod images;
pub mod libsvm;

pub use self::dataset::FeatureDataset;
pub use self::images::{extract_folder, extract_image, FailedSample, ImageEntry, ImageFolder};
pub use self::libsvm::{write_libsvm, write_libsvm_file, LibSVMDataset};
