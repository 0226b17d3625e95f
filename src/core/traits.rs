//! Core traits for the scan pipeline

use crate::core::{Matrix, Result, Sample};

/// Dataset abstraction for labeled feature vectors
pub trait Dataset: Send + Sync {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Number of features (dimensionality)
    fn dim(&self) -> usize;

    /// Get a single sample by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_sample(&self, i: usize) -> Sample;

    /// Get all labels as a vector
    fn get_labels(&self) -> Vec<usize>;

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fitted feature-space transform (scaling, projection)
///
/// Implementors start unfitted. `fit` is the only transition and may run once;
/// every transform call before it returns `ScanError::NotFitted`.
pub trait Transform: Send + Sync {
    /// Learn parameters from a sample-by-feature matrix
    fn fit(&mut self, x: &Matrix) -> Result<()>;

    /// Apply to every row of `x`
    fn transform(&self, x: &Matrix) -> Result<Matrix>;

    /// Apply to a single feature vector
    fn transform_row(&self, x: &[f64]) -> Result<Vec<f64>>;

    /// Whether `fit` has run
    fn is_fitted(&self) -> bool;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Matrix) -> Result<Matrix> {
        self.fit(x)?;
        self.transform(x)
    }
}
