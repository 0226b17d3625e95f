//! Utility functions shared by the fitted models

use crate::core::{Matrix, Result, ScanError};

/// Feature scaling utilities
pub mod scaling {
    use super::*;
    use crate::core::Transform;
    use serde::{Deserialize, Serialize};

    /// Fitted column statistics
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ScalerParams {
        pub mean: Vec<f64>,
        /// Population std per column; zero columns are stored as 1.0
        pub std: Vec<f64>,
    }

    /// Standard (z-score) scaler: `(x - mean) / std`
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct StandardScaler {
        params: Option<ScalerParams>,
    }

    impl StandardScaler {
        /// Create an unfitted scaler
        pub fn new() -> Self {
            Self { params: None }
        }

        /// Rebuild a fitted scaler from stored parameters
        pub fn from_params(params: ScalerParams) -> Result<Self> {
            if params.mean.len() != params.std.len() {
                return Err(ScanError::ShapeMismatch {
                    expected: params.mean.len(),
                    actual: params.std.len(),
                });
            }
            Ok(Self {
                params: Some(params),
            })
        }

        pub fn params(&self) -> Option<&ScalerParams> {
            self.params.as_ref()
        }

        /// Number of features seen at fit time
        pub fn n_features(&self) -> Option<usize> {
            self.params.as_ref().map(|p| p.mean.len())
        }

        fn fitted(&self) -> Result<&ScalerParams> {
            self.params
                .as_ref()
                .ok_or(ScanError::NotFitted("StandardScaler"))
        }
    }

    impl Transform for StandardScaler {
        fn fit(&mut self, x: &Matrix) -> Result<()> {
            if self.params.is_some() {
                return Err(ScanError::AlreadyFitted("StandardScaler"));
            }
            if x.rows() == 0 {
                return Err(ScanError::EmptyDataset);
            }

            let mean = stats::column_means(x);
            let std = stats::column_stds(x, &mean)
                .into_iter()
                .map(|s| if s == 0.0 { 1.0 } else { s })
                .collect();

            self.params = Some(ScalerParams { mean, std });
            Ok(())
        }

        fn transform(&self, x: &Matrix) -> Result<Matrix> {
            let params = self.fitted()?;
            validation::check_dim(params.mean.len(), x.cols())?;

            let mut out = x.clone();
            for r in 0..x.rows() {
                for c in 0..x.cols() {
                    out.set(r, c, (x.get(r, c) - params.mean[c]) / params.std[c]);
                }
            }
            Ok(out)
        }

        fn transform_row(&self, x: &[f64]) -> Result<Vec<f64>> {
            let params = self.fitted()?;
            validation::check_dim(params.mean.len(), x.len())?;

            Ok(x.iter()
                .zip(params.mean.iter().zip(&params.std))
                .map(|(&v, (&m, &s))| (v - m) / s)
                .collect())
        }

        fn is_fitted(&self) -> bool {
            self.params.is_some()
        }
    }
}

/// Validation helpers
pub mod validation {
    use super::*;

    /// Fail with `ShapeMismatch` unless `actual == expected`
    pub fn check_dim(expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(ScanError::ShapeMismatch { expected, actual });
        }
        Ok(())
    }

    /// Ensure every label is a valid class index
    pub fn validate_labels(labels: &[usize], n_classes: usize) -> Result<()> {
        for (i, &label) in labels.iter().enumerate() {
            if label >= n_classes {
                return Err(ScanError::InvalidDataset(format!(
                    "Invalid label {label} at index {i}: expected a class index below {n_classes}"
                )));
            }
        }
        Ok(())
    }

    /// Samples per class
    pub fn class_counts(labels: &[usize], n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; n_classes];
        for &label in labels {
            if label < n_classes {
                counts[label] += 1;
            }
        }
        counts
    }
}

/// Column statistics
pub mod stats {
    use super::*;

    pub fn column_means(x: &Matrix) -> Vec<f64> {
        let mut means = vec![0.0; x.cols()];
        if x.rows() == 0 {
            return means;
        }
        for r in 0..x.rows() {
            for (m, &v) in means.iter_mut().zip(x.row(r)) {
                *m += v;
            }
        }
        let n = x.rows() as f64;
        means.iter_mut().for_each(|m| *m /= n);
        means
    }

    /// Population standard deviation (divides by n)
    pub fn column_stds(x: &Matrix, means: &[f64]) -> Vec<f64> {
        let mut vars = vec![0.0; x.cols()];
        if x.rows() == 0 {
            return vars;
        }
        for r in 0..x.rows() {
            for ((acc, &v), &m) in vars.iter_mut().zip(x.row(r)).zip(means) {
                *acc += (v - m) * (v - m);
            }
        }
        let n = x.rows() as f64;
        vars.into_iter().map(|v| (v / n).sqrt()).collect()
    }
}
