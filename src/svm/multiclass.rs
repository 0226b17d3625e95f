//! One-vs-rest decomposition over binary linear SVMs

use super::binary::{train_linear, LinearModel};
use crate::core::{argmax, Matrix, Result, ScanError, SvmConfig};
use crate::utils::validation;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Multiclass linear SVM: one hyperplane per class against all others
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneVsRestSvm {
    config: SvmConfig,
    n_classes: usize,
    /// Empty until fitted, then one model per class
    models: Vec<LinearModel>,
}

impl OneVsRestSvm {
    pub fn new(config: SvmConfig, n_classes: usize) -> Self {
        Self {
            config,
            n_classes,
            models: Vec::new(),
        }
    }

    pub fn config(&self) -> &SvmConfig {
        &self.config
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn models(&self) -> &[LinearModel] {
        &self.models
    }

    pub fn is_fitted(&self) -> bool {
        !self.models.is_empty()
    }

    /// Input dimensionality, once fitted
    pub fn n_features(&self) -> Option<usize> {
        self.models.first().map(|m| m.weights.len())
    }

    /// Check a deserialized model for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !self.is_fitted() {
            return Err(ScanError::NotFitted("OneVsRestSvm"));
        }
        validation::check_dim(self.n_classes, self.models.len())?;
        let dim = self.models[0].weights.len();
        for model in &self.models {
            validation::check_dim(dim, model.weights.len())?;
        }
        Ok(())
    }

    /// Train class `k` as +1 against the rest as -1, for every class
    pub fn fit(&mut self, x: &Matrix, labels: &[usize]) -> Result<()> {
        if self.is_fitted() {
            return Err(ScanError::AlreadyFitted("OneVsRestSvm"));
        }
        if x.rows() == 0 {
            return Err(ScanError::EmptyDataset);
        }
        if self.n_classes < 2 {
            return Err(ScanError::InvalidParameter(format!(
                "One-vs-rest needs at least 2 classes, got {}",
                self.n_classes
            )));
        }
        validation::check_dim(x.rows(), labels.len())?;
        validation::validate_labels(labels, self.n_classes)?;
        self.config.validate()?;

        info!(
            "Training {} one-vs-rest SVMs on {} samples x {} features ({} passes)",
            self.n_classes,
            x.rows(),
            x.cols(),
            self.config.n_iters
        );

        let mut models = Vec::with_capacity(self.n_classes);
        for class in 0..self.n_classes {
            let y: Vec<f64> = labels
                .iter()
                .map(|&l| if l == class { 1.0 } else { -1.0 })
                .collect();
            let model = train_linear(x, &y, &self.config);
            debug!("Class {class}: bias {:.4}", model.bias);
            models.push(model);
        }

        self.models = models;
        Ok(())
    }

    /// Per-class `w·x - b`
    pub fn decision_function(&self, x: &[f64]) -> Result<Vec<f64>> {
        let dim = self.n_features().ok_or(ScanError::NotFitted("OneVsRestSvm"))?;
        validation::check_dim(dim, x.len())?;
        Ok(self.models.iter().map(|m| m.decision(x)).collect())
    }

    /// Class with the largest decision value, lowest index on ties
    pub fn predict(&self, x: &[f64]) -> Result<usize> {
        Ok(argmax(&self.decision_function(x)?))
    }

    pub fn predict_batch(&self, x: &Matrix) -> Result<Vec<usize>> {
        (0..x.rows()).map(|r| self.predict(x.row(r))).collect()
    }
}
