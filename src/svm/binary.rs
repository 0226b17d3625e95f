//! Binary linear SVM trained by sub-gradient descent on the hinge loss

use crate::core::{dot, Matrix, Result, ScanError, SvmConfig};
use crate::utils::validation;
use serde::{Deserialize, Serialize};

/// Separating hyperplane `w·x - b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearModel {
    /// Signed distance proxy `w·x - b`
    #[inline]
    pub fn decision(&self, x: &[f64]) -> f64 {
        dot(&self.weights, x) - self.bias
    }
}

/// Two-class linear SVM
///
/// Minimizes `λ‖w‖² + Σ max(0, 1 - y(w·x - b))` with one online update per
/// sample, for a fixed number of full passes.
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySvm {
    config: SvmConfig,
    model: Option<LinearModel>,
}

impl BinarySvm {
    pub fn new(config: SvmConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    pub fn from_model(config: SvmConfig, model: LinearModel) -> Self {
        Self {
            config,
            model: Some(model),
        }
    }

    pub fn model(&self) -> Option<&LinearModel> {
        self.model.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    /// Fit on rows of `x`; labels `<= 0` are the negative class
    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        if self.model.is_some() {
            return Err(ScanError::AlreadyFitted("BinarySvm"));
        }
        if x.rows() == 0 {
            return Err(ScanError::EmptyDataset);
        }
        validation::check_dim(x.rows(), y.len())?;
        self.config.validate()?;

        self.model = Some(train_linear(x, y, &self.config));
        Ok(())
    }

    /// `w·x - b`
    pub fn decision(&self, x: &[f64]) -> Result<f64> {
        let model = self.model.as_ref().ok_or(ScanError::NotFitted("BinarySvm"))?;
        validation::check_dim(model.weights.len(), x.len())?;
        Ok(model.decision(x))
    }

    /// +1 or -1
    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        Ok(if self.decision(x)? >= 0.0 { 1.0 } else { -1.0 })
    }
}

pub(crate) fn train_linear(x: &Matrix, y: &[f64], config: &SvmConfig) -> LinearModel {
    let lr = config.learning_rate;
    let lambda = config.lambda;
    let signs: Vec<f64> = y.iter().map(|&v| if v <= 0.0 { -1.0 } else { 1.0 }).collect();

    let mut w = vec![0.0; x.cols()];
    let mut b = 0.0;

    for _ in 0..config.n_iters {
        for (i, &yi) in signs.iter().enumerate() {
            let xi = x.row(i);
            let margin = yi * (dot(&w, xi) - b);
            if margin >= 1.0 {
                for wj in w.iter_mut() {
                    *wj -= lr * (2.0 * lambda * *wj);
                }
            } else {
                for (wj, &xj) in w.iter_mut().zip(xi) {
                    *wj -= lr * (2.0 * lambda * *wj - yi * xj);
                }
                b -= lr * yi;
            }
        }
    }

    LinearModel {
        weights: w,
        bias: b,
    }
}
