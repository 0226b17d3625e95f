//! Linear SVM classification
//!
//! - [`BinarySvm`]: a single hinge-loss hyperplane
//! - [`OneVsRestSvm`]: one hyperplane per class, argmax over decisions
//! - [`Classifier`]: the stored classifier, with or without calibrated probabilities

pub mod binary;
pub mod multiclass;
pub mod platt;

pub use self::binary::{BinarySvm, LinearModel};
pub use self::multiclass::OneVsRestSvm;
pub use self::platt::PlattParams;

use crate::core::{argmax, Matrix, Prediction, Result, ScanError};
use crate::utils::validation;
use log::info;
use serde::{Deserialize, Serialize};

/// Trained classifier, tagged by the kind of output it can give
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    /// Raw decision values; confidence is always 1.0
    ScoresOnly { svm: OneVsRestSvm },
    /// Decision values mapped through per-class Platt sigmoids
    ProbabilityCapable {
        svm: OneVsRestSvm,
        calibration: Vec<PlattParams>,
    },
}

impl Classifier {
    /// Fit the SVM, then calibrate it on its own training decisions if asked
    pub fn fit(svm: OneVsRestSvm, x: &Matrix, labels: &[usize]) -> Result<Self> {
        let mut svm = svm;
        svm.fit(x, labels)?;
        if !svm.config().probability {
            return Ok(Classifier::ScoresOnly { svm });
        }

        info!("Calibrating class probabilities");
        let decisions: Vec<Vec<f64>> = (0..x.rows())
            .map(|r| svm.decision_function(x.row(r)))
            .collect::<Result<_>>()?;
        let calibration = (0..svm.n_classes())
            .map(|class| {
                let column: Vec<f64> = decisions.iter().map(|d| d[class]).collect();
                let positive: Vec<bool> = labels.iter().map(|&l| l == class).collect();
                PlattParams::fit(&column, &positive)
            })
            .collect();

        Ok(Classifier::ProbabilityCapable { svm, calibration })
    }

    pub fn svm(&self) -> &OneVsRestSvm {
        match self {
            Classifier::ScoresOnly { svm } => svm,
            Classifier::ProbabilityCapable { svm, .. } => svm,
        }
    }

    pub fn has_probabilities(&self) -> bool {
        matches!(self, Classifier::ProbabilityCapable { .. })
    }

    pub fn n_classes(&self) -> usize {
        self.svm().n_classes()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.svm().n_features()
    }

    /// Check a deserialized classifier for internal consistency
    pub fn validate(&self) -> Result<()> {
        self.svm().validate()?;
        if let Classifier::ProbabilityCapable { svm, calibration } = self {
            validation::check_dim(svm.n_classes(), calibration.len())?;
        }
        Ok(())
    }

    /// Per-class scores: raw decisions, or probabilities summing to 1
    pub fn scores(&self, x: &[f64]) -> Result<Vec<f64>> {
        match self {
            Classifier::ScoresOnly { svm } => svm.decision_function(x),
            Classifier::ProbabilityCapable { svm, calibration } => {
                let decisions = svm.decision_function(x)?;
                let raw: Vec<f64> = decisions
                    .iter()
                    .zip(calibration)
                    .map(|(&d, p)| p.probability(d))
                    .collect();
                let total: f64 = raw.iter().sum();
                if total > 0.0 {
                    Ok(raw.into_iter().map(|p| p / total).collect())
                } else {
                    let uniform = 1.0 / raw.len() as f64;
                    Ok(vec![uniform; raw.len()])
                }
            }
        }
    }

    pub fn predict(&self, x: &[f64]) -> Result<Prediction> {
        let scores = self.scores(x)?;
        let class_index = argmax(&scores);
        let confidence = match self {
            Classifier::ScoresOnly { .. } => 1.0,
            Classifier::ProbabilityCapable { .. } => scores[class_index],
        };
        Ok(Prediction::new(class_index, confidence, scores))
    }

    pub fn predict_batch(&self, x: &Matrix) -> Result<Vec<Prediction>> {
        (0..x.rows()).map(|r| self.predict(x.row(r))).collect()
    }
}

impl TryFrom<OneVsRestSvm> for Classifier {
    type Error = ScanError;

    /// Wrap an already fitted SVM without calibration
    fn try_from(svm: OneVsRestSvm) -> Result<Self> {
        svm.validate()?;
        Ok(Classifier::ScoresOnly { svm })
    }
}
