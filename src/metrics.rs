//! Multiclass evaluation metrics
//!
//! Accuracy, a confusion matrix, per-class precision / recall / F1 and
//! one-vs-rest ROC AUC computed from per-class scores.

use crate::core::{Result, ScanError};
use crate::utils::validation;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Write;

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Number of true samples of this class
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * (precision * recall) / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1_score,
            support: tp + fn_,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Evaluation of a set of predictions against ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    /// `confusion[true][predicted]`
    pub confusion: Vec<Vec<usize>>,
    pub per_class: Vec<ClassMetrics>,
    /// One-vs-rest AUC; `None` when a class lacks positives or negatives
    pub auc: Vec<Option<f64>>,
    /// Mean of the defined per-class AUCs
    pub macro_auc: Option<f64>,
}

impl EvaluationReport {
    /// Score predictions
    ///
    /// `scores` holds one per-class score vector per sample (higher means
    /// more likely); pass an empty slice to skip AUC.
    pub fn compute(
        y_true: &[usize],
        y_pred: &[usize],
        scores: &[Vec<f64>],
        n_classes: usize,
    ) -> Result<Self> {
        if y_true.is_empty() {
            return Err(ScanError::EmptyDataset);
        }
        validation::check_dim(y_true.len(), y_pred.len())?;
        validation::validate_labels(y_true, n_classes)?;
        validation::validate_labels(y_pred, n_classes)?;
        if !scores.is_empty() {
            validation::check_dim(y_true.len(), scores.len())?;
            for row in scores {
                validation::check_dim(n_classes, row.len())?;
            }
        }

        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            confusion[t][p] += 1;
        }

        let correct: usize = (0..n_classes).map(|k| confusion[k][k]).sum();
        let accuracy = correct as f64 / y_true.len() as f64;

        let per_class = (0..n_classes)
            .map(|k| {
                let tp = confusion[k][k];
                let fn_: usize = confusion[k].iter().sum::<usize>() - tp;
                let fp: usize = (0..n_classes).map(|t| confusion[t][k]).sum::<usize>() - tp;
                ClassMetrics::from_counts(tp, fp, fn_)
            })
            .collect();

        let auc: Vec<Option<f64>> = if scores.is_empty() {
            vec![None; n_classes]
        } else {
            (0..n_classes)
                .map(|k| {
                    let column: Vec<f64> = scores.iter().map(|s| s[k]).collect();
                    let positive: Vec<bool> = y_true.iter().map(|&t| t == k).collect();
                    roc_auc(&column, &positive)
                })
                .collect()
        };

        let defined: Vec<f64> = auc.iter().flatten().copied().collect();
        let macro_auc = if defined.is_empty() {
            None
        } else {
            Some(defined.iter().sum::<f64>() / defined.len() as f64)
        };

        Ok(Self {
            accuracy,
            confusion,
            per_class,
            auc,
            macro_auc,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.per_class.len()
    }

    /// Unweighted mean F1 over classes
    pub fn macro_f1(&self) -> f64 {
        if self.per_class.is_empty() {
            return 0.0;
        }
        self.per_class.iter().map(|m| m.f1_score).sum::<f64>() / self.per_class.len() as f64
    }

    /// Plain-text table of the per-class metrics and the confusion matrix
    pub fn summary(&self, class_names: &[String]) -> String {
        let name = |k: usize| {
            class_names
                .get(k)
                .cloned()
                .unwrap_or_else(|| format!("class {k}"))
        };
        let width = (0..self.n_classes())
            .map(|k| name(k).len())
            .max()
            .unwrap_or(0)
            .max(12);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "auc", "support"
        );
        for (k, m) in self.per_class.iter().enumerate() {
            let auc = self.auc[k].map_or_else(|| "-".to_string(), |a| format!("{a:.4}"));
            let _ = writeln!(
                out,
                "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9} {:>9}",
                name(k),
                m.precision,
                m.recall,
                m.f1_score,
                auc,
                m.support
            );
        }
        let total: usize = self.per_class.iter().map(|m| m.support).sum();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9.4} {:>9} {:>9}",
            "accuracy", "", "", self.accuracy, "", total
        );
        let macro_auc = self
            .macro_auc
            .map_or_else(|| "-".to_string(), |a| format!("{a:.4}"));
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9.4} {:>9} {:>9}",
            "macro avg", "", "", self.macro_f1(), macro_auc, total
        );

        let _ = writeln!(out);
        let _ = writeln!(out, "Confusion matrix (rows = true, columns = predicted):");
        for row in &self.confusion {
            let cells: Vec<String> = row.iter().map(|c| format!("{c:>6}")).collect();
            let _ = writeln!(out, "{}", cells.join(""));
        }
        out
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic
///
/// Tied scores share the average of their ranks.
pub fn roc_auc(scores: &[f64], positive: &[bool]) -> Option<f64> {
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; a tie group spanning i..=j shares their mean
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let rank_sum: f64 = ranks
        .iter()
        .zip(positive)
        .filter_map(|(&r, &p)| p.then_some(r))
        .sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}
