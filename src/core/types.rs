//! Core type definitions for the scan pipeline

use crate::core::{Result, ScanError};
use serde::{Deserialize, Serialize};

/// Category directory names, in class-index order
pub const DEFAULT_CATEGORIES: [&str; 4] = ["glioma", "meningioma", "notumor", "pituitary"];

/// Label reported when no classifier is loaded
pub const MODEL_NOT_TRAINED: &str = "Model not trained";

/// Human-readable label for a category directory name
pub fn category_label(category: &str) -> String {
    match category {
        "notumor" => "No Tumor".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Dense row-major matrix of f64
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create an identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Wrap a row-major buffer
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "Data must match rows * cols");
        Self { rows, cols, data }
    }

    /// Stack equal-length rows into a matrix
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(ScanError::ShapeMismatch {
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: f64) {
        self.data[r * self.cols + c] = value;
    }

    #[inline]
    pub fn add_at(&mut self, r: usize, c: usize, value: f64) {
        self.data[r * self.cols + c] += value;
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, c)).collect()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Whether the buffer length agrees with the shape (deserialized input)
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.rows * self.cols
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn transpose(&self) -> Matrix {
        let mut t = Matrix::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                t.set(c, r, self.get(r, c));
            }
        }
        t
    }

    /// Matrix product `self · other`
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(ScanError::ShapeMismatch {
                expected: self.cols,
                actual: other.rows,
            });
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            let lhs = self.row(i);
            for (k, &a) in lhs.iter().enumerate() {
                if a == 0.0 {
                    continue;
                }
                let rhs = other.row(k);
                let start = i * out.cols;
                for (o, &b) in out.data[start..start + other.cols].iter_mut().zip(rhs) {
                    *o += a * b;
                }
            }
        }
        Ok(out)
    }
}

/// Dot product of two equal-length slices
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// Labeled feature vector
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Dense feature vector
    pub features: Vec<f64>,
    /// Class index
    pub label: usize,
}

impl Sample {
    pub fn new(features: Vec<f64>, label: usize) -> Self {
        Self { features, label }
    }
}

/// Prediction result for one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted class index
    pub class_index: usize,
    /// Selected class probability, or 1.0 when the classifier only emits scores
    pub confidence: f64,
    /// Per-class scores (raw decisions or probabilities)
    pub scores: Vec<f64>,
}

impl Prediction {
    pub fn new(class_index: usize, confidence: f64, scores: Vec<f64>) -> Self {
        Self {
            class_index,
            confidence,
            scores,
        }
    }
}

/// Index of the largest value; ties go to the lowest index
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
