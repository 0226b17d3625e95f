//! In-memory dense feature dataset

use crate::core::{Dataset, Matrix, Result, Sample, ScanError};
use crate::utils::validation;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Dense labeled feature vectors of one fixed dimensionality
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl FeatureDataset {
    /// Empty dataset expecting vectors of length `dimensions`
    pub fn new(dimensions: usize) -> Self {
        Self {
            samples: Vec::new(),
            dimensions,
        }
    }

    /// Build from samples that must all share one length
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let dimensions = samples.first().map(|s| s.features.len()).unwrap_or(0);
        for s in &samples {
            validation::check_dim(dimensions, s.features.len())?;
        }
        Ok(Self {
            samples,
            dimensions,
        })
    }

    pub fn push(&mut self, sample: Sample) -> Result<()> {
        validation::check_dim(self.dimensions, sample.features.len())?;
        self.samples.push(sample);
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Sample-by-feature matrix
    pub fn to_matrix(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.samples.len() * self.dimensions);
        for s in &self.samples {
            data.extend_from_slice(&s.features);
        }
        Matrix::from_vec(self.samples.len(), self.dimensions, data)
    }

    /// Seeded shuffle, then the first `round(n * test_ratio)` samples become the test set
    ///
    /// Returns `(train, test)`.
    pub fn split(&self, test_ratio: f64, seed: u64) -> Result<(FeatureDataset, FeatureDataset)> {
        if !(0.0..1.0).contains(&test_ratio) {
            return Err(ScanError::InvalidParameter(format!(
                "Test ratio must be in [0, 1), got {test_ratio}"
            )));
        }

        let mut indices: Vec<usize> = (0..self.samples.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = (self.samples.len() as f64 * test_ratio).round() as usize;
        let (test_idx, train_idx) = indices.split_at(n_test);

        let pick = |idx: &[usize]| FeatureDataset {
            samples: idx.iter().map(|&i| self.samples[i].clone()).collect(),
            dimensions: self.dimensions,
        };
        Ok((pick(train_idx), pick(test_idx)))
    }
}

impl Dataset for FeatureDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }
}
