//! Principal Component Analysis by covariance eigendecomposition
//!
//! `fit` centers the data, builds the feature covariance `CᵀC / (n - 1)`,
//! decomposes it with the Jacobi solver in [`eigen`], and keeps the leading
//! eigenvectors as projection axes.

pub mod eigen;

pub use self::eigen::{symmetric_eigen, SymmetricEigen};

use crate::core::{Matrix, PcaComponents, Result, ScanError, Transform};
use crate::utils::{stats, validation};
use log::info;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fitted projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaModel {
    /// Per-feature training mean
    pub mean: Vec<f64>,
    /// n_features x n_components, one unit eigenvector per column
    pub components: Matrix,
    /// Retained eigenvalues (variance along each component)
    pub explained_variance: Vec<f64>,
    /// Retained eigenvalues divided by the sum of all eigenvalues
    pub explained_variance_ratio: Vec<f64>,
}

impl PcaModel {
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn n_components(&self) -> usize {
        self.components.cols()
    }
}

/// PCA projector
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    n_components: PcaComponents,
    model: Option<PcaModel>,
}

impl Pca {
    /// Create an unfitted projector
    pub fn new(n_components: PcaComponents) -> Result<Self> {
        n_components.validate()?;
        Ok(Self {
            n_components,
            model: None,
        })
    }

    /// Rebuild a fitted projector from a stored model
    pub fn from_model(model: PcaModel) -> Result<Self> {
        if !model.components.is_consistent() {
            return Err(ScanError::InvalidDataset(
                "PCA component buffer does not match its shape".to_string(),
            ));
        }
        validation::check_dim(model.mean.len(), model.components.rows())?;
        validation::check_dim(model.n_components(), model.explained_variance_ratio.len())?;
        Ok(Self {
            n_components: PcaComponents::Fixed(model.n_components()),
            model: Some(model),
        })
    }

    pub fn model(&self) -> Option<&PcaModel> {
        self.model.as_ref()
    }

    pub fn n_components(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.n_components())
    }

    fn fitted(&self) -> Result<&PcaModel> {
        self.model.as_ref().ok_or(ScanError::NotFitted("PCA"))
    }

    /// Map projected rows back into feature space: `Z · componentsᵀ + mean`
    pub fn inverse_transform(&self, z: &Matrix) -> Result<Matrix> {
        let model = self.fitted()?;
        validation::check_dim(model.n_components(), z.cols())?;

        let mut out = z.matmul(&model.components.transpose())?;
        for r in 0..out.rows() {
            for c in 0..out.cols() {
                out.add_at(r, c, model.mean[c]);
            }
        }
        Ok(out)
    }

    /// Smallest count whose cumulative ratio reaches `fraction`
    fn count_for_variance(ratios: &[f64], fraction: f64) -> usize {
        let mut cumulative = 0.0;
        for (i, r) in ratios.iter().enumerate() {
            cumulative += r;
            if cumulative >= fraction {
                return i + 1;
            }
        }
        // Rounding kept the sum just under the target; keep everything
        ratios.len().max(1)
    }
}

/// Flip `vector` so its first nonzero entry is positive
fn fix_sign(vector: &mut [f64]) {
    if let Some(&first) = vector.iter().find(|v| v.abs() > 1e-12) {
        if first < 0.0 {
            vector.iter_mut().for_each(|v| *v = -*v);
        }
    }
}

impl Transform for Pca {
    fn fit(&mut self, x: &Matrix) -> Result<()> {
        if self.model.is_some() {
            return Err(ScanError::AlreadyFitted("PCA"));
        }
        let (n_samples, n_features) = x.shape();
        if n_samples < 2 {
            return Err(ScanError::InvalidDataset(format!(
                "PCA needs at least 2 samples, got {n_samples}"
            )));
        }
        if let PcaComponents::Fixed(k) = self.n_components {
            if k > n_features {
                return Err(ScanError::InvalidParameter(format!(
                    "Cannot keep {k} components from {n_features} features"
                )));
            }
        }

        let mean = stats::column_means(x);
        let mut centered = x.clone();
        for r in 0..n_samples {
            for c in 0..n_features {
                centered.add_at(r, c, -mean[c]);
            }
        }

        let mut cov = Matrix::zeros(n_features, n_features);
        let denom = (n_samples - 1) as f64;
        for i in 0..n_features {
            for j in i..n_features {
                let s: f64 = (0..n_samples)
                    .map(|r| centered.get(r, i) * centered.get(r, j))
                    .sum::<f64>()
                    / denom;
                cov.set(i, j, s);
                cov.set(j, i, s);
            }
        }

        let eig = symmetric_eigen(&cov)?;

        // Descending by eigenvalue; the stable sort keeps solver order on ties
        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| {
            eig.values[b]
                .partial_cmp(&eig.values[a])
                .unwrap_or(Ordering::Equal)
        });
        let sorted_values: Vec<f64> = order.iter().map(|&i| eig.values[i]).collect();

        let total: f64 = sorted_values.iter().sum();
        let ratios: Vec<f64> = if total > 0.0 {
            sorted_values.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; n_features]
        };

        let k = match self.n_components {
            PcaComponents::Fixed(k) => k,
            PcaComponents::Variance(_) if total <= 0.0 => 1,
            PcaComponents::Variance(f) => Self::count_for_variance(&ratios, f),
        };
        info!(
            "PCA: keeping {k} of {n_features} components ({:.2}% variance)",
            ratios[..k].iter().sum::<f64>() * 100.0
        );

        let mut components = Matrix::zeros(n_features, k);
        for (dst, &src) in order.iter().take(k).enumerate() {
            let mut vector = eig.vectors.column(src);
            fix_sign(&mut vector);
            for (r, v) in vector.into_iter().enumerate() {
                components.set(r, dst, v);
            }
        }

        self.model = Some(PcaModel {
            mean,
            components,
            explained_variance: sorted_values[..k].to_vec(),
            explained_variance_ratio: ratios[..k].to_vec(),
        });
        Ok(())
    }

    fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let model = self.fitted()?;
        validation::check_dim(model.n_features(), x.cols())?;

        let mut centered = x.clone();
        for r in 0..x.rows() {
            for c in 0..x.cols() {
                centered.add_at(r, c, -model.mean[c]);
            }
        }
        centered.matmul(&model.components)
    }

    fn transform_row(&self, x: &[f64]) -> Result<Vec<f64>> {
        let model = self.fitted()?;
        validation::check_dim(model.n_features(), x.len())?;

        let k = model.n_components();
        let mut out = vec![0.0; k];
        for (i, (&v, &m)) in x.iter().zip(&model.mean).enumerate() {
            let centered = v - m;
            for (o, &w) in out.iter_mut().zip(model.components.row(i)) {
                *o += centered * w;
            }
        }
        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Rows dominated by one direction, with smaller independent wiggles
    fn correlated_data() -> Matrix {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let t = i as f64 - 20.0;
                let a = ((i * 7) % 5) as f64 - 2.0;
                let b = ((i * 11) % 3) as f64 - 1.0;
                vec![
                    t,
                    2.0 * t + 0.5 * a,
                    -t + 0.3 * b,
                    0.2 * a - 0.1 * b,
                ]
            })
            .collect();
        Matrix::from_rows(&rows).unwrap()
    }

    fn residual(x: &Matrix, recon: &Matrix) -> f64 {
        x.as_slice()
            .iter()
            .zip(recon.as_slice())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    #[test]
    fn test_fixed_components_shape() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Fixed(2)).unwrap();
        let z = pca.fit_transform(&x).unwrap();
        assert_eq!(z.shape(), (40, 2));
        assert_eq!(pca.n_components(), Some(2));
        assert_eq!(pca.model().unwrap().components.shape(), (4, 2));
    }

    #[test]
    fn test_variance_fraction_resolution() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Variance(0.95)).unwrap();
        let z = pca.fit_transform(&x).unwrap();
        let model = pca.model().unwrap();
        let k = model.n_components();
        assert_eq!(z.cols(), k);

        let kept: f64 = model.explained_variance_ratio.iter().sum();
        assert!(kept >= 0.95);
        // One fewer component would not be enough
        let without_last: f64 = model.explained_variance_ratio[..k - 1].iter().sum();
        assert!(without_last < 0.95);
    }

    #[test]
    fn test_ratios_descending() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Fixed(4)).unwrap();
        pca.fit(&x).unwrap();
        let ratios = &pca.model().unwrap().explained_variance_ratio;
        assert!(ratios.windows(2).all(|w| w[0] >= w[1]));
        assert_relative_eq!(ratios.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sign_convention() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Fixed(4)).unwrap();
        pca.fit(&x).unwrap();
        let components = &pca.model().unwrap().components;
        for c in 0..components.cols() {
            let column = components.column(c);
            let first = column.iter().find(|v| v.abs() > 1e-12).unwrap();
            assert!(*first > 0.0);
        }
    }

    #[test]
    fn test_reconstruction_residual_decreases() {
        let x = correlated_data();
        let mut previous = f64::INFINITY;
        for k in 1..=4 {
            let mut pca = Pca::new(PcaComponents::Fixed(k)).unwrap();
            let z = pca.fit_transform(&x).unwrap();
            let recon = pca.inverse_transform(&z).unwrap();
            let err = residual(&x, &recon);
            assert!(err <= previous + 1e-9, "k={k}: {err} > {previous}");
            previous = err;
        }
        assert!(previous < 1e-8);
    }

    #[test]
    fn test_transform_row_matches_matrix() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Fixed(3)).unwrap();
        let z = pca.fit_transform(&x).unwrap();
        let row = pca.transform_row(x.row(5)).unwrap();
        for (a, b) in row.iter().zip(z.row(5)) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_not_fitted_and_refit() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Fixed(2)).unwrap();
        assert_eq!(pca.transform(&x).unwrap_err().code(), "not_fitted");
        pca.fit(&x).unwrap();
        assert_eq!(pca.fit(&x).unwrap_err().code(), "already_fitted");
    }

    #[test]
    fn test_invalid_inputs() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Fixed(5)).unwrap();
        assert!(pca.fit(&x).is_err());

        let single = Matrix::from_rows(&[vec![1.0, 2.0]]).unwrap();
        let mut pca = Pca::new(PcaComponents::Fixed(1)).unwrap();
        assert!(pca.fit(&single).is_err());

        assert!(Pca::new(PcaComponents::Variance(0.0)).is_err());
    }

    #[test]
    fn test_constant_data_keeps_one_component() {
        let x = Matrix::from_rows(&[vec![1.0, 2.0], vec![1.0, 2.0], vec![1.0, 2.0]]).unwrap();
        let mut pca = Pca::new(PcaComponents::Variance(0.95)).unwrap();
        let z = pca.fit_transform(&x).unwrap();
        assert_eq!(z.cols(), 1);
        assert!(z.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_model_validates_shape() {
        let x = correlated_data();
        let mut pca = Pca::new(PcaComponents::Fixed(2)).unwrap();
        pca.fit(&x).unwrap();
        let mut model = pca.model().unwrap().clone();
        assert!(Pca::from_model(model.clone()).is_ok());
        model.mean.pop();
        assert!(Pca::from_model(model).is_err());
    }
}
