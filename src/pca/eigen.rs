//! Symmetric eigendecomposition by the cyclic Jacobi method

use crate::core::{Matrix, Result, ScanError};
use log::warn;

const MAX_SWEEPS: usize = 100;
const TOLERANCE: f64 = 1e-12;

/// Eigenvalues and column eigenvectors of a symmetric matrix
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues in the solver's diagonal order (unsorted)
    pub values: Vec<f64>,
    /// Column `i` is the unit eigenvector for `values[i]`
    pub vectors: Matrix,
}

/// Decompose a symmetric matrix with cyclic Jacobi rotations
///
/// Sweeps over every off-diagonal pair, zeroing each with a plane rotation
/// and accumulating the rotations into the eigenvector matrix, until the
/// off-diagonal Frobenius norm falls below `TOLERANCE` relative to the
/// whole matrix.
pub fn symmetric_eigen(matrix: &Matrix) -> Result<SymmetricEigen> {
    let (n, cols) = matrix.shape();
    if n != cols {
        return Err(ScanError::ShapeMismatch {
            expected: n,
            actual: cols,
        });
    }

    let mut a = matrix.clone();
    let mut v = Matrix::identity(n);

    let total_norm = a.as_slice().iter().map(|x| x * x).sum::<f64>().sqrt();
    let threshold = TOLERANCE * total_norm.max(f64::MIN_POSITIVE);

    let mut converged = n < 2;
    for _ in 0..MAX_SWEEPS {
        if off_diagonal_norm(&a) <= threshold {
            converged = true;
            break;
        }
        for p in 0..n - 1 {
            for q in p + 1..n {
                rotate(&mut a, &mut v, p, q);
            }
        }
    }
    if !converged {
        warn!(
            "Jacobi eigen-solver stopped after {MAX_SWEEPS} sweeps; residual off-diagonal norm {:.3e}",
            off_diagonal_norm(&a)
        );
    }

    let values = (0..n).map(|i| a.get(i, i)).collect();
    Ok(SymmetricEigen { values, vectors: v })
}

fn off_diagonal_norm(a: &Matrix) -> f64 {
    let n = a.rows();
    let mut sum = 0.0;
    for p in 0..n {
        for q in 0..n {
            if p != q {
                sum += a.get(p, q) * a.get(p, q);
            }
        }
    }
    sum.sqrt()
}

/// Apply the rotation that zeroes `a[p][q]`: A <- J^T A J, V <- V J
fn rotate(a: &mut Matrix, v: &mut Matrix, p: usize, q: usize) {
    let apq = a.get(p, q);
    if apq == 0.0 {
        return;
    }
    let n = a.rows();

    let theta = (a.get(q, q) - a.get(p, p)) / (2.0 * apq);
    // Smaller root of t^2 + 2 theta t - 1 = 0 keeps the rotation angle <= 45 degrees
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    for k in 0..n {
        let akp = a.get(k, p);
        let akq = a.get(k, q);
        a.set(k, p, c * akp - s * akq);
        a.set(k, q, s * akp + c * akq);
    }
    for k in 0..n {
        let apk = a.get(p, k);
        let aqk = a.get(q, k);
        a.set(p, k, c * apk - s * aqk);
        a.set(q, k, s * apk + c * aqk);
    }
    // Pin the annihilated pair to exact zero
    a.set(p, q, 0.0);
    a.set(q, p, 0.0);

    for k in 0..n {
        let vkp = v.get(k, p);
        let vkq = v.get(k, q);
        v.set(k, p, c * vkp - s * vkq);
        v.set(k, q, s * vkp + c * vkq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn symmetric(n: usize) -> Matrix {
        let mut m = Matrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let v = ((i * 7 + j * 13) % 11) as f64 - 5.0 + if i == j { 10.0 } else { 0.0 };
                m.set(i, j, v);
                m.set(j, i, v);
            }
        }
        m
    }

    #[test]
    fn test_two_by_two() {
        let m = Matrix::from_vec(2, 2, vec![2.0, 1.0, 1.0, 2.0]);
        let eig = symmetric_eigen(&m).unwrap();
        let mut values = eig.values.clone();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(values[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(values[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diagonal_is_untouched() {
        let m = Matrix::from_vec(3, 3, vec![4.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 9.0]);
        let eig = symmetric_eigen(&m).unwrap();
        assert_eq!(eig.values, vec![4.0, 1.0, 9.0]);
        assert_eq!(eig.vectors, Matrix::identity(3));
    }

    #[test]
    fn test_eigen_equation_holds() {
        let m = symmetric(6);
        let eig = symmetric_eigen(&m).unwrap();
        for i in 0..6 {
            let vec_i = eig.vectors.column(i);
            for r in 0..6 {
                let av: f64 = (0..6).map(|c| m.get(r, c) * vec_i[c]).sum();
                assert_relative_eq!(av, eig.values[i] * vec_i[r], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_vectors_orthonormal() {
        let m = symmetric(5);
        let eig = symmetric_eigen(&m).unwrap();
        let vtv = eig.vectors.transpose().matmul(&eig.vectors).unwrap();
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(vtv.get(i, j), expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_trace_preserved() {
        let m = symmetric(7);
        let eig = symmetric_eigen(&m).unwrap();
        let trace: f64 = (0..7).map(|i| m.get(i, i)).sum();
        assert_relative_eq!(eig.values.iter().sum::<f64>(), trace, epsilon = 1e-9);
    }

    #[test]
    fn test_non_square_rejected() {
        let m = Matrix::zeros(2, 3);
        assert!(symmetric_eigen(&m).is_err());
    }
}
