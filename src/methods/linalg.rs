use nalgebra::{DMatrix, DVector};

use crate::error::{PrepError, Result};

const SVD_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Symmetric band matrices
// ---------------------------------------------------------------------------

/// Symmetric matrix stored by its upper diagonals: `bands[k][i] = A[i][i + k]`.
#[derive(Debug, Clone)]
pub(crate) struct SymmetricBand {
    n: usize,
    bands: Vec<Vec<f64>>,
}

impl SymmetricBand {
    pub fn zeros(n: usize, bandwidth: usize) -> Self {
        let bands = (0..=bandwidth)
            .map(|k| vec![0.0; n.saturating_sub(k)])
            .collect();
        Self { n, bands }
    }

    pub fn bandwidth(&self) -> usize {
        self.bands.len() - 1
    }

    /// Add `value` to `A[i][j]` (and its mirror). `j - i` must be within the band.
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        self.bands[hi - lo][lo] += value;
    }

    pub fn add_diagonal(&mut self, diagonal: &[f64]) {
        for (a, d) in self.bands[0].iter_mut().zip(diagonal) {
            *a += d;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for band in &mut self.bands {
            band.iter_mut().for_each(|v| *v *= factor);
        }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        self.bands.get(hi - lo).map_or(0.0, |band| band[lo])
    }

    /// Solve `A x = rhs` by banded Cholesky factorization.
    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>> {
        let n = self.n;
        let bw = self.bandwidth();
        if rhs.len() != n {
            return Err(PrepError::ShapeMismatch(format!(
                "right-hand side has {} values, matrix is {n}x{n}",
                rhs.len()
            )));
        }

        // factor[d][i] = L[i][i - d]
        let mut factor = vec![vec![0.0; n]; bw + 1];
        let l = |factor: &[Vec<f64>], i: usize, j: usize| factor[i - j][i];

        for i in 0..n {
            let lo = i.saturating_sub(bw);
            for j in lo..=i {
                let mut sum = self.get(j, i);
                for k in lo..j {
                    sum -= l(&factor, i, k) * l(&factor, j, k);
                }
                if j == i {
                    if sum <= 0.0 || !sum.is_finite() {
                        return Err(PrepError::Algorithm(format!(
                            "system is not positive definite (pivot {i})"
                        )));
                    }
                    factor[0][i] = sum.sqrt();
                } else {
                    factor[i - j][i] = sum / factor[0][j];
                }
            }
        }

        let mut z = vec![0.0; n];
        for i in 0..n {
            let lo = i.saturating_sub(bw);
            let sum: f64 = (lo..i).map(|k| l(&factor, i, k) * z[k]).sum();
            z[i] = (rhs[i] - sum) / factor[0][i];
        }

        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let hi = (i + bw).min(n - 1);
            let sum: f64 = (i + 1..=hi).map(|k| l(&factor, k, i) * x[k]).sum();
            x[i] = (z[i] - sum) / factor[0][i];
        }
        Ok(x)
    }
}

/// `D Dᵀ` for the `n × (n-2)` second difference operator `D`, a pentadiagonal
/// smoothness penalty.
pub(crate) fn second_difference_penalty(n: usize) -> SymmetricBand {
    const STENCIL: [f64; 3] = [1.0, -2.0, 1.0];
    let mut penalty = SymmetricBand::zeros(n, 2);
    for col in 0..n.saturating_sub(2) {
        for a in 0..3 {
            for b in a..3 {
                penalty.add(col + a, col + b, STENCIL[a] * STENCIL[b]);
            }
        }
    }
    penalty
}

// ---------------------------------------------------------------------------
// Polynomial least squares
// ---------------------------------------------------------------------------

/// Design matrix with one row per point: `[1, u, u², ..., u^order]`.
pub(crate) fn vandermonde(u: &[f64], order: usize) -> DMatrix<f64> {
    DMatrix::from_fn(u.len(), order + 1, |i, j| u[i].powi(j as i32))
}

/// Moore-Penrose pseudo-inverse, mapping point values to polynomial coefficients.
pub(crate) fn pseudo_inverse(design: DMatrix<f64>) -> Result<DMatrix<f64>> {
    design
        .pseudo_inverse(SVD_EPS)
        .map_err(|e| PrepError::Algorithm(format!("pseudo-inverse failed: {e}")))
}

/// Least-squares coefficients of `design · c ≈ values`.
pub(crate) fn least_squares(design: &DMatrix<f64>, values: &[f64]) -> Result<DVector<f64>> {
    let rhs = DVector::from_column_slice(values);
    design
        .clone()
        .svd(true, true)
        .solve(&rhs, SVD_EPS)
        .map_err(|e| PrepError::Algorithm(format!("least squares failed: {e}")))
}

/// `i! / (i - d)!`, zero when `d > i`.
pub(crate) fn falling_factorial(i: usize, d: usize) -> f64 {
    if d > i {
        return 0.0;
    }
    ((i - d + 1)..=i).map(|k| k as f64).product()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn penalty_matches_dense_product() {
        let n = 6;
        let penalty = second_difference_penalty(n);
        let mut d = DMatrix::<f64>::zeros(n, n - 2);
        for col in 0..n - 2 {
            d[(col, col)] = 1.0;
            d[(col + 1, col)] = -2.0;
            d[(col + 2, col)] = 1.0;
        }
        let dense = &d * d.transpose();
        for i in 0..n {
            for j in 0..n {
                let expected = if i.abs_diff(j) <= 2 { dense[(i, j)] } else { 0.0 };
                assert_abs_diff_eq!(penalty.get(i, j), expected);
            }
        }
    }

    #[test]
    fn band_solve_matches_dense_solve() {
        let n = 8;
        let mut a = second_difference_penalty(n);
        a.scale(3.0);
        a.add_diagonal(&vec![1.5; n]);
        let rhs: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();
        let x = a.solve(&rhs).unwrap();

        let dense = DMatrix::from_fn(n, n, |i, j| a.get(i, j));
        let expected = dense.lu().solve(&DVector::from_vec(rhs)).unwrap();
        for i in 0..n {
            assert_abs_diff_eq!(x[i], expected[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn singular_band_is_reported() {
        // The bare penalty annihilates straight lines.
        let penalty = second_difference_penalty(5);
        assert!(matches!(
            penalty.solve(&[1.0; 5]),
            Err(PrepError::Algorithm(_))
        ));
    }

    #[test]
    fn least_squares_recovers_a_quadratic() {
        let u: Vec<f64> = (0..7).map(|i| i as f64 / 3.0 - 1.0).collect();
        let values: Vec<f64> = u.iter().map(|t| 2.0 - t + 0.5 * t * t).collect();
        let coeffs = least_squares(&vandermonde(&u, 2), &values).unwrap();
        assert_abs_diff_eq!(coeffs[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(coeffs[1], -1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(coeffs[2], 0.5, epsilon = 1e-10);
    }

    #[test]
    fn falling_factorials() {
        assert_eq!(falling_factorial(5, 0), 1.0);
        assert_eq!(falling_factorial(5, 2), 20.0);
        assert_eq!(falling_factorial(2, 3), 0.0);
    }
}
