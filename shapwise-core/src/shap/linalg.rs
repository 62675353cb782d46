//! Small dense square matrices for the normal equations.

use std::ops::{Index, IndexMut};

/// Relative pivot size below which a matrix is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Row-major `n × n` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                m.data[i * n + j] = f(i, j);
            }
        }
        m
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn trace(&self) -> f64 {
        (0..self.n).map(|i| self[(i, i)]).sum()
    }

    fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Copy with `lambda` added to the diagonal.
    pub fn with_ridge(&self, lambda: f64) -> Self {
        let mut m = self.clone();
        for i in 0..self.n {
            m[(i, i)] += lambda;
        }
        m
    }

    pub fn mul(&self, other: &Matrix) -> Matrix {
        Matrix::from_fn(self.n, |i, j| {
            (0..self.n).map(|k| self[(i, k)] * other[(k, j)]).sum()
        })
    }

    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        (0..self.n)
            .map(|i| (0..self.n).map(|k| self[(i, k)] * v[k]).sum())
            .collect()
    }

    /// Solve `self · x = rhs` by Gaussian elimination with partial pivoting.
    /// Returns `None` when the matrix is (numerically) singular.
    pub fn solve(&self, rhs: &[f64]) -> Option<Vec<f64>> {
        let n = self.n;
        let mut a = self.clone();
        let mut x = rhs.to_vec();
        let tolerance = SINGULAR_TOLERANCE * a.max_abs().max(f64::MIN_POSITIVE);

        for col in 0..n {
            let pivot = (col..n).max_by(|&r, &s| a[(r, col)].abs().total_cmp(&a[(s, col)].abs()))?;
            let size = a[(pivot, col)].abs();
            if size.is_nan() || size <= tolerance {
                return None;
            }
            if pivot != col {
                for k in 0..n {
                    a.data.swap(pivot * n + k, col * n + k);
                }
                x.swap(pivot, col);
            }
            for row in col + 1..n {
                let factor = a[(row, col)] / a[(col, col)];
                if factor == 0.0 {
                    continue;
                }
                for k in col..n {
                    let v = a[(col, k)];
                    a[(row, k)] -= factor * v;
                }
                x[row] -= factor * x[col];
            }
        }

        for row in (0..n).rev() {
            let tail: f64 = (row + 1..n).map(|k| a[(row, k)] * x[k]).sum();
            x[row] = (x[row] - tail) / a[(row, row)];
        }
        Some(x)
    }

    /// Gauss-Jordan inverse with partial pivoting.
    pub fn inverse(&self) -> Option<Matrix> {
        let n = self.n;
        let mut a = self.clone();
        let mut inv = Matrix::from_fn(n, |i, j| if i == j { 1.0 } else { 0.0 });
        let tolerance = SINGULAR_TOLERANCE * a.max_abs().max(f64::MIN_POSITIVE);

        for col in 0..n {
            let pivot = (col..n).max_by(|&r, &s| a[(r, col)].abs().total_cmp(&a[(s, col)].abs()))?;
            let size = a[(pivot, col)].abs();
            if size.is_nan() || size <= tolerance {
                return None;
            }
            if pivot != col {
                for k in 0..n {
                    a.data.swap(pivot * n + k, col * n + k);
                    inv.data.swap(pivot * n + k, col * n + k);
                }
            }
            let diag = a[(col, col)];
            for k in 0..n {
                a[(col, k)] /= diag;
                inv[(col, k)] /= diag;
            }
            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = a[(row, col)];
                if factor == 0.0 {
                    continue;
                }
                for k in 0..n {
                    let (av, iv) = (a[(col, k)], inv[(col, k)]);
                    a[(row, k)] -= factor * av;
                    inv[(row, k)] -= factor * iv;
                }
            }
        }
        Some(inv)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.n + j]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_with_pivoting() {
        let a = Matrix::from_fn(3, |i, j| [[0.0, 2.0, 1.0], [1.0, 1.0, 0.0], [3.0, 0.0, 1.0]][i][j]);
        let x = a.solve(&[5.0, 3.0, 6.0]).unwrap();
        let back = a.mul_vec(&x);
        for (got, want) in back.iter().zip([5.0, 3.0, 6.0]) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_singular_matrix_is_detected() {
        let a = Matrix::from_fn(2, |i, j| [[1.0, 2.0], [2.0, 4.0]][i][j]);
        assert!(a.solve(&[1.0, 2.0]).is_none());
        assert!(a.inverse().is_none());
        assert!(a.with_ridge(1e-3).inverse().is_some());
    }

    #[test]
    fn test_inverse_roundtrip() {
        let a = Matrix::from_fn(3, |i, j| if i == j { 4.0 } else { 1.0 });
        let product = a.mul(&a.inverse().unwrap());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[(i, j)] - expected).abs() < 1e-12);
            }
        }
        assert_eq!(a.trace(), 12.0);
    }
}
