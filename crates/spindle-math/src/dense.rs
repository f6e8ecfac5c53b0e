//! Dense LU solver backed by `faer`.
//!
//! Wraps faer's partial-pivoting LU behind a factorize/solve interface so
//! that per-entity operators can be factorized once per timestep and
//! solved against many right-hand sides (every preconditioner
//! application reuses the factorization).

use faer::linalg::solvers::{PartialPivLu, Solve};
use faer::Mat;

/// Dense LU (PA = LU) solver with a cached factorization.
#[derive(Debug)]
pub struct DenseLu {
    /// Cached factorization.
    factorization: Option<PartialPivLu<f64>>,
    /// Matrix dimension (N×N).
    dimension: usize,
}

impl DenseLu {
    /// Creates a new solver (unfactorized).
    pub fn new() -> Self {
        Self {
            factorization: None,
            dimension: 0,
        }
    }

    /// Factorize the matrix. Call once per operator rebuild.
    pub fn factorize(&mut self, matrix: &Mat<f64>) -> Result<(), String> {
        if matrix.nrows() != matrix.ncols() {
            return Err(format!(
                "Matrix must be square, got {}×{}",
                matrix.nrows(),
                matrix.ncols()
            ));
        }
        if matrix.nrows() == 0 {
            return Err("Cannot factorize empty matrix".into());
        }

        self.dimension = matrix.nrows();
        self.factorization = Some(PartialPivLu::new(matrix.as_ref()));
        Ok(())
    }

    /// Solve A x = b for a multi-column right-hand side.
    pub fn solve_mat(&self, rhs: &Mat<f64>) -> Result<Mat<f64>, String> {
        let lu = self
            .factorization
            .as_ref()
            .ok_or_else(|| "Solver not factorized. Call factorize() first.".to_string())?;

        if rhs.nrows() != self.dimension {
            return Err(format!(
                "RHS rows ({}) != matrix dimension ({})",
                rhs.nrows(),
                self.dimension
            ));
        }

        Ok(lu.solve(rhs))
    }

    /// Solve A x = b for a single right-hand side given as a slice.
    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, String> {
        if rhs.len() != self.dimension {
            return Err(format!(
                "RHS length ({}) != matrix dimension ({})",
                rhs.len(),
                self.dimension
            ));
        }
        let b = Mat::from_fn(self.dimension, 1, |i, _| rhs[i]);
        let x = self.solve_mat(&b)?;
        Ok((0..self.dimension).map(|i| x[(i, 0)]).collect())
    }

    /// Returns true if the solver holds a valid factorization.
    pub fn is_factorized(&self) -> bool {
        self.factorization.is_some()
    }

    /// Dimension of the factorized operator (0 if unfactorized).
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for DenseLu {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense inverse via LU solve against the identity.
///
/// Only used by offline operator builders (the periphery inverse-mobility
/// operator is precomputed, never inverted inside the solve loop).
pub fn inverse(matrix: &Mat<f64>) -> Result<Mat<f64>, String> {
    let n = matrix.nrows();
    let mut lu = DenseLu::new();
    lu.factorize(matrix)?;
    let identity = Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 });
    lu.solve_mat(&identity)
}

/// Flatten a 3×n point/vector-field matrix into node-major [x,y,z] order.
pub fn flatten_columns(m: &Mat<f64>) -> Vec<f64> {
    let n = m.ncols();
    let mut out = Vec::with_capacity(3 * n);
    for j in 0..n {
        for i in 0..3 {
            out.push(m[(i, j)]);
        }
    }
    out
}

/// Inverse of [`flatten_columns`]: node-major [x,y,z] slice to 3×n matrix.
pub fn unflatten_columns(v: &[f64]) -> Mat<f64> {
    debug_assert_eq!(v.len() % 3, 0);
    let n = v.len() / 3;
    Mat::from_fn(3, n, |i, j| v[3 * j + i])
}
