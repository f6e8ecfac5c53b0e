//! Columnar named-array precompute contract.
//!
//! Precomputed geometry and operators (body surfaces, the periphery's
//! inverse mobility) arrive as named f64 arrays. The loader that parses
//! a concrete on-disk format lives outside the core; this type is the
//! validated in-memory hand-off. Every accessor checks shape and
//! presence and fails with a fatal precompute error on mismatch.

use std::collections::HashMap;

use faer::Mat;
use spindle_types::{SpindleError, SpindleResult};

/// One named array: column-major data with explicit dimensions.
#[derive(Debug, Clone)]
pub struct NamedArray {
    pub rows: usize,
    pub cols: usize,
    /// Column-major storage, `data[col * rows + row]`.
    pub data: Vec<f64>,
}

/// A bundle of named arrays for one entity.
#[derive(Debug, Clone, Default)]
pub struct PrecomputeData {
    arrays: HashMap<String, NamedArray>,
}

impl PrecomputeData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an array, validating that the data length matches the
    /// declared shape.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    ) -> SpindleResult<()> {
        let name = name.into();
        if data.len() != rows * cols {
            return Err(SpindleError::Precompute(format!(
                "array '{name}' declared {rows}×{cols} but holds {} values",
                data.len()
            )));
        }
        self.arrays.insert(name, NamedArray { rows, cols, data });
        Ok(())
    }

    /// Insert a matrix under the given key.
    pub fn insert_matrix(&mut self, name: impl Into<String>, m: &Mat<f64>) {
        let (rows, cols) = (m.nrows(), m.ncols());
        let mut data = Vec::with_capacity(rows * cols);
        for j in 0..cols {
            for i in 0..rows {
                data.push(m[(i, j)]);
            }
        }
        self.arrays.insert(name.into(), NamedArray { rows, cols, data });
    }

    /// Insert a vector (n×1) under the given key.
    pub fn insert_vector(&mut self, name: impl Into<String>, v: &[f64]) {
        self.arrays.insert(
            name.into(),
            NamedArray {
                rows: v.len(),
                cols: 1,
                data: v.to_vec(),
            },
        );
    }

    fn require(&self, name: &str) -> SpindleResult<&NamedArray> {
        self.arrays.get(name).ok_or_else(|| {
            SpindleError::Precompute(format!("required array '{name}' is missing"))
        })
    }

    /// Fetch a matrix with a required row count.
    pub fn matrix(&self, name: &str, expected_rows: usize) -> SpindleResult<Mat<f64>> {
        let arr = self.require(name)?;
        if arr.rows != expected_rows {
            return Err(SpindleError::Precompute(format!(
                "array '{name}' has {} rows, expected {expected_rows}",
                arr.rows
            )));
        }
        Ok(Mat::from_fn(arr.rows, arr.cols, |i, j| {
            arr.data[j * arr.rows + i]
        }))
    }

    /// Fetch a matrix with fully specified shape.
    pub fn matrix_exact(
        &self,
        name: &str,
        expected_rows: usize,
        expected_cols: usize,
    ) -> SpindleResult<Mat<f64>> {
        let m = self.matrix(name, expected_rows)?;
        if m.ncols() != expected_cols {
            return Err(SpindleError::Precompute(format!(
                "array '{name}' has {} columns, expected {expected_cols}",
                m.ncols()
            )));
        }
        Ok(m)
    }

    /// Fetch a flat vector (stored as n×1 or 1×n).
    pub fn vector(&self, name: &str) -> SpindleResult<Vec<f64>> {
        let arr = self.require(name)?;
        if arr.rows != 1 && arr.cols != 1 {
            return Err(SpindleError::Precompute(format!(
                "array '{name}' is {}×{}, expected a vector",
                arr.rows, arr.cols
            )));
        }
        Ok(arr.data.clone())
    }

    /// Column count of a named array, for cross-array consistency checks.
    pub fn cols(&self, name: &str) -> SpindleResult<usize> {
        Ok(self.require(name)?.cols)
    }

    /// Whether the bundle contains the named array.
    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }
}
