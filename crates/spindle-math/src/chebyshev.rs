//! Chebyshev collocation machinery for fiber discretization.
//!
//! Fibers are discretized on Chebyshev–Gauss–Lobatto points mapped to
//! arclength [0, L]. Differentiation matrices of orders 1–4 are formed
//! once per (point count, length) pair and reused for every operator
//! rebuild; derivatives of the fiber shape are matrix products against
//! these.
//!
//! The first-order matrix uses the classic formula with the
//! negative-row-sum diagonal, which keeps the (badly conditioned) higher
//! powers as accurate as the representation allows. Quadrature weights
//! are Clenshaw–Curtis.

use faer::Mat;

/// Spectral basis for one fiber discretization.
///
/// Nodes are stored in ascending arclength order; node 0 is the minus
/// end (s = 0), node n−1 the plus end (s = L).
pub struct ChebyshevBasis {
    /// Number of collocation points.
    pub n: usize,
    /// Arclength of the interval.
    pub length: f64,
    /// Collocation nodes on [0, length], ascending.
    pub s: Vec<f64>,
    /// Differentiation matrices d/ds ... d⁴/ds⁴ at the nodes.
    pub d1: Mat<f64>,
    pub d2: Mat<f64>,
    pub d3: Mat<f64>,
    pub d4: Mat<f64>,
    /// Clenshaw–Curtis quadrature weights on [0, length].
    pub weights: Vec<f64>,
}

impl ChebyshevBasis {
    /// Build the basis for `n` points on an interval of length `length`.
    ///
    /// Requires `n >= 5` (a fourth-order operator needs two boundary
    /// rows per end plus at least one interior node) and a positive
    /// length.
    pub fn new(n: usize, length: f64) -> Result<Self, String> {
        if n < 5 {
            return Err(format!("Chebyshev basis needs at least 5 points, got {n}"));
        }
        if length <= 0.0 {
            return Err(format!("Fiber length must be positive, got {length}"));
        }

        let big_n = n - 1;
        // Standard nodes t_k = cos(kπ/N), descending from 1 to −1.
        let t: Vec<f64> = (0..n)
            .map(|k| (std::f64::consts::PI * k as f64 / big_n as f64).cos())
            .collect();

        // Arclength map s = L (1 − t)/2, ascending in k. Chain rule:
        // d/ds = −(2/L) d/dt.
        let s: Vec<f64> = t.iter().map(|&tk| length * (1.0 - tk) / 2.0).collect();
        let scale = -2.0 / length;

        let d_t = differentiation_matrix(&t);
        let d1 = scale_mat(&d_t, scale);
        let d2 = &d1 * &d1;
        let d3 = &d2 * &d1;
        let d4 = &d2 * &d2;

        let weights = clenshaw_curtis(big_n)
            .into_iter()
            .map(|w| w * length / 2.0)
            .collect();

        Ok(Self {
            n,
            length,
            s,
            d1,
            d2,
            d3,
            d4,
            weights,
        })
    }
}

/// First-order spectral differentiation matrix on arbitrary distinct
/// nodes `x` (Chebyshev–Lobatto in practice).
///
/// Off-diagonal entries follow the (c_i/c_j)(−1)^{i+j}/(x_i − x_j)
/// formula; the diagonal is the negative row sum so that constants
/// differentiate to exactly zero.
pub fn differentiation_matrix(x: &[f64]) -> Mat<f64> {
    let n = x.len();
    let last = n - 1;
    let c = |i: usize| -> f64 {
        let endpoint = if i == 0 || i == last { 2.0 } else { 1.0 };
        endpoint * if i % 2 == 0 { 1.0 } else { -1.0 }
    };

    let mut d = Mat::<f64>::zeros(n, n);
    for i in 0..n {
        let mut row_sum = 0.0;
        for j in 0..n {
            if i == j {
                continue;
            }
            let entry = (c(i) / c(j)) / (x[i] - x[j]);
            d[(i, j)] = entry;
            row_sum += entry;
        }
        d[(i, i)] = -row_sum;
    }
    d
}

/// Clenshaw–Curtis quadrature weights for N+1 points t_k = cos(kπ/N)
/// on [−1, 1] (Waldvogel's cosine-sum form).
pub fn clenshaw_curtis(big_n: usize) -> Vec<f64> {
    let n = big_n;
    let mut w = vec![0.0; n + 1];
    let half = n / 2;
    for (k, wk) in w.iter_mut().enumerate() {
        let c_k = if k == 0 || k == n { 1.0 } else { 2.0 };
        let mut sum = 0.0;
        for j in 1..=half {
            let b_j = if 2 * j == n { 1.0 } else { 2.0 };
            let angle = 2.0 * std::f64::consts::PI * (j * k) as f64 / n as f64;
            sum += b_j * angle.cos() / ((4 * j * j - 1) as f64);
        }
        *wk = (c_k / n as f64) * (1.0 - sum);
    }
    w
}

fn scale_mat(m: &Mat<f64>, s: f64) -> Mat<f64> {
    Mat::from_fn(m.nrows(), m.ncols(), |i, j| s * m[(i, j)])
}
