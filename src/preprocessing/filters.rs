// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Digital filters for signal preprocessing
//!
//! This module provides the smoothing stage that runs ahead of peak
//! detection. All filters implement the [`Filter`] trait and operate on
//! whole series, returning an output of the same length.
//!
//! # Examples
//!
//! ```
//! use rust_rheed::preprocessing::filters::{Filter, SavitzkyGolayFilter};
//!
//! let filter = SavitzkyGolayFilter::new().with_window(11).with_order(3);
//! let noisy: Vec<f64> = (0..64)
//!     .map(|i| (i as f64 * 0.3).sin() + if i % 2 == 0 { 0.1 } else { -0.1 })
//!     .collect();
//! let smoothed = filter.apply(&noisy);
//! assert_eq!(smoothed.len(), noisy.len());
//! ```

use ndarray::{Array1, Array2};

/// Trait for implementing digital filters
///
/// All filters are stateless with respect to the signal: `apply` is a pure
/// function from an input series to an output series of the same length.
pub trait Filter: Send + Sync {
    /// Apply the filter to a signal and return the filtered signal.
    fn apply(&self, signal: &[f64]) -> Vec<f64>;
}

/// A Savitzky-Golay smoothing filter
///
/// Each output point is the value of a least-squares polynomial fitted over
/// a sliding window, evaluated at the point's position. Interior points use
/// a window centered on them; points closer than half a window to either
/// boundary use the first (respectively last) full window, fitted once and
/// evaluated at their offset inside it.
///
/// The configured window is an upper bound. For a given series the
/// effective window is reduced to the largest odd value that fits the
/// series and does not exceed half its length, so a short trace is never
/// collapsed into a single global polynomial fit that would erase genuine
/// oscillations. The polynomial order is reduced alongside whenever the
/// effective window is too small for it. Windows below 3 samples make the
/// filter an identity.
///
/// ### Examples
///
/// ```
/// use rust_rheed::preprocessing::filters::{Filter, SavitzkyGolayFilter};
///
/// let filter = SavitzkyGolayFilter::new();
/// let constant = vec![5.0; 40];
/// let smoothed = filter.apply(&constant);
/// assert!(smoothed.iter().all(|&v| (v - 5.0).abs() < 1e-9));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SavitzkyGolayFilter {
    window: usize,
    order: usize,
}

impl Default for SavitzkyGolayFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SavitzkyGolayFilter {
    /// Create a filter with the default window of 11 samples and cubic fit.
    pub fn new() -> Self {
        Self {
            window: 11,
            order: 3,
        }
    }

    /// Set the maximum window length in samples. Even values are rounded
    /// down to the next odd value at application time.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Set the polynomial order of the fit.
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Effective window for a series of the given length: the largest odd
    /// value that is at most the configured window, the series length, and
    /// half the series length.
    fn effective_window(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let mut window = self.window.min(len);
        if window % 2 == 0 {
            window -= 1;
        }
        while window > 1 && window > len / 2 {
            window -= 2;
        }
        window.max(1)
    }
}

impl Filter for SavitzkyGolayFilter {
    fn apply(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        let window = self.effective_window(n);
        if window < 3 {
            return signal.to_vec();
        }
        let order = self.order.min(window - 1);
        let half = window / 2;

        let mut smoothed = Vec::with_capacity(n);
        for i in 0..n {
            let value = if i < half {
                polyfit_eval(&signal[..window], order, i as f64)
            } else if i + half >= n {
                polyfit_eval(&signal[n - window..], order, (window - (n - i)) as f64)
            } else {
                polyfit_eval(&signal[i - half..=i + half], order, half as f64)
            };
            smoothed.push(value);
        }
        smoothed
    }
}

/// Least-squares polynomial fit over `ys` at abscissae `0..ys.len()`,
/// evaluated at `x_eval`.
fn polyfit_eval(ys: &[f64], order: usize, x_eval: f64) -> f64 {
    let order = order.min(ys.len().saturating_sub(1));
    let dim = order + 1;

    // Normal equations: the Gram matrix holds the power sums of the
    // abscissae, the right-hand side the moment sums of the data.
    let mut power_sums = vec![0.0f64; 2 * order + 1];
    for x in 0..ys.len() {
        let mut p = 1.0;
        let xf = x as f64;
        for sum in power_sums.iter_mut() {
            *sum += p;
            p *= xf;
        }
    }

    let mut gram = Array2::<f64>::zeros((dim, dim));
    for i in 0..dim {
        for j in 0..dim {
            gram[[i, j]] = power_sums[i + j];
        }
    }

    let mut moments = Array1::<f64>::zeros(dim);
    for (x, &y) in ys.iter().enumerate() {
        let mut p = 1.0;
        let xf = x as f64;
        for i in 0..dim {
            moments[i] += y * p;
            p *= xf;
        }
    }

    let coefficients = solve_linear(gram, moments);
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, &c| acc * x_eval + c)
}

/// Solve a small dense linear system by Gaussian elimination with partial
/// pivoting. Degenerate pivots leave the corresponding coefficient at zero,
/// which only occurs for fits the caller has already reduced below.
fn solve_linear(mut a: Array2<f64>, mut b: Array1<f64>) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| a[[r1, col]].abs().total_cmp(&a[[r2, col]].abs()))
            .unwrap_or(col);
        if a[[pivot_row, col]].abs() < 1e-12 {
            continue;
        }
        if pivot_row != col {
            for k in 0..n {
                let tmp = a[[col, k]];
                a[[col, k]] = a[[pivot_row, k]];
                a[[pivot_row, k]] = tmp;
            }
            b.swap(col, pivot_row);
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    (0..n)
        .map(|i| {
            let pivot = a[[i, i]];
            if pivot.abs() < 1e-12 {
                0.0
            } else {
                b[i] / pivot
            }
        })
        .collect()
}
