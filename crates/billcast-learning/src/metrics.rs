//! Held-out regression metrics.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Scores of a fitted model on the held-out partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Coefficient of determination.
    pub r2: f64,

    /// Root mean squared error, in target units.
    pub rmse: f64,

    pub train_rows: usize,
    pub test_rows: usize,
}

impl Metrics {
    /// Score `predicted` against `actual`.
    pub fn evaluate(
        actual: ArrayView1<'_, f64>,
        predicted: ArrayView1<'_, f64>,
        train_rows: usize,
    ) -> Self {
        Self {
            r2: r2_score(actual, predicted),
            rmse: mean_squared_error(actual, predicted).sqrt(),
            train_rows,
            test_rows: actual.len(),
        }
    }
}

/// Mean of the squared residuals. Zero for empty input.
pub fn mean_squared_error(actual: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    sse / actual.len() as f64
}

/// `1 - SS_res / SS_tot`.
///
/// When the actual values are constant `SS_tot` is zero; the score is then
/// 1.0 for an exact fit and 0.0 otherwise.
pub fn r2_score(actual: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.sum() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
