//! Conversion from cleaned batches to dense feature matrices.

use billcast_processing::utils::{has_column, is_numeric_dtype, series_to_f64};
use ndarray::{Array1, Array2};
use polars::prelude::*;

use crate::error::{LearningError, Result};

/// Feature columns of a batch, read as `f64` with nulls preserved.
///
/// Stored column-major so that fill values can be computed per feature.
#[derive(Debug, Clone)]
pub struct FeatureColumns {
    names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    n_rows: usize,
}

impl FeatureColumns {
    /// Read the named columns from `df`.
    pub fn from_frame(df: &DataFrame, names: &[String]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| {
                let series = df.column(name)?.as_materialized_series();
                Ok(series_to_f64(series)?)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            names: names.to_vec(),
            columns,
            n_rows: df.height(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Per-feature median over `rows`, ignoring missing values.
    ///
    /// A feature with no observed value on `rows` gets `0.0`.
    pub fn medians(&self, rows: &[usize]) -> Vec<f64> {
        self.columns
            .iter()
            .map(|values| {
                let observed: Vec<f64> = rows
                    .iter()
                    .filter_map(|&r| values[r])
                    .filter(|v| v.is_finite())
                    .collect();
                median(observed).unwrap_or(0.0)
            })
            .collect()
    }

    /// Dense matrix of `rows`, with missing values replaced by `fill`.
    pub fn matrix(&self, rows: &[usize], fill: &[f64]) -> Result<Array2<f64>> {
        if fill.len() != self.columns.len() {
            return Err(LearningError::InvalidData(format!(
                "{} fill values for {} features",
                fill.len(),
                self.columns.len()
            )));
        }

        let mut data = Vec::with_capacity(rows.len() * self.columns.len());
        for (values, &fallback) in self.columns.iter().zip(fill) {
            data.extend(rows.iter().map(|&r| match values[r] {
                Some(v) if v.is_finite() => v,
                _ => fallback,
            }));
        }

        // column-major buffer: build (features, rows) and transpose
        let x = Array2::from_shape_vec((self.columns.len(), rows.len()), data)?;
        Ok(x.t().to_owned())
    }

    /// Dense matrix of every row.
    pub fn full_matrix(&self, fill: &[f64]) -> Result<Array2<f64>> {
        let rows: Vec<usize> = (0..self.n_rows).collect();
        self.matrix(&rows, fill)
    }
}

/// Read the target column as a dense vector.
///
/// # Errors
///
/// - [`LearningError::TargetNotFound`] when the column is absent
/// - [`LearningError::InvalidData`] when it is not numeric or holds missing
///   or non-finite values
pub fn target_vector(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    if !has_column(df, target) {
        return Err(LearningError::TargetNotFound(target.to_string()));
    }

    let series = df.column(target)?.as_materialized_series();
    if !is_numeric_dtype(series.dtype()) {
        return Err(LearningError::InvalidData(format!(
            "target column '{}' is {}, expected a numeric column",
            target,
            series.dtype()
        )));
    }

    let values = series_to_f64(series)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(LearningError::InvalidData(format!(
                "target column '{}' has no usable value at row {}",
                target, row
            ))),
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(Array1::from(values))
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn batch() -> DataFrame {
        df!(
            "Usage" => &[Some(1.0), None, Some(3.0), Some(10.0)],
            "Meter" => &[Some(5i64), Some(6), None, Some(8)],
            "Water_Bill_Amount" => &[10.0, 20.0, 30.0, 40.0]
        )
        .unwrap()
    }

    fn names() -> Vec<String> {
        vec!["Usage".to_string(), "Meter".to_string()]
    }

    #[test]
    fn test_medians_use_only_given_rows() {
        let features = FeatureColumns::from_frame(&batch(), &names()).unwrap();

        assert_eq!(features.medians(&[0, 1, 2, 3]), vec![3.0, 6.0]);
        assert_eq!(features.medians(&[0, 2]), vec![2.0, 5.0]);
        assert_eq!(features.medians(&[1]), vec![0.0, 6.0]);
    }

    #[test]
    fn test_matrix_is_row_major_and_filled() {
        let features = FeatureColumns::from_frame(&batch(), &names()).unwrap();

        let x = features.matrix(&[1, 2], &[-1.0, -2.0]).unwrap();

        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[0, 0]], -1.0);
        assert_eq!(x[[0, 1]], 6.0);
        assert_eq!(x[[1, 0]], 3.0);
        assert_eq!(x[[1, 1]], -2.0);
    }

    #[test]
    fn test_matrix_rejects_wrong_fill_length() {
        let features = FeatureColumns::from_frame(&batch(), &names()).unwrap();
        assert!(features.full_matrix(&[0.0]).is_err());
    }

    #[test]
    fn test_target_vector() {
        let y = target_vector(&batch(), "Water_Bill_Amount").unwrap();
        assert_eq!(y.to_vec(), vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_target_vector_errors() {
        let df = df!(
            "text" => &["a", "b"],
            "gappy" => &[Some(1.0), None]
        )
        .unwrap();

        assert!(matches!(
            target_vector(&df, "missing"),
            Err(LearningError::TargetNotFound(_))
        ));
        assert!(matches!(
            target_vector(&df, "text"),
            Err(LearningError::InvalidData(_))
        ));
        assert!(matches!(
            target_vector(&df, "gappy"),
            Err(LearningError::InvalidData(_))
        ));
    }
}
