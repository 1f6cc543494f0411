//! Feature selection shared by training and inference.

use polars::prelude::*;
use tracing::debug;

use crate::config::SchemaConfig;
use crate::error::{PreprocessingError, Result};
use crate::utils::{has_column, is_numeric_dtype};

/// Picks the numeric feature columns of a cleaned batch.
///
/// Features are every integer or float column other than the target, the
/// prediction column and the categorical exclusions, in current column order.
/// Boolean and temporal columns are never features.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSelector<'a> {
    schema: &'a SchemaConfig,
}

impl<'a> FeatureSelector<'a> {
    pub fn new(schema: &'a SchemaConfig) -> Self {
        Self { schema }
    }

    /// Select features using the schema's canonical target.
    pub fn select(&self, df: &DataFrame) -> Result<Vec<String>> {
        self.select_for(df, &self.schema.target_column)
    }

    /// Select features for an explicit target column.
    pub fn select_for(&self, df: &DataFrame, target: &str) -> Result<Vec<String>> {
        if !has_column(df, target) {
            return Err(PreprocessingError::TargetNotFound(target.to_string()));
        }

        let features = self.candidates(df, target);
        if features.is_empty() {
            return Err(PreprocessingError::NoFeatures {
                target: target.to_string(),
            });
        }

        debug!(count = features.len(), ?features, "Selected feature columns");
        Ok(features)
    }

    /// The columns [`select_for`](Self::select_for) would pick, without
    /// requiring `target` to be present. Scoring an unlabeled batch uses
    /// this; the result may be empty.
    pub fn candidates(&self, df: &DataFrame, target: &str) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|c| c.name().as_str() != target)
            .filter(|c| c.name().as_str() != self.schema.prediction_column)
            .filter(|c| is_numeric_dtype(c.dtype()))
            .filter(|c| !self.schema.is_categorical(c.name().as_str()))
            .map(|c| c.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_selects_numeric_non_target_columns_in_order() {
        let schema = SchemaConfig::default();
        let df = df!(
            "Usage_Gallons" => &[1.0, 2.0],
            "Water_Bill_Amount" => &[10.0, 20.0],
            "Account" => &["a", "b"],
            "Meter_Size" => &[1i64, 2],
            "Estimated" => &[true, false]
        )
        .unwrap();

        let features = FeatureSelector::new(&schema).select(&df).unwrap();
        assert_eq!(
            features,
            vec!["Usage_Gallons".to_string(), "Meter_Size".to_string()]
        );
    }

    #[test]
    fn test_never_selects_categorical_columns() {
        let schema = SchemaConfig::default();
        let df = df!(
            "Weekday" => &[1i64, 2],
            "Traffic_Data" => &[3.0, 4.0],
            "Usage" => &[1.0, 2.0],
            "Water_Bill_Amount" => &[10.0, 20.0]
        )
        .unwrap();

        let features = FeatureSelector::new(&schema).select(&df).unwrap();
        assert_eq!(features, vec!["Usage".to_string()]);
    }

    #[test]
    fn test_skips_prediction_column() {
        let schema = SchemaConfig::default();
        let df = df!(
            "Usage" => &[1.0, 2.0],
            "Water_Bill_Amount" => &[10.0, 20.0],
            "Predicted_Bill_Amount" => &[11.0, 19.0]
        )
        .unwrap();

        let features = FeatureSelector::new(&schema).select(&df).unwrap();
        assert_eq!(features, vec!["Usage".to_string()]);
    }

    #[test]
    fn test_candidates_without_target() {
        let schema = SchemaConfig::default();
        let df = df!("Usage" => &[1.0, 2.0], "Weekday" => &[1i64, 2]).unwrap();

        let selector = FeatureSelector::new(&schema);
        assert_eq!(
            selector.candidates(&df, "Water_Bill_Amount"),
            vec!["Usage".to_string()]
        );
        assert!(selector.select(&df).is_err());
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let schema = SchemaConfig::default();
        let df = df!("Usage" => &[1.0]).unwrap();

        let err = FeatureSelector::new(&schema).select(&df).unwrap_err();
        assert!(matches!(err, PreprocessingError::TargetNotFound(_)));
    }

    #[test]
    fn test_no_features_is_an_error() {
        let schema = SchemaConfig::default();
        let df = df!(
            "Water_Bill_Amount" => &[10.0],
            "Account" => &["a"]
        )
        .unwrap();

        let err = FeatureSelector::new(&schema).select(&df).unwrap_err();
        assert!(matches!(err, PreprocessingError::NoFeatures { .. }));
    }
}
