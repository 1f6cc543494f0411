//! Scoring cleaned batches with a trained model.

use billcast_processing::{FeatureSelector, SchemaConfig};
use polars::prelude::*;
use tracing::info;

use crate::dataset::FeatureColumns;
use crate::error::{LearningError, Result};
use crate::model::TrainedModel;

/// Appends model predictions to a batch.
///
/// Features are selected with the same rules used at training time and must
/// match the model's recorded feature list exactly, names and order. The
/// target column may be absent, so unlabeled batches can be scored.
#[derive(Debug, Clone, Copy)]
pub struct Predictor<'a> {
    model: &'a TrainedModel,
    schema: &'a SchemaConfig,
}

impl<'a> Predictor<'a> {
    pub fn new(model: &'a TrainedModel, schema: &'a SchemaConfig) -> Self {
        Self { model, schema }
    }

    /// Predictions for every row of `df`, in row order.
    pub fn predict_values(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let selected =
            FeatureSelector::new(self.schema).candidates(df, &self.model.target_column);
        if selected != self.model.feature_names {
            return Err(LearningError::FeatureMismatch {
                expected: self.model.feature_names.clone(),
                found: selected,
            });
        }

        let features = FeatureColumns::from_frame(df, &selected)?;
        let x = features.full_matrix(&self.model.fill_values)?;
        Ok(self.model.forest.predict(&x)?.to_vec())
    }

    /// Return a copy of `df` with the prediction column appended.
    ///
    /// `df` itself is left untouched.
    pub fn predict(&self, df: &DataFrame) -> Result<DataFrame> {
        let predictions = self.predict_values(df)?;
        let column = Series::new(
            self.schema.prediction_column.as_str().into(),
            predictions,
        );

        let mut scored = df.clone();
        scored.with_column(column)?;

        info!(
            rows = scored.height(),
            column = %self.schema.prediction_column,
            "Scored batch"
        );
        Ok(scored)
    }
}
