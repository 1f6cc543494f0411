//! Fitting a forest on a cleaned batch.

use std::time::Instant;

use billcast_processing::utils::has_column;
use billcast_processing::{FeatureSelector, SchemaConfig};
use polars::prelude::DataFrame;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::TrainerConfig;
use crate::dataset::{FeatureColumns, target_vector};
use crate::error::{LearningError, Result};
use crate::forest::RandomForest;
use crate::metrics::Metrics;
use crate::model::TrainedModel;

/// Row indices of the two partitions of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with `seed` and hold out `ceil(n_rows * test_size)`
/// rows.
///
/// # Errors
///
/// Returns [`LearningError::InvalidData`] when either partition would be empty.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Result<Split> {
    let n_test = (n_rows as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(LearningError::InvalidData(format!(
            "{} rows cannot be split into non-empty training and held-out sets \
             (test_size {})",
            n_rows, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(Split {
        train,
        test: indices,
    })
}

/// Trains a [`TrainedModel`] from a cleaned batch.
///
/// The batch is split with a seeded shuffle, the forest is fitted on the
/// training rows and scored on the held-out rows. Missing feature values are
/// replaced by training-partition medians, which are kept in the model for
/// scoring.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
    schema: SchemaConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig, schema: SchemaConfig) -> Self {
        Self { config, schema }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train against the schema's canonical target column.
    pub fn train(&self, df: &DataFrame) -> Result<TrainedModel> {
        self.train_for(df, &self.schema.target_column)
    }

    /// Train against an explicit target column.
    ///
    /// When `persist_model` is set the model is also written to `model_path`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::TargetNotFound`] when `target` is absent
    /// - [`LearningError::Preprocessing`] wrapping `NoFeatures` when no
    ///   numeric feature remains
    /// - [`LearningError::InvalidData`] for a non-numeric or incomplete
    ///   target, or too few rows to split
    pub fn train_for(&self, df: &DataFrame, target: &str) -> Result<TrainedModel> {
        self.config.validate()?;
        let start = Instant::now();

        if !has_column(df, target) {
            return Err(LearningError::TargetNotFound(target.to_string()));
        }
        let feature_names = FeatureSelector::new(&self.schema).select_for(df, target)?;
        let y_all = target_vector(df, target)?;
        let split = train_test_split(df.height(), self.config.test_size, self.config.random_seed)?;

        info!(
            rows = df.height(),
            train = split.train.len(),
            test = split.test.len(),
            features = feature_names.len(),
            trees = self.config.n_trees,
            "Training random forest"
        );

        let features = FeatureColumns::from_frame(df, &feature_names)?;
        let fill_values = features.medians(&split.train);
        debug!(?fill_values, "Feature fill values from training rows");

        let x_train = features.matrix(&split.train, &fill_values)?;
        let y_train = y_all.select(ndarray::Axis(0), &split.train);
        let x_test = features.matrix(&split.test, &fill_values)?;
        let y_test = y_all.select(ndarray::Axis(0), &split.test);

        let forest = RandomForest::fit(&x_train, &y_train, &self.config.forest_params())?;
        let predicted = forest.predict(&x_test)?;
        let metrics = Metrics::evaluate(y_test.view(), predicted.view(), split.train.len());

        info!(
            r2 = metrics.r2,
            rmse = metrics.rmse,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );

        let model = TrainedModel::new(forest, feature_names, fill_values, target, metrics);
        if self.config.persist_model {
            model.save(&self.config.model_path)?;
        }
        Ok(model)
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(TrainerConfig::default(), SchemaConfig::default())
    }
}
