//! Configuration for the forest trainer.
//!
//! This module provides [`TrainerConfig`] and its builder.
//!
//! # Example
//!
//! ```
//! use billcast_learning::TrainerConfig;
//!
//! let config = TrainerConfig::builder()
//!     .n_trees(200)
//!     .test_size(0.2)
//!     .random_seed(42)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.n_trees, 200);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LearningError;
use crate::forest::ForestParams;

/// Default location of the persisted model artifact.
pub const DEFAULT_MODEL_PATH: &str = "model/water_bill_model.bin";

/// Configuration for training a random forest on a cleaned batch.
///
/// Use [`TrainerConfig::builder()`] to construct a configuration with the builder pattern.
///
/// # Validation
///
/// The builder validates the following constraints on [`build()`](TrainerConfigBuilder::build):
/// - `n_trees` must be at least 1
/// - `test_size` must be in range `(0.0, 1.0)` (exclusive)
/// - `min_samples_split` must be at least 2
/// - `min_samples_leaf` must be at least 1
/// - `max_depth` and `max_features`, when set, must be at least 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of trees in the forest (default: 200).
    pub n_trees: usize,

    /// Fraction of rows held out for scoring (default: 0.2).
    ///
    /// The held-out count is `ceil(rows * test_size)`.
    pub test_size: f64,

    /// Seed for the split shuffle and every bootstrap sample (default: 42).
    pub random_seed: u64,

    /// Maximum tree depth. `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,

    /// Minimum number of rows a node needs before it is split (default: 2).
    pub min_samples_split: usize,

    /// Minimum number of rows in each child of a split (default: 1).
    pub min_samples_leaf: usize,

    /// Features considered per split. `None` considers every feature.
    pub max_features: Option<usize>,

    /// Where the trained model is written (default: `model/water_bill_model.bin`).
    pub model_path: PathBuf,

    /// Whether training writes the model artifact (default: true).
    pub persist_model: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            test_size: 0.2,
            random_seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            persist_model: true,
        }
    }
}

impl TrainerConfig {
    /// Create a new builder for `TrainerConfig`.
    #[must_use]
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }

    /// Tree-growing parameters handed to the forest.
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            seed: self.random_seed,
        }
    }

    /// Check every constraint listed on [`TrainerConfig`].
    pub fn validate(&self) -> Result<(), LearningError> {
        if self.n_trees == 0 {
            return Err(LearningError::InvalidConfig(
                "n_trees must be at least 1".to_string(),
            ));
        }

        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(LearningError::InvalidConfig(
                "test_size must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }

        if self.min_samples_split < 2 {
            return Err(LearningError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }

        if self.min_samples_leaf == 0 {
            return Err(LearningError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }

        if self.max_depth == Some(0) {
            return Err(LearningError::InvalidConfig(
                "max_depth must be at least 1 when set".to_string(),
            ));
        }

        if self.max_features == Some(0) {
            return Err(LearningError::InvalidConfig(
                "max_features must be at least 1 when set".to_string(),
            ));
        }

        if self.persist_model && self.model_path.as_os_str().is_empty() {
            return Err(LearningError::InvalidConfig(
                "model_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`TrainerConfig`].
///
/// Created via [`TrainerConfig::builder()`]. All setters return `self` to allow
/// method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainerConfigBuilder {
    config: TrainerConfig,
}

impl TrainerConfigBuilder {
    /// Set the number of trees (default: 200).
    #[must_use]
    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.config.n_trees = n_trees;
        self
    }

    /// Set the held-out fraction (default: 0.2).
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the random seed for reproducibility (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Limit tree depth.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn min_samples_split(mut self, samples: usize) -> Self {
        self.config.min_samples_split = samples;
        self
    }

    #[must_use]
    pub fn min_samples_leaf(mut self, samples: usize) -> Self {
        self.config.min_samples_leaf = samples;
        self
    }

    /// Consider a random subset of this many features at each split.
    #[must_use]
    pub fn max_features(mut self, features: usize) -> Self {
        self.config.max_features = Some(features);
        self
    }

    /// Set where the model artifact is written.
    #[must_use]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = path.into();
        self
    }

    /// Enable or disable writing the model artifact (default: true).
    #[must_use]
    pub fn persist_model(mut self, persist: bool) -> Self {
        self.config.persist_model = persist;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] when any constraint listed on
    /// [`TrainerConfig`] is violated.
    pub fn build(self) -> Result<TrainerConfig, LearningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
