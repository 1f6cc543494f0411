//! Trained model and its on-disk artifact.
//!
//! This module provides [`TrainedModel`], which bundles a fitted
//! [`RandomForest`] with everything needed to score a new batch:
//!
//! - the ordered feature names it was fitted on
//! - the per-feature fill values used for missing inputs
//! - the target column name and held-out metrics
//!
//! # Serialization
//!
//! | Method | Use Case |
//! |--------|----------|
//! | [`save()`](TrainedModel::save) / [`load()`](TrainedModel::load) | File-based persistence |
//! | [`to_bytes()`](TrainedModel::to_bytes) / [`from_bytes()`](TrainedModel::from_bytes) | Database or network transfer |
//!
//! Artifacts are `bincode` encoded. [`save()`](TrainedModel::save) writes to a
//! temporary file in the destination directory and renames it into place, so
//! readers never observe a half-written model.
//!
//! # Example
//!
//! ```rust,no_run
//! use billcast_learning::TrainedModel;
//!
//! let model = TrainedModel::load("model/water_bill_model.bin")?;
//! println!("{} trees, features {:?}", model.forest.n_trees(), model.feature_names);
//! # Ok::<(), billcast_learning::LearningError>(())
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{LearningError, Result};
use crate::forest::RandomForest;
use crate::metrics::Metrics;

/// Bumped whenever the artifact layout changes.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// A fitted forest plus the metadata needed to score new batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub format_version: u32,
    pub forest: RandomForest,

    /// Feature columns in the order the forest expects them.
    pub feature_names: Vec<String>,

    /// Replacement for a missing feature value, one per feature.
    pub fill_values: Vec<f64>,

    pub target_column: String,

    /// Held-out scores from training.
    pub metrics: Metrics,

    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub fn new(
        forest: RandomForest,
        feature_names: Vec<String>,
        fill_values: Vec<f64>,
        target_column: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            forest,
            feature_names,
            fill_values,
            target_column: target_column.into(),
            metrics,
            trained_at: Utc::now(),
        }
    }

    /// Encode the model.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a model produced by [`to_bytes()`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::Serialization`] for corrupt input or an
    /// artifact written with a different format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: Self = bincode::deserialize(bytes)?;
        if model.format_version != MODEL_FORMAT_VERSION {
            return Err(LearningError::Serialization(format!(
                "unsupported model format version {} (expected {})",
                model.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if model.fill_values.len() != model.feature_names.len()
            || model.forest.n_features() != model.feature_names.len()
        {
            return Err(LearningError::Serialization(
                "model feature metadata is inconsistent".to_string(),
            ));
        }
        Ok(model)
    }

    /// Write the model to `path`, replacing any existing artifact.
    ///
    /// Parent directories are created as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let bytes = self.to_bytes()?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LearningError::Io(e.error))?;

        info!(path = %path.display(), bytes = bytes.len(), "Saved model");
        Ok(())
    }

    /// Read a model written by [`save()`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ModelNotFound`] when `path` does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LearningError::ModelNotFound {
                path: path.display().to_string(),
            });
        }

        let bytes = fs::read(path)?;
        let model = Self::from_bytes(&bytes)?;
        debug!(
            path = %path.display(),
            trees = model.forest.n_trees(),
            features = model.feature_names.len(),
            "Loaded model"
        );
        Ok(model)
    }
}
