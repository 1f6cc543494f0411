//! Progress reporting for the cleaning and forecasting pipelines.
//!
//! Stages cover both cleaning and training so that a single reporter can
//! follow an end-to-end run.
//!
//! # Example
//!
//! ```rust
//! use billcast_processing::pipeline::{CleaningPipeline, ProgressUpdate};
//! use polars::prelude::*;
//!
//! let df = df!("Date_Time" => &["2020-01-01 00:00:00"], "Water_Bill_Amount" => &[1.0]).unwrap();
//! let cleaned = CleaningPipeline::builder()
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()
//!     .unwrap()
//!     .process(df)
//!     .unwrap();
//! assert_eq!(cleaned.data.height(), 1);
//! ```

use serde::{Deserialize, Serialize};

/// Stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Validating input
    Initializing,
    /// Renaming columns to canonical names
    Normalizing,
    /// Parsing the timestamp column
    ParsingTimestamps,
    /// Removing duplicates, empty columns and unusable rows
    Filtering,
    /// Converting numeric text columns
    Coercing,
    /// Fitting the forest
    Training,
    /// Scoring the cleaned batch
    Scoring,
    /// Run completed successfully
    Complete,
    /// Run failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Normalizing => "Normalizing Schema",
            Self::ParsingTimestamps => "Parsing Timestamps",
            Self::Filtering => "Filtering Rows",
            Self::Coercing => "Coercing Types",
            Self::Training => "Training Model",
            Self::Scoring => "Scoring",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of an end-to-end run spent in this stage (0.0 - 1.0).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Normalizing => 0.05,
            Self::ParsingTimestamps => 0.08,
            Self::Filtering => 0.10,
            Self::Coercing => 0.10,
            Self::Training => 0.55,
            Self::Scoring => 0.10,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Normalizing => 0.02,
            Self::ParsingTimestamps => 0.07,
            Self::Filtering => 0.15,
            Self::Coercing => 0.25,
            Self::Training => 0.35,
            Self::Scoring => 0.90,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update emitted by a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage.
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Complete,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates during a run.
///
/// Implementations must be `Send + Sync` so a reporter can be shared with
/// the thread that renders progress.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}
