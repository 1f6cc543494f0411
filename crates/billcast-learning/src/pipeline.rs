//! End-to-end forecasting: clean, train, score.
//!
//! [`ForecastPipeline`] chains the cleaning pipeline from `billcast-processing`
//! with the [`Trainer`] and [`Predictor`]. A run either returns a complete
//! [`ForecastOutput`] or an error; nothing is returned half-done.
//!
//! # Example
//!
//! ```rust,no_run
//! use billcast_learning::{ForecastPipeline, TrainerConfig};
//! use billcast_processing::io::load_csv_with_fallbacks;
//!
//! let raw = load_csv_with_fallbacks("bills.csv")?;
//! let output = ForecastPipeline::builder()
//!     .trainer_config(TrainerConfig::builder().n_trees(100).build()?)
//!     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
//!     .build()?
//!     .run(raw)?;
//!
//! println!("R² = {:.3}, RMSE = {:.2}", output.metrics.r2, output.metrics.rmse);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use billcast_processing::{
    CleanedBatch, CleaningPipeline, CleaningSummary, ClosureProgressReporter, PipelineConfig,
    PipelineStage, PreprocessingError, ProgressReporter, ProgressUpdate,
};
use polars::prelude::DataFrame;
use tracing::{error, info};

use crate::config::TrainerConfig;
use crate::error::{LearningError, Result};
use crate::metrics::Metrics;
use crate::model::TrainedModel;
use crate::predictor::Predictor;
use crate::trainer::Trainer;

/// Everything produced by a successful run.
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    /// The cleaned batch with the prediction column appended.
    pub scored: DataFrame,

    /// Held-out metrics of the trained model.
    pub metrics: Metrics,

    /// What cleaning did to the raw batch.
    pub summary: CleaningSummary,

    /// Where the model was written, if it was persisted.
    pub model_path: Option<PathBuf>,

    pub model: TrainedModel,
}

/// Clean → train → predict.
pub struct ForecastPipeline {
    cleaning: CleaningPipeline,
    trainer: Trainer,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(ForecastPipeline: Send, Sync);

impl ForecastPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> ForecastPipelineBuilder {
        ForecastPipelineBuilder::default()
    }

    pub fn cleaning_config(&self) -> &PipelineConfig {
        self.cleaning.config()
    }

    pub fn trainer_config(&self) -> &TrainerConfig {
        self.trainer.config()
    }

    /// Run the full pipeline on a raw batch.
    pub fn run(&self, raw: DataFrame) -> Result<ForecastOutput> {
        match self.run_internal(raw) {
            Ok(output) => Ok(output),
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Forecast pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Clean a raw batch without training.
    pub fn clean(&self, raw: DataFrame) -> Result<CleanedBatch> {
        Ok(self.cleaning.process(raw)?)
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, raw: DataFrame) -> Result<ForecastOutput> {
        let start_time = Instant::now();

        let cleaned = self.cleaning.process(raw)?;
        let schema = &self.cleaning.config().schema;
        let target = cleaned
            .target_column
            .clone()
            .ok_or_else(|| LearningError::TargetNotFound(schema.target_column.clone()))?;

        // ====================================================================
        // Training
        // ====================================================================
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Training,
            0.0,
            format!(
                "Training {} trees on {} rows...",
                self.trainer.config().n_trees,
                cleaned.data.height()
            ),
        ));

        let model = self.trainer.train_for(&cleaned.data, &target)?;

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Training,
            1.0,
            format!(
                "R² {:.4}, RMSE {:.4}",
                model.metrics.r2, model.metrics.rmse
            ),
        ));

        // ====================================================================
        // Scoring
        // ====================================================================
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Scoring,
            0.0,
            "Scoring cleaned batch...",
        ));

        let scored = Predictor::new(&model, schema).predict(&cleaned.data)?;

        let model_path = self
            .trainer
            .config()
            .persist_model
            .then(|| self.trainer.config().model_path.clone());

        info!(
            rows = scored.height(),
            r2 = model.metrics.r2,
            rmse = model.metrics.rmse,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Forecast pipeline complete"
        );
        self.report_progress(ProgressUpdate::complete(format!(
            "Scored {} rows",
            scored.height()
        )));

        Ok(ForecastOutput {
            scored,
            metrics: model.metrics,
            summary: cleaned.summary,
            model_path,
            model,
        })
    }
}

/// Builder for [`ForecastPipeline`].
#[derive(Default)]
pub struct ForecastPipelineBuilder {
    cleaning_config: Option<PipelineConfig>,
    trainer_config: Option<TrainerConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl ForecastPipelineBuilder {
    /// Set the cleaning configuration. Its schema is also used for feature
    /// selection and the prediction column.
    pub fn cleaning_config(mut self, config: PipelineConfig) -> Self {
        self.cleaning_config = Some(config);
        self
    }

    pub fn trainer_config(mut self, config: TrainerConfig) -> Self {
        self.trainer_config = Some(config);
        self
    }

    /// Set a progress reporter shared by every stage.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline, validating both configurations.
    pub fn build(self) -> Result<ForecastPipeline> {
        let cleaning_config = self.cleaning_config.unwrap_or_default();
        let trainer_config = self.trainer_config.unwrap_or_default();
        trainer_config.validate()?;

        let mut cleaning = CleaningPipeline::builder().config(cleaning_config.clone());
        if let Some(reporter) = &self.progress_reporter {
            cleaning = cleaning.progress_reporter(Arc::clone(reporter));
        }
        let cleaning = cleaning.build().map_err(PreprocessingError::from)?;

        Ok(ForecastPipeline {
            cleaning,
            trainer: Trainer::new(trainer_config, cleaning_config.schema),
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billcast_processing::utils::column_names;
    use polars::prelude::*;
    use std::sync::Mutex;

    fn raw_batch(n: usize) -> DataFrame {
        let dates: Vec<String> = (0..n)
            .map(|i| format!("{:02}/{:02}/2021", i % 12 + 1, i % 28 + 1))
            .collect();
        let usage: Vec<f64> = (0..n).map(|i| 100.0 + 10.0 * i as f64).collect();
        let charges: Vec<String> = usage.iter().map(|u| format!("{:.2}", 3.0 + u * 0.05)).collect();
        df!(
            "Service End Date" => dates,
            "Current Charges" => charges,
            "Usage_Gallons" => usage,
            "Weekday" => (0..n).map(|i| (i % 7) as i64).collect::<Vec<_>>()
        )
        .unwrap()
    }

    fn quick_trainer() -> TrainerConfig {
        TrainerConfig::builder()
            .n_trees(10)
            .persist_model(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_scores_cleaned_batch() {
        let output = ForecastPipeline::builder()
            .trainer_config(quick_trainer())
            .build()
            .unwrap()
            .run(raw_batch(30))
            .unwrap();

        assert_eq!(output.scored.height(), 30);
        assert_eq!(
            column_names(&output.scored),
            vec![
                "Date_Time".to_string(),
                "Water_Bill_Amount".to_string(),
                "Usage_Gallons".to_string(),
                "Predicted_Bill_Amount".to_string(),
            ]
        );
        assert_eq!(output.metrics.test_rows, 6);
        assert!(output.model_path.is_none());
        assert_eq!(output.summary.rows_before, 30);
    }

    #[test]
    fn test_infinite_charge_row_is_dropped() {
        let mut raw = raw_batch(30);
        let mut charges: Vec<String> = raw
            .column("Current Charges")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(str::to_string)
            .collect();
        charges[5] = "inf".to_string();
        raw.replace("Current Charges", Series::new("Current Charges".into(), charges))
            .unwrap();

        let output = ForecastPipeline::builder()
            .trainer_config(quick_trainer())
            .build()
            .unwrap()
            .run(raw)
            .unwrap();

        assert_eq!(output.scored.height(), 29);
        assert_eq!(output.metrics.train_rows + output.metrics.test_rows, 29);
        assert!(output.metrics.rmse.is_finite());
    }

    #[test]
    fn test_run_without_target_fails() {
        let raw = df!(
            "Date_Time" => &["2021-01-01 00:00:00", "2021-02-01 00:00:00"],
            "Usage" => &[1.0, 2.0]
        )
        .unwrap();

        let err = ForecastPipeline::builder()
            .trainer_config(quick_trainer())
            .build()
            .unwrap()
            .run(raw)
            .unwrap_err();
        assert!(matches!(err, LearningError::TargetNotFound(_)));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let bad_cleaning = PipelineConfig {
            numeric_ratio_threshold: 2.0,
            ..PipelineConfig::default()
        };
        assert!(ForecastPipeline::builder()
            .cleaning_config(bad_cleaning)
            .build()
            .is_err());

        let bad_trainer = TrainerConfig {
            n_trees: 0,
            ..TrainerConfig::default()
        };
        assert!(matches!(
            ForecastPipeline::builder().trainer_config(bad_trainer).build(),
            Err(LearningError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_progress_covers_training_and_scoring() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();

        ForecastPipeline::builder()
            .trainer_config(quick_trainer())
            .on_progress(move |update: ProgressUpdate| sink.lock().unwrap().push(update.stage))
            .build()
            .unwrap()
            .run(raw_batch(20))
            .unwrap();

        let mut seen = stages.lock().unwrap().clone();
        seen.dedup();
        assert_eq!(
            &seen[seen.len() - 3..],
            &[
                PipelineStage::Training,
                PipelineStage::Scoring,
                PipelineStage::Complete
            ]
        );
        assert_eq!(seen[0], PipelineStage::Initializing);
    }
}
