//! Cleaning pipeline and its builder.
//!
//! `CleaningPipeline` orchestrates the cleaning stages in order:
//! normalize → parse timestamps → filter → coerce → missing-target policy.

use std::sync::Arc;
use std::time::Instant;

use polars::prelude::*;
use tracing::{error, info, warn};

use crate::cleaner::{FilterStep, FilterStepKind, RowColumnFilter, TypeCoercer};
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::Result;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::schema::SchemaNormalizer;
use crate::timestamp::TimestampParser;
use crate::types::{ActionType, CleanedBatch, CleaningAction, CleaningSummary};
use crate::utils::has_column;

/// The cleaning pipeline.
///
/// Use [`CleaningPipeline::builder()`] to create a pipeline with custom
/// configuration.
///
/// # Example
///
/// ```rust
/// use billcast_processing::{CleaningPipeline, MissingTargetPolicy, PipelineConfig};
/// use polars::prelude::*;
///
/// let df = df!(
///     "Service End Date" => &["01/15/2020", "bad-date", "02/01/2020"],
///     "Current Charges" => &[Some(45.20), Some(30.00), None]
/// )
/// .unwrap();
///
/// let cleaned = CleaningPipeline::builder()
///     .config(PipelineConfig::builder()
///         .missing_target_policy(MissingTargetPolicy::Drop)
///         .build()
///         .unwrap())
///     .build()
///     .unwrap()
///     .process(df)
///     .unwrap();
///
/// assert_eq!(cleaned.data.height(), 1);
/// assert_eq!(cleaned.target_column.as_deref(), Some("Water_Bill_Amount"));
/// ```
pub struct CleaningPipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// The pipeline is handed to worker threads by hosts.
static_assertions::assert_impl_all!(CleaningPipeline: Send, Sync);

impl CleaningPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> CleaningPipelineBuilder {
        CleaningPipelineBuilder::default()
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The progress reporter, if one was configured.
    pub fn progress_reporter(&self) -> Option<Arc<dyn ProgressReporter>> {
        self.progress_reporter.clone()
    }

    /// Clean a raw batch.
    ///
    /// The pipeline never fails on individual bad values; those become
    /// nulls and are filtered. Errors are structural (polars failures) only.
    pub fn process(&self, df: DataFrame) -> Result<CleanedBatch> {
        match self.process_internal(df) {
            Ok(batch) => Ok(batch),
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Cleaning pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn process_internal(&self, df: DataFrame) -> Result<CleanedBatch> {
        let start_time = Instant::now();
        let schema = &self.config.schema;

        info!(rows = df.height(), columns = df.width(), "Starting cleaning pipeline");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            0.0,
            "Starting cleaning pipeline...",
        ));

        let mut summary = CleaningSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();

        // ====================================================================
        // Stage 1: Schema normalization
        // ====================================================================
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Normalizing,
            0.0,
            "Normalizing column names...",
        ));

        let (df, decision) = SchemaNormalizer::new(schema).apply(df)?;
        for (source, canonical) in &decision.renamed {
            summary.add_action(CleaningAction::new(
                ActionType::ColumnRenamed,
                canonical.as_str(),
                format!("Renamed '{}' to '{}'", source, canonical),
            ));
        }
        for shadowed in &decision.shadowed {
            summary.add_action(
                CleaningAction::new(
                    ActionType::ColumnRemoved,
                    shadowed.as_str(),
                    format!("Removed '{}' in favour of an existing canonical column", shadowed),
                )
                .with_details("shadowed alternate"),
            );
        }
        match &decision.target {
            Some(target) => summary.add_action(CleaningAction::new(
                ActionType::TargetIdentified,
                target.as_str(),
                format!("Target column: {}", target),
            )),
            None => {
                warn!(target = %schema.target_column, "No target column in batch");
                summary.add_warning(format!(
                    "No column maps to the target '{}'",
                    schema.target_column
                ));
            }
        }

        // ====================================================================
        // Stage 2: Timestamp parsing
        // ====================================================================
        self.report_progress(ProgressUpdate::new(
            PipelineStage::ParsingTimestamps,
            0.0,
            "Parsing timestamps...",
        ));

        let mut df = df;
        let parser = TimestampParser::new(schema.timestamp_formats.clone());
        match parser.parse_column(&mut df, &schema.timestamp_column)? {
            Some(report) => {
                summary.add_action(
                    CleaningAction::new(
                        ActionType::TimestampParsed,
                        schema.timestamp_column.as_str(),
                        format!(
                            "Parsed {} timestamps, {} unparsable",
                            report.parsed, report.unparsable
                        ),
                    )
                    .with_details(format!("format hits: {:?}", report.format_hits)),
                );
                summary.timestamps = Some(report);
            }
            None => summary.add_warning(format!(
                "Timestamp column '{}' not found; timestamp parsing skipped",
                schema.timestamp_column
            )),
        }

        // ====================================================================
        // Stage 3: Row/column filtering
        // ====================================================================
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Filtering,
            0.0,
            "Filtering rows and columns...",
        ));

        let filter = RowColumnFilter::new(&self.config);
        let (df, steps) = filter.apply(df)?;
        for step in &steps {
            record_filter_step(&mut summary, step, &schema.target_column);
        }

        // ====================================================================
        // Stage 4: Type coercion
        // ====================================================================
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Coercing,
            0.0,
            "Coercing numeric text columns...",
        ));

        let mut df = df;
        let coercions = TypeCoercer::new(self.config.numeric_ratio_threshold).coerce(&mut df)?;
        for coercion in coercions.iter().filter(|c| c.applied) {
            summary.add_action(
                CleaningAction::new(
                    ActionType::TypeCorrected,
                    coercion.column.as_str(),
                    format!("Converted '{}' to numeric", coercion.column),
                )
                .with_details(format!(
                    "{} of {} values converted",
                    coercion.converted, coercion.non_blank
                )),
            );
        }

        // Coercion can turn an unconvertible target into a null.
        let (df, step) = filter.apply_target_policy(df)?;
        record_filter_step(&mut summary, &step, &schema.target_column);

        let target_column = decision
            .target
            .filter(|t| has_column(&df, t));

        summary.finish(df.height(), df.width());
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            rows_before = summary.rows_before,
            rows_after = summary.rows_after,
            columns_after = summary.columns_after,
            duration_ms = summary.duration_ms,
            "Cleaning complete"
        );
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Coercing,
            1.0,
            "Cleaning complete",
        ));

        Ok(CleanedBatch {
            data: df,
            target_column,
            summary,
        })
    }
}

fn record_filter_step(summary: &mut CleaningSummary, step: &FilterStep, target: &str) {
    if step.is_noop() {
        return;
    }

    let action_type = match step.kind {
        FilterStepKind::Duplicates => ActionType::DuplicatesRemoved,
        FilterStepKind::EmptyColumns | FilterStepKind::CategoricalColumns => {
            ActionType::ColumnRemoved
        }
        FilterStepKind::MissingTarget if step.values_imputed > 0 => ActionType::ValueImputed,
        FilterStepKind::UnparsableTimestamps | FilterStepKind::MissingTarget => {
            ActionType::RowsRemoved
        }
    };
    let action_target = match step.kind {
        FilterStepKind::MissingTarget => target,
        _ => "dataset",
    };

    summary.add_action(CleaningAction::new(action_type, action_target, step.describe()));
}

/// Builder for [`CleaningPipeline`].
#[derive(Default)]
pub struct CleaningPipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(CleaningPipelineBuilder: Send);

impl CleaningPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<CleaningPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(CleaningPipeline {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingTargetPolicy;
    use crate::utils::column_names;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw_batch() -> DataFrame {
        df!(
            "Service End Date" => &[
                Some("01/15/2020"), Some("01/15/2020"), Some("bad-date"),
                Some("2020-02-01 00:00:00"), Some("03/01/2020"), Some("04/01/2020"), Some("05/01/2020"),
            ],
            "Current Charges" => &[
                Some("45.20"), Some("45.20"), Some("30.00"),
                Some("oops"), None, Some("50.00"), Some("55.00"),
            ],
            "Usage_Gallons" => &["1,200", "1,200", "900", "1,000", "1,100", "1,300", "1,400"],
            "Weekday" => &["Wed", "Wed", "Thu", "Sat", "Sun", "Wed", "Fri"],
            "Notes" => &[None::<&str>, None, None, None, None, None, None]
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = CleaningPipeline::builder().build().unwrap();
        assert_eq!(pipeline.config().numeric_ratio_threshold, 0.7);
        assert!(pipeline.progress_reporter().is_none());
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.numeric_ratio_threshold = 2.0;
        assert!(CleaningPipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_process_drop_policy() {
        let cleaned = CleaningPipeline::builder()
            .build()
            .unwrap()
            .process(raw_batch())
            .unwrap();

        // duplicate, bad date, unconvertible charge, missing charge all removed
        assert_eq!(cleaned.data.height(), 3);
        assert_eq!(
            column_names(&cleaned.data),
            vec!["Date_Time", "Water_Bill_Amount", "Usage_Gallons"]
        );
        assert_eq!(
            cleaned.data.column("Water_Bill_Amount").unwrap().dtype(),
            &DataType::Float64
        );
        assert_eq!(
            cleaned.data.column("Usage_Gallons").unwrap().dtype(),
            &DataType::Float64
        );
        assert_eq!(cleaned.summary.rows_before, 7);
        assert_eq!(cleaned.summary.rows_after, 3);
        assert_eq!(
            cleaned
                .summary
                .actions_of(ActionType::DuplicatesRemoved)
                .count(),
            1
        );
    }

    #[test]
    fn test_process_mean_impute_policy() {
        let config = PipelineConfig::builder()
            .missing_target_policy(MissingTargetPolicy::MeanImpute)
            .build()
            .unwrap();

        let cleaned = CleaningPipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .process(raw_batch())
            .unwrap();

        // only the duplicate and the bad date go; "oops" and the missing
        // charge are filled with the mean of the observed charge
        assert_eq!(cleaned.data.height(), 5);
        let target = cleaned.data.column("Water_Bill_Amount").unwrap();
        assert_eq!(target.null_count(), 0);
        assert!(
            cleaned
                .summary
                .actions_of(ActionType::ValueImputed)
                .count()
                >= 1
        );
    }

    #[test]
    fn test_infinite_charge_is_dropped() {
        let mut batch = raw_batch();
        let charges = Series::new(
            "Current Charges".into(),
            &[
                Some("45.20"), Some("45.20"), Some("30.00"),
                Some("oops"), Some("inf"), Some("50.00"), Some("55.00"),
            ],
        );
        batch.replace("Current Charges", charges).unwrap();

        let cleaned = CleaningPipeline::builder()
            .build()
            .unwrap()
            .process(batch)
            .unwrap();

        assert_eq!(cleaned.data.height(), 3);
        let target = cleaned.data.column("Water_Bill_Amount").unwrap();
        assert_eq!(target.null_count(), 0);
        assert!(target
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .all(f64::is_finite));
    }

    #[test]
    fn test_missing_timestamp_column_is_a_warning() {
        let df = df!("Water_Bill_Amount" => &[1.0, 2.0], "Usage" => &[3.0, 4.0]).unwrap();
        let cleaned = CleaningPipeline::builder()
            .build()
            .unwrap()
            .process(df)
            .unwrap();

        assert_eq!(cleaned.data.height(), 2);
        assert!(cleaned.summary.timestamps.is_none());
        assert_eq!(cleaned.summary.warnings.len(), 1);
    }

    #[test]
    fn test_pipeline_reports_progress() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();

        let pipeline = CleaningPipeline::builder()
            .on_progress(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        pipeline.process(raw_batch()).unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 5);
    }
}
