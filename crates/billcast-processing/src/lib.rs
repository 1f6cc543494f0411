//! Utility-billing data cleaning library
//!
//! Turns a raw billing export into a batch a regression model can train on,
//! built with Rust and Polars.
//!
//! # Overview
//!
//! - **Schema Normalization**: alternate column names (`Service End Date`,
//!   `Current Charges`, legacy `Charging_Load_kW`) are mapped onto the
//!   canonical `Date_Time` and `Water_Bill_Amount`
//! - **Timestamp Parsing**: several date layouts are accepted, in priority order
//! - **Filtering**: duplicates, empty columns, rows without a usable timestamp
//!   or target, and a fixed list of categorical columns are removed
//! - **Type Coercion**: numeric text columns become `Float64`
//! - **Feature Selection**: the numeric columns a model is fitted on
//! - **Progress Reporting**: stage-by-stage updates through a reporter
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use billcast_processing::{CleaningPipeline, FeatureSelector, PipelineConfig};
//! use billcast_processing::io::load_csv_with_fallbacks;
//!
//! let df = load_csv_with_fallbacks("bills.csv")?;
//!
//! let pipeline = CleaningPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! let cleaned = pipeline.process(df)?;
//! let features = FeatureSelector::new(&pipeline.config().schema).select(&cleaned.data)?;
//! println!("{} rows, features: {:?}", cleaned.data.height(), features);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod pipeline;
pub mod schema;
pub mod timestamp;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{Coerced, FilterStep, FilterStepKind, RowColumnFilter, TypeCoercer, coerce_value};
pub use config::{
    ConfigValidationError, MissingTargetPolicy, PipelineConfig, PipelineConfigBuilder, RenameRule,
    SchemaConfig,
};
pub use error::{PreprocessingError, Result as PreprocessingResult, ResultExt};
pub use features::FeatureSelector;
pub use pipeline::{
    CleaningPipeline, CleaningPipelineBuilder, ClosureProgressReporter, PipelineStage,
    ProgressReporter, ProgressUpdate,
};
pub use schema::{NormalizationDecision, SchemaNormalizer};
pub use timestamp::{FormatKind, ParsedTimestamp, TimestampFormat, TimestampParser, TimestampReport};
pub use types::{ActionType, CleanedBatch, CleaningAction, CleaningSummary};
