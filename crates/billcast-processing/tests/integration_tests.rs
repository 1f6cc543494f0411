//! Integration tests for the cleaning pipeline.
//!
//! These tests verify end-to-end behavior on CSV input, from loading through
//! feature selection.

use billcast_processing::io::{load_csv_with_fallbacks, write_csv};
use billcast_processing::utils::{column_names, is_numeric_dtype};
use billcast_processing::{
    ActionType, CleaningPipeline, FeatureSelector, MissingTargetPolicy, PipelineConfig,
    PipelineStage, PreprocessingError, ProgressUpdate,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(filename: &str) -> DataFrame {
    load_csv_with_fallbacks(fixtures_path().join(filename)).expect("Failed to read CSV file")
}

fn write_temp_csv(dir: &tempfile::TempDir, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    path
}

fn clean(df: DataFrame) -> billcast_processing::CleanedBatch {
    CleaningPipeline::builder()
        .build()
        .unwrap()
        .process(df)
        .expect("Cleaning should succeed")
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_service_end_date_scenario_keeps_one_row() {
    let dir = tempdir().unwrap();
    let path = write_temp_csv(
        &dir,
        "bills.csv",
        &[
            "Service End Date,Current Charges",
            "01/15/2020,45.20",
            "bad-date,30.00",
            "02/01/2020,",
        ],
    );

    let cleaned = clean(load_csv_with_fallbacks(&path).unwrap());

    assert_eq!(cleaned.data.height(), 1);
    assert_eq!(
        column_names(&cleaned.data),
        vec!["Date_Time".to_string(), "Water_Bill_Amount".to_string()]
    );
    let amount = cleaned
        .data
        .column("Water_Bill_Amount")
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .get(0);
    assert_eq!(amount, Some(45.2));
}

#[test]
fn test_all_missing_column_is_dropped() {
    let dir = tempdir().unwrap();
    let path = write_temp_csv(
        &dir,
        "bills.csv",
        &[
            "Date_Time,Water_Bill_Amount,Usage,Comments",
            "2020-01-01 00:00:00,10.0,100,",
            "2020-02-01 00:00:00,12.0,120,",
            "2020-03-01 00:00:00,14.0,140,",
        ],
    );

    let cleaned = clean(load_csv_with_fallbacks(&path).unwrap());

    assert!(!column_names(&cleaned.data).contains(&"Comments".to_string()));
    assert_eq!(cleaned.data.height(), 3);
    assert_eq!(
        cleaned.summary.actions_of(ActionType::ColumnRemoved).count(),
        1
    );
}

#[test]
fn test_fixture_cleaning_invariants() {
    let cleaned = clean(load_fixture("billing_sample.csv"));
    let df = &cleaned.data;

    // 37 rows: one duplicate, two unusable dates, two missing charges
    assert_eq!(cleaned.summary.rows_before, 37);
    assert_eq!(df.height(), 32);

    // every surviving row has a timestamp and a target
    assert_eq!(df.column("Date_Time").unwrap().null_count(), 0);
    assert_eq!(df.column("Water_Bill_Amount").unwrap().null_count(), 0);
    assert!(matches!(
        df.column("Date_Time").unwrap().dtype(),
        DataType::Datetime(_, _)
    ));

    // categorical and empty columns are gone
    let names = column_names(df);
    assert!(!names.contains(&"Weekday".to_string()));
    assert!(!names.contains(&"Notes".to_string()));

    // every column is purely numeric, purely text, or the timestamp
    for col in df.get_columns() {
        let dtype = col.dtype();
        assert!(
            is_numeric_dtype(dtype)
                || dtype == &DataType::String
                || matches!(dtype, DataType::Datetime(_, _)),
            "unexpected dtype {:?} for {}",
            dtype,
            col.name()
        );
    }
    assert_eq!(
        df.column("Account_Type").unwrap().dtype(),
        &DataType::String
    );
}

#[test]
fn test_fixture_feature_selection() {
    let config = PipelineConfig::default();
    let cleaned = clean(load_fixture("billing_sample.csv"));

    let features = FeatureSelector::new(&config.schema)
        .select(&cleaned.data)
        .unwrap();

    assert_eq!(
        features,
        vec!["Usage_Gallons".to_string(), "Meter_Size".to_string()]
    );
    assert!(!features.contains(&"Water_Bill_Amount".to_string()));
    for name in &config.schema.categorical_columns {
        assert!(!features.contains(name));
    }
}

#[test]
fn test_fixture_mean_impute_keeps_rows_with_missing_charges() {
    let config = PipelineConfig::builder()
        .missing_target_policy(MissingTargetPolicy::MeanImpute)
        .build()
        .unwrap();

    let cleaned = CleaningPipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .process(load_fixture("billing_sample.csv"))
        .unwrap();

    assert_eq!(cleaned.data.height(), 34);
    assert_eq!(
        cleaned
            .data
            .column("Water_Bill_Amount")
            .unwrap()
            .null_count(),
        0
    );
}

#[test]
fn test_cleaning_is_deterministic() {
    let first = clean(load_fixture("billing_sample.csv"));
    let second = clean(load_fixture("billing_sample.csv"));
    assert!(first.data.equals_missing(&second.data));
}

#[test]
fn test_batch_without_target_fails_feature_selection() {
    let df = df!(
        "Date_Time" => &["2020-01-01 00:00:00", "2020-01-02 00:00:00"],
        "Usage" => &[1.0, 2.0]
    )
    .unwrap();

    let cleaned = clean(df);
    assert!(cleaned.target_column.is_none());

    let schema = PipelineConfig::default().schema;
    let err = FeatureSelector::new(&schema)
        .select(&cleaned.data)
        .unwrap_err();
    assert!(matches!(err, PreprocessingError::TargetNotFound(_)));
    assert!(err.is_data_shape());
}

#[test]
fn test_cleaned_batch_round_trips_through_csv() {
    let dir = tempdir().unwrap();
    let mut cleaned = clean(load_fixture("billing_sample.csv"));
    let out = dir.path().join("cleaned.csv");

    write_csv(&mut cleaned.data, &out).unwrap();
    let reloaded = load_csv_with_fallbacks(&out).unwrap();

    assert_eq!(reloaded.height(), cleaned.data.height());
    assert_eq!(column_names(&reloaded), column_names(&cleaned.data));
}

#[test]
fn test_progress_stages_in_order() {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = stages.clone();

    CleaningPipeline::builder()
        .on_progress(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage);
        })
        .build()
        .unwrap()
        .process(load_fixture("billing_sample.csv"))
        .unwrap();

    let mut seen = stages.lock().unwrap().clone();
    seen.dedup();
    assert_eq!(
        seen,
        vec![
            PipelineStage::Initializing,
            PipelineStage::Normalizing,
            PipelineStage::ParsingTimestamps,
            PipelineStage::Filtering,
            PipelineStage::Coercing,
        ]
    );
}
