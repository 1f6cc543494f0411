//! Row and column filtering.
//!
//! Runs in a fixed order: duplicates, empty columns, unusable timestamps,
//! categorical exclusions, then the missing-target policy. Each step reports
//! what it removed as a [`FilterStep`].

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{MissingTargetPolicy, PipelineConfig};
use crate::error::{Result, ResultExt};
use crate::utils::{
    column_names, fill_numeric_nulls, has_column, is_numeric_dtype, series_to_f64,
};

/// Which filter step produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterStepKind {
    Duplicates,
    EmptyColumns,
    UnparsableTimestamps,
    CategoricalColumns,
    MissingTarget,
}

/// What one filter step removed or filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterStep {
    pub kind: FilterStepKind,
    pub rows_removed: usize,
    pub columns_removed: Vec<String>,
    /// Target values filled under [`MissingTargetPolicy::MeanImpute`].
    pub values_imputed: usize,
}

impl FilterStep {
    fn rows(kind: FilterStepKind, rows_removed: usize) -> Self {
        Self {
            kind,
            rows_removed,
            columns_removed: Vec::new(),
            values_imputed: 0,
        }
    }

    fn columns(kind: FilterStepKind, columns_removed: Vec<String>) -> Self {
        Self {
            kind,
            rows_removed: 0,
            columns_removed,
            values_imputed: 0,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.rows_removed == 0 && self.columns_removed.is_empty() && self.values_imputed == 0
    }

    /// Human-readable description for summaries.
    pub fn describe(&self) -> String {
        match self.kind {
            FilterStepKind::Duplicates => format!("Removed {} duplicate rows", self.rows_removed),
            FilterStepKind::EmptyColumns => format!(
                "Removed {} empty columns: {:?}",
                self.columns_removed.len(),
                self.columns_removed
            ),
            FilterStepKind::UnparsableTimestamps => format!(
                "Removed {} rows with unparsable timestamps",
                self.rows_removed
            ),
            FilterStepKind::CategoricalColumns => format!(
                "Removed {} categorical columns: {:?}",
                self.columns_removed.len(),
                self.columns_removed
            ),
            FilterStepKind::MissingTarget if self.values_imputed > 0 => format!(
                "Imputed {} missing target values with the mean",
                self.values_imputed
            ),
            FilterStepKind::MissingTarget => {
                format!("Removed {} rows with a missing target", self.rows_removed)
            }
        }
    }
}

/// Applies the filter steps configured in a [`PipelineConfig`].
pub struct RowColumnFilter<'a> {
    config: &'a PipelineConfig,
}

impl<'a> RowColumnFilter<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Run all steps in order.
    pub fn apply(&self, df: DataFrame) -> Result<(DataFrame, Vec<FilterStep>)> {
        let mut steps = Vec::with_capacity(5);
        let mut df = df;

        if self.config.remove_duplicates {
            let (next, step) = remove_duplicates(df)?;
            df = next;
            steps.push(step);
        }

        if self.config.drop_empty_columns {
            let schema = &self.config.schema;
            let protected = [schema.timestamp_column.as_str(), schema.target_column.as_str()];
            let (next, step) = remove_empty_columns(df, &protected);
            df = next;
            steps.push(step);
        }

        let (next, step) = remove_unparsable_timestamps(df, &self.config.schema.timestamp_column)?;
        df = next;
        steps.push(step);

        let (next, step) = remove_categorical_columns(df, &self.config.schema.categorical_columns);
        df = next;
        steps.push(step);

        let (next, step) = self.apply_target_policy(df)?;
        df = next;
        steps.push(step);

        for step in steps.iter().filter(|s| !s.is_noop()) {
            debug!("{}", step.describe());
        }

        Ok((df, steps))
    }

    /// Apply the missing-target policy on its own.
    pub fn apply_target_policy(&self, df: DataFrame) -> Result<(DataFrame, FilterStep)> {
        apply_target_policy(
            df,
            &self.config.schema.target_column,
            self.config.missing_target_policy,
        )
    }
}

/// Remove exact-duplicate rows, keeping the first occurrence in order.
pub fn remove_duplicates(df: DataFrame) -> Result<(DataFrame, FilterStep)> {
    let before = df.height();
    if before == 0 {
        return Ok((df, FilterStep::rows(FilterStepKind::Duplicates, 0)));
    }

    let deduped = df
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
        .context("Removing duplicate rows")?;
    let removed = before - deduped.height();

    Ok((deduped, FilterStep::rows(FilterStepKind::Duplicates, removed)))
}

/// Remove columns with no values at all.
///
/// Skipped on an empty batch, where every column is trivially empty.
/// `protected` columns are kept so that the later row filters can act on
/// them.
pub fn remove_empty_columns(df: DataFrame, protected: &[&str]) -> (DataFrame, FilterStep) {
    let height = df.height();
    if height == 0 {
        return (df, FilterStep::columns(FilterStepKind::EmptyColumns, Vec::new()));
    }

    let empty: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() == height)
        .map(|c| c.name().to_string())
        .filter(|name| !protected.contains(&name.as_str()))
        .collect();

    if empty.is_empty() {
        return (df, FilterStep::columns(FilterStepKind::EmptyColumns, empty));
    }

    let drop: Vec<PlSmallStr> = empty.iter().map(|s| s.as_str().into()).collect();
    let df = df.drop_many(drop);
    (df, FilterStep::columns(FilterStepKind::EmptyColumns, empty))
}

/// Remove rows whose (already parsed) timestamp is null.
pub fn remove_unparsable_timestamps(df: DataFrame, column: &str) -> Result<(DataFrame, FilterStep)> {
    drop_null_rows(df, column, FilterStepKind::UnparsableTimestamps)
}

/// Remove the categorical exclusion columns that are present.
pub fn remove_categorical_columns(df: DataFrame, categorical: &[String]) -> (DataFrame, FilterStep) {
    let present: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|c| categorical.contains(c))
        .collect();

    if present.is_empty() {
        return (df, FilterStep::columns(FilterStepKind::CategoricalColumns, present));
    }

    let drop: Vec<PlSmallStr> = present.iter().map(|s| s.as_str().into()).collect();
    let df = df.drop_many(drop);
    (df, FilterStep::columns(FilterStepKind::CategoricalColumns, present))
}

/// Drop or mean-impute rows whose target is missing.
///
/// Non-finite float targets (`inf`, `-inf`, `NaN`) count as missing.
/// Mean imputation needs a numeric target. A text target is left for the
/// pass after coercion; if no target value is observed at all the affected
/// rows are dropped instead.
pub fn apply_target_policy(
    df: DataFrame,
    target: &str,
    policy: MissingTargetPolicy,
) -> Result<(DataFrame, FilterStep)> {
    let df = null_non_finite(df, target)?;
    match policy {
        MissingTargetPolicy::Drop => drop_null_rows(df, target, FilterStepKind::MissingTarget),
        MissingTargetPolicy::MeanImpute => mean_impute_target(df, target),
    }
}

/// Replace non-finite values of a float column with nulls.
fn null_non_finite(mut df: DataFrame, column: &str) -> Result<DataFrame> {
    let Ok(col) = df.column(column) else {
        return Ok(df);
    };
    if !matches!(col.dtype(), DataType::Float32 | DataType::Float64) {
        return Ok(df);
    }

    let series = col.as_materialized_series();
    let values = series_to_f64(series)?;
    let non_finite = values.iter().flatten().filter(|v| !v.is_finite()).count();
    if non_finite == 0 {
        return Ok(df);
    }

    warn!(column, count = non_finite, "Treating non-finite values as missing");
    let cleaned: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()))
        .collect();
    let cleaned = Series::new(series.name().clone(), cleaned);
    df.replace(column, cleaned).context("Nulling non-finite values")?;
    Ok(df)
}

fn mean_impute_target(mut df: DataFrame, target: &str) -> Result<(DataFrame, FilterStep)> {
    let Ok(col) = df.column(target) else {
        return Ok((df, FilterStep::rows(FilterStepKind::MissingTarget, 0)));
    };
    let series = col.as_materialized_series().clone();
    let missing = series.null_count();

    if missing == 0 {
        return Ok((df, FilterStep::rows(FilterStepKind::MissingTarget, 0)));
    }

    if !is_numeric_dtype(series.dtype()) {
        debug!(target, "Target is not numeric yet, deferring mean imputation");
        return Ok((df, FilterStep::rows(FilterStepKind::MissingTarget, 0)));
    }

    let Some(mean) = series.mean() else {
        warn!(target, "No observed target values to impute from, dropping rows");
        return drop_null_rows(df, target, FilterStepKind::MissingTarget);
    };

    let filled = fill_numeric_nulls(&series, mean).context("Imputing target")?;
    df.replace(target, filled).context("Imputing target")?;

    let mut step = FilterStep::rows(FilterStepKind::MissingTarget, 0);
    step.values_imputed = missing;
    Ok((df, step))
}

fn drop_null_rows(df: DataFrame, column: &str, kind: FilterStepKind) -> Result<(DataFrame, FilterStep)> {
    if !has_column(&df, column) {
        debug!(column, "Column absent, skipping {:?} filter", kind);
        return Ok((df, FilterStep::rows(kind, 0)));
    }

    let before = df.height();
    let mask = df.column(column)?.as_materialized_series().is_not_null();
    let filtered = df.filter(&mask)?;
    let removed = before - filtered.height();

    Ok((filtered, FilterStep::rows(kind, removed)))
}
