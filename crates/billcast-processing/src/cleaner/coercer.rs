//! Best-effort numeric coercion of text columns.

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::utils::{column_names, is_blank_value, parse_numeric_string};

/// Result of coercing one raw cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Numeric(f64),
    Missing,
}

impl Coerced {
    pub fn as_option(self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(v),
            Self::Missing => None,
        }
    }
}

/// Coerce a single raw value. Pure; never fails.
///
/// Currency symbols, thousands separators and percent signs are stripped
/// before parsing.
pub fn coerce_value(raw: &str) -> Coerced {
    match parse_numeric_string(raw) {
        Some(v) => Coerced::Numeric(v),
        None => Coerced::Missing,
    }
}

/// Per-column coercion outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCoercion {
    pub column: String,
    /// Values that were neither null nor blank-like.
    pub non_blank: usize,
    /// Of those, how many parsed as numbers.
    pub converted: usize,
    /// Whether the column was replaced by a `Float64` column.
    pub applied: bool,
}

impl ColumnCoercion {
    pub fn ratio(&self) -> f64 {
        if self.non_blank == 0 {
            0.0
        } else {
            self.converted as f64 / self.non_blank as f64
        }
    }

    /// Values that were present but became null through conversion.
    pub fn failed(&self) -> usize {
        self.non_blank - self.converted
    }
}

/// Converts text columns to `Float64` when enough of their values are
/// numbers.
#[derive(Debug, Clone, Copy)]
pub struct TypeCoercer {
    numeric_ratio_threshold: f64,
}

impl TypeCoercer {
    pub fn new(numeric_ratio_threshold: f64) -> Self {
        Self {
            numeric_ratio_threshold,
        }
    }

    /// Coerce a text series. Returns the converted series, or `None` when the
    /// column should stay text.
    pub fn coerce_series(&self, series: &Series) -> Result<(Option<Series>, ColumnCoercion)> {
        let str_series = series.str()?;
        let mut values: Vec<Option<f64>> = Vec::with_capacity(str_series.len());
        let mut non_blank = 0usize;
        let mut converted = 0usize;

        for opt_val in str_series.into_iter() {
            match opt_val {
                Some(raw) if !is_blank_value(raw) => {
                    non_blank += 1;
                    let value = coerce_value(raw).as_option();
                    if value.is_some() {
                        converted += 1;
                    }
                    values.push(value);
                }
                _ => values.push(None),
            }
        }

        let mut outcome = ColumnCoercion {
            column: series.name().to_string(),
            non_blank,
            converted,
            applied: false,
        };

        // An all-blank column carries no evidence either way.
        if non_blank == 0 || outcome.ratio() < self.numeric_ratio_threshold {
            return Ok((None, outcome));
        }

        outcome.applied = true;
        Ok((Some(Series::new(series.name().clone(), values)), outcome))
    }

    /// Coerce every text column of `df` in place.
    pub fn coerce(&self, df: &mut DataFrame) -> Result<Vec<ColumnCoercion>> {
        let mut outcomes = Vec::new();

        for name in column_names(df) {
            let Ok(col) = df.column(&name) else {
                continue;
            };
            let series = col.as_materialized_series();
            if series.dtype() != &DataType::String {
                continue;
            }

            let (coerced, outcome) = self.coerce_series(series)?;
            if let Some(coerced) = coerced {
                df.replace(&name, coerced)?;
                debug!(
                    column = %name,
                    converted = outcome.converted,
                    failed = outcome.failed(),
                    "Coerced text column to numeric"
                );
            } else {
                debug!(
                    column = %name,
                    ratio = outcome.ratio(),
                    "Column kept as text"
                );
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
