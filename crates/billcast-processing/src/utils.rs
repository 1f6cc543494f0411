//! Shared utilities for the cleaning pipeline.
//!
//! This module contains the numeric dtype check and string helpers used by
//! the parser, the coercer and the feature selector, so that each stage
//! agrees on what "numeric", "missing" and "null-like" mean.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Common error/missing value markers in data.
pub const ERROR_MARKERS: [&str; 8] = [
    "error", "unknown", "n/a", "na", "null", "missing", "none", "#n/a",
];

/// Tokens that exports write in place of an absent value.
pub const NULL_TOKENS: [&str; 3] = ["", "nan", "none"];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust
/// use billcast_processing::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// assert_eq!(clean_numeric_string("  42%  "), "42");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is an error/missing value marker.
pub fn is_error_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|&marker| lower == marker)
}

/// Check if a string is one of the null-like tokens (`""`, `"nan"`, `"none"`),
/// ignoring case and surrounding whitespace.
pub fn is_null_token(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    NULL_TOKENS.iter().any(|&token| lower == token)
}

/// Whether a raw cell should be read as "no value" rather than as a value
/// that failed to convert.
pub fn is_blank_value(s: &str) -> bool {
    is_null_token(s) || is_error_marker(s)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles common formatting like currency symbols, percentages, and thousands
/// separators. Non-finite spellings such as `nan`, `inf` or an overflowing
/// `1e999` are not numbers here.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Read a numeric-compatible series as `f64` values, nulls preserved.
pub fn series_to_f64(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Fill null values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let filled: Vec<Option<f64>> = series_to_f64(series)?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();

    Ok(Series::new(series.name().clone(), filled))
}

/// Names of the columns of a DataFrame, as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Whether a DataFrame has a column with the given name.
#[inline]
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

// =============================================================================
// Tests
// =============================================================================
