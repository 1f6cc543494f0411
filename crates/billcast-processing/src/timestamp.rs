//! Multi-format timestamp parsing.
//!
//! Billing exports write service dates in several layouts depending on the
//! utility and the tool that produced the file. Every value is tried against
//! an ordered list of [`TimestampFormat`]s; the first that parses wins, so an
//! ambiguous date like `03/04/2020 10:00` resolves month-first under the
//! default list. Values that match nothing become nulls, which the filter
//! later removes.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PreprocessingError, Result};
use crate::utils::is_null_token;

/// Whether a format carries a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// Date and time; the pattern must consume both.
    DateTime,
    /// Date only; the instant is midnight of that day.
    DateOnly,
}

/// One accepted timestamp layout, as a `chrono` format string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampFormat {
    pub pattern: String,
    pub kind: FormatKind,
}

impl TimestampFormat {
    pub fn date_time(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: FormatKind::DateTime,
        }
    }

    pub fn date_only(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: FormatKind::DateOnly,
        }
    }

    /// Parse `value` under this format.
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        match self.kind {
            FormatKind::DateTime => NaiveDateTime::parse_from_str(value, &self.pattern).ok(),
            FormatKind::DateOnly => NaiveDate::parse_from_str(value, &self.pattern)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
        }
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// The formats accepted out of the box, in priority order.
pub fn default_timestamp_formats() -> Vec<TimestampFormat> {
    vec![
        TimestampFormat::date_time("%Y-%m-%d %H:%M:%S"),
        TimestampFormat::date_time("%m/%d/%Y %H:%M"),
        TimestampFormat::date_time("%d/%m/%Y %H:%M"),
        TimestampFormat::date_time("%Y/%m/%d %H:%M"),
        TimestampFormat::date_only("%m/%d/%Y"),
    ]
}

/// Result of parsing a single raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    /// Parsed under the format at index `format` of the parser's list.
    Parsed { value: NaiveDateTime, format: usize },
    Unparsable,
}

impl ParsedTimestamp {
    pub fn value(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Parsed { value, .. } => Some(*value),
            Self::Unparsable => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }
}

/// Outcome of parsing one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimestampReport {
    /// Values that parsed to an instant.
    pub parsed: usize,
    /// Values (including nulls and null-like tokens) that did not.
    pub unparsable: usize,
    /// Hits per format, aligned with the parser's format list.
    pub format_hits: Vec<usize>,
    /// The column already had a temporal dtype and was only cast.
    pub already_typed: bool,
}

/// Converts a raw timestamp column to `Datetime(ms)`.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    formats: Vec<TimestampFormat>,
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self::new(default_timestamp_formats())
    }
}

impl TimestampParser {
    pub fn new(formats: Vec<TimestampFormat>) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &[TimestampFormat] {
        &self.formats
    }

    /// Parse a single raw value.
    ///
    /// Surrounding whitespace is ignored. `""`, `nan` and `none` in any case
    /// are unparsable without trying any format.
    pub fn parse_value(&self, raw: &str) -> ParsedTimestamp {
        let trimmed = raw.trim();
        if is_null_token(trimmed) {
            return ParsedTimestamp::Unparsable;
        }

        self.formats
            .iter()
            .enumerate()
            .find_map(|(idx, format)| {
                format
                    .parse(trimmed)
                    .map(|value| ParsedTimestamp::Parsed { value, format: idx })
            })
            .unwrap_or(ParsedTimestamp::Unparsable)
    }

    /// Parse a series into a `Datetime(ms)` series of the same name and length.
    pub fn parse_series(&self, series: &Series) -> Result<(Series, TimestampReport)> {
        let target_dtype = DataType::Datetime(TimeUnit::Milliseconds, None);

        if matches!(series.dtype(), DataType::Datetime(_, _) | DataType::Date) {
            let casted = series.cast(&target_dtype)?;
            let report = TimestampReport {
                parsed: casted.len() - casted.null_count(),
                unparsable: casted.null_count(),
                format_hits: vec![0; self.formats.len()],
                already_typed: true,
            };
            return Ok((casted, report));
        }

        // Everything else is read as text; a numeric column simply fails to
        // match any format.
        let text = series.cast(&DataType::String)?;
        let text = text.str()?;

        let mut report = TimestampReport {
            format_hits: vec![0; self.formats.len()],
            ..Default::default()
        };
        let mut millis: Vec<Option<i64>> = Vec::with_capacity(text.len());

        for opt_val in text.into_iter() {
            let parsed = opt_val
                .map(|raw| self.parse_value(raw))
                .unwrap_or(ParsedTimestamp::Unparsable);

            match parsed {
                ParsedTimestamp::Parsed { value, format } => {
                    report.parsed += 1;
                    report.format_hits[format] += 1;
                    millis.push(Some(value.and_utc().timestamp_millis()));
                }
                ParsedTimestamp::Unparsable => {
                    report.unparsable += 1;
                    millis.push(None);
                }
            }
        }

        let parsed = Series::new(series.name().clone(), millis).cast(&target_dtype)?;
        Ok((parsed, report))
    }

    /// Replace `column` in `df` with its parsed form.
    ///
    /// Returns `None` and leaves the frame untouched if the column is absent.
    pub fn parse_column(
        &self,
        df: &mut DataFrame,
        column: &str,
    ) -> Result<Option<TimestampReport>> {
        let Ok(col) = df.column(column) else {
            warn!(column, "Timestamp column not found, skipping timestamp parsing");
            return Ok(None);
        };

        let (parsed, report) = self.parse_series(col.as_materialized_series())?;
        df.replace(column, parsed)
            .map_err(|e| PreprocessingError::Polars(e).with_context("Replacing timestamp column"))?;

        for (format, hits) in self.formats.iter().zip(&report.format_hits) {
            if *hits > 0 {
                debug!(format = %format, hits, "Timestamp format matched");
            }
        }
        debug!(
            column,
            parsed = report.parsed,
            unparsable = report.unparsable,
            "Parsed timestamp column"
        );

        Ok(Some(report))
    }
}
