use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::timestamp::TimestampReport;

/// Output of the cleaning pipeline.
#[derive(Debug, Clone)]
pub struct CleanedBatch {
    /// The cleaned batch.
    pub data: DataFrame,
    /// Canonical target column, if the batch carries one.
    pub target_column: Option<String>,
    /// What was done to get here.
    pub summary: CleaningSummary,
}

// ============================================================================
// Cleaning Summary Types
// ============================================================================

/// Human-readable summary of what the cleaning pipeline did.
///
/// Serializable so that hosts can print it or store it next to the scored
/// batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Number of rows before cleaning.
    pub rows_before: usize,
    /// Number of rows after cleaning.
    pub rows_after: usize,
    /// Number of rows removed during cleaning.
    pub rows_removed: usize,

    /// Number of columns before cleaning.
    pub columns_before: usize,
    /// Number of columns after cleaning.
    pub columns_after: usize,
    /// Number of columns removed during cleaning.
    pub columns_removed: usize,

    /// Timestamp parsing outcome, if a timestamp column was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<TimestampReport>,

    /// List of actions taken during cleaning.
    pub actions: Vec<CleaningAction>,

    /// Warnings and notes generated during cleaning.
    pub warnings: Vec<String>,
}

impl CleaningSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the summary.
    pub fn add_action(&mut self, action: CleaningAction) {
        self.actions.push(action);
    }

    /// Add a warning to the summary.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Record the final shape and derive the removed counts.
    pub fn finish(&mut self, rows_after: usize, columns_after: usize) {
        self.rows_after = rows_after;
        self.columns_after = columns_after;
        self.rows_removed = self.rows_before.saturating_sub(rows_after);
        self.columns_removed = self.columns_before.saturating_sub(columns_after);
    }

    /// Calculate the percentage of rows removed.
    pub fn rows_removed_percentage(&self) -> f32 {
        if self.rows_before == 0 {
            0.0
        } else {
            (self.rows_removed as f32 / self.rows_before as f32) * 100.0
        }
    }

    /// Actions of a given type.
    pub fn actions_of(&self, action_type: ActionType) -> impl Iterator<Item = &CleaningAction> {
        self.actions
            .iter()
            .filter(move |a| a.action_type == action_type)
    }
}

/// A single action taken during cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningAction {
    /// Type of action performed.
    pub action_type: ActionType,
    /// Target of the action (column name or "dataset").
    pub target: String,
    /// Human-readable description of the action.
    pub description: String,
    /// Additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CleaningAction {
    /// Create a new cleaning action.
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Add details to the action.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Types of actions that can be taken during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// A column was renamed to its canonical name.
    ColumnRenamed,
    /// A column was removed from the batch.
    ColumnRemoved,
    /// One or more rows were removed.
    RowsRemoved,
    /// Duplicate rows were removed.
    DuplicatesRemoved,
    /// A timestamp column was parsed.
    TimestampParsed,
    /// A column's data type was converted.
    TypeCorrected,
    /// Missing values were imputed.
    ValueImputed,
    /// The target column was identified.
    TargetIdentified,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ColumnRenamed => "Column Renamed",
            Self::ColumnRemoved => "Column Removed",
            Self::RowsRemoved => "Rows Removed",
            Self::DuplicatesRemoved => "Duplicates Removed",
            Self::TimestampParsed => "Timestamp Parsed",
            Self::TypeCorrected => "Type Corrected",
            Self::ValueImputed => "Value Imputed",
            Self::TargetIdentified => "Target Identified",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_finish() {
        let mut summary = CleaningSummary::new();
        summary.rows_before = 100;
        summary.columns_before = 10;
        summary.finish(90, 8);

        assert_eq!(summary.rows_removed, 10);
        assert_eq!(summary.columns_removed, 2);
        assert!((summary.rows_removed_percentage() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_action_with_details() {
        let action = CleaningAction::new(
            ActionType::ValueImputed,
            "Water_Bill_Amount",
            "Imputed 3 missing values",
        )
        .with_details("mean = 42.1");

        assert_eq!(action.action_type, ActionType::ValueImputed);
        assert!(action.details.unwrap().contains("mean"));
    }

    #[test]
    fn test_actions_of() {
        let mut summary = CleaningSummary::new();
        summary.add_action(CleaningAction::new(ActionType::ColumnRenamed, "a", "x"));
        summary.add_action(CleaningAction::new(ActionType::ColumnRemoved, "b", "y"));
        summary.add_action(CleaningAction::new(ActionType::ColumnRenamed, "c", "z"));

        assert_eq!(summary.actions_of(ActionType::ColumnRenamed).count(), 2);
    }

    #[test]
    fn test_action_types_serialize_snake_case() {
        let json = serde_json::to_string(&ActionType::TimestampParsed).unwrap();
        assert_eq!(json, "\"timestamp_parsed\"");
        let json = serde_json::to_string(&ActionType::DuplicatesRemoved).unwrap();
        assert_eq!(json, "\"duplicates_removed\"");
    }

    #[test]
    fn test_summary_serialization() {
        let mut summary = CleaningSummary::new();
        summary.duration_ms = 1500;
        summary.add_warning("Timestamp column not found");

        let json = serde_json::to_string(&summary).expect("Should serialize");
        assert!(json.contains("1500"));
        assert!(json.contains("Timestamp column not found"));
        assert!(!json.contains("timestamps"));
    }
}
