//! Configuration types for the cleaning pipeline.
//!
//! Two layers of configuration exist:
//!
//! - [`SchemaConfig`] describes the *shape* of a billing export: which names
//!   are canonical, which alternates map onto them, which columns are never
//!   features, and which timestamp formats are accepted.
//! - [`PipelineConfig`] describes *how* to clean: missing-target policy,
//!   numeric detection threshold, duplicate removal. It embeds a
//!   `SchemaConfig` and is built with the builder pattern.

use serde::{Deserialize, Serialize};

use crate::timestamp::{TimestampFormat, default_timestamp_formats};

/// Canonical name of the timestamp column.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Date_Time";

/// Canonical name of the billing-amount target.
pub const DEFAULT_TARGET_COLUMN: &str = "Water_Bill_Amount";

/// Name of the column appended by the predictor.
pub const DEFAULT_PREDICTION_COLUMN: &str = "Predicted_Bill_Amount";

/// Columns that are never used as features, even when numeric.
pub const DEFAULT_CATEGORICAL_COLUMNS: [&str; 7] = [
    "Traffic_Data",
    "Road_Conditions",
    "Charging_Station_ID",
    "Fleet_Schedule",
    "Charging_Preferences",
    "Weather_Conditions",
    "Weekday",
];

/// Maps an alternate source column name onto a canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRule {
    /// Column name as it appears in the source file.
    pub source: String,
    /// Canonical name downstream stages expect.
    pub canonical: String,
}

impl RenameRule {
    pub fn new(source: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            canonical: canonical.into(),
        }
    }
}

/// Shape of a billing export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Canonical timestamp column.
    pub timestamp_column: String,

    /// Canonical target column.
    pub target_column: String,

    /// Ordered rename rules. Earlier rules take priority when two alternates
    /// map to the same canonical name.
    pub rename_rules: Vec<RenameRule>,

    /// Columns dropped by the filter and never selected as features.
    pub categorical_columns: Vec<String>,

    /// Accepted timestamp formats, tried in order.
    pub timestamp_formats: Vec<TimestampFormat>,

    /// Name of the column the predictor appends.
    pub prediction_column: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            // The legacy load column predates the billing exports, so it wins
            // over "Current Charges" when both are present.
            rename_rules: vec![
                RenameRule::new("Charging_Load_kW", DEFAULT_TARGET_COLUMN),
                RenameRule::new("Current Charges", DEFAULT_TARGET_COLUMN),
                RenameRule::new("Service End Date", DEFAULT_TIMESTAMP_COLUMN),
            ],
            categorical_columns: DEFAULT_CATEGORICAL_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timestamp_formats: default_timestamp_formats(),
            prediction_column: DEFAULT_PREDICTION_COLUMN.to_string(),
        }
    }
}

impl SchemaConfig {
    /// Whether `name` is in the categorical exclusion list.
    pub fn is_categorical(&self, name: &str) -> bool {
        self.categorical_columns.iter().any(|c| c == name)
    }

    /// Validate the schema description.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.timestamp_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName("timestamp_column"));
        }
        if self.target_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName("target_column"));
        }
        if self.prediction_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName("prediction_column"));
        }
        if self.timestamp_formats.is_empty() {
            return Err(ConfigValidationError::NoTimestampFormats);
        }
        if let Some(rule) = self
            .rename_rules
            .iter()
            .find(|r| r.source.is_empty() || r.canonical.is_empty() || r.source == r.canonical)
        {
            return Err(ConfigValidationError::InvalidRenameRule {
                source_name: rule.source.clone(),
                canonical: rule.canonical.clone(),
            });
        }
        Ok(())
    }
}

/// What to do with rows whose target value is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MissingTargetPolicy {
    /// Remove the row.
    #[default]
    Drop,
    /// Fill with the mean of the observed target values.
    MeanImpute,
}

/// Configuration for the cleaning pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust
/// use billcast_processing::config::{MissingTargetPolicy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .missing_target_policy(MissingTargetPolicy::MeanImpute)
///     .numeric_ratio_threshold(0.8)
///     .build()
///     .unwrap();
/// assert_eq!(config.missing_target_policy, MissingTargetPolicy::MeanImpute);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Column names, rename rules, exclusions and timestamp formats.
    pub schema: SchemaConfig,

    /// Policy for rows with a missing target.
    /// Default: Drop
    pub missing_target_policy: MissingTargetPolicy,

    /// Minimum share of non-blank values that must parse as numbers for a
    /// text column to become numeric (0.0 - 1.0).
    /// Default: 0.7
    pub numeric_ratio_threshold: f64,

    /// Whether to remove duplicate rows.
    /// Default: true
    pub remove_duplicates: bool,

    /// Whether to drop columns with no values at all.
    /// Default: true
    pub drop_empty_columns: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: SchemaConfig::default(),
            missing_target_policy: MissingTargetPolicy::default(),
            numeric_ratio_threshold: 0.7,
            remove_duplicates: true,
            drop_empty_columns: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.numeric_ratio_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "numeric_ratio_threshold".to_string(),
                value: self.numeric_ratio_threshold,
            });
        }

        self.schema.validate()
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(&'static str),

    #[error("At least one timestamp format is required")]
    NoTimestampFormats,

    #[error("Invalid rename rule '{source_name}' -> '{canonical}'")]
    InvalidRenameRule {
        source_name: String,
        canonical: String,
    },
}

impl From<ConfigValidationError> for crate::error::PreprocessingError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::PreprocessingError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    schema: Option<SchemaConfig>,
    missing_target_policy: Option<MissingTargetPolicy>,
    numeric_ratio_threshold: Option<f64>,
    remove_duplicates: Option<bool>,
    drop_empty_columns: Option<bool>,
    target_column: Option<String>,
    timestamp_formats: Option<Vec<TimestampFormat>>,
}

impl PipelineConfigBuilder {
    /// Replace the whole schema description.
    pub fn schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the policy for rows with a missing target.
    pub fn missing_target_policy(mut self, policy: MissingTargetPolicy) -> Self {
        self.missing_target_policy = Some(policy);
        self
    }

    /// Set the share of values that must parse for a text column to become
    /// numeric.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.7 = 70%)
    pub fn numeric_ratio_threshold(mut self, threshold: f64) -> Self {
        self.numeric_ratio_threshold = Some(threshold);
        self
    }

    /// Enable or disable duplicate row removal.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Enable or disable dropping of all-missing columns.
    pub fn drop_empty_columns(mut self, drop: bool) -> Self {
        self.drop_empty_columns = Some(drop);
        self
    }

    /// Override the canonical target column.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Override the accepted timestamp formats.
    pub fn timestamp_formats(mut self, formats: Vec<TimestampFormat>) -> Self {
        self.timestamp_formats = Some(formats);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let mut schema = self.schema.unwrap_or_default();
        if let Some(target) = self.target_column {
            schema.target_column = target;
        }
        if let Some(formats) = self.timestamp_formats {
            schema.timestamp_formats = formats;
        }

        let config = PipelineConfig {
            schema,
            missing_target_policy: self.missing_target_policy.unwrap_or_default(),
            numeric_ratio_threshold: self.numeric_ratio_threshold.unwrap_or(0.7),
            remove_duplicates: self.remove_duplicates.unwrap_or(true),
            drop_empty_columns: self.drop_empty_columns.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.numeric_ratio_threshold, 0.7);
        assert_eq!(config.missing_target_policy, MissingTargetPolicy::Drop);
        assert!(config.remove_duplicates);
        assert_eq!(config.schema.target_column, "Water_Bill_Amount");
        assert_eq!(config.schema.timestamp_column, "Date_Time");
        assert_eq!(config.schema.timestamp_formats.len(), 5);
        assert_eq!(config.schema.categorical_columns.len(), 7);
    }

    #[test]
    fn test_default_rename_rule_order() {
        let schema = SchemaConfig::default();
        let sources: Vec<&str> = schema
            .rename_rules
            .iter()
            .map(|r| r.source.as_str())
            .collect();
        assert_eq!(
            sources,
            vec!["Charging_Load_kW", "Current Charges", "Service End Date"]
        );
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .missing_target_policy(MissingTargetPolicy::MeanImpute)
            .numeric_ratio_threshold(0.9)
            .remove_duplicates(false)
            .target_column("Amount_Due")
            .build()
            .unwrap();

        assert_eq!(config.missing_target_policy, MissingTargetPolicy::MeanImpute);
        assert_eq!(config.numeric_ratio_threshold, 0.9);
        assert!(!config.remove_duplicates);
        assert_eq!(config.schema.target_column, "Amount_Due");
    }

    #[test]
    fn test_validation_invalid_threshold() {
        let result = PipelineConfig::builder()
            .numeric_ratio_threshold(1.5)
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_no_formats() {
        let result = PipelineConfig::builder().timestamp_formats(vec![]).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NoTimestampFormats
        ));
    }

    #[test]
    fn test_validation_self_rename() {
        let mut schema = SchemaConfig::default();
        schema
            .rename_rules
            .push(RenameRule::new("Date_Time", "Date_Time"));
        let result = PipelineConfig::builder().schema(schema).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidRenameRule { .. }
        ));
    }

    #[test]
    fn test_is_categorical() {
        let schema = SchemaConfig::default();
        assert!(schema.is_categorical("Weekday"));
        assert!(!schema.is_categorical("Water_Bill_Amount"));
    }

    #[test]
    fn test_pipeline_config_from_partial_json() {
        let json = r#"{
            "missing_target_policy": "MeanImpute",
            "numeric_ratio_threshold": 0.5
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).expect("Should deserialize");

        assert_eq!(config.missing_target_policy, MissingTargetPolicy::MeanImpute);
        assert_eq!(config.numeric_ratio_threshold, 0.5);
        assert!(config.remove_duplicates);
        assert_eq!(config.schema, SchemaConfig::default());
    }
}
