//! Schema normalization.
//!
//! Maps alternate column names onto the canonical ones with a prioritized
//! list of [`RenameRule`]s. Planning is a pure function of the column names,
//! so the decision can be inspected (and tested) apart from the frame.

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{RenameRule, SchemaConfig};
use crate::error::Result;
use crate::utils::column_names;

/// What the normalizer decided for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationDecision {
    /// `(source, canonical)` pairs that are renamed.
    pub renamed: Vec<(String, String)>,
    /// Alternate columns dropped because their canonical name was already
    /// present (in the source or through an earlier rule).
    pub shadowed: Vec<String>,
    /// Canonical target name, if the batch carries the target after renaming.
    pub target: Option<String>,
}

impl NormalizationDecision {
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty() && self.shadowed.is_empty()
    }
}

/// Renames source columns to canonical names and resolves the target.
#[derive(Debug, Clone)]
pub struct SchemaNormalizer<'a> {
    schema: &'a SchemaConfig,
}

impl<'a> SchemaNormalizer<'a> {
    pub fn new(schema: &'a SchemaConfig) -> Self {
        Self { schema }
    }

    /// Decide renames for the given column list.
    pub fn plan(&self, columns: &[String]) -> NormalizationDecision {
        plan_renames(columns, &self.schema.rename_rules, &self.schema.target_column)
    }

    /// Apply the rename plan to `df`. Never fails because a column is absent.
    pub fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, NormalizationDecision)> {
        let decision = self.plan(&column_names(&df));

        if decision.is_noop() {
            debug!("Schema already canonical");
            return Ok((df, decision));
        }

        if !decision.shadowed.is_empty() {
            let drop: Vec<PlSmallStr> = decision
                .shadowed
                .iter()
                .map(|s| s.as_str().into())
                .collect();
            df = df.drop_many(drop);
        }

        for (source, canonical) in &decision.renamed {
            df.rename(source, canonical.as_str().into())?;
        }

        info!(
            renamed = decision.renamed.len(),
            shadowed = decision.shadowed.len(),
            target = ?decision.target,
            "Normalized schema"
        );

        Ok((df, decision))
    }
}

fn plan_renames(columns: &[String], rules: &[RenameRule], target: &str) -> NormalizationDecision {
    let mut decision = NormalizationDecision::default();
    // Names present once the planned renames are applied.
    let mut present: Vec<String> = columns.to_vec();

    for rule in rules {
        if !columns.contains(&rule.source) || decision.shadowed.contains(&rule.source) {
            continue;
        }

        if present.contains(&rule.canonical) {
            decision.shadowed.push(rule.source.clone());
            present.retain(|c| c != &rule.source);
            continue;
        }

        present.retain(|c| c != &rule.source);
        present.push(rule.canonical.clone());
        decision
            .renamed
            .push((rule.source.clone(), rule.canonical.clone()));
    }

    if present.iter().any(|c| c == target) {
        decision.target = Some(target.to_string());
    }

    decision
}
