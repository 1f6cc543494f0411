//! Data cleaning module for billing batches.
//!
//! This module provides functionality for:
//! - Removing duplicate rows and all-missing columns
//! - Removing rows without a usable timestamp
//! - Dropping categorical exclusion columns
//! - Applying the missing-target policy
//! - Coercing numeric text columns to `Float64`

pub mod coercer;
pub mod filter;

pub use coercer::{ColumnCoercion, Coerced, TypeCoercer, coerce_value};
pub use filter::{FilterStep, FilterStepKind, RowColumnFilter};
