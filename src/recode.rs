//! Factor recoding and feature selection.
//!
//! Every declared factor column is validated against its closed level set
//! before contrast coding. An out-of-set value is surfaced as a data-quality
//! error; rows are never silently dropped here. Missing values pass through
//! and fall to listwise deletion when the design matrix is built.

use crate::error::{AnalysisError, Result};
use crate::schema::{self, FactorSpec};
use polars::prelude::*;
use tracing::debug;

/// Validate one factor column against its declared levels.
fn validate_levels(df: &DataFrame, spec: &FactorSpec) -> Result<()> {
    let ca = df.column(spec.column)?.str().map_err(|e| {
        AnalysisError::Schema(format!(
            "factor column '{}' is not a string column: {}",
            spec.column, e
        ))
    })?;
    for value in ca.into_iter().flatten() {
        if spec.level_index(value).is_none() {
            return Err(AnalysisError::LevelMismatch {
                column: spec.column.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Recode all declared factors as categoricals and project the table to the
/// columns used downstream.
pub fn recode(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;
    for spec in schema::factors() {
        validate_levels(&df, &spec)?;
        let cast = df
            .column(spec.column)?
            .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
        df.with_column(cast)?;
        debug!(column = spec.column, levels = spec.n_levels(), "recoded factor");
    }
    let df = df.select(schema::selected_columns())?;
    Ok(df)
}

/// Read a recoded factor column back as level indices into the declared
/// level order. `None` marks a missing value.
pub fn level_indices(df: &DataFrame, spec: &FactorSpec) -> Result<Vec<Option<usize>>> {
    let series = df.column(spec.column)?;
    // Categorical columns round-trip through their string representation so
    // indices always follow the declared order, not the physical encoding.
    let as_str = series.cast(&DataType::String)?;
    let ca = as_str.str()?;
    let mut out = Vec::with_capacity(ca.len());
    for value in ca.into_iter() {
        match value {
            Some(v) => {
                let idx = spec
                    .level_index(v)
                    .ok_or_else(|| AnalysisError::LevelMismatch {
                        column: spec.column.to_string(),
                        value: v.to_string(),
                    })?;
                out.push(Some(idx));
            }
            None => out.push(None),
        }
    }
    Ok(out)
}
