//! Mean-centering of the continuous covariates.

use crate::error::{AnalysisError, Result};
use crate::schema;
use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

/// The mean subtracted from each covariate. Scoring new data against the
/// fitted model must subtract these same means, not means of the new sample.
#[derive(Debug, Clone, Serialize)]
pub struct CenteringMap {
    pub means: Vec<(String, f64)>,
}

impl CenteringMap {
    pub fn mean_of(&self, covariate: &str) -> Option<f64> {
        self.means
            .iter()
            .find(|(name, _)| name == covariate)
            .map(|(_, m)| *m)
    }
}

/// Append a `<name>_c` column per covariate, centered on the sample mean of
/// the non-missing values. Missing values stay missing.
pub fn center(mut df: DataFrame) -> Result<(DataFrame, CenteringMap)> {
    let mut means = Vec::with_capacity(schema::COVARIATES.len());
    for &cov in schema::COVARIATES {
        let ca = df.column(cov)?.f64()?;
        let mean = ca.mean().ok_or_else(|| {
            AnalysisError::Data(format!("covariate '{}' has no non-missing values", cov))
        })?;
        let centered: Float64Chunked = ca.apply_values(|v| v - mean);
        let mut centered = centered.into_series();
        centered.rename(&schema::centered_name(cov));
        df.with_column(centered)?;
        debug!(covariate = cov, mean, "centered covariate");
        means.push((cov.to_string(), mean));
    }
    Ok((df, CenteringMap { means }))
}
