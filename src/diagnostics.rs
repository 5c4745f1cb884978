//! Influence and collinearity diagnostics.
//!
//! Observations and predictors are flagged for the analyst; nothing is ever
//! excluded or remediated automatically.

use crate::design::DesignMatrix;
use crate::error::{AnalysisError, Result};
use crate::model::{self, OlsFit};
use ndarray::{Array1, Array2};
use serde::Serialize;

/// Tolerance below this (equivalently VIF above 5) flags a predictor.
pub const TOLERANCE_FLAG: f64 = 0.20;

#[derive(Debug, Clone, Serialize)]
pub struct InfluenceRow {
    /// Original row index in the loaded table.
    pub row: usize,
    pub residual: f64,
    pub leverage: f64,
    pub cooks_distance: f64,
    pub flagged: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfluenceReport {
    /// Rows ranked by descending Cook's distance.
    pub rows: Vec<InfluenceRow>,
    pub threshold: f64,
}

impl InfluenceReport {
    pub fn flagged(&self) -> impl Iterator<Item = &InfluenceRow> {
        self.rows.iter().filter(|r| r.flagged)
    }
}

/// Cook's distance per analyzed observation, ranked descending.
///
/// `threshold` defaults to the conventional 4/n when not supplied.
pub fn influence(
    design: &DesignMatrix,
    fit: &OlsFit,
    threshold: Option<f64>,
) -> Result<InfluenceReport> {
    if fit.residual_variance_negligible() {
        return Err(AnalysisError::Degenerate(
            "residual variance is numerically zero: Cook's distance is undefined".to_string(),
        ));
    }
    let n = design.n();
    let p = design.p() as f64;
    let threshold = threshold.unwrap_or(4.0 / n as f64);

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let e = fit.residuals[i];
        let h = fit.leverage[i];
        let cooks = if h < 1.0 {
            (e * e) / (p * fit.sigma2) * h / ((1.0 - h) * (1.0 - h))
        } else {
            f64::INFINITY
        };
        rows.push(InfluenceRow {
            row: design.kept_rows[i],
            residual: e,
            leverage: h,
            cooks_distance: cooks,
            flagged: cooks > threshold,
        });
    }
    rows.sort_by(|a, b| {
        b.cooks_distance
            .partial_cmp(&a.cooks_distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(InfluenceReport { rows, threshold })
}

#[derive(Debug, Clone, Serialize)]
pub struct CollinearityRow {
    pub column: String,
    /// 1 - R-squared of the predictor on all other predictors. Zero for a
    /// constant column.
    pub tolerance: f64,
    /// `None` means undefined (infinite): the predictor is constant or an
    /// exact linear combination of the others.
    pub vif: Option<f64>,
    pub flagged: bool,
}

/// Tolerance and VIF per non-intercept design column.
pub fn collinearity(design: &DesignMatrix) -> Result<Vec<CollinearityRow>> {
    let (n, p) = design.x.dim();
    let mut out = Vec::with_capacity(p - 1);

    let column_variance: Vec<f64> = (0..p)
        .map(|k| {
            let col = design.x.column(k);
            let mean = col.sum() / n as f64;
            col.iter().map(|v| (v - mean).powi(2)).sum()
        })
        .collect();

    for j in 1..p {
        let target: Array1<f64> = design.x.column(j).to_owned();
        if column_variance[j] == 0.0 {
            out.push(CollinearityRow {
                column: design.column_names[j].clone(),
                tolerance: 0.0,
                vif: None,
                flagged: true,
            });
            continue;
        }

        // Constant columns carry no information beyond the intercept and
        // would make the auxiliary regression rank-deficient.
        let keep: Vec<usize> = (0..p)
            .filter(|&k| k != j && (k == 0 || column_variance[k] > 0.0))
            .collect();
        let mut reduced = Array2::zeros((n, keep.len()));
        let mut names = Vec::with_capacity(keep.len());
        for (col, &k) in keep.iter().enumerate() {
            reduced.column_mut(col).assign(&design.x.column(k));
            names.push(design.column_names[k].clone());
        }

        let r_sq = model::auxiliary_r_squared(&reduced, &target, &names)?;
        let tolerance = (1.0 - r_sq).max(0.0);
        let vif = if tolerance > 1e-12 {
            Some(1.0 / tolerance)
        } else {
            None
        };
        out.push(CollinearityRow {
            column: design.column_names[j].clone(),
            tolerance,
            vif: vif.map(|v| v.max(1.0)),
            flagged: tolerance < TOLERANCE_FLAG,
        });
    }
    Ok(out)
}
