//! Sequential (Type I) ANOVA and effect sizes.
//!
//! The design columns enter the QR in formula order, so the Type I sum of
//! squares for a term is just the sum of squared projections q_j'y over that
//! term's columns. Term SS plus residual SS reproduces the total SS of the
//! outcome exactly.

use crate::design::DesignMatrix;
use crate::error::{AnalysisError, Result};
use crate::model::OlsFit;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

#[derive(Debug, Clone, Serialize)]
pub struct AnovaRow {
    pub term: String,
    pub df: usize,
    pub sum_sq: f64,
    pub mean_sq: f64,
    pub f: f64,
    pub p: f64,
    pub eta_sq: f64,
    pub partial_eta_sq: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnovaTable {
    pub rows: Vec<AnovaRow>,
    pub residual_df: usize,
    pub residual_sum_sq: f64,
    pub residual_mean_sq: f64,
    pub total_sum_sq: f64,
}

fn f_p_value(f: f64, df1: usize, df2: usize) -> f64 {
    if !f.is_finite() {
        return f64::NAN;
    }
    match FisherSnedecor::new(df1 as f64, df2 as f64) {
        Ok(dist) => 1.0 - dist.cdf(f),
        Err(_) => f64::NAN,
    }
}

/// Decompose the model sum of squares term by term, in formula order.
pub fn anova(design: &DesignMatrix, fit: &OlsFit) -> Result<AnovaTable> {
    if fit.residual_variance_negligible() {
        return Err(AnalysisError::Degenerate(
            "residual variance is numerically zero: F ratios are undefined".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for term in &design.terms {
        if term.name == "(Intercept)" {
            continue;
        }
        let sum_sq: f64 = term.range().map(|j| fit.qty[j] * fit.qty[j]).sum();
        let mean_sq = sum_sq / term.len as f64;
        let f = mean_sq / fit.sigma2;
        rows.push(AnovaRow {
            term: term.name.clone(),
            df: term.len,
            sum_sq,
            mean_sq,
            f,
            p: f_p_value(f, term.len, fit.df_resid),
            eta_sq: sum_sq / fit.tss,
            partial_eta_sq: sum_sq / (sum_sq + fit.rss),
        });
    }

    Ok(AnovaTable {
        rows,
        residual_df: fit.df_resid,
        residual_sum_sq: fit.rss,
        residual_mean_sq: fit.sigma2,
        total_sum_sq: fit.tss,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::center;
    use crate::design;
    use crate::model;

    fn fitted() -> (design::DesignMatrix, model::OlsFit, AnovaTable) {
        let (df, _) = center::center(design::tests::synthetic_frame(false)).unwrap();
        let d = design::build(&df).unwrap();
        let fit = model::fit(&d).unwrap();
        let table = anova(&d, &fit).unwrap();
        (d, fit, table)
    }

    #[test]
    fn outcome_in_model_span_is_degenerate() {
        // QR rounding leaves a tiny nonzero RSS here; F ratios against it
        // would be astronomically inflated rather than meaningful.
        let (df, _) = center::center(design::tests::span_outcome_frame()).unwrap();
        let d = design::build(&df).unwrap();
        let fit = model::fit(&d).unwrap();
        assert!(matches!(
            anova(&d, &fit),
            Err(AnalysisError::Degenerate(_))
        ));
    }

    #[test]
    fn term_df_follow_the_formula() {
        let (_, _, table) = fitted();
        let df: Vec<(String, usize)> =
            table.rows.iter().map(|r| (r.term.clone(), r.df)).collect();
        assert_eq!(df[0], ("framing".to_string(), 2));
        assert_eq!(df[1], ("norm".to_string(), 4));
        assert_eq!(df[2], ("framing:norm".to_string(), 8));
        assert_eq!(df[df.len() - 1], ("gender".to_string(), 4));
        assert_eq!(table.rows.len(), 9);
    }

    #[test]
    fn sums_of_squares_decompose_the_total() {
        let (_, _, table) = fitted();
        let term_ss: f64 = table.rows.iter().map(|r| r.sum_sq).sum();
        let total = term_ss + table.residual_sum_sq;
        assert!(
            (total - table.total_sum_sq).abs() < 1e-8 * table.total_sum_sq.max(1.0),
            "decomposition {} vs total {}",
            total,
            table.total_sum_sq
        );
    }

    #[test]
    fn eta_squared_stays_in_unit_interval() {
        let (_, _, table) = fitted();
        for row in &table.rows {
            assert!(row.eta_sq >= 0.0 && row.eta_sq <= 1.0);
            assert!(row.partial_eta_sq >= 0.0 && row.partial_eta_sq <= 1.0);
            assert!(row.eta_sq <= row.partial_eta_sq + 1e-12);
        }
    }

    #[test]
    fn p_values_are_probabilities() {
        let (_, _, table) = fitted();
        for row in &table.rows {
            assert!(row.p >= 0.0 && row.p <= 1.0, "{}: p = {}", row.term, row.p);
        }
    }
}
