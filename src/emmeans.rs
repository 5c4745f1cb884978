//! Estimated marginal means and pairwise contrasts.
//!
//! Means are model predictions with centered covariates at zero and the
//! non-focal factors averaged over their levels. Pairwise contrasts carry
//! no multiple-comparison adjustment; that mirrors the preregistered
//! analysis choice and is stated in the rendered report.

use crate::design::DesignMatrix;
use crate::error::{AnalysisError, Result};
use crate::model::{self, OlsFit};
use crate::schema;
use itertools::Itertools;
use ndarray::Array1;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Emmean {
    pub label: String,
    pub mean: f64,
    pub se: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairwiseContrast {
    pub label: String,
    pub estimate: f64,
    pub se: f64,
    pub t: f64,
    /// Unadjusted two-sided p-value.
    pub p: f64,
    /// Contrast estimate scaled by the residual SD (a Cohen's-d analogue).
    pub effect_size: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmmeansReport {
    pub framing: Vec<Emmean>,
    pub framing_contrasts: Vec<PairwiseContrast>,
    pub norm: Vec<Emmean>,
    pub norm_contrasts: Vec<PairwiseContrast>,
    pub cells: Vec<Emmean>,
    pub cell_contrasts: Vec<PairwiseContrast>,
}

fn mean_at(fit: &OlsFit, row: &Array1<f64>, label: String) -> Emmean {
    Emmean {
        label,
        mean: row.dot(&fit.coef),
        se: fit.linear_se(row),
    }
}

fn contrast_between(
    fit: &OlsFit,
    a: (&str, &Array1<f64>),
    b: (&str, &Array1<f64>),
) -> PairwiseContrast {
    let diff = a.1 - b.1;
    let estimate = diff.dot(&fit.coef);
    let se = fit.linear_se(&diff);
    let t = if se > 0.0 { estimate / se } else { f64::INFINITY };
    PairwiseContrast {
        label: format!("{} - {}", a.0, b.0),
        estimate,
        se,
        t,
        p: model::two_sided_p(t, fit.df_resid),
        effect_size: estimate / fit.sigma(),
    }
}

fn factor_section(
    fit: &OlsFit,
    labels: &[(String, Array1<f64>)],
) -> (Vec<Emmean>, Vec<PairwiseContrast>) {
    let means = labels
        .iter()
        .map(|(label, row)| mean_at(fit, row, label.clone()))
        .collect();
    let contrasts = labels
        .iter()
        .tuple_combinations()
        .map(|(a, b)| contrast_between(fit, (&a.0, &a.1), (&b.0, &b.1)))
        .collect();
    (means, contrasts)
}

/// Marginal means and all pairwise contrasts for each treatment factor and
/// for the framing x norm cells.
pub fn emmeans(design: &DesignMatrix, fit: &OlsFit) -> Result<EmmeansReport> {
    if fit.residual_variance_negligible() {
        return Err(AnalysisError::Degenerate(
            "residual variance is numerically zero: contrast effect sizes are undefined"
                .to_string(),
        ));
    }

    let framing_rows: Vec<(String, Array1<f64>)> = schema::FRAMING
        .levels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.to_string(), design.emm_row(Some(i), None)))
        .collect();
    let norm_rows: Vec<(String, Array1<f64>)> = schema::NORM
        .levels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.to_string(), design.emm_row(None, Some(i))))
        .collect();
    let cell_rows: Vec<(String, Array1<f64>)> = schema::FRAMING
        .levels
        .iter()
        .enumerate()
        .cartesian_product(schema::NORM.levels.iter().enumerate())
        .map(|((f, fl), (n, nl))| {
            (format!("{}/{}", fl, nl), design.emm_row(Some(f), Some(n)))
        })
        .collect();

    let (framing, framing_contrasts) = factor_section(fit, &framing_rows);
    let (norm, norm_contrasts) = factor_section(fit, &norm_rows);
    let (cells, cell_contrasts) = factor_section(fit, &cell_rows);

    Ok(EmmeansReport {
        framing,
        framing_contrasts,
        norm,
        norm_contrasts,
        cells,
        cell_contrasts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::center;
    use crate::design;
    use crate::model;

    fn fitted() -> (design::DesignMatrix, model::OlsFit) {
        let (df, _) = center::center(design::tests::synthetic_frame(false)).unwrap();
        let d = design::build(&df).unwrap();
        let fit = model::fit(&d).unwrap();
        (d, fit)
    }

    #[test]
    fn section_sizes_match_the_design() {
        let (d, fit) = fitted();
        let report = emmeans(&d, &fit).unwrap();
        assert_eq!(report.framing.len(), 3);
        assert_eq!(report.framing_contrasts.len(), 3);
        assert_eq!(report.norm.len(), 5);
        assert_eq!(report.norm_contrasts.len(), 10);
        assert_eq!(report.cells.len(), 15);
        assert_eq!(report.cell_contrasts.len(), 105);
    }

    #[test]
    fn outcome_in_model_span_is_degenerate_for_contrasts() {
        let (df, _) = center::center(design::tests::span_outcome_frame()).unwrap();
        let d = design::build(&df).unwrap();
        let fit = model::fit(&d).unwrap();
        assert!(matches!(
            emmeans(&d, &fit),
            Err(AnalysisError::Degenerate(_))
        ));
    }

    #[test]
    fn factor_means_average_the_cell_means() {
        let (d, fit) = fitted();
        let report = emmeans(&d, &fit).unwrap();
        // EMM of a framing level is the mean of its five cell EMMs.
        for (f, level) in schema::FRAMING.levels.iter().enumerate() {
            let cell_avg: f64 = report
                .cells
                .iter()
                .filter(|c| c.label.starts_with(&format!("{}/", level)))
                .map(|c| c.mean)
                .sum::<f64>()
                / 5.0;
            assert!((report.framing[f].mean - cell_avg).abs() < 1e-10);
        }
    }

    #[test]
    fn contrast_estimates_are_mean_differences() {
        let (d, fit) = fitted();
        let report = emmeans(&d, &fit).unwrap();
        let first = &report.framing_contrasts[0];
        let diff = report.framing[0].mean - report.framing[1].mean;
        assert!((first.estimate - diff).abs() < 1e-12);
        assert_eq!(first.label, "control - pro-environmental");
    }

    #[test]
    fn effect_size_scales_by_residual_sd() {
        let (d, fit) = fitted();
        let report = emmeans(&d, &fit).unwrap();
        for c in &report.framing_contrasts {
            assert!((c.effect_size - c.estimate / fit.sigma()).abs() < 1e-12);
        }
    }
}
