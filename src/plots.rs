//! Static SVG diagnostics.
//!
//! These are visual checks for the analyst (linearity, homoscedasticity,
//! normality, independence), not pass/fail tests.

use crate::design::DesignMatrix;
use crate::emmeans::EmmeansReport;
use crate::error::{AnalysisError, Result};
use crate::model::OlsFit;
use crate::schema;
use plotters::prelude::*;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::path::Path;

fn plot_err<E: std::fmt::Display>(e: E) -> AnalysisError {
    AnalysisError::Plot(e.to_string())
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = (hi - lo).max(1e-6) * 0.05;
    (lo - pad, hi + pad)
}

fn scatter(
    path: &Path,
    caption: &str,
    x_desc: &str,
    y_desc: &str,
    points: &[(f64, f64)],
    zero_line: bool,
) -> Result<()> {
    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let (x_lo, x_hi) = bounds(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = bounds(points.iter().map(|p| p.1));
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(
            points
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 3, BLUE.filled())),
        )
        .map_err(plot_err)?;
    if zero_line {
        chart
            .draw_series(LineSeries::new(vec![(x_lo, 0.0), (x_hi, 0.0)], &RED))
            .map_err(plot_err)?;
    }
    root.present().map_err(plot_err)?;
    Ok(())
}

pub fn residuals_vs_fitted(fit: &OlsFit, output_dir: &Path) -> Result<()> {
    let points: Vec<(f64, f64)> = fit
        .fitted
        .iter()
        .zip(fit.residuals.iter())
        .map(|(f, r)| (*f, *r))
        .collect();
    scatter(
        &output_dir.join("residuals_vs_fitted.svg"),
        "Residuals vs fitted",
        "fitted value",
        "residual",
        &points,
        true,
    )
}

pub fn residuals_vs_index(design: &DesignMatrix, fit: &OlsFit, output_dir: &Path) -> Result<()> {
    let points: Vec<(f64, f64)> = design
        .kept_rows
        .iter()
        .zip(fit.residuals.iter())
        .map(|(i, r)| (*i as f64, *r))
        .collect();
    scatter(
        &output_dir.join("residuals_vs_index.svg"),
        "Residuals vs row order",
        "row index",
        "residual",
        &points,
        true,
    )
}

fn residual_reference(fit: &OlsFit) -> Result<Normal> {
    let n = fit.residuals.len() as f64;
    let mean = fit.residuals.sum() / n;
    let sd = (fit.residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    Normal::new(mean, sd)
        .map_err(|_| AnalysisError::Degenerate("residuals have zero variance".to_string()))
}

/// Normal QQ plot against a reference with the residuals' own mean and SD.
pub fn residual_qq(fit: &OlsFit, output_dir: &Path) -> Result<()> {
    let normal = residual_reference(fit)?;
    let mut sorted: Vec<f64> = fit.residuals.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let points: Vec<(f64, f64)> = sorted
        .iter()
        .enumerate()
        .map(|(i, r)| (normal.inverse_cdf((i as f64 + 0.5) / n as f64), *r))
        .collect();

    let path = output_dir.join("residual_qq.svg");
    let root = SVGBackend::new(&path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let (lo, hi) = bounds(points.iter().flat_map(|p| [p.0, p.1]));
    let mut chart = ChartBuilder::on(&root)
        .caption("Normal QQ plot of residuals", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, lo..hi)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("theoretical quantile")
        .y_desc("sample quantile")
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(points.iter().map(|(x, y)| Circle::new((*x, *y), 3, BLUE.filled())))
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(vec![(lo, lo), (hi, hi)], &RED))
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

/// Residual histogram (as a density) with the matching normal curve.
pub fn residual_density(fit: &OlsFit, output_dir: &Path) -> Result<()> {
    let normal = residual_reference(fit)?;
    let n = fit.residuals.len();
    let resid_mean = fit.residuals.sum() / n as f64;
    let (lo, hi) = bounds(fit.residuals.iter().copied());
    let n_bins = 20usize;
    let width = (hi - lo) / n_bins as f64;
    let mut counts = vec![0usize; n_bins];
    for r in fit.residuals.iter() {
        let b = (((r - lo) / width) as usize).min(n_bins - 1);
        counts[b] += 1;
    }
    let density: Vec<f64> = counts
        .iter()
        .map(|c| *c as f64 / (n as f64 * width))
        .collect();
    let peak = density
        .iter()
        .chain(std::iter::once(&normal.pdf(resid_mean)))
        .fold(0.0f64, |a, b| a.max(*b));

    let path = output_dir.join("residual_density.svg");
    let root = SVGBackend::new(&path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Residual density", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0.0..peak * 1.1)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("residual")
        .y_desc("density")
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(density.iter().enumerate().map(|(b, d)| {
            let x0 = lo + b as f64 * width;
            Rectangle::new([(x0, 0.0), (x0 + width, *d)], BLUE.mix(0.4).filled())
        }))
        .map_err(plot_err)?;
    let curve: Vec<(f64, f64)> = (0..200)
        .map(|i| {
            let x = lo + (hi - lo) * i as f64 / 199.0;
            (x, normal.pdf(x))
        })
        .collect();
    chart
        .draw_series(LineSeries::new(curve, &RED))
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

/// Cell EMMs: one line per norm condition across the framing levels.
pub fn interaction(emmeans: &EmmeansReport, output_dir: &Path) -> Result<()> {
    let path = output_dir.join("interaction.svg");
    let root = SVGBackend::new(&path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let (y_lo, y_hi) = bounds(emmeans.cells.iter().map(|c| c.mean));
    let mut chart = ChartBuilder::on(&root)
        .caption("Framing x norm interaction (cell EMMs)", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..2.5f64, y_lo..y_hi)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_labels(3)
        .x_label_formatter(&|x| {
            let i = x.round() as i64;
            if (0..3).contains(&i) && (x - i as f64).abs() < 0.01 {
                schema::FRAMING.levels[i as usize].to_string()
            } else {
                String::new()
            }
        })
        .x_desc("framing condition")
        .y_desc("estimated marginal mean")
        .draw()
        .map_err(plot_err)?;

    let n_norm = schema::NORM.n_levels();
    for (n_idx, norm_level) in schema::NORM.levels.iter().enumerate() {
        let color = Palette99::pick(n_idx).to_rgba();
        let series: Vec<(f64, f64)> = (0..schema::FRAMING.n_levels())
            .map(|f| (f as f64, emmeans.cells[f * n_norm + n_idx].mean))
            .collect();
        chart
            .draw_series(LineSeries::new(series.clone(), color.stroke_width(2)))
            .map_err(plot_err)?
            .label(*norm_level)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(2))
            });
        chart
            .draw_series(series.iter().map(|(x, y)| Circle::new((*x, *y), 3, color.filled())))
            .map_err(plot_err)?;
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

/// Render every diagnostic figure into the output directory.
pub fn render_all(
    design: &DesignMatrix,
    fit: &OlsFit,
    emmeans: &EmmeansReport,
    output_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    residuals_vs_fitted(fit, output_dir)?;
    residuals_vs_index(design, fit, output_dir)?;
    residual_qq(fit, output_dir)?;
    residual_density(fit, output_dir)?;
    interaction(emmeans, output_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::center;
    use crate::design;
    use crate::emmeans as emm;
    use crate::model;

    #[test]
    fn writes_all_five_figures() {
        let (df, _) = center::center(design::tests::synthetic_frame(false)).unwrap();
        let d = design::build(&df).unwrap();
        let fit = model::fit(&d).unwrap();
        let report = emm::emmeans(&d, &fit).unwrap();
        let dir = tempfile::tempdir().unwrap();
        render_all(&d, &fit, &report, dir.path()).unwrap();
        for name in [
            "residuals_vs_fitted.svg",
            "residuals_vs_index.svg",
            "residual_qq.svg",
            "residual_density.svg",
            "interaction.svg",
        ] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
    }
}
