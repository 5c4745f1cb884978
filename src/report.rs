//! Human-readable tables and the machine-readable results export.

use crate::anova::AnovaTable;
use crate::center::CenteringMap;
use crate::diagnostics::{CollinearityRow, InfluenceReport};
use crate::emmeans::EmmeansReport;
use crate::error::Result;
use crate::model::OlsFit;
use chrono::Utc;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct CoefficientRow {
    pub name: String,
    pub estimate: f64,
    pub se: f64,
    pub t: f64,
    pub p: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub n_total: usize,
    pub n_analyzed: usize,
    pub n_dropped: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_sd: f64,
}

/// Everything the analysis produced, in one serializable bundle.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generated_at: String,
    pub summary: ModelSummary,
    pub centering: CenteringMap,
    pub coefficients: Vec<CoefficientRow>,
    pub anova: AnovaTable,
    pub emmeans: EmmeansReport,
    pub influence: InfluenceReport,
    pub collinearity: Vec<CollinearityRow>,
}

impl AnalysisReport {
    pub fn new(
        n_total: usize,
        centering: CenteringMap,
        fit: &OlsFit,
        coefficient_names: &[String],
        anova: AnovaTable,
        emmeans: EmmeansReport,
        influence: InfluenceReport,
        collinearity: Vec<CollinearityRow>,
        n_dropped: usize,
    ) -> Self {
        let n_analyzed = fit.fitted.len();
        let coefficients = coefficient_names
            .iter()
            .enumerate()
            .map(|(j, name)| CoefficientRow {
                name: name.clone(),
                estimate: fit.coef[j],
                se: fit.se[j],
                t: fit.t[j],
                p: fit.p_values[j],
            })
            .collect();
        AnalysisReport {
            generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            summary: ModelSummary {
                n_total,
                n_analyzed,
                n_dropped,
                df_resid: fit.df_resid,
                r_squared: fit.r_squared,
                adj_r_squared: fit.adj_r_squared,
                residual_sd: fit.sigma(),
            },
            centering,
            coefficients,
            anova,
            emmeans,
            influence,
            collinearity,
        }
    }

    /// Write the full numeric bundle as JSON next to the plots.
    pub fn write_json(&self, output_dir: &Path) -> Result<()> {
        let path = output_dir.join("results.json");
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

fn fmt(v: f64) -> String {
    if v.is_nan() {
        "-".to_string()
    } else {
        format!("{:.4}", v)
    }
}

fn fmt_p(p: f64) -> String {
    if p.is_nan() {
        "-".to_string()
    } else if p < 0.001 {
        "<0.001".to_string()
    } else {
        format!("{:.3}", p)
    }
}

pub fn render_summary(s: &ModelSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["statistic", "value"]);
    table.add_row(vec!["rows loaded".to_string(), s.n_total.to_string()]);
    table.add_row(vec!["rows analyzed".to_string(), s.n_analyzed.to_string()]);
    table.add_row(vec![
        "rows dropped (listwise)".to_string(),
        s.n_dropped.to_string(),
    ]);
    table.add_row(vec!["residual df".to_string(), s.df_resid.to_string()]);
    table.add_row(vec!["R^2".to_string(), fmt(s.r_squared)]);
    table.add_row(vec!["adj. R^2".to_string(), fmt(s.adj_r_squared)]);
    table.add_row(vec!["residual SD".to_string(), fmt(s.residual_sd)]);
    table
}

pub fn render_anova(a: &AnovaTable) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "term", "df", "sum sq", "mean sq", "F", "p", "eta^2", "partial eta^2",
    ]);
    for row in &a.rows {
        table.add_row(vec![
            row.term.clone(),
            row.df.to_string(),
            fmt(row.sum_sq),
            fmt(row.mean_sq),
            fmt(row.f),
            fmt_p(row.p),
            fmt(row.eta_sq),
            fmt(row.partial_eta_sq),
        ]);
    }
    table.add_row(vec![
        "Residuals".to_string(),
        a.residual_df.to_string(),
        fmt(a.residual_sum_sq),
        fmt(a.residual_mean_sq),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
    ]);
    table
}

pub fn render_coefficients(rows: &[CoefficientRow]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["coefficient", "estimate", "SE", "t", "p"]);
    for row in rows {
        table.add_row(vec![
            row.name.clone(),
            fmt(row.estimate),
            fmt(row.se),
            fmt(row.t),
            fmt_p(row.p),
        ]);
    }
    table
}

pub fn render_emmeans(title_col: &str, means: &[crate::emmeans::Emmean]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![title_col, "emmean", "SE"]);
    for m in means {
        table.add_row(vec![m.label.clone(), fmt(m.mean), fmt(m.se)]);
    }
    table
}

pub fn render_contrasts(contrasts: &[crate::emmeans::PairwiseContrast]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["contrast", "estimate", "SE", "t", "p (unadjusted)", "d"]);
    for c in contrasts {
        table.add_row(vec![
            c.label.clone(),
            fmt(c.estimate),
            fmt(c.se),
            fmt(c.t),
            fmt_p(c.p),
            fmt(c.effect_size),
        ]);
    }
    table
}

pub fn render_influence(report: &InfluenceReport, top: usize) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["row", "residual", "leverage", "Cook's D", "review"]);
    for r in report.rows.iter().take(top) {
        let review = if r.flagged {
            "flag".red().to_string()
        } else {
            String::new()
        };
        table.add_row(vec![
            r.row.to_string(),
            fmt(r.residual),
            fmt(r.leverage),
            fmt(r.cooks_distance),
            review,
        ]);
    }
    table
}

pub fn render_collinearity(rows: &[CollinearityRow]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["predictor", "tolerance", "VIF", "concern"]);
    for r in rows {
        let vif = match r.vif {
            Some(v) => fmt(v),
            None => "undefined (infinite)".to_string(),
        };
        let concern = if r.flagged {
            "multicollinearity".yellow().to_string()
        } else {
            String::new()
        };
        table.add_row(vec![r.column.clone(), fmt(r.tolerance), vif, concern]);
    }
    table
}

/// The full report as printed to stdout.
pub fn render(report: &AnalysisReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\ngenerated {}\n\n",
        "=== framing x norm consumer-intentions analysis ===".bold(),
        report.generated_at
    ));
    out.push_str(&format!("{}\n{}\n\n", "Model summary".bold(), render_summary(&report.summary)));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Sequential (Type I) ANOVA".bold(),
        render_anova(&report.anova)
    ));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Coefficients".bold(),
        render_coefficients(&report.coefficients)
    ));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Estimated marginal means: framing".bold(),
        render_emmeans("framing", &report.emmeans.framing)
    ));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Pairwise contrasts: framing (no adjustment)".bold(),
        render_contrasts(&report.emmeans.framing_contrasts)
    ));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Estimated marginal means: norm".bold(),
        render_emmeans("norm", &report.emmeans.norm)
    ));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Pairwise contrasts: norm (no adjustment)".bold(),
        render_contrasts(&report.emmeans.norm_contrasts)
    ));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Estimated marginal means: framing x norm cells".bold(),
        render_emmeans("cell", &report.emmeans.cells)
    ));
    out.push_str(&format!(
        "{}\n{}\n\n",
        "Pairwise contrasts: cells (no adjustment)".bold(),
        render_contrasts(&report.emmeans.cell_contrasts)
    ));
    out.push_str(&format!(
        "{} (threshold {:.4})\n{}\n\n",
        "Influence: top Cook's distances".bold(),
        report.influence.threshold,
        render_influence(&report.influence, 10)
    ));
    out.push_str(&format!(
        "{}\n{}\n",
        "Collinearity".bold(),
        render_collinearity(&report.collinearity)
    ));
    out
}
