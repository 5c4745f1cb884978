//! The analysis pipeline: linear, synchronous, one-shot.
//!
//! Every stage runs exactly once; the first error aborts the run. There is
//! nothing to resume — rerun from the start after fixing the input.

use crate::error::Result;
use crate::report::AnalysisReport;
use crate::{anova, center, design, diagnostics, emmeans, loader, model, plots, recode};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Cook's distance review threshold; defaults to 4/n.
    pub cooks_threshold: Option<f64>,
    pub render_plots: bool,
}

/// Run the full analysis and return the assembled report.
pub fn run(config: &PipelineConfig) -> Result<AnalysisReport> {
    info!(input = %config.input.display(), "starting analysis run");

    let df = loader::load(&config.input)?;
    let n_total = df.height();

    let df = recode::recode(df)?;
    info!("factor columns validated and recoded");

    let (df, centering) = center::center(df)?;
    info!("covariates centered");

    let design = design::build(&df)?;
    info!(
        analyzed = design.n(),
        dropped = design.n_dropped,
        columns = design.p(),
        "design matrix built"
    );

    let fit = model::fit(&design)?;
    info!(
        df_resid = fit.df_resid,
        r_squared = fit.r_squared,
        "model fitted"
    );

    let anova_table = anova::anova(&design, &fit)?;
    let influence = diagnostics::influence(&design, &fit, config.cooks_threshold)?;
    let collinearity = diagnostics::collinearity(&design)?;
    let emm = emmeans::emmeans(&design, &fit)?;
    info!("inference tables computed");

    if config.render_plots {
        plots::render_all(&design, &fit, &emm, &config.output_dir)?;
        info!(dir = %config.output_dir.display(), "diagnostic plots written");
    }

    let report = AnalysisReport::new(
        n_total,
        centering,
        &fit,
        &design.column_names,
        anova_table,
        emm,
        influence,
        collinearity,
        design.n_dropped,
    );
    std::fs::create_dir_all(&config.output_dir)?;
    report.write_json(&config.output_dir)?;
    info!("results.json written");

    Ok(report)
}
