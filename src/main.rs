use anyhow::Result;
use clap::Parser;
use normframe::pipeline::{self, PipelineConfig};
use normframe::report;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "normframe")]
#[command(about = "OLS analysis of the framing x social-norm consumer-intentions experiment")]
struct Args {
    /// Path to the survey CSV export
    input: PathBuf,

    /// Directory for plots and results.json (default: ./analysis_out)
    #[arg(short, long, default_value = "analysis_out")]
    output_dir: PathBuf,

    /// Cook's distance review threshold (default: 4/n)
    #[arg(long)]
    cooks_threshold: Option<f64>,

    /// Write results.json and plots only, without printing tables
    #[arg(long)]
    json_only: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = PipelineConfig {
        input: args.input,
        output_dir: args.output_dir,
        cooks_threshold: args.cooks_threshold,
        render_plots: true,
    };

    let analysis = pipeline::run(&config)?;

    if !args.json_only {
        println!("{}", report::render(&analysis));
    }
    info!("analysis complete");

    Ok(())
}
