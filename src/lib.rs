pub mod anova;
pub mod center;
pub mod contrasts;
pub mod design;
pub mod diagnostics;
pub mod emmeans;
pub mod error;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod plots;
pub mod recode;
pub mod report;
pub mod schema;

pub use error::{AnalysisError, Result};
pub use pipeline::{run, PipelineConfig};
