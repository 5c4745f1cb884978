use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Level mismatch in column '{column}': value '{value}' is not a declared level")]
    LevelMismatch { column: String, value: String },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Rank-deficient design matrix: {0}")]
    RankDeficient(String),

    #[error("Degenerate fit: {0}")]
    Degenerate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error("Plot error: {0}")]
    Plot(String),
}

impl From<polars::error::PolarsError> for AnalysisError {
    fn from(e: polars::error::PolarsError) -> Self {
        AnalysisError::Polars(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
