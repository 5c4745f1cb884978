//! Loads the survey export into an observation table.

use crate::error::{AnalysisError, Result};
use crate::schema;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Read the delimited survey file and validate it against the fixed schema.
///
/// The table is read exactly once; everything downstream works on the
/// in-memory frame.
pub fn load(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(AnalysisError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input file not found: {}", path.display()),
        )));
    }

    let df = LazyCsvReader::new(path)
        .finish()
        .map_err(|e| AnalysisError::Schema(format!("failed to read {}: {}", path.display(), e)))?
        .collect()
        .map_err(|e| AnalysisError::Schema(format!("failed to parse {}: {}", path.display(), e)))?;

    let df = validate(df)?;
    info!(rows = df.height(), "loaded observation table");
    Ok(df)
}

/// Check column presence, coerce numeric columns, and enforce one row per
/// participant. Unparseable values in a typed column are a schema error,
/// not a silent null.
pub fn validate(mut df: DataFrame) -> Result<DataFrame> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for expected in schema::expected_columns() {
        if !present.iter().any(|c| c == expected) {
            return Err(AnalysisError::Schema(format!(
                "input is missing expected column '{}'",
                expected
            )));
        }
    }

    let mut numeric: Vec<&str> = schema::COVARIATES.to_vec();
    numeric.push(schema::OUTCOME);
    for col_name in numeric {
        let series = df.column(col_name)?.clone();
        let nulls_before = series.null_count();
        let cast = series.cast(&DataType::Float64).map_err(|e| {
            AnalysisError::Schema(format!("column '{}' is not numeric: {}", col_name, e))
        })?;
        if cast.null_count() > nulls_before {
            return Err(AnalysisError::Schema(format!(
                "column '{}' contains {} unparseable value(s)",
                col_name,
                cast.null_count() - nulls_before
            )));
        }
        df.with_column(cast)?;
    }

    let ids = df.column(schema::PARTICIPANT_ID)?;
    let unique = ids.n_unique()?;
    if unique != df.height() {
        return Err(AnalysisError::Data(format!(
            "participant ids are not unique: {} ids over {} rows",
            unique,
            df.height()
        )));
    }

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_frame() -> DataFrame {
        df![
            "participant_id" => ["p1", "p2"],
            "framing" => ["control", "self-enhancing"],
            "norm" => ["control", "moral"],
            "gender" => ["female", "male"],
            "class_level" => ["junior", "senior"],
            "employment" => ["part_time", "full_time"],
            "parental_education" => ["bachelors", "masters"],
            "political_orientation" => ["moderate", "liberal"],
            "ethnicity" => ["white", "asian"],
            "behaviors" => ["sometimes", "often"],
            "biospheric" => [5.0, 6.0],
            "egoistic" => [3.0, 2.0],
            "ingroup_identification" => [4.0, 4.5],
            "clothing_interest" => [2.0, 3.0],
            "age" => [20.0, 21.0],
            "intentions" => [4.2, 5.1],
        ]
        .unwrap()
    }

    #[test]
    fn validates_complete_frame() {
        assert!(validate(minimal_frame()).is_ok());
    }

    #[test]
    fn missing_column_is_schema_error() {
        let df = minimal_frame().drop("norm").unwrap();
        match validate(df) {
            Err(AnalysisError::Schema(msg)) => assert!(msg.contains("norm")),
            other => panic!("expected schema error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unparseable_numeric_is_schema_error() {
        let mut df = minimal_frame();
        df.with_column(Series::new("age", ["twenty", "21"])).unwrap();
        match validate(df) {
            Err(AnalysisError::Schema(msg)) => assert!(msg.contains("age")),
            other => panic!("expected schema error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn duplicate_participant_is_data_error() {
        let mut df = minimal_frame();
        df.with_column(Series::new("participant_id", ["p1", "p1"])).unwrap();
        assert!(matches!(validate(df), Err(AnalysisError::Data(_))));
    }
}
