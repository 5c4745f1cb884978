//! Model-matrix construction for
//! `intentions ~ framing * norm + centered covariates + gender`.
//!
//! Columns are laid out in formula order: intercept, framing (2), norm (4),
//! framing:norm (8), the five centered covariates, gender (4). The sequential
//! ANOVA attributes sums of squares in exactly this order, so the layout is
//! part of the analysis contract, not an implementation detail.

use crate::contrasts;
use crate::error::{AnalysisError, Result};
use crate::recode;
use crate::schema;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::warn;

// Column offsets of each term, shared by `build` and `emm_row` so the fill
// loop and the prediction rows can never disagree about the layout.
const FRAMING_START: usize = 1;
const NORM_START: usize = FRAMING_START + 2;
const INTERACTION_START: usize = NORM_START + 4;
const COVARIATE_START: usize = INTERACTION_START + 8;
const GENDER_START: usize = COVARIATE_START + 5;

/// One term of the model formula and the design columns it owns.
#[derive(Debug, Clone)]
pub struct TermSpan {
    pub name: String,
    pub start: usize,
    pub len: usize,
}

impl TermSpan {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// The fitted sample: complete-case design matrix, outcome vector, and the
/// bookkeeping needed by diagnostics and reporting.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub column_names: Vec<String>,
    pub terms: Vec<TermSpan>,
    /// Original row index of each analyzed row, for influence reporting.
    pub kept_rows: Vec<usize>,
    /// Rows lost to listwise deletion.
    pub n_dropped: usize,
}

impl DesignMatrix {
    pub fn n(&self) -> usize {
        self.x.nrows()
    }

    pub fn p(&self) -> usize {
        self.x.ncols()
    }

    /// Prediction row for an estimated marginal mean.
    ///
    /// A `Some(level)` pins that factor to the level's contrast row; `None`
    /// averages over the factor's levels, which under these centered codings
    /// is the zero vector. Centered covariates and gender are held at zero.
    pub fn emm_row(&self, framing: Option<usize>, norm: Option<usize>) -> Array1<f64> {
        let fc = contrasts::framing_contrasts();
        let nc = contrasts::helmert(schema::NORM.n_levels());
        let mut row = Array1::zeros(self.p());
        row[0] = 1.0;
        if let Some(f) = framing {
            for j in 0..fc.ncols() {
                row[FRAMING_START + j] = fc[[f, j]];
            }
        }
        if let Some(n) = norm {
            for j in 0..nc.ncols() {
                row[NORM_START + j] = nc[[n, j]];
            }
        }
        if let (Some(f), Some(n)) = (framing, norm) {
            let mut col = INTERACTION_START;
            for i in 0..fc.ncols() {
                for j in 0..nc.ncols() {
                    row[col] = fc[[f, i]] * nc[[n, j]];
                    col += 1;
                }
            }
        }
        row
    }
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(df.column(name)?.f64()?.into_iter().collect())
}

/// Expand the formula into a complete-case design matrix.
///
/// Rows with a missing value in any modeled column are excluded; the
/// attrition is logged because it silently shrinks the analyzed sample.
pub fn build(df: &DataFrame) -> Result<DesignMatrix> {
    let framing_idx = recode::level_indices(df, &schema::FRAMING)?;
    let norm_idx = recode::level_indices(df, &schema::NORM)?;
    let gender_idx = recode::level_indices(df, &schema::GENDER)?;

    let mut covariates = Vec::with_capacity(schema::COVARIATES.len());
    for &cov in schema::COVARIATES {
        covariates.push(f64_column(df, &schema::centered_name(cov))?);
    }
    let outcome = f64_column(df, schema::OUTCOME)?;

    let n_total = df.height();
    let mut kept_rows = Vec::with_capacity(n_total);
    for i in 0..n_total {
        let complete = framing_idx[i].is_some()
            && norm_idx[i].is_some()
            && gender_idx[i].is_some()
            && outcome[i].is_some()
            && covariates.iter().all(|c| c[i].is_some());
        if complete {
            kept_rows.push(i);
        }
    }
    let n_dropped = n_total - kept_rows.len();
    if n_dropped > 0 {
        warn!(
            dropped = n_dropped,
            analyzed = kept_rows.len(),
            "listwise deletion removed rows with missing modeled values"
        );
    }
    if kept_rows.is_empty() {
        return Err(AnalysisError::Data(
            "no complete cases remain after listwise deletion".to_string(),
        ));
    }

    let fc = contrasts::framing_contrasts();
    let nc = contrasts::helmert(schema::NORM.n_levels());
    let gc = contrasts::helmert(schema::GENDER.n_levels());

    let mut column_names = vec!["(Intercept)".to_string()];
    let mut terms = vec![TermSpan {
        name: "(Intercept)".to_string(),
        start: 0,
        len: 1,
    }];

    let framing_cols = ["framing.3v1", "framing.2v13"];
    column_names.extend(framing_cols.iter().map(|s| s.to_string()));
    terms.push(TermSpan {
        name: "framing".to_string(),
        start: FRAMING_START,
        len: 2,
    });

    for j in 1..=nc.ncols() {
        column_names.push(format!("norm.h{}", j));
    }
    terms.push(TermSpan {
        name: "norm".to_string(),
        start: NORM_START,
        len: 4,
    });

    for i in 0..fc.ncols() {
        for j in 1..=nc.ncols() {
            column_names.push(format!("{}:norm.h{}", framing_cols[i], j));
        }
    }
    terms.push(TermSpan {
        name: "framing:norm".to_string(),
        start: INTERACTION_START,
        len: 8,
    });

    for (k, &cov) in schema::COVARIATES.iter().enumerate() {
        let name = schema::centered_name(cov);
        column_names.push(name.clone());
        terms.push(TermSpan {
            name,
            start: COVARIATE_START + k,
            len: 1,
        });
    }

    for j in 1..=gc.ncols() {
        column_names.push(format!("gender.h{}", j));
    }
    terms.push(TermSpan {
        name: "gender".to_string(),
        start: GENDER_START,
        len: 4,
    });

    let p = column_names.len();
    let n = kept_rows.len();
    let mut x = Array2::zeros((n, p));
    let mut y = Array1::zeros(n);

    for (r, &i) in kept_rows.iter().enumerate() {
        let f = framing_idx[i].unwrap();
        let nl = norm_idx[i].unwrap();
        let g = gender_idx[i].unwrap();

        x[[r, 0]] = 1.0;
        for j in 0..fc.ncols() {
            x[[r, FRAMING_START + j]] = fc[[f, j]];
        }
        for j in 0..nc.ncols() {
            x[[r, NORM_START + j]] = nc[[nl, j]];
        }
        let mut col = INTERACTION_START;
        for a in 0..fc.ncols() {
            for b in 0..nc.ncols() {
                x[[r, col]] = fc[[f, a]] * nc[[nl, b]];
                col += 1;
            }
        }
        for (k, cov) in covariates.iter().enumerate() {
            x[[r, COVARIATE_START + k]] = cov[i].unwrap();
        }
        for j in 0..gc.ncols() {
            x[[r, GENDER_START + j]] = gc[[g, j]];
        }
        y[r] = outcome[i].unwrap();
    }

    Ok(DesignMatrix {
        x,
        y,
        column_names,
        terms,
        kept_rows,
        n_dropped,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::center;

    fn frame_with_outcome(
        with_missing: bool,
        outcome: impl Fn(usize, usize) -> f64,
    ) -> DataFrame {
        // One participant per framing x norm x gender-rotation slot.
        let framing_levels = schema::FRAMING.levels;
        let norm_levels = schema::NORM.levels;
        let mut ids = Vec::new();
        let mut framing = Vec::new();
        let mut norm = Vec::new();
        let mut gender = Vec::new();
        let mut biospheric = Vec::new();
        let mut egoistic = Vec::new();
        let mut ingroup = Vec::new();
        let mut clothing = Vec::new();
        let mut age = Vec::new();
        let mut intentions: Vec<Option<f64>> = Vec::new();

        let mut k = 0usize;
        for rep in 0..4 {
            for f in framing_levels {
                for nl in norm_levels {
                    ids.push(format!("p{:03}", k));
                    framing.push(*f);
                    norm.push(*nl);
                    // Cycle lengths are chosen so no covariate or the gender
                    // assignment is a function of the 15-cell factorial
                    // pattern, which would make the design rank-deficient.
                    gender.push(schema::GENDER.levels[(k % 7) % 5]);
                    biospheric.push(3.0 + (k % 7) as f64 * 0.5);
                    egoistic.push(2.0 + (k % 11) as f64 * 0.25);
                    ingroup.push(4.0 + (k % 13) as f64 * 0.5);
                    clothing.push(1.0 + (k % 4) as f64 * 0.75);
                    age.push(18.0 + (k % 9) as f64);
                    if with_missing && k == 5 {
                        intentions.push(None);
                    } else {
                        intentions.push(Some(outcome(k, rep)));
                    }
                    k += 1;
                }
            }
        }

        df![
            "participant_id" => ids,
            "framing" => framing,
            "norm" => norm,
            "gender" => gender,
            "biospheric" => biospheric,
            "egoistic" => egoistic,
            "ingroup_identification" => ingroup,
            "clothing_interest" => clothing,
            "age" => age,
            "intentions" => intentions,
        ]
        .unwrap()
    }

    pub(crate) fn synthetic_frame(with_missing: bool) -> DataFrame {
        // The sin term keeps the outcome outside the column span of the
        // model, so fits on this frame always leave residual variance.
        frame_with_outcome(with_missing, |k, rep| {
            4.0 + 0.3 * (k % 7) as f64 + 0.1 * rep as f64 + 0.05 * (k as f64).sin()
        })
    }

    /// Outcome lying exactly in the span of the intercept and two centered
    /// covariates, so a fit leaves only rounding residue in the residuals.
    pub(crate) fn span_outcome_frame() -> DataFrame {
        frame_with_outcome(false, |k, _| {
            let biospheric = 3.0 + (k % 7) as f64 * 0.5;
            let age = 18.0 + (k % 9) as f64;
            4.0 + 0.2 * biospheric + 0.1 * age
        })
    }

    fn build_from(with_missing: bool) -> DesignMatrix {
        let (df, _) = center::center(synthetic_frame(with_missing)).unwrap();
        build(&df).unwrap()
    }

    #[test]
    fn column_count_matches_the_formula() {
        let d = build_from(false);
        // 1 + 2 + 4 + 8 + 5 + 4
        assert_eq!(d.p(), 24);
        assert_eq!(d.column_names.len(), 24);
        assert_eq!(d.terms.iter().map(|t| t.len).sum::<usize>(), 24);
    }

    #[test]
    fn complete_data_keeps_every_row() {
        let d = build_from(false);
        assert_eq!(d.n(), 60);
        assert_eq!(d.n_dropped, 0);
    }

    #[test]
    fn missing_outcome_row_is_listwise_deleted() {
        let d = build_from(true);
        assert_eq!(d.n(), 59);
        assert_eq!(d.n_dropped, 1);
        assert!(!d.kept_rows.contains(&5));
    }

    #[test]
    fn interaction_columns_are_products() {
        let d = build_from(false);
        for r in 0..d.n() {
            assert_eq!(d.x[[r, 7]], d.x[[r, 1]] * d.x[[r, 3]]);
            assert_eq!(d.x[[r, 14]], d.x[[r, 2]] * d.x[[r, 6]]);
        }
    }

    #[test]
    fn term_spans_cover_contiguous_columns() {
        let d = build_from(false);
        let mut next = 0;
        for t in &d.terms {
            assert_eq!(t.start, next, "term '{}' starts off its span", t.name);
            next += t.len;
        }
        assert_eq!(next, d.p());
    }

    #[test]
    fn emm_row_zeroes_averaged_factors() {
        let d = build_from(false);
        let row = d.emm_row(Some(1), None);
        assert_eq!(row[0], 1.0);
        assert_eq!(row[1], 0.0); // framing contrast A is 0 at level 2
        assert!(row.iter().skip(3).all(|v| *v == 0.0));
    }
}
