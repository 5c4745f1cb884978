//! Ordinary least squares by Householder QR.
//!
//! The solve is deterministic: no pivoting, no regularization, columns
//! processed in formula order. That ordering is load-bearing for the
//! sequential ANOVA, which reads its sums of squares straight from the
//! per-column projections computed here.

use crate::design::DesignMatrix;
use crate::error::{AnalysisError, Result};
use ndarray::{s, Array1, Array2};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Relative tolerance for declaring a diagonal of R numerically zero.
const RANK_TOL: f64 = 1e-10;

/// RSS at or below this fraction of the TSS is QR rounding residue, not
/// real residual variation.
const RSS_TOL: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coef: Array1<f64>,
    pub se: Array1<f64>,
    pub t: Array1<f64>,
    pub p_values: Array1<f64>,
    pub fitted: Array1<f64>,
    pub residuals: Array1<f64>,
    pub df_resid: usize,
    /// Residual variance (RSS / df_resid).
    pub sigma2: f64,
    pub rss: f64,
    /// Total sum of squares of the outcome about its mean.
    pub tss: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    /// (X'X)^-1, for marginal-mean standard errors.
    pub xtx_inv: Array2<f64>,
    /// Hat-matrix diagonal per analyzed row.
    pub leverage: Array1<f64>,
    /// Projections q_j'y for each design column, in column order.
    pub qty: Array1<f64>,
}

impl OlsFit {
    /// Residual standard deviation.
    pub fn sigma(&self) -> f64 {
        self.sigma2.sqrt()
    }

    /// Standard error of a linear combination l'beta.
    pub fn linear_se(&self, l: &Array1<f64>) -> f64 {
        (l.dot(&self.xtx_inv.dot(l)) * self.sigma2).sqrt()
    }

    /// True when the outcome lies in the column span of the design up to
    /// rounding, or is constant. An exact-span outcome never produces an RSS
    /// of exactly zero (the Householder sweeps leave residue in the tail
    /// projections), so anything that divides by the residual variance must
    /// check this instead of comparing against 0.0.
    pub fn residual_variance_negligible(&self) -> bool {
        self.tss <= 0.0 || self.rss <= RSS_TOL * self.tss
    }
}

struct Householder {
    /// Reflection vectors, one per design column; vs[k] has length n-k.
    vs: Vec<Array1<f64>>,
    /// Upper-triangular R (p x p).
    r: Array2<f64>,
}

fn householder(x: &Array2<f64>, column_names: &[String]) -> Result<Householder> {
    let p = x.ncols();
    let mut a = x.to_owned();
    let mut vs = Vec::with_capacity(p);
    let mut max_diag: f64 = 0.0;

    for k in 0..p {
        let col = a.slice(s![k.., k]).to_owned();
        let norm = col.dot(&col).sqrt();
        let pivot = if norm > 0.0 {
            -col[0].signum() * norm
        } else {
            0.0
        };
        // R's diagonal after reflection; a vanishing pivot means this column
        // lies in the span of the earlier ones.
        if norm <= RANK_TOL * max_diag.max(1.0) {
            return Err(AnalysisError::RankDeficient(format!(
                "design column '{}' is collinear with the preceding columns",
                column_names[k]
            )));
        }
        max_diag = max_diag.max(norm);

        let mut v = col;
        v[0] -= pivot;
        let vtv = v.dot(&v);
        if vtv > 0.0 {
            let beta = 2.0 / vtv;
            for j in k..p {
                let dot = v.dot(&a.slice(s![k.., j]));
                let scale = beta * dot;
                for (idx, vi) in v.iter().enumerate() {
                    a[[k + idx, j]] -= scale * vi;
                }
            }
        }
        vs.push(v);
    }

    let mut r = Array2::zeros((p, p));
    for i in 0..p {
        for j in i..p {
            r[[i, j]] = a[[i, j]];
        }
    }
    Ok(Householder { vs, r })
}

impl Householder {
    /// Apply Q' in place to a length-n vector.
    fn apply_qt(&self, w: &mut Array1<f64>) {
        for (k, v) in self.vs.iter().enumerate() {
            let vtv = v.dot(v);
            if vtv == 0.0 {
                continue;
            }
            let beta = 2.0 / vtv;
            let dot: f64 = v
                .iter()
                .enumerate()
                .map(|(idx, vi)| vi * w[k + idx])
                .sum();
            let scale = beta * dot;
            for (idx, vi) in v.iter().enumerate() {
                w[k + idx] -= scale * vi;
            }
        }
    }

    /// Apply Q in place (reflections in reverse order).
    fn apply_q(&self, w: &mut Array1<f64>) {
        for (k, v) in self.vs.iter().enumerate().rev() {
            let vtv = v.dot(v);
            if vtv == 0.0 {
                continue;
            }
            let beta = 2.0 / vtv;
            let dot: f64 = v
                .iter()
                .enumerate()
                .map(|(idx, vi)| vi * w[k + idx])
                .sum();
            let scale = beta * dot;
            for (idx, vi) in v.iter().enumerate() {
                w[k + idx] -= scale * vi;
            }
        }
    }
}

/// Back-substitute R b = rhs for an upper-triangular R.
fn back_substitute(r: &Array2<f64>, rhs: &Array1<f64>) -> Array1<f64> {
    let p = r.nrows();
    let mut b = Array1::zeros(p);
    for i in (0..p).rev() {
        let mut acc = rhs[i];
        for j in i + 1..p {
            acc -= r[[i, j]] * b[j];
        }
        b[i] = acc / r[[i, i]];
    }
    b
}

/// Invert an upper-triangular matrix by back substitution per column.
fn invert_upper(r: &Array2<f64>) -> Array2<f64> {
    let p = r.nrows();
    let mut inv = Array2::zeros((p, p));
    for j in 0..p {
        let mut e = Array1::zeros(p);
        e[j] = 1.0;
        let col = back_substitute(r, &e);
        inv.slice_mut(s![.., j]).assign(&col);
    }
    inv
}

/// Two-sided p-value for a t-statistic with `df` degrees of freedom.
pub(crate) fn two_sided_p(t: f64, df: usize) -> f64 {
    if !t.is_finite() {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df as f64) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => f64::NAN,
    }
}

/// Centered R-squared of a plain least-squares regression of `y` on `x`.
///
/// Used by the collinearity diagnostics for the auxiliary regressions; the
/// first column of `x` is expected to be an intercept.
pub(crate) fn auxiliary_r_squared(
    x: &Array2<f64>,
    y: &Array1<f64>,
    column_names: &[String],
) -> Result<f64> {
    let p = x.ncols();
    let qr = householder(x, column_names)?;
    let mut qty = y.clone();
    qr.apply_qt(&mut qty);
    let rss: f64 = qty.slice(s![p..]).iter().map(|v| v * v).sum();
    let n = y.len() as f64;
    let mean = y.sum() / n;
    let tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if tss == 0.0 {
        return Err(AnalysisError::Degenerate(
            "auxiliary regression outcome has zero variance".to_string(),
        ));
    }
    Ok(1.0 - rss / tss)
}

/// Fit the model on a complete-case design matrix.
pub fn fit(design: &DesignMatrix) -> Result<OlsFit> {
    let (n, p) = design.x.dim();
    if n <= p {
        return Err(AnalysisError::Degenerate(format!(
            "residual degrees of freedom would be {} (n = {}, p = {})",
            n as i64 - p as i64,
            n,
            p
        )));
    }
    let df_resid = n - p;

    let qr = householder(&design.x, &design.column_names)?;

    let mut qty_full = design.y.clone();
    qr.apply_qt(&mut qty_full);
    let qty = qty_full.slice(s![..p]).to_owned();

    let coef = back_substitute(&qr.r, &qty);
    let fitted = design.x.dot(&coef);
    let residuals = &design.y - &fitted;

    let rss: f64 = qty_full.slice(s![p..]).iter().map(|v| v * v).sum();
    let y_mean = design.y.sum() / n as f64;
    let tss: f64 = design.y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let sigma2 = rss / df_resid as f64;

    let r_inv = invert_upper(&qr.r);
    let xtx_inv = r_inv.dot(&r_inv.t());

    let mut se = Array1::zeros(p);
    let mut t = Array1::zeros(p);
    let mut p_values = Array1::zeros(p);
    for j in 0..p {
        se[j] = (xtx_inv[[j, j]] * sigma2).sqrt();
        t[j] = if se[j] > 0.0 {
            coef[j] / se[j]
        } else {
            f64::INFINITY
        };
        p_values[j] = two_sided_p(t[j], df_resid);
    }

    // Hat diagonal: squared row norms of the thin Q.
    let mut leverage = Array1::zeros(n);
    for j in 0..p {
        let mut e = Array1::zeros(n);
        e[j] = 1.0;
        qr.apply_q(&mut e);
        for i in 0..n {
            leverage[i] += e[i] * e[i];
        }
    }

    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN };
    let adj_r_squared = if tss > 0.0 {
        1.0 - (rss / df_resid as f64) / (tss / (n - 1) as f64)
    } else {
        f64::NAN
    };

    Ok(OlsFit {
        coef,
        se,
        t,
        p_values,
        fitted,
        residuals,
        df_resid,
        sigma2,
        rss,
        tss,
        r_squared,
        adj_r_squared,
        xtx_inv,
        leverage,
        qty,
    })
}
