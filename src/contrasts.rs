//! Orthogonal contrast codings for the categorical factors.
//!
//! A factor with k levels contributes k-1 contrast columns to the design
//! matrix. Every column here sums to zero across levels (orthogonal to the
//! intercept) and the columns of one factor are mutually orthogonal, so the
//! sequential ANOVA decomposition attributes variance cleanly per term.

use ndarray::Array2;

/// Custom 2-df coding for the 3-level framing factor.
///
/// Column 0 compares self-enhancing (level 3) against control (level 1):
/// `[-1/2, 0, 1/2]`. Column 1 compares pro-environmental against the other
/// two: `[-1/3, 2/3, -1/3]`.
pub fn framing_contrasts() -> Array2<f64> {
    ndarray::arr2(&[
        [-0.5, -1.0 / 3.0],
        [0.0, 2.0 / 3.0],
        [0.5, -1.0 / 3.0],
    ])
}

/// Helmert coding for a k-level factor.
///
/// Contrast j compares level j+2 against the mean of levels 1..=j+1:
/// rows 0..=j carry -1, row j+1 carries j+1, later rows carry 0.
pub fn helmert(k: usize) -> Array2<f64> {
    let mut m = Array2::zeros((k, k - 1));
    for j in 0..k - 1 {
        for i in 0..=j {
            m[[i, j]] = -1.0;
        }
        m[[j + 1, j]] = (j + 1) as f64;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_sums(m: &Array2<f64>) -> Vec<f64> {
        (0..m.ncols()).map(|j| m.column(j).sum()).collect()
    }

    fn dot(m: &Array2<f64>, a: usize, b: usize) -> f64 {
        m.column(a).dot(&m.column(b))
    }

    #[test]
    fn framing_columns_sum_to_zero() {
        let m = framing_contrasts();
        for s in column_sums(&m) {
            assert!(s.abs() < 1e-12);
        }
    }

    #[test]
    fn framing_columns_are_orthogonal() {
        let m = framing_contrasts();
        assert!(dot(&m, 0, 1).abs() < 1e-12);
    }

    #[test]
    fn framing_primary_contrast_is_level3_vs_level1() {
        let m = framing_contrasts();
        assert_eq!(m[[0, 0]], -0.5);
        assert_eq!(m[[1, 0]], 0.0);
        assert_eq!(m[[2, 0]], 0.5);
    }

    #[test]
    fn helmert5_columns_sum_to_zero_and_are_orthogonal() {
        let m = helmert(5);
        assert_eq!(m.ncols(), 4);
        for s in column_sums(&m) {
            assert!(s.abs() < 1e-12);
        }
        for a in 0..4 {
            for b in a + 1..4 {
                assert!(dot(&m, a, b).abs() < 1e-12, "columns {} and {}", a, b);
            }
        }
    }

    #[test]
    fn helmert_compares_each_level_to_mean_of_earlier() {
        let m = helmert(4);
        // Third contrast: level 4 vs levels 1-3.
        assert_eq!(m[[0, 2]], -1.0);
        assert_eq!(m[[1, 2]], -1.0);
        assert_eq!(m[[2, 2]], -1.0);
        assert_eq!(m[[3, 2]], 3.0);
    }
}
