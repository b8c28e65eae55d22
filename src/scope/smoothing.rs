use ndarray::{Array2, ArrayView1};

use crate::scope::error::ScopeError;

/// Smoothing window length in samples. Must be odd.
pub const SMOOTH_WINDOW: usize = 11;
/// Fit polynomial order. Must be smaller than the window.
pub const SMOOTH_ORDER: usize = 2;

/// Checks the window/order contract without touching any data. Called once
/// at session construction so a bad configuration fails before the first
/// channel is read.
pub fn validate(window: usize, order: usize) -> Result<(), ScopeError> {
    if window % 2 == 0 {
        return Err(ScopeError::InvalidSmoothingParameters {
            window,
            order,
            reason: "window must be odd".to_string(),
        });
    }
    if window <= order {
        return Err(ScopeError::InvalidSmoothingParameters {
            window,
            order,
            reason: "order must be smaller than the window".to_string(),
        });
    }
    Ok(())
}

/// Savitzky-Golay smoothing: a least-squares polynomial fit over a sliding
/// centered window, same output length as the input.
///
/// Interior samples use the center row of the projection matrix
/// `H = A (A^T A)^-1 A^T`; the first and last `window/2` samples evaluate the
/// polynomial fitted to the first/last full window (the "interp" boundary
/// convention).
pub fn smooth(series: &[f64], window: usize, order: usize) -> Result<Vec<f64>, ScopeError> {
    validate(window, order)?;
    if series.len() < window {
        return Err(ScopeError::InvalidSmoothingParameters {
            window,
            order,
            reason: format!("series has {} samples, need at least {window}", series.len()),
        });
    }
    let projection = projection_matrix(window, order).ok_or_else(|| {
        ScopeError::InvalidSmoothingParameters {
            window,
            order,
            reason: "normal equations are singular".to_string(),
        }
    })?;
    let half = window / 2;
    let len = series.len();
    let mut out = vec![0.0; len];
    for i in half..len - half {
        out[i] = dot(projection.row(half), &series[i - half..i + half + 1]);
    }
    for i in 0..half {
        out[i] = dot(projection.row(i), &series[..window]);
        out[len - half + i] = dot(projection.row(half + 1 + i), &series[len - window..]);
    }
    Ok(out)
}

/// `H = A (A^T A)^-1 A^T` for a Vandermonde design matrix centered on the
/// window. Row `r` of `H` evaluates the window's fit at sample position `r`.
fn projection_matrix(window: usize, order: usize) -> Option<Array2<f64>> {
    let half = (window / 2) as f64;
    let mut design = Array2::<f64>::zeros((window, order + 1));
    for r in 0..window {
        let x = r as f64 - half;
        let mut power = 1.0;
        for c in 0..=order {
            design[[r, c]] = power;
            power *= x;
        }
    }
    let gram = design.t().dot(&design);
    let inverse = invert(&gram)?;
    Some(design.dot(&inverse).dot(&design.t()))
}

/// Gauss-Jordan inverse with partial pivoting; the matrices here are tiny
/// ((order+1) x (order+1)) so nothing fancier is warranted.
fn invert(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    let mut work = matrix.clone();
    let mut inverse = Array2::<f64>::eye(n);
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| {
            work[[a, col]]
                .abs()
                .partial_cmp(&work[[b, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if work[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for k in 0..n {
                work.swap([pivot_row, k], [col, k]);
                inverse.swap([pivot_row, k], [col, k]);
            }
        }
        let pivot = work[[col, col]];
        for k in 0..n {
            work[[col, k]] /= pivot;
            inverse[[col, k]] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                work[[row, k]] -= factor * work[[col, k]];
                inverse[[row, k]] -= factor * inverse[[col, k]];
            }
        }
    }
    Some(inverse)
}

fn dot(coefficients: ArrayView1<f64>, segment: &[f64]) -> f64 {
    coefficients
        .iter()
        .zip(segment)
        .map(|(c, s)| c * s)
        .sum()
}
