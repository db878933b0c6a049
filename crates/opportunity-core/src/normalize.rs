//! Normalization utilities for opportunity scoring.
//!
//! Every metric feeding the opportunity score is rescaled onto [0, 1] relative to the
//! other candidates of the same run. The result is a relative signal: a value of 1.0
//! means "largest in this candidate set", not "large" in any absolute sense.

/// Value assigned to every element of a degenerate series (all values equal).
pub const DEGENERATE_VALUE: f64 = 0.5;

/// Min-max normalize a series onto [0, 1].
///
/// A degenerate series (`max == min`, which includes a single element) maps every
/// value to 0.5 instead of dividing by zero. An empty series stays empty.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    if span == 0.0 {
        return vec![DEGENERATE_VALUE; values.len()];
    }
    values.iter().map(|v| (v - lo) / span).collect()
}

/// Index of the first NaN or infinite value, if any.
pub fn first_non_finite(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_finite())
}
