//! Coordinate transform T(x) = x - delta(x).
//!
//! Applies a fitted [`DriftModel`] to distance values, re-expressing them in
//! the secondary survey's coordinate frame. The transform is a pure function
//! of the model: it never mutates it and works for distances from surveys
//! that were not used in the fit.

use rayon::prelude::*;

use super::drift::DriftModel;

/// Correct a single distance: `x - delta(x)`.
#[inline]
pub fn correct(model: &DriftModel, x: f64) -> f64 {
    x - model.evaluate(x)
}

/// Correct a slice of distances.
///
/// Output length equals input length. Parallelized; the model is shared
/// read-only across threads.
pub fn correct_all(model: &DriftModel, xs: &[f64]) -> Vec<f64> {
    xs.par_iter().map(|&x| correct(model, x)).collect()
}

/// Correct a slice of optional distances, propagating missing and
/// non-finite inputs as missing outputs.
pub fn correct_optional(model: &DriftModel, xs: &[Option<f64>]) -> Vec<Option<f64>> {
    xs.par_iter()
        .map(|x| x.filter(|v| v.is_finite()).map(|v| correct(model, v)))
        .collect()
}
