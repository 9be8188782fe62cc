//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Clamp each element of `value` into `[-limits[i], limits[i]]`.
///
/// Returns the clamped vector and whether any element was limited.
pub fn clamp_abs_elementwise(value: &Vector3<f64>, limits: &Vector3<f64>) -> (Vector3<f64>, bool) {
    let mut limited = false;
    let mut out = *value;

    for i in 0..3 {
        out[i] = clamp(&value[i], &(-limits[i]), &limits[i]);
        limited |= out[i] != value[i];
    }

    (out, limited)
}

/// Scale `value` down so that its norm does not exceed `max_norm`.
///
/// The direction is preserved. Vectors already within the limit are returned
/// unchanged. Returns the clamped vector and whether it was limited.
pub fn clamp_norm(value: &Vector3<f64>, max_norm: f64) -> (Vector3<f64>, bool) {
    let norm = value.norm();

    if norm > max_norm && norm > 0.0 {
        (value * (max_norm / norm), true)
    }
    else {
        (*value, false)
    }
}
