//! Implements `Convert` functions between wire arrays and `nalgebra` types.
//!
//! Messages on the network carry plain arrays so that non-rust peers can
//! produce and consume them. Quaternions are stored as `[x, y, z, w]`.
//!
//! Arrays received from the network are not trusted to hold a rotation, so
//! the array to quaternion direction is the fallible [`try_unit_quaternion`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Quaternions with a norm at or below this can't be normalised into a rotation.
pub const MIN_QUATERNION_NORM: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Convert<O> {
    fn convert(&self) -> O;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Convert<Vector3<f64>> for [f64; 3] {
    fn convert(&self) -> Vector3<f64> {
        Vector3::new(self[0], self[1], self[2])
    }
}

impl Convert<[f64; 3]> for Vector3<f64> {
    fn convert(&self) -> [f64; 3] {
        [self[0], self[1], self[2]]
    }
}

impl Convert<[f64; 4]> for UnitQuaternion<f64> {
    fn convert(&self) -> [f64; 4] {
        let q = self.quaternion();
        [q.i, q.j, q.k, q.w]
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Normalise a wire quaternion `[x, y, z, w]` into a rotation.
///
/// Returns `None` if any element is not finite or the norm is not above
/// [`MIN_QUATERNION_NORM`].
pub fn try_unit_quaternion(q: &[f64; 4]) -> Option<UnitQuaternion<f64>> {
    if !q.iter().all(|x| x.is_finite()) {
        return None;
    }

    UnitQuaternion::try_new(Quaternion::new(q[3], q[0], q[1], q[2]), MIN_QUATERNION_NORM)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quaternion_order() {
        // 90 degrees about Z
        let half = std::f64::consts::FRAC_PI_4;
        let wire = [0.0, 0.0, half.sin(), half.cos()];

        let q = try_unit_quaternion(&wire).unwrap();
        assert_relative_eq!(q.euler_angles().2, std::f64::consts::FRAC_PI_2, epsilon = 1e-12);

        let back: [f64; 4] = q.convert();
        for i in 0..4 {
            assert_relative_eq!(back[i], wire[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_unnormalised_quaternion() {
        let q = try_unit_quaternion(&[0.0, 0.0, 0.0, 2.0]).unwrap();
        assert_relative_eq!(q.angle(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.quaternion().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_quaternion() {
        assert!(try_unit_quaternion(&[0.0; 4]).is_none());
        assert!(try_unit_quaternion(&[1e-12, 0.0, 0.0, 0.0]).is_none());
        assert!(try_unit_quaternion(&[0.0, 0.0, f64::NAN, 1.0]).is_none());
        assert!(try_unit_quaternion(&[0.0, f64::INFINITY, 0.0, 1.0]).is_none());
    }
}
