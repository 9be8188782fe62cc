//! Plane containing the limit cycle

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Unit, Vector3};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The plane the limit cycle lies in, described by its unit normal.
///
/// Positions are split into an in-plane part, which is driven onto the circle, and a scalar
/// out-of-plane part, which is driven to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclePlane {
    normal: Unit<Vector3<f64>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CyclePlane {
    /// Create a plane from a (not necessarily unit) normal vector.
    ///
    /// Returns `None` if the normal is zero or not finite.
    pub fn new(normal: Vector3<f64>) -> Option<Self> {
        if !normal.iter().all(|n| n.is_finite()) {
            return None;
        }

        Unit::try_new(normal, f64::EPSILON).map(|normal| Self { normal })
    }

    /// Horizontal plane, normal along +Z.
    pub fn xy() -> Self {
        Self {
            normal: Vector3::z_axis()
        }
    }

    /// The plane's unit normal.
    pub fn normal(&self) -> &Unit<Vector3<f64>> {
        &self.normal
    }

    /// Split `v` into its in-plane vector and out-of-plane scalar component.
    pub fn decompose(&self, v: &Vector3<f64>) -> (Vector3<f64>, f64) {
        let out = self.normal.dot(v);

        (v - self.normal.into_inner() * out, out)
    }
}

impl Default for CyclePlane {
    fn default() -> Self {
        Self::xy()
    }
}
