//! # Limit cycle control law
//!
//! Maps a position to the velocity that drives it onto the limit cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;

use super::{CyclePlane, Params};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The limit cycle dynamical system.
///
/// Holds only the construction-time geometry. Everything tunable is passed in as a `Params`
/// snapshot on each evaluation, so a single `CycleDs` can be shared by the control loop and the
/// path predictor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleDs {
    plane: CyclePlane
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CycleDs {
    pub fn new(plane: CyclePlane) -> Self {
        Self { plane }
    }

    pub fn plane(&self) -> &CyclePlane {
        &self.plane
    }

    /// Desired velocity at `position_m` for a cycle centred on `target_m`, using the effective
    /// values of `params`.
    pub fn velocity(
        &self,
        position_m: &Vector3<f64>,
        target_m: &Vector3<f64>,
        params: &Params
    ) -> Vector3<f64> {
        limit_cycle_velocity(
            &self.plane,
            position_m,
            target_m,
            params.effective_radius_m(),
            params.angular_speed_rads,
            params.speed_offset_rads,
            params.effective_convergence_rate()
        )
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the limit cycle velocity.
///
/// With `r` the in-plane offset of the position from the target and `rho = |r|`, the in-plane
/// velocity is
///
/// ```text
/// v = (angular_speed + speed_offset) * (n x r/rho) + convergence_rate * (radius - rho) * r/rho
/// ```
///
/// and the out-of-plane velocity is `convergence_rate * (target - position) . n`.
///
/// When `rho` is zero both in-plane directions are undefined and the in-plane contribution is
/// zero, so the output is never NaN.
pub fn limit_cycle_velocity(
    plane: &CyclePlane,
    position_m: &Vector3<f64>,
    target_m: &Vector3<f64>,
    radius_m: f64,
    angular_speed_rads: f64,
    speed_offset_rads: f64,
    convergence_rate: f64
) -> Vector3<f64> {
    let normal = plane.normal().into_inner();
    let (r, out_of_plane) = plane.decompose(&(position_m - target_m));

    // Proportional pull back into the target's plane
    let mut vel = normal * (-convergence_rate * out_of_plane);

    let rho = r.norm();
    if rho > f64::EPSILON {
        let radial_dir = r / rho;
        let tangent_dir = normal.cross(&radial_dir);

        vel += tangent_dir * (angular_speed_rads + speed_offset_rads);
        vel += radial_dir * (convergence_rate * (radius_m - rho));
    }

    vel
}
