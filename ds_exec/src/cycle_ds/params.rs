//! Cycle DS parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::ds::ReconfigureMsg;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use util::convert::Convert;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Live-tunable parameters of the limit cycle.
///
/// A `Params` value is always replaced as a whole, never field by field, so a reader holding a
/// copy sees one consistent set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Offset added to the cycle centre to obtain the target.
    ///
    /// Units: meters
    #[serde(default = "zero_offset")]
    pub target_offset_m: Vector3<f64>,

    /// Radius of the limit cycle.
    ///
    /// Units: meters
    pub radius_m: f64,

    /// Multiplier applied to `radius_m`.
    #[serde(default = "unit_scale")]
    pub radius_scale: f64,

    /// Angular speed along the cycle, positive values rotate counter-clockwise about the plane
    /// normal.
    ///
    /// Units: radians/second
    pub angular_speed_rads: f64,

    /// Constant added to `angular_speed_rads`.
    ///
    /// Units: radians/second
    #[serde(default)]
    pub speed_offset_rads: f64,

    /// Rate at which the point converges onto the cycle and its plane.
    ///
    /// Units: 1/seconds
    pub convergence_rate: f64,

    /// Multiplier applied to `convergence_rate`.
    #[serde(default = "unit_scale")]
    pub convergence_rate_scale: f64,

    /// Maximum norm of the raw velocity command.
    ///
    /// Units: meters/second
    pub velocity_limit_ms: f64,

    /// Natural frequency of the command filter.
    ///
    /// Units: radians/second
    pub filter_wn: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a parameter set is rejected.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Parameter {0} is not a finite number")]
    NotFinite(&'static str),

    #[error("Cycle radius must not be negative, found {0}")]
    NegativeRadius(f64),

    #[error("Radius scale must be greater than zero, found {0}")]
    NonPositiveRadiusScale(f64),

    #[error("Convergence rate must not be negative, found {0}")]
    NegativeConvergenceRate(f64),

    #[error("Convergence rate scale must be greater than zero, found {0}")]
    NonPositiveConvergenceScale(f64),

    #[error("Velocity limit must be greater than zero, found {0}")]
    NonPositiveVelocityLimit(f64),

    #[error("Filter natural frequency must be greater than zero, found {0}")]
    NonPositiveFilterWn(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check every field, returning the first violation found.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let fields = [
            ("target_offset_m.x", self.target_offset_m[0]),
            ("target_offset_m.y", self.target_offset_m[1]),
            ("target_offset_m.z", self.target_offset_m[2]),
            ("radius_m", self.radius_m),
            ("radius_scale", self.radius_scale),
            ("angular_speed_rads", self.angular_speed_rads),
            ("speed_offset_rads", self.speed_offset_rads),
            ("convergence_rate", self.convergence_rate),
            ("convergence_rate_scale", self.convergence_rate_scale),
            ("velocity_limit_ms", self.velocity_limit_ms),
            ("filter_wn", self.filter_wn),
        ];
        if let Some(&(name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ParamsError::NotFinite(name));
        }

        if self.radius_m < 0.0 {
            return Err(ParamsError::NegativeRadius(self.radius_m));
        }
        if self.radius_scale <= 0.0 {
            return Err(ParamsError::NonPositiveRadiusScale(self.radius_scale));
        }
        if self.convergence_rate < 0.0 {
            return Err(ParamsError::NegativeConvergenceRate(self.convergence_rate));
        }
        if self.convergence_rate_scale <= 0.0 {
            return Err(ParamsError::NonPositiveConvergenceScale(self.convergence_rate_scale));
        }
        if self.velocity_limit_ms <= 0.0 {
            return Err(ParamsError::NonPositiveVelocityLimit(self.velocity_limit_ms));
        }
        if self.filter_wn <= 0.0 {
            return Err(ParamsError::NonPositiveFilterWn(self.filter_wn));
        }

        Ok(())
    }

    /// Radius after scaling.
    pub fn effective_radius_m(&self) -> f64 {
        self.radius_m * self.radius_scale
    }

    /// Convergence rate after scaling.
    pub fn effective_convergence_rate(&self) -> f64 {
        self.convergence_rate * self.convergence_rate_scale
    }

    /// Speed along the cycle including the offset.
    pub fn effective_speed_rads(&self) -> f64 {
        self.angular_speed_rads + self.speed_offset_rads
    }
}

impl From<&ReconfigureMsg> for Params {
    fn from(msg: &ReconfigureMsg) -> Self {
        Self {
            target_offset_m: msg.target_offset_m.convert(),
            radius_m: msg.radius_m,
            radius_scale: msg.radius_scale,
            angular_speed_rads: msg.angular_speed_rads,
            speed_offset_rads: msg.speed_offset_rads,
            convergence_rate: msg.convergence_rate,
            convergence_rate_scale: msg.convergence_rate_scale,
            velocity_limit_ms: msg.velocity_limit_ms,
            filter_wn: msg.filter_wn,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn unit_scale() -> f64 {
    1.0
}

fn zero_offset() -> Vector3<f64> {
    Vector3::zeros()
}
