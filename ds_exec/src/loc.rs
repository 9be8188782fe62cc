//! # Localisation module
//!
//! Holds the sensed state of the controlled point and of the tracked object, as they are received
//! from the input transport.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::ds::ObjectStateMsg;
use nalgebra::{UnitQuaternion, Vector3};
use util::convert::Convert;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose of the controlled point.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Pose {
    /// The position in meters
    pub position_m: Vector3<f64>,

    /// The attitude, if the pose source provides one. It is never used by the control law, and is
    /// published as the orientation output when no desired orientation has been set.
    pub attitude_q: Option<UnitQuaternion<f64>>
}

/// The state of the tracked object the limit cycle can be centred on.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ObjectState {
    /// Object position in meters
    pub position_m: Vector3<f64>,

    /// Object velocity in meters/second, kept for diagnostics only
    pub velocity_ms: Vector3<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Build a pose with no attitude.
    pub fn from_position(position_m: Vector3<f64>) -> Self {
        Self {
            position_m,
            attitude_q: None
        }
    }
}

impl From<&ObjectStateMsg> for ObjectState {
    fn from(msg: &ObjectStateMsg) -> Self {
        Self {
            position_m: msg.position_m.convert(),
            velocity_ms: msg.velocity_ms.convert()
        }
    }
}
