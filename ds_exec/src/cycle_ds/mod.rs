//! # Cycle DS
//!
//! The limit cycle dynamical system. Given the position of the controlled point and the centre of
//! the cycle (the target) it produces the velocity that moves the point onto a circle of the
//! configured radius in the cycle's plane, and then around that circle at the configured angular
//! speed.
//!
//! The module is pure computation: it holds no shared state and performs no I/O, so the control
//! loop and the path predictor both evaluate it against their own parameter snapshots.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod law;
mod params;
mod plane;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use law::{CycleDs, limit_cycle_velocity};
pub use params::{Params, ParamsError};
pub use plane::CyclePlane;
