//! # Shared state
//!
//! State written by the input client and read by the control loop and the path predictor. All of
//! it lives behind a single lock which is only held long enough to copy a snapshot out or to write
//! a new value in, never across a control law evaluation or a filter update.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use nalgebra::{UnitQuaternion, Vector3};

use crate::{
    cycle_ds::{CyclePlane, Params, ParamsError},
    loc::{ObjectState, Pose},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State shared between the DS threads, normally held in an `Arc`.
#[derive(Debug)]
pub struct Shared {
    plane: CyclePlane,

    /// Reconfigurations with a higher `filter_wn` are rejected
    max_filter_wn: f64,

    data: Mutex<SharedData>,
}

#[derive(Debug)]
struct SharedData {
    params: Params,

    /// Configured cycle centre, used until an object is tracked
    center_m: Vector3<f64>,

    object: Option<ObjectState>,

    /// Latest pose and when it was received
    pose: Option<(Pose, Instant)>,

    orientation: Option<UnitQuaternion<f64>>,
}

/// A consistent copy of the shared state taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub params: Params,

    pub plane: CyclePlane,

    /// Centre of the limit cycle, including the target offset.
    ///
    /// Units: meters
    pub target_m: Vector3<f64>,

    /// Latest sensed pose, `None` until the first one is received
    pub pose: Option<Pose>,

    /// Time since `pose` was received
    pub pose_age: Option<Duration>,

    /// Desired orientation to pass through, if one has been received
    pub orientation: Option<UnitQuaternion<f64>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SharedError {
    #[error("Parameters rejected: {0}")]
    Rejected(ParamsError),

    #[error("Filter natural frequency {0} is above {1}, the highest the control rate allows")]
    UnstableFilter(f64, f64),

    #[error("The shared state lock is poisoned")]
    PoisonError,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Shared {
    /// Create the shared state from the construction-time configuration.
    ///
    /// The initial parameters must be valid.
    pub fn new(
        params: Params,
        center_m: Vector3<f64>,
        plane: CyclePlane
    ) -> Result<Self, SharedError> {
        params.validate().map_err(SharedError::Rejected)?;

        Ok(Self {
            plane,
            max_filter_wn: f64::INFINITY,
            data: Mutex::new(SharedData {
                params,
                center_m,
                object: None,
                pose: None,
                orientation: None,
            }),
        })
    }

    /// Bound the `filter_wn` of any parameter set applied from now on.
    ///
    /// The current parameters must already be within the bound.
    pub fn with_max_filter_wn(mut self, max_filter_wn: f64) -> Result<Self, SharedError> {
        let filter_wn = self.data.get_mut()?.params.filter_wn;
        check_filter_wn(filter_wn, max_filter_wn)?;

        self.max_filter_wn = max_filter_wn;
        Ok(self)
    }

    /// Replace the whole parameter set.
    ///
    /// Invalid parameters are rejected and the current set stays in effect.
    pub fn apply(&self, params: Params) -> Result<(), SharedError> {
        params.validate().map_err(SharedError::Rejected)?;
        check_filter_wn(params.filter_wn, self.max_filter_wn)?;

        self.data.lock()?.params = params;

        Ok(())
    }

    /// Take a consistent copy of the current state.
    pub fn snapshot(&self) -> Result<Snapshot, SharedError> {
        let data = self.data.lock()?;

        let center_m = match data.object {
            Some(ref o) => o.position_m,
            None => data.center_m,
        };

        Ok(Snapshot {
            params: data.params,
            plane: self.plane,
            target_m: center_m + data.params.target_offset_m,
            pose: data.pose.map(|(p, _)| p),
            pose_age: data.pose.map(|(_, t)| t.elapsed()),
            orientation: data.orientation,
        })
    }

    /// Store a newly received pose, stamped with the current time.
    pub fn set_pose(&self, pose: Pose) -> Result<(), SharedError> {
        self.data.lock()?.pose = Some((pose, Instant::now()));
        Ok(())
    }

    /// Set the tracked object, the cycle is centred on it from now on.
    pub fn set_object(&self, object: ObjectState) -> Result<(), SharedError> {
        self.data.lock()?.object = Some(object);
        Ok(())
    }

    pub fn set_orientation(&self, orientation: UnitQuaternion<f64>) -> Result<(), SharedError> {
        self.data.lock()?.orientation = Some(orientation);
        Ok(())
    }

    pub fn plane(&self) -> &CyclePlane {
        &self.plane
    }
}

fn check_filter_wn(filter_wn: f64, max_filter_wn: f64) -> Result<(), SharedError> {
    if filter_wn <= max_filter_wn {
        Ok(())
    }
    else {
        Err(SharedError::UnstableFilter(filter_wn, max_filter_wn))
    }
}

impl<G> From<PoisonError<G>> for SharedError {
    fn from(_: PoisonError<G>) -> Self {
        Self::PoisonError
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread};

    fn params(radius_m: f64) -> Params {
        Params {
            target_offset_m: Vector3::zeros(),
            radius_m,
            radius_scale: 1.0,
            angular_speed_rads: 1.0,
            speed_offset_rads: 0.0,
            convergence_rate: 1.0,
            convergence_rate_scale: 1.0,
            velocity_limit_ms: 0.5,
            filter_wn: 5.0,
        }
    }

    fn shared() -> Shared {
        Shared::new(params(0.1), Vector3::new(1.0, 2.0, 0.0), CyclePlane::xy()).unwrap()
    }

    #[test]
    fn test_invalid_initial_params() {
        assert!(matches!(
            Shared::new(params(-0.1), Vector3::zeros(), CyclePlane::xy()),
            Err(SharedError::Rejected(ParamsError::NegativeRadius(_)))
        ));
    }

    #[test]
    fn test_rejected_apply_keeps_previous() {
        let s = shared();

        assert!(matches!(
            s.apply(params(-1.0)),
            Err(SharedError::Rejected(ParamsError::NegativeRadius(_)))
        ));
        assert_eq!(s.snapshot().unwrap().params.radius_m, 0.1);

        s.apply(params(0.3)).unwrap();
        assert_eq!(s.snapshot().unwrap().params.radius_m, 0.3);
    }

    #[test]
    fn test_target_composition() {
        let s = shared();
        let offset = Params { target_offset_m: Vector3::new(0.0, 0.0, 0.5), ..params(0.1) };
        s.apply(offset).unwrap();

        // No object yet, configured centre is used
        assert_eq!(s.snapshot().unwrap().target_m, Vector3::new(1.0, 2.0, 0.5));

        s.set_object(ObjectState {
            position_m: Vector3::new(-1.0, 0.0, 0.2),
            velocity_ms: Vector3::zeros(),
        }).unwrap();
        assert_eq!(s.snapshot().unwrap().target_m, Vector3::new(-1.0, 0.0, 0.7));
    }

    #[test]
    fn test_pose_and_orientation() {
        let s = shared();
        let snap = s.snapshot().unwrap();
        assert!(snap.pose.is_none());
        assert!(snap.orientation.is_none());

        s.set_pose(Pose::from_position(Vector3::new(0.1, 0.2, 0.3))).unwrap();
        s.set_orientation(UnitQuaternion::identity()).unwrap();

        let snap = s.snapshot().unwrap();
        assert_eq!(snap.pose.map(|p| p.position_m), Some(Vector3::new(0.1, 0.2, 0.3)));
        assert_eq!(snap.orientation, Some(UnitQuaternion::identity()));
    }

    #[test]
    fn test_pose_age() {
        let s = shared();
        assert!(s.snapshot().unwrap().pose_age.is_none());

        s.set_pose(Pose::from_position(Vector3::zeros())).unwrap();
        thread::sleep(Duration::from_millis(20));
        let age = s.snapshot().unwrap().pose_age.unwrap();
        assert!(age >= Duration::from_millis(20));

        // A new pose restarts the age
        s.set_pose(Pose::from_position(Vector3::zeros())).unwrap();
        assert!(s.snapshot().unwrap().pose_age.unwrap() < age);
    }

    #[test]
    fn test_max_filter_wn() {
        assert!(matches!(
            shared().with_max_filter_wn(1.0),
            Err(SharedError::UnstableFilter(_, _))
        ));

        let s = shared().with_max_filter_wn(50.0).unwrap();
        assert!(matches!(
            s.apply(Params { filter_wn: 80.0, ..params(0.2) }),
            Err(SharedError::UnstableFilter(_, _))
        ));
        assert_eq!(s.snapshot().unwrap().params, params(0.1));

        s.apply(Params { filter_wn: 40.0, ..params(0.2) }).unwrap();
        assert_eq!(s.snapshot().unwrap().params.filter_wn, 40.0);
    }

    #[test]
    fn test_apply_is_atomic() {
        let a = params(0.1);
        let b = Params {
            target_offset_m: Vector3::new(1.0, 1.0, 1.0),
            radius_m: 0.7,
            radius_scale: 2.0,
            angular_speed_rads: -3.0,
            speed_offset_rads: 0.5,
            convergence_rate: 4.0,
            convergence_rate_scale: 0.5,
            velocity_limit_ms: 2.0,
            filter_wn: 9.0,
        };

        let s = Arc::new(Shared::new(a, Vector3::zeros(), CyclePlane::xy()).unwrap());

        let writer = {
            let s = s.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    s.apply(if i % 2 == 0 { b } else { a }).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4).map(|_| {
            let s = s.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    let p = s.snapshot().unwrap().params;
                    assert!(p == a || p == b, "mixed parameter set observed: {:?}", p);
                }
            })
        }).collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
