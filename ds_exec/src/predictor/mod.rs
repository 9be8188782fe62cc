//! # Path predictor
//!
//! Periodically rolls the limit cycle forward from the latest pose to show where the controlled
//! point is heading. The roll-out uses the raw control law, without the velocity clamp or the
//! filter, and never writes back into the shared state.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::{
    sync::{
        mpsc::{self, SendError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{info, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    cycle_ds::{CycleDs, Params},
    output::OutputSink,
    shared::{Shared, SharedError},
};

use self::worker::worker_thread;
pub use self::worker::WorkerSignal;

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod worker;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Upper bound on the number of points in a predicted path.
pub const MAX_PATH_POINTS: usize = 200;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Parameters of the predictor, the `[predictor]` table of `ds.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictorParams {
    /// Number of points in the predicted path, including the start point
    pub num_points: usize,

    /// Integration step between two points.
    ///
    /// Units: seconds
    pub step_s: f64,

    /// Time between two predictions.
    ///
    /// Units: seconds
    pub period_s: f64,
}

/// Handle to the predictor thread.
#[derive(Debug)]
pub struct Predictor {
    worker_jh: Option<JoinHandle<Result<(), PredictorError>>>,
    worker_sender: Sender<WorkerSignal>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("Invalid number of path points {0}, expected between 1 and {}", MAX_PATH_POINTS)]
    InvalidNumPoints(usize),

    #[error("The prediction step must be greater than zero, found {0}")]
    InvalidStep(f64),

    #[error("The prediction period must be greater than zero, found {0}")]
    InvalidPeriod(f64),

    #[error("Could not start the predictor thread: {0}")]
    SpawnError(std::io::Error),

    #[error("Could not signal the predictor thread")]
    SendError,

    #[error("The predictor thread panicked")]
    WorkerPanicked,

    #[error("Shared state error: {0}")]
    SharedError(SharedError),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl PredictorParams {
    pub fn validate(&self) -> Result<(), PredictorError> {
        if self.num_points == 0 || self.num_points > MAX_PATH_POINTS {
            return Err(PredictorError::InvalidNumPoints(self.num_points));
        }
        if !(self.step_s.is_finite() && self.step_s > 0.0) {
            return Err(PredictorError::InvalidStep(self.step_s));
        }
        self.period()?;

        Ok(())
    }

    /// The prediction period as a `Duration`.
    pub fn period(&self) -> Result<Duration, PredictorError> {
        if !(self.period_s > 0.0) {
            return Err(PredictorError::InvalidPeriod(self.period_s));
        }

        Duration::try_from_secs_f64(self.period_s)
            .map_err(|_| PredictorError::InvalidPeriod(self.period_s))
    }
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            num_points: MAX_PATH_POINTS,
            step_s: 0.05,
            period_s: 0.1,
        }
    }
}

impl Predictor {
    /// Start the predictor thread.
    pub fn spawn(
        shared: Arc<Shared>,
        sink: Arc<dyn OutputSink>,
        params: PredictorParams
    ) -> Result<Self, PredictorError> {
        params.validate()?;

        let (worker_sender, worker_reciever) = mpsc::channel();

        let worker_jh = thread::Builder::new()
            .name("ds::predictor".into())
            .spawn(move || worker_thread(shared, sink, params, worker_reciever))
            .map_err(PredictorError::SpawnError)?;

        info!(
            "Predictor started, {} points every {} s",
            params.num_points,
            params.period_s
        );

        Ok(Self {
            worker_jh: Some(worker_jh),
            worker_sender,
        })
    }

    /// Request a prediction now rather than at the end of the current period.
    pub fn trigger(&self) -> Result<(), PredictorError> {
        self.worker_sender.send(WorkerSignal::Predict)?;
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Calling `stop` on an already stopped predictor does nothing.
    pub fn stop(&mut self) -> Result<(), PredictorError> {
        let jh = match self.worker_jh.take() {
            Some(jh) => jh,
            None => return Ok(())
        };

        // The worker may already have exited on an error, in which case the send fails and the
        // join reports why
        self.worker_sender.send(WorkerSignal::Stop).ok();

        let result = jh.join().map_err(|_| PredictorError::WorkerPanicked)?;
        info!("Predictor stopped");

        result
    }
}

impl Drop for Predictor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Predictor exited with an error: {}", e);
        }
    }
}

impl From<SendError<WorkerSignal>> for PredictorError {
    fn from(_: SendError<WorkerSignal>) -> Self {
        Self::SendError
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Roll the limit cycle forward from `start_m` with explicit Euler steps of `step_s`.
///
/// The returned path starts with `start_m` and holds `num_points` points, capped at
/// [`MAX_PATH_POINTS`].
pub fn predict_path(
    ds: &CycleDs,
    start_m: &Vector3<f64>,
    target_m: &Vector3<f64>,
    params: &Params,
    num_points: usize,
    step_s: f64
) -> Vec<Vector3<f64>> {
    let num_points = num_points.min(MAX_PATH_POINTS);
    let mut path = Vec::with_capacity(num_points);

    let mut p = *start_m;
    for _ in 0..num_points {
        path.push(p);
        p += ds.velocity(&p, target_m, params) * step_s;
    }

    path
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cycle_ds::CyclePlane,
        loc::Pose,
        output::OutputError,
    };
    use comms_if::ds::DsOutput;
    use std::{sync::Mutex, time::Duration};

    fn params() -> Params {
        Params {
            target_offset_m: Vector3::zeros(),
            radius_m: 0.5,
            radius_scale: 1.0,
            angular_speed_rads: 1.0,
            speed_offset_rads: 0.0,
            convergence_rate: 2.0,
            convergence_rate_scale: 1.0,
            velocity_limit_ms: 1.0,
            filter_wn: 5.0,
        }
    }

    #[derive(Default)]
    struct PathSink {
        paths: Mutex<Vec<Vec<[f64; 3]>>>,
    }

    impl OutputSink for PathSink {
        fn send(&self, msg: DsOutput) -> Result<(), OutputError> {
            if let DsOutput::Path(p) = msg {
                self.paths.lock()?.push(p);
            }
            Ok(())
        }
    }

    #[test]
    fn test_params_validation() {
        assert!(PredictorParams::default().validate().is_ok());

        let p = PredictorParams { num_points: MAX_PATH_POINTS + 1, ..Default::default() };
        assert!(matches!(p.validate(), Err(PredictorError::InvalidNumPoints(201))));

        let p = PredictorParams { num_points: 0, ..Default::default() };
        assert!(matches!(p.validate(), Err(PredictorError::InvalidNumPoints(0))));

        let p = PredictorParams { step_s: 0.0, ..Default::default() };
        assert!(matches!(p.validate(), Err(PredictorError::InvalidStep(_))));

        let p = PredictorParams { period_s: f64::NAN, ..Default::default() };
        assert!(matches!(p.validate(), Err(PredictorError::InvalidPeriod(_))));

        // Too long to be represented as a Duration
        let p = PredictorParams { period_s: 1e30, ..Default::default() };
        assert!(matches!(p.validate(), Err(PredictorError::InvalidPeriod(_))));
        assert_eq!(
            PredictorParams::default().period().unwrap(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_path_bounds() {
        let ds = CycleDs::default();
        let start = Vector3::new(1.0, 0.0, 0.3);

        let path = predict_path(&ds, &start, &Vector3::zeros(), &params(), 50, 0.01);
        assert_eq!(path.len(), 50);
        assert_eq!(path[0], start);

        let path = predict_path(&ds, &start, &Vector3::zeros(), &params(), 1000, 0.01);
        assert_eq!(path.len(), MAX_PATH_POINTS);
    }

    #[test]
    fn test_path_approaches_cycle() {
        let ds = CycleDs::default();
        let path = predict_path(
            &ds,
            &Vector3::new(2.0, 0.0, 0.5),
            &Vector3::zeros(),
            &params(),
            MAX_PATH_POINTS,
            0.02
        );

        let err = |p: &Vector3<f64>| {
            let (r, out) = ds.plane().decompose(p);
            (r.norm() - 0.5).abs() + out.abs()
        };

        let first = err(&path[0]);
        let last = err(&path[path.len() - 1]);
        assert!(last < 0.05 * first, "first {} last {}", first, last);
    }

    #[test]
    fn test_worker_publishes_paths() {
        let shared = Arc::new(
            Shared::new(params(), Vector3::zeros(), CyclePlane::xy()).unwrap()
        );
        let sink = Arc::new(PathSink::default());

        let mut predictor = Predictor::spawn(
            shared.clone(),
            sink.clone(),
            PredictorParams { num_points: 20, step_s: 0.05, period_s: 0.01 }
        ).unwrap();

        // Without a pose nothing is published
        predictor.trigger().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(sink.paths.lock().unwrap().is_empty());

        shared.set_pose(Pose::from_position(Vector3::new(1.0, 1.0, 0.0))).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        predictor.stop().unwrap();

        let paths = sink.paths.lock().unwrap();
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.len() == 20 && p[0] == [1.0, 1.0, 0.0]));
    }

    #[test]
    fn test_stop_twice() {
        let shared = Arc::new(
            Shared::new(params(), Vector3::zeros(), CyclePlane::xy()).unwrap()
        );
        let mut predictor = Predictor::spawn(
            shared,
            Arc::new(PathSink::default()),
            PredictorParams::default()
        ).unwrap();

        assert!(predictor.stop().is_ok());
        assert!(predictor.stop().is_ok());
        assert!(matches!(predictor.trigger(), Err(PredictorError::SendError)));
    }
}
