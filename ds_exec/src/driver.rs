//! # Control loop driver
//!
//! Runs the limit cycle at a fixed rate. Each cycle takes a snapshot of the shared state, evaluates
//! the control law at the latest pose, clamps and filters the result, and publishes the commands.
//!
//! Velocity commands are withheld until a first pose has been received, and again whenever the
//! latest pose is older than the pose timeout. The target, and the desired orientation if one is
//! set, are published on every cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use comms_if::ds::DsOutput;
use log::{debug, info, trace, warn};
use nalgebra::{UnitQuaternion, Vector3};
use util::{convert::Convert, maths::clamp_norm, module::State, time::frequency_to_period_s};

use crate::{
    cd_filter::{CdFilter, FilterError, FilterParams},
    cycle_ds::{CycleDs, CyclePlane},
    output::OutputSink,
    shared::{Shared, SharedError, Snapshot},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The DS control loop.
#[derive(Debug, Default)]
pub struct Driver {
    state: DriverState,

    ds: CycleDs,

    /// Filter, created by `init`
    filter: Option<CdFilter>,

    period_s: f64,
    period: Duration,

    /// Poses older than this don't produce commands
    pose_timeout: Duration,

    num_cycles: u64,
}

/// Construction-time configuration of the driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverInit {
    /// Rate of the control loop
    pub frequency_hz: f64,

    /// Plane of the limit cycle
    pub plane: CyclePlane,

    /// Initial natural frequency of the filter
    pub filter_wn: f64,

    /// Age after which the latest pose is considered stale.
    ///
    /// Units: seconds
    pub pose_timeout_s: f64,

    /// Filter limits
    pub filter: FilterParams,
}

/// Output of one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputData {
    /// Current target
    pub target_m: Vector3<f64>,

    /// Velocity commands, `None` while there is no fresh pose
    pub command: Option<VelCommand>,

    /// Orientation to pass through, the desired one if set, otherwise the attitude of a fresh pose
    pub orientation: Option<UnitQuaternion<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelCommand {
    /// Control law output after the norm clamp
    pub raw_ms: Vector3<f64>,

    /// Filtered command
    pub filtered_ms: Vector3<f64>,
}

/// Status report for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusReport {
    /// No pose has been received yet, no command was produced
    pub no_pose: bool,

    /// The latest pose is older than the pose timeout, no command was produced
    pub stale_pose: bool,

    /// The raw command was scaled down to the velocity limit
    pub vel_limited: bool,

    /// The filter hit its rate or acceleration limits
    pub filter_limited: bool,

    /// The filter natural frequency was changed before the update
    pub filter_retuned: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialised,
    Ready,
    Running,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Control frequency must be greater than zero and give a representable period, found {0}")]
    InvalidFrequency(f64),

    #[error("Pose timeout must be greater than zero, found {0}")]
    InvalidPoseTimeout(f64),

    #[error("Filter error: {0}")]
    FilterError(FilterError),

    #[error("Shared state error: {0}")]
    SharedError(SharedError),

    #[error("The driver is in the {0:?} state, expected {1:?}")]
    InvalidState(DriverState, DriverState),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DriverState {
    fn default() -> Self {
        DriverState::Uninitialised
    }
}

impl State for Driver {
    type InitData = DriverInit;
    type InitError = DriverError;

    type InputData = Snapshot;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriverError;

    /// Validate the configuration and build the filter.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if self.state == DriverState::Running {
            return Err(DriverError::InvalidState(self.state, DriverState::Uninitialised));
        }

        let period_s = frequency_to_period_s(init_data.frequency_hz)
            .ok_or(DriverError::InvalidFrequency(init_data.frequency_hz))?;
        let period = Duration::try_from_secs_f64(period_s)
            .map_err(|_| DriverError::InvalidFrequency(init_data.frequency_hz))?;

        let pose_timeout = match init_data.pose_timeout_s {
            t if t > 0.0 => Duration::try_from_secs_f64(t)
                .map_err(|_| DriverError::InvalidPoseTimeout(t))?,
            t => return Err(DriverError::InvalidPoseTimeout(t))
        };

        let mut filter = CdFilter::from_params(
            period_s,
            init_data.filter_wn,
            &init_data.filter
        ).map_err(DriverError::FilterError)?;
        filter.reset();

        self.ds = CycleDs::new(init_data.plane);
        self.filter = Some(filter);
        self.period_s = period_s;
        self.period = period;
        self.pose_timeout = pose_timeout;
        self.num_cycles = 0;
        self.state = DriverState::Ready;

        debug!(
            "Driver initialised at {} Hz, filter wn = {}, pose timeout = {} s",
            init_data.frequency_hz,
            init_data.filter_wn,
            init_data.pose_timeout_s
        );

        Ok(())
    }

    /// Compute the commands for one snapshot.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let filter = match self.filter {
            Some(ref mut f) => f,
            None => return Err(DriverError::InvalidState(self.state, DriverState::Ready))
        };

        let mut report = StatusReport::default();
        let params = &input_data.params;

        let mut output = OutputData {
            target_m: input_data.target_m,
            command: None,
            orientation: input_data.orientation,
        };

        let pose = match (input_data.pose, input_data.pose_age) {
            (Some(p), Some(age)) if age <= self.pose_timeout => p,
            (Some(_), _) => {
                // Start again from rest once poses resume
                filter.reset();
                report.stale_pose = true;
                return Ok((output, report));
            },
            (None, _) => {
                report.no_pose = true;
                return Ok((output, report));
            }
        };

        if output.orientation.is_none() {
            output.orientation = pose.attitude_q;
        }

        let raw = self.ds.velocity(&pose.position_m, &input_data.target_m, params);
        let (raw, vel_limited) = clamp_norm(&raw, params.velocity_limit_ms);
        report.vel_limited = vel_limited;

        if params.filter_wn != filter.natural_frequency() {
            filter.set_natural_frequency(params.filter_wn)
                .map_err(DriverError::FilterError)?;
            report.filter_retuned = true;
            debug!("Filter retuned to wn = {}", params.filter_wn);
        }

        let filtered = filter.update(&raw);
        report.filter_limited = filtered.acc_limited || filtered.vel_limited;

        trace!(
            "DS command:\n    pos: {:?}\n    raw: {:?}\n    filt: {:?}",
            pose.position_m.as_slice(),
            raw.as_slice(),
            filtered.value.as_slice()
        );

        output.command = Some(VelCommand {
            raw_ms: raw,
            filtered_ms: filtered.value,
        });

        Ok((output, report))
    }
}

impl Driver {
    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn period_s(&self) -> f64 {
        self.period_s
    }

    pub fn num_cycles(&self) -> u64 {
        self.num_cycles
    }

    /// Execute a single cycle: snapshot, process, publish.
    ///
    /// Publishing errors are logged and do not fail the cycle.
    pub fn cycle(
        &mut self,
        shared: &Shared,
        sink: &dyn OutputSink
    ) -> Result<StatusReport, DriverError> {
        let snapshot = shared.snapshot().map_err(DriverError::SharedError)?;

        let (output, report) = self.proc(&snapshot)?;
        self.num_cycles += 1;

        for msg in output.messages() {
            let topic = msg.topic();
            if let Err(e) = sink.send(msg) {
                warn!("Could not publish {}: {}", topic, e);
            }
        }

        Ok(report)
    }

    /// Run the fixed-rate loop until `run` is cleared.
    ///
    /// Cycle errors are logged and the loop carries on, except for a poisoned shared state which
    /// can't recover and is returned.
    pub fn run(
        &mut self,
        shared: &Shared,
        sink: &dyn OutputSink,
        run: &AtomicBool
    ) -> Result<(), DriverError> {
        if self.state != DriverState::Ready {
            return Err(DriverError::InvalidState(self.state, DriverState::Ready));
        }

        let period = self.period;
        self.state = DriverState::Running;
        info!("Driver running");

        let mut was_gated = false;
        let mut was_stale = false;

        while run.load(Ordering::Relaxed) {
            let cycle_start_instant = Instant::now();

            match self.cycle(shared, sink) {
                Ok(report) => {
                    if report.no_pose && !was_gated {
                        info!("Waiting for the first pose, velocity output withheld");
                    }
                    else if !report.no_pose && was_gated {
                        info!("Pose received, velocity output enabled");
                    }
                    was_gated = report.no_pose;

                    if report.stale_pose && !was_stale {
                        warn!(
                            "Pose older than {:.03} s, velocity output withheld",
                            self.pose_timeout.as_secs_f64()
                        );
                    }
                    else if !report.stale_pose && was_stale {
                        info!("Fresh pose received, velocity output enabled");
                    }
                    was_stale = report.stale_pose;
                },
                Err(DriverError::SharedError(e)) => {
                    self.state = DriverState::Ready;
                    return Err(DriverError::SharedError(e));
                },
                Err(e) => warn!("Error during DS processing: {}", e)
            }

            let cycle_dur = Instant::now() - cycle_start_instant;

            match period.checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - period.as_secs_f64()
                )
            }
        }

        self.state = DriverState::Ready;
        info!("Driver stopped after {} cycles", self.num_cycles);

        Ok(())
    }
}

impl OutputData {
    /// The messages to publish for this output, in publishing order.
    pub fn messages(&self) -> Vec<DsOutput> {
        let mut msgs = vec![DsOutput::Target(self.target_m.convert())];

        if let Some(ref cmd) = self.command {
            msgs.push(DsOutput::VelRaw(cmd.raw_ms.convert()));
            msgs.push(DsOutput::VelFiltered(cmd.filtered_ms.convert()));
        }

        if let Some(ref q) = self.orientation {
            msgs.push(DsOutput::Orientation(q.convert()));
        }

        msgs
    }
}
