//! # Critically damped command filter
//!
//! Smooths the raw velocity command with a second order, critically damped response. Each axis
//! is filtered independently and both the rate and the acceleration of the filtered signal are
//! bounded.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use util::maths::clamp_abs_elementwise;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default per-axis limit on the rate of the filtered signal.
pub const DEFAULT_VEL_LIMIT: f64 = 18.0;

/// Default per-axis limit on the acceleration of the filtered signal.
pub const DEFAULT_ACC_LIMIT: f64 = 30.0;

/// Largest allowed product of the natural frequency and the sub-step length.
///
/// Above this the discrete response alternates in sign from one sub-step to the next.
pub const MAX_WN_DT: f64 = 0.5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Construction parameters of the filter, loaded as the `[filter]` table of `ds.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Per-axis limit on the rate of the filtered signal
    #[serde(default = "default_vel_limits")]
    pub vel_limits: [f64; 3],

    /// Per-axis limit on the acceleration of the filtered signal
    #[serde(default = "default_acc_limits")]
    pub acc_limits: [f64; 3],

    /// Number of integration sub-steps per update
    #[serde(default = "default_substeps")]
    pub substeps: usize,
}

/// Critically damped second order filter.
#[derive(Debug, Clone)]
pub struct CdFilter {
    dt_s: f64,
    wn: f64,
    substeps: usize,

    vel_limits: Vector3<f64>,
    acc_limits: Vector3<f64>,

    /// Filtered output
    x: Vector3<f64>,

    /// Rate of the filtered output
    v: Vector3<f64>,

    /// Acceleration applied on the last sub-step
    a: Vector3<f64>,
}

/// Result of a single filter update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterOutput {
    /// The filtered signal
    pub value: Vector3<f64>,

    /// True if the acceleration limit was hit during the update
    pub acc_limited: bool,

    /// True if the rate limit was hit during the update
    pub vel_limited: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("Filter timestep must be greater than zero, found {0}")]
    InvalidTimestep(f64),

    #[error("Filter natural frequency must be greater than zero, found {0}")]
    InvalidNaturalFrequency(f64),

    #[error("Filter limits must be greater than zero, found {0:?}")]
    InvalidLimits([f64; 3]),

    #[error("Filter must take at least one sub-step")]
    NoSubsteps,

    #[error("Filter natural frequency {0} is above {1}, the highest the sub-step length allows")]
    UnstableNaturalFrequency(f64, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            vel_limits: default_vel_limits(),
            acc_limits: default_acc_limits(),
            substeps: default_substeps(),
        }
    }
}

impl CdFilter {
    /// Create a new filter with zeroed state.
    ///
    /// `dt_s` is the period between calls to [`CdFilter::update`], normally the control loop
    /// period.
    pub fn new(
        dt_s: f64,
        wn: f64,
        vel_limits: [f64; 3],
        acc_limits: [f64; 3],
        substeps: usize
    ) -> Result<Self, FilterError> {
        if !(dt_s.is_finite() && dt_s > 0.0) {
            return Err(FilterError::InvalidTimestep(dt_s));
        }
        check_wn(wn)?;
        for limits in [vel_limits, acc_limits].iter() {
            if !limits.iter().all(|l| l.is_finite() && *l > 0.0) {
                return Err(FilterError::InvalidLimits(*limits));
            }
        }
        if substeps == 0 {
            return Err(FilterError::NoSubsteps);
        }
        check_stable(wn, max_natural_frequency(dt_s, substeps))?;

        Ok(Self {
            dt_s,
            wn,
            substeps,
            vel_limits: Vector3::from(vel_limits),
            acc_limits: Vector3::from(acc_limits),
            x: Vector3::zeros(),
            v: Vector3::zeros(),
            a: Vector3::zeros(),
        })
    }

    /// Create a filter from its parameter table.
    pub fn from_params(dt_s: f64, wn: f64, params: &FilterParams) -> Result<Self, FilterError> {
        Self::new(dt_s, wn, params.vel_limits, params.acc_limits, params.substeps)
    }

    /// Advance the filter by one period towards `target`, returning the new filtered value.
    pub fn update(&mut self, target: &Vector3<f64>) -> FilterOutput {
        let dt = self.dt_s / self.substeps as f64;
        let mut out = FilterOutput::default();

        for _ in 0..self.substeps {
            let a = (target - self.x) * self.wn.powi(2) - self.v * (2.0 * self.wn);
            let (a, acc_limited) = clamp_abs_elementwise(&a, &self.acc_limits);

            let (v, vel_limited) = clamp_abs_elementwise(&(self.v + a * dt), &self.vel_limits);

            self.a = a;
            self.v = v;
            self.x += v * dt;

            out.acc_limited |= acc_limited;
            out.vel_limited |= vel_limited;
        }

        out.value = self.x;
        out
    }

    /// Zero the filter state.
    pub fn reset(&mut self) {
        self.x = Vector3::zeros();
        self.v = Vector3::zeros();
        self.a = Vector3::zeros();
    }

    /// Change the natural frequency without touching the filter state.
    pub fn set_natural_frequency(&mut self, wn: f64) -> Result<(), FilterError> {
        check_wn(wn)?;
        check_stable(wn, self.max_natural_frequency())?;
        self.wn = wn;
        Ok(())
    }

    pub fn natural_frequency(&self) -> f64 {
        self.wn
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    /// Highest natural frequency this filter accepts.
    pub fn max_natural_frequency(&self) -> f64 {
        max_natural_frequency(self.dt_s, self.substeps)
    }

    /// Current filtered value.
    pub fn value(&self) -> &Vector3<f64> {
        &self.x
    }

    /// Current rate of the filtered value.
    pub fn rate(&self) -> &Vector3<f64> {
        &self.v
    }

    /// Acceleration applied on the last sub-step.
    pub fn acceleration(&self) -> &Vector3<f64> {
        &self.a
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn check_wn(wn: f64) -> Result<(), FilterError> {
    if wn.is_finite() && wn > 0.0 {
        Ok(())
    }
    else {
        Err(FilterError::InvalidNaturalFrequency(wn))
    }
}

/// Highest natural frequency a filter updated every `dt_s` in `substeps` sub-steps accepts.
pub fn max_natural_frequency(dt_s: f64, substeps: usize) -> f64 {
    MAX_WN_DT * substeps as f64 / dt_s
}

fn check_stable(wn: f64, max_wn: f64) -> Result<(), FilterError> {
    if wn <= max_wn {
        Ok(())
    }
    else {
        Err(FilterError::UnstableNaturalFrequency(wn, max_wn))
    }
}

fn default_vel_limits() -> [f64; 3] {
    [DEFAULT_VEL_LIMIT; 3]
}

fn default_acc_limits() -> [f64; 3] {
    [DEFAULT_ACC_LIMIT; 3]
}

fn default_substeps() -> usize {
    1
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    const DT_S: f64 = 0.01;

    fn filter(wn: f64, vel: f64, acc: f64) -> CdFilter {
        CdFilter::new(DT_S, wn, [vel; 3], [acc; 3], 1).unwrap()
    }

    #[test]
    fn test_invalid_construction() {
        assert_eq!(
            CdFilter::new(0.0, 5.0, [1.0; 3], [1.0; 3], 1).unwrap_err(),
            FilterError::InvalidTimestep(0.0)
        );
        assert_eq!(
            CdFilter::new(DT_S, 0.0, [1.0; 3], [1.0; 3], 1).unwrap_err(),
            FilterError::InvalidNaturalFrequency(0.0)
        );
        assert_eq!(
            CdFilter::new(DT_S, 5.0, [1.0, -1.0, 1.0], [1.0; 3], 1).unwrap_err(),
            FilterError::InvalidLimits([1.0, -1.0, 1.0])
        );
        assert_eq!(
            CdFilter::new(DT_S, 5.0, [1.0; 3], [1.0; 3], 0).unwrap_err(),
            FilterError::NoSubsteps
        );
    }

    #[test]
    fn test_converges_to_constant() {
        let mut f = filter(5.0, DEFAULT_VEL_LIMIT, DEFAULT_ACC_LIMIT);
        let target = Vector3::new(0.3, -0.2, 0.1);

        let mut out = FilterOutput::default();
        for _ in 0..1000 {
            out = f.update(&target);
        }

        assert_relative_eq!((out.value - target).norm(), 0.0, epsilon = 1e-6);
        assert!(f.rate().norm() < 1e-6);
    }

    #[test]
    fn test_limits_respected() {
        let (vel, acc) = (0.5, 2.0);
        let mut f = filter(20.0, vel, acc);
        let target = Vector3::new(10.0, -10.0, 3.0);

        let mut any_limited = false;
        for _ in 0..500 {
            let out = f.update(&target);
            any_limited |= out.acc_limited || out.vel_limited;

            for i in 0..3 {
                assert!(f.rate()[i].abs() <= vel);
                assert!(f.acceleration()[i].abs() <= acc);
            }
        }

        assert!(any_limited);
    }

    #[test]
    fn test_reset() {
        let mut f = filter(5.0, DEFAULT_VEL_LIMIT, DEFAULT_ACC_LIMIT);
        f.update(&Vector3::new(1.0, 1.0, 1.0));
        assert!(f.value().norm() > 0.0);

        f.reset();
        assert_eq!(*f.value(), Vector3::zeros());
        assert_eq!(*f.rate(), Vector3::zeros());
        assert_eq!(*f.acceleration(), Vector3::zeros());
    }

    #[test]
    fn test_retune_keeps_state() {
        let mut f = filter(5.0, DEFAULT_VEL_LIMIT, DEFAULT_ACC_LIMIT);
        for _ in 0..10 {
            f.update(&Vector3::new(1.0, 0.0, 0.0));
        }
        let before = *f.value();

        f.set_natural_frequency(10.0).unwrap();
        assert_eq!(*f.value(), before);
        assert_eq!(f.natural_frequency(), 10.0);

        assert!(f.set_natural_frequency(-1.0).is_err());
        assert_eq!(f.natural_frequency(), 10.0);
    }

    #[test]
    fn test_natural_frequency_bound() {
        assert_relative_eq!(max_natural_frequency(DT_S, 1), 50.0, epsilon = 1e-9);
        assert_relative_eq!(max_natural_frequency(DT_S, 4), 200.0, epsilon = 1e-9);

        assert!(matches!(
            CdFilter::new(DT_S, 60.0, [1.0; 3], [1.0; 3], 1),
            Err(FilterError::UnstableNaturalFrequency(_, _))
        ));
        assert!(CdFilter::new(DT_S, 60.0, [1.0; 3], [1.0; 3], 2).is_ok());

        let mut f = filter(5.0, DEFAULT_VEL_LIMIT, DEFAULT_ACC_LIMIT);
        assert!(matches!(
            f.set_natural_frequency(1000.0),
            Err(FilterError::UnstableNaturalFrequency(_, _))
        ));
        assert_eq!(f.natural_frequency(), 5.0);

        // Near the bound the step response still approaches without overshoot
        let mut f = filter(40.0, 1e6, 1e6);
        let target = Vector3::new(1.0, 0.0, 0.0);
        for _ in 0..100 {
            f.update(&target);
            assert!(f.value()[0] >= 0.0 && f.value()[0] <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_substeps_match_smaller_dt() {
        let target = Vector3::new(0.5, 0.5, 0.0);

        let mut coarse = CdFilter::new(2.0 * DT_S, 5.0, [18.0; 3], [30.0; 3], 2).unwrap();
        let mut fine = CdFilter::new(DT_S, 5.0, [18.0; 3], [30.0; 3], 1).unwrap();

        for _ in 0..50 {
            let c = coarse.update(&target);
            fine.update(&target);
            let f = fine.update(&target);

            assert_relative_eq!((c.value - f.value).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_params_defaults() {
        let p: FilterParams = util::params::from_toml_str("").unwrap();
        assert_eq!(p, FilterParams::default());
        assert_eq!(p.substeps, 1);

        let f = CdFilter::from_params(DT_S, 5.0, &p).unwrap();
        assert_eq!(f.dt_s(), DT_S);
    }
}
