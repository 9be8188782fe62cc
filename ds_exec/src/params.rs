//! # DS executable parameters
//!
//! Construction-time configuration loaded from `ds.toml`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Duration;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    cd_filter::{self, CdFilter, FilterError, FilterParams},
    cycle_ds::{CyclePlane, Params, ParamsError},
    predictor::{PredictorError, PredictorParams},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the DS executable.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DsExecParams {
    /// Rate of the control loop.
    ///
    /// Units: Hertz
    pub frequency_hz: f64,

    /// Centre of the limit cycle until an object is tracked.
    ///
    /// Units: meters
    pub center_m: [f64; 3],

    /// Normal of the plane the limit cycle lies in, need not be unit length
    #[serde(default = "default_plane_normal")]
    pub plane_normal: [f64; 3],

    /// Velocity commands are withheld while the latest pose is older than this.
    ///
    /// Units: seconds
    #[serde(default = "default_pose_timeout_s")]
    pub pose_timeout_s: f64,

    /// Initial live-tunable parameters
    pub initial: Params,

    #[serde(default)]
    pub filter: FilterParams,

    #[serde(default)]
    pub predictor: PredictorParams,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Control frequency must be greater than zero and give a representable period, found {0}")]
    InvalidFrequency(f64),

    #[error("Pose timeout must be greater than zero, found {0}")]
    InvalidPoseTimeout(f64),

    #[error("Cycle centre must be finite, found {0:?}")]
    InvalidCenter([f64; 3]),

    #[error("Plane normal must be finite and non-zero, found {0:?}")]
    InvalidPlaneNormal([f64; 3]),

    #[error("Invalid initial parameters: {0}")]
    InvalidParams(ParamsError),

    #[error("Invalid filter parameters: {0}")]
    InvalidFilter(FilterError),

    #[error("Invalid predictor parameters: {0}")]
    InvalidPredictor(PredictorError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DsExecParams {
    /// Check the whole configuration, so that a bad file fails at startup rather than in the loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let period_s = util::time::frequency_to_period_s(self.frequency_hz)
            .ok_or(ConfigError::InvalidFrequency(self.frequency_hz))?;
        Duration::try_from_secs_f64(period_s)
            .map_err(|_| ConfigError::InvalidFrequency(self.frequency_hz))?;

        if !(self.pose_timeout_s > 0.0 && Duration::try_from_secs_f64(self.pose_timeout_s).is_ok()) {
            return Err(ConfigError::InvalidPoseTimeout(self.pose_timeout_s));
        }

        if !self.center_m.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::InvalidCenter(self.center_m));
        }

        self.plane()?;

        self.initial.validate().map_err(ConfigError::InvalidParams)?;

        CdFilter::from_params(period_s, self.initial.filter_wn, &self.filter)
            .map_err(ConfigError::InvalidFilter)?;

        self.predictor.validate().map_err(ConfigError::InvalidPredictor)?;

        Ok(())
    }

    /// The plane of the limit cycle.
    pub fn plane(&self) -> Result<CyclePlane, ConfigError> {
        CyclePlane::new(Vector3::from(self.plane_normal))
            .ok_or(ConfigError::InvalidPlaneNormal(self.plane_normal))
    }

    pub fn center(&self) -> Vector3<f64> {
        Vector3::from(self.center_m)
    }

    /// Highest `filter_wn` a reconfiguration may set at this control rate.
    ///
    /// Only meaningful once the parameters have been validated.
    pub fn max_filter_wn(&self) -> f64 {
        cd_filter::max_natural_frequency(1.0 / self.frequency_hz, self.filter.substeps)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_plane_normal() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

fn default_pose_timeout_s() -> f64 {
    0.5
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    const DS_TOML: &str = r#"
        frequency_hz = 100.0
        center_m = [0.5, 0.0, 0.3]

        [initial]
        radius_m = 0.1
        angular_speed_rads = 1.5
        convergence_rate = 2.0
        velocity_limit_ms = 0.3
        filter_wn = 5.0

        [predictor]
        num_points = 100
        step_s = 0.05
        period_s = 0.1
    "#;

    fn load() -> DsExecParams {
        util::params::from_toml_str(DS_TOML).unwrap()
    }

    #[test]
    fn test_parse_and_defaults() {
        let p = load();

        assert_eq!(p.frequency_hz, 100.0);
        assert_eq!(p.center(), Vector3::new(0.5, 0.0, 0.3));
        assert_eq!(p.plane().unwrap(), CyclePlane::xy());
        assert_eq!(p.filter, FilterParams::default());
        assert_eq!(p.initial.radius_scale, 1.0);
        assert_eq!(p.initial.target_offset_m, Vector3::zeros());
        assert_eq!(p.predictor.num_points, 100);
        assert_eq!(p.pose_timeout_s, 0.5);
        assert_relative_eq!(p.max_filter_wn(), 50.0, epsilon = 1e-9);

        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let p = DsExecParams { frequency_hz: -10.0, ..load() };
        assert!(matches!(p.validate(), Err(ConfigError::InvalidFrequency(_))));

        // Positive, but the period does not fit in a Duration
        let p = DsExecParams { frequency_hz: 1e-30, ..load() };
        assert!(matches!(p.validate(), Err(ConfigError::InvalidFrequency(_))));

        let p = DsExecParams { pose_timeout_s: 0.0, ..load() };
        assert!(matches!(p.validate(), Err(ConfigError::InvalidPoseTimeout(_))));

        let mut p = load();
        p.initial.filter_wn = 80.0;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::InvalidFilter(FilterError::UnstableNaturalFrequency(_, _)))
        ));

        let p = DsExecParams { center_m: [0.0, f64::NAN, 0.0], ..load() };
        assert!(matches!(p.validate(), Err(ConfigError::InvalidCenter(_))));

        let p = DsExecParams { plane_normal: [0.0; 3], ..load() };
        assert!(matches!(p.validate(), Err(ConfigError::InvalidPlaneNormal(_))));

        let mut p = load();
        p.initial.radius_m = -1.0;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::InvalidParams(ParamsError::NegativeRadius(_)))
        ));

        let mut p = load();
        p.filter.substeps = 0;
        assert!(matches!(p.validate(), Err(ConfigError::InvalidFilter(FilterError::NoSubsteps))));

        let mut p = load();
        p.predictor.num_points = 500;
        assert!(matches!(p.validate(), Err(ConfigError::InvalidPredictor(_))));

        let mut p = load();
        p.predictor.period_s = 1e30;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::InvalidPredictor(PredictorError::InvalidPeriod(_)))
        ));
    }

    #[test]
    fn test_missing_field() {
        let r: Result<DsExecParams, _> = util::params::from_toml_str("frequency_hz = 10.0");
        assert!(r.is_err());
    }
}
