//! # DS node messages
//!
//! Every message travels as a single frame of the form `"<topic> <json>"`. The topic is the first
//! space-separated word, so subscribers can filter with `set_subscribe`. Vectors are `[x, y, z]`
//! and quaternions `[x, y, z, w]`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

pub const TOPIC_POSE: &str = "pose";
pub const TOPIC_OBJECT: &str = "object";
pub const TOPIC_ORIENTATION: &str = "orientation";
pub const TOPIC_RECONFIGURE: &str = "reconfigure";

pub const TOPIC_VEL_RAW: &str = "vel_raw";
pub const TOPIC_VEL_FILTERED: &str = "vel_filtered";
pub const TOPIC_TARGET: &str = "target";
pub const TOPIC_PATH: &str = "path";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sensed pose of the controlled point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseMsg {
    /// Position in meters
    pub position_m: [f64; 3],

    /// Orientation as `[x, y, z, w]`, must be non-zero
    #[serde(default)]
    pub orientation_q: Option<[f64; 4]>,
}

/// State of a tracked object, the limit cycle is centred on it once one has been received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectStateMsg {
    /// Object position in meters
    pub position_m: [f64; 3],

    /// Object velocity in meters/second
    #[serde(default)]
    pub velocity_ms: [f64; 3],
}

/// A complete set of live-tunable parameters.
///
/// The set is applied as a whole or rejected as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconfigureMsg {
    pub target_offset_m: [f64; 3],
    pub radius_m: f64,
    pub radius_scale: f64,
    pub angular_speed_rads: f64,
    pub speed_offset_rads: f64,
    pub convergence_rate: f64,
    pub convergence_rate_scale: f64,
    pub velocity_limit_ms: f64,
    pub filter_wn: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Messages consumed by the DS node.
#[derive(Debug, Clone, PartialEq)]
pub enum DsInput {
    Pose(PoseMsg),
    Object(ObjectStateMsg),
    /// Desired orientation `[x, y, z, w]`
    Orientation([f64; 4]),
    Reconfigure(ReconfigureMsg),
}

/// Messages produced by the DS node.
#[derive(Debug, Clone, PartialEq)]
pub enum DsOutput {
    /// Raw velocity command after the norm clamp, in meters/second
    VelRaw([f64; 3]),
    /// Filtered velocity command, in meters/second
    VelFiltered([f64; 3]),
    /// Current limit cycle target
    Target([f64; 3]),
    /// Predicted path of the controlled point
    Path(Vec<[f64; 3]>),
    /// Desired orientation `[x, y, z, w]`
    Orientation([f64; 4]),
}

#[derive(Debug, thiserror::Error)]
pub enum MsgError {
    #[error("Message has no topic")]
    NoTopic,

    #[error("Unknown message topic \"{0}\"")]
    UnknownTopic(String),

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the message body: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DsInput {
    /// Topic this message is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            DsInput::Pose(_) => TOPIC_POSE,
            DsInput::Object(_) => TOPIC_OBJECT,
            DsInput::Orientation(_) => TOPIC_ORIENTATION,
            DsInput::Reconfigure(_) => TOPIC_RECONFIGURE,
        }
    }

    /// Encode into a `"<topic> <json>"` frame.
    pub fn to_frame(&self) -> Result<String, MsgError> {
        let body = match self {
            DsInput::Pose(m) => serde_json::to_string(m),
            DsInput::Object(m) => serde_json::to_string(m),
            DsInput::Orientation(q) => serde_json::to_string(q),
            DsInput::Reconfigure(m) => serde_json::to_string(m),
        }.map_err(MsgError::SerializationError)?;

        Ok(format!("{} {}", self.topic(), body))
    }

    /// Decode a `"<topic> <json>"` frame.
    pub fn from_frame(frame: &str) -> Result<Self, MsgError> {
        let (topic, body) = split_frame(frame)?;

        let de = MsgError::DeserializeError;
        match topic {
            TOPIC_POSE => serde_json::from_str(body).map(DsInput::Pose).map_err(de),
            TOPIC_OBJECT => serde_json::from_str(body).map(DsInput::Object).map_err(de),
            TOPIC_ORIENTATION => serde_json::from_str(body).map(DsInput::Orientation).map_err(de),
            TOPIC_RECONFIGURE => serde_json::from_str(body).map(DsInput::Reconfigure).map_err(de),
            t => Err(MsgError::UnknownTopic(t.into())),
        }
    }
}

impl DsOutput {
    /// Topic this message is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            DsOutput::VelRaw(_) => TOPIC_VEL_RAW,
            DsOutput::VelFiltered(_) => TOPIC_VEL_FILTERED,
            DsOutput::Target(_) => TOPIC_TARGET,
            DsOutput::Path(_) => TOPIC_PATH,
            DsOutput::Orientation(_) => TOPIC_ORIENTATION,
        }
    }

    /// Encode into a `"<topic> <json>"` frame.
    pub fn to_frame(&self) -> Result<String, MsgError> {
        let body = match self {
            DsOutput::VelRaw(v) | DsOutput::VelFiltered(v) | DsOutput::Target(v) =>
                serde_json::to_string(v),
            DsOutput::Path(p) => serde_json::to_string(p),
            DsOutput::Orientation(q) => serde_json::to_string(q),
        }.map_err(MsgError::SerializationError)?;

        Ok(format!("{} {}", self.topic(), body))
    }

    /// Decode a `"<topic> <json>"` frame.
    pub fn from_frame(frame: &str) -> Result<Self, MsgError> {
        let (topic, body) = split_frame(frame)?;

        let de = MsgError::DeserializeError;
        match topic {
            TOPIC_VEL_RAW => serde_json::from_str(body).map(DsOutput::VelRaw).map_err(de),
            TOPIC_VEL_FILTERED => serde_json::from_str(body).map(DsOutput::VelFiltered).map_err(de),
            TOPIC_TARGET => serde_json::from_str(body).map(DsOutput::Target).map_err(de),
            TOPIC_PATH => serde_json::from_str(body).map(DsOutput::Path).map_err(de),
            TOPIC_ORIENTATION => serde_json::from_str(body).map(DsOutput::Orientation).map_err(de),
            t => Err(MsgError::UnknownTopic(t.into())),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn split_frame(frame: &str) -> Result<(&str, &str), MsgError> {
    let frame = frame.trim_start();

    match frame.find(' ') {
        Some(i) => Ok((&frame[..i], &frame[i + 1..])),
        None if frame.is_empty() => Err(MsgError::NoTopic),
        // A bare topic has an empty body, which will fail to deserialize
        None => Ok((frame, "")),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pose_frame() {
        let frame = "pose {\"position_m\": [1.0, 2.0, 3.0]}";

        match DsInput::from_frame(frame).unwrap() {
            DsInput::Pose(p) => {
                assert_eq!(p.position_m, [1.0, 2.0, 3.0]);
                assert_eq!(p.orientation_q, None);
            },
            m => panic!("Expected a pose, got {:?}", m)
        }
    }

    #[test]
    fn test_input_topic_prefix() {
        let msg = DsInput::Object(ObjectStateMsg {
            position_m: [0.5, 0.0, 0.2],
            velocity_ms: [0.0; 3],
        });
        let frame = msg.to_frame().unwrap();

        assert!(frame.starts_with("object {"));
        assert_eq!(DsInput::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn test_reconfigure_frame() {
        let frame = r#"reconfigure {
            "target_offset_m": [0.0, 0.0, 0.1],
            "radius_m": 0.1,
            "radius_scale": 1.0,
            "angular_speed_rads": 1.5,
            "speed_offset_rads": 0.0,
            "convergence_rate": 2.0,
            "convergence_rate_scale": 1.0,
            "velocity_limit_ms": 0.3,
            "filter_wn": 5.0
        }"#;

        match DsInput::from_frame(frame).unwrap() {
            DsInput::Reconfigure(r) => {
                assert_eq!(r.radius_m, 0.1);
                assert_eq!(r.target_offset_m, [0.0, 0.0, 0.1]);
            },
            m => panic!("Expected a reconfigure, got {:?}", m)
        }
    }

    #[test]
    fn test_bad_frames() {
        assert!(matches!(DsInput::from_frame(""), Err(MsgError::NoTopic)));
        assert!(matches!(
            DsInput::from_frame("twist [0, 0, 0]"),
            Err(MsgError::UnknownTopic(t)) if t == "twist"
        ));
        assert!(matches!(
            DsInput::from_frame("pose"),
            Err(MsgError::DeserializeError(_))
        ));
        assert!(matches!(
            DsOutput::from_frame("path {\"not\": \"a path\"}"),
            Err(MsgError::DeserializeError(_))
        ));
    }

    #[test]
    fn test_path_frame() {
        let msg = DsOutput::Path(vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]);
        let frame = msg.to_frame().unwrap();

        assert_eq!(frame, "path [[0.0,0.0,0.0],[0.1,0.0,0.0]]");
        assert_eq!(DsOutput::from_frame(&frame).unwrap(), msg);
    }
}
