//! # Input Client
//!
//! Receives the DS inputs and writes them into the shared state. Inputs arrive on a single `SUB`
//! socket as `"<topic> <json>"` frames:
//!
//! - `pose` - sensed pose of the controlled point,
//! - `object` - state of the tracked object, the cycle is centred on it once received,
//! - `orientation` - desired orientation, passed through to the outputs,
//! - `reconfigure` - a complete parameter set, applied as a whole or rejected.
//!
//! The socket is read by a background thread so that the control loop never waits on the
//! network.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    thread::{self, JoinHandle},
    time::Duration,
};

use comms_if::{
    ds::{DsInput, MsgError},
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq},
};
use log::{debug, error, info, warn};
use util::convert::{Convert, try_unit_quaternion};

use crate::{
    cycle_ds::Params,
    loc::{ObjectState, Pose},
    shared::{Shared, SharedError},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Wait after a failed receive before trying again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct InputClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not subscribe to the inputs: {0}")]
    SubscribeError(zmq::Error),

    #[error("Could not start the background thread: {0}")]
    SpawnError(std::io::Error),

    #[error("Could not decode the input: {0}")]
    DecodeError(MsgError),

    #[error("Input {0} contains non-finite values")]
    NotFinite(&'static str),

    #[error("Input {0} contains a quaternion which is not a rotation")]
    DegenerateQuaternion(&'static str),

    #[error("{0}")]
    SharedError(SharedError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InputClient {
    /// Connect to the input endpoint and start the background thread.
    ///
    /// This function does not block until a publisher is present.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        shared: Arc<Shared>
    ) -> Result<Self, InputClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            socket_options,
            &params.ds_input_endpoint
        ).map_err(InputClientError::SocketError)?;

        // Topics are filtered in the decoder so unknown ones get reported
        socket.set_subscribe(b"")
            .map_err(InputClientError::SubscribeError)?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let bg_run_clone = bg_run.clone();

        let bg_jh = thread::Builder::new()
            .name("ds::input_client".into())
            .spawn(move || bg_thread(socket, bg_run_clone, shared))
            .map_err(InputClientError::SpawnError)?;

        Ok(Self {
            bg_jh: Some(bg_jh),
            bg_run,
        })
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                error!("InputClient background thread panicked");
            }
            else {
                info!("InputClient stopped");
            }
        }
    }
}

impl Drop for InputClient {
    fn drop(&mut self) {
        self.stop();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decode a frame and apply it to the shared state.
pub fn handle_frame(shared: &Shared, frame: &str) -> Result<(), InputClientError> {
    let input = DsInput::from_frame(frame)
        .map_err(InputClientError::DecodeError)?;

    handle_input(shared, input)
}

/// Apply a single input to the shared state.
///
/// A rejected reconfiguration leaves the current parameters in place and is reported as an
/// error.
pub fn handle_input(shared: &Shared, input: DsInput) -> Result<(), InputClientError> {
    let result = match input {
        DsInput::Pose(ref msg) => {
            if !msg.position_m.iter().all(|x| x.is_finite()) {
                return Err(InputClientError::NotFinite("pose"));
            }
            let attitude_q = match msg.orientation_q {
                Some(ref q) => Some(checked_quaternion(q, "pose")?),
                None => None
            };
            shared.set_pose(Pose {
                position_m: msg.position_m.convert(),
                attitude_q,
            })
        },
        DsInput::Object(ref msg) => {
            if !msg.position_m.iter().all(|x| x.is_finite()) {
                return Err(InputClientError::NotFinite("object"));
            }
            shared.set_object(ObjectState::from(msg))
        },
        DsInput::Orientation(ref q) => {
            let q = checked_quaternion(q, "orientation")?;
            shared.set_orientation(q)
        },
        DsInput::Reconfigure(ref msg) => {
            let params = Params::from(msg);
            shared.apply(params).map(|_| info!("Parameters reconfigured: {:?}", params))
        },
    };

    result.map_err(InputClientError::SharedError)
}

/// Normalise a received quaternion, rejecting non-finite or zero-length ones.
fn checked_quaternion(
    q: &[f64; 4],
    input: &'static str
) -> Result<nalgebra::UnitQuaternion<f64>, InputClientError> {
    if !q.iter().all(|x| x.is_finite()) {
        return Err(InputClientError::NotFinite(input));
    }

    try_unit_quaternion(q).ok_or(InputClientError::DegenerateQuaternion(input))
}

/// Only a terminated context ends the input thread, other receive errors are retried.
fn recv_error_is_fatal(e: zmq::Error) -> bool {
    e == zmq::Error::ETERM
}

/// Background thread, reads the socket until instructed to stop.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    shared: Arc<Shared>
) {
    while run.load(Ordering::Relaxed) {
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 input message");
                continue
            },
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) if recv_error_is_fatal(e) => {
                error!("Input socket closed, InputClient exiting: {}", e);
                break
            },
            Err(e) => {
                warn!("Error receiving input: {}", e);
                thread::sleep(RECV_ERROR_BACKOFF);
                continue
            }
        };

        debug!("Input: {}", msg);

        match handle_frame(&shared, &msg) {
            Ok(()) => (),
            Err(InputClientError::SharedError(SharedError::PoisonError)) => {
                error!("Shared state poisoned, InputClient exiting");
                break
            },
            Err(e) => warn!("Input ignored: {}", e)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cycle_ds::{CyclePlane, ParamsError};
    use nalgebra::{UnitQuaternion, Vector3};

    fn shared() -> Shared {
        let params = Params {
            target_offset_m: Vector3::zeros(),
            radius_m: 0.1,
            radius_scale: 1.0,
            angular_speed_rads: 1.0,
            speed_offset_rads: 0.0,
            convergence_rate: 1.0,
            convergence_rate_scale: 1.0,
            velocity_limit_ms: 0.5,
            filter_wn: 5.0,
        };
        Shared::new(params, Vector3::zeros(), CyclePlane::xy()).unwrap()
    }

    const RECONFIGURE: &str = r#"reconfigure {
        "target_offset_m": [0.0, 0.0, 0.1],
        "radius_m": 0.25,
        "radius_scale": 1.0,
        "angular_speed_rads": -1.0,
        "speed_offset_rads": 0.0,
        "convergence_rate": 3.0,
        "convergence_rate_scale": 1.0,
        "velocity_limit_ms": 0.4,
        "filter_wn": 6.0
    }"#;

    #[test]
    fn test_pose_and_object() {
        let s = shared();

        handle_frame(&s, "pose {\"position_m\": [0.1, 0.2, 0.3]}").unwrap();
        handle_frame(&s, "object {\"position_m\": [1.0, 0.0, 0.0]}").unwrap();

        let snap = s.snapshot().unwrap();
        assert_eq!(snap.pose.map(|p| p.position_m), Some(Vector3::new(0.1, 0.2, 0.3)));
        assert_eq!(snap.target_m, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_reconfigure() {
        let s = shared();

        handle_frame(&s, RECONFIGURE).unwrap();
        let snap = s.snapshot().unwrap();
        assert_eq!(snap.params.radius_m, 0.25);
        assert_eq!(snap.params.filter_wn, 6.0);
        assert_eq!(snap.target_m, Vector3::new(0.0, 0.0, 0.1));

        let bad = RECONFIGURE.replace("\"radius_m\": 0.25", "\"radius_m\": -1.0");
        assert!(matches!(
            handle_frame(&s, &bad),
            Err(InputClientError::SharedError(SharedError::Rejected(ParamsError::NegativeRadius(_))))
        ));
        assert_eq!(s.snapshot().unwrap().params.radius_m, 0.25);
    }

    #[test]
    fn test_bad_inputs() {
        let s = shared();

        assert!(matches!(
            handle_frame(&s, "twist [0.0, 0.0, 0.0]"),
            Err(InputClientError::DecodeError(MsgError::UnknownTopic(_)))
        ));
        assert!(matches!(
            handle_input(&s, DsInput::Orientation([0.0, 0.0, f64::NAN, 1.0])),
            Err(InputClientError::NotFinite("orientation"))
        ));
        assert!(s.snapshot().unwrap().orientation.is_none());
        assert!(s.snapshot().unwrap().pose.is_none());
    }

    #[test]
    fn test_orientation() {
        let s = shared();

        handle_frame(&s, "orientation [0.0, 0.0, 0.0, 1.0]").unwrap();
        assert_eq!(s.snapshot().unwrap().orientation, Some(UnitQuaternion::identity()));
    }

    #[test]
    fn test_zero_orientation_rejected() {
        let s = shared();

        assert!(matches!(
            handle_frame(&s, "orientation [0.0, 0.0, 0.0, 0.0]"),
            Err(InputClientError::DegenerateQuaternion("orientation"))
        ));
        assert!(s.snapshot().unwrap().orientation.is_none());

        // A rejected orientation does not replace the previous one
        handle_frame(&s, "orientation [0.0, 0.0, 0.0, 1.0]").unwrap();
        assert!(handle_frame(&s, "orientation [0.0, 0.0, 0.0, 0.0]").is_err());
        assert_eq!(s.snapshot().unwrap().orientation, Some(UnitQuaternion::identity()));
    }

    #[test]
    fn test_pose_attitude() {
        let s = shared();

        handle_frame(
            &s,
            "pose {\"position_m\": [0.1, 0.2, 0.3], \"orientation_q\": [0.0, 0.0, 0.0, 2.0]}"
        ).unwrap();
        let pose = s.snapshot().unwrap().pose.unwrap();
        assert_eq!(pose.attitude_q, Some(UnitQuaternion::identity()));

        assert!(matches!(
            handle_frame(
                &s,
                "pose {\"position_m\": [0.5, 0.5, 0.5], \"orientation_q\": [0.0, 0.0, 0.0, 0.0]}"
            ),
            Err(InputClientError::DegenerateQuaternion("pose"))
        ));
        assert!(matches!(
            handle_input(&s, DsInput::Pose(comms_if::ds::PoseMsg {
                position_m: [0.5, 0.5, 0.5],
                orientation_q: Some([f64::NAN, 0.0, 0.0, 1.0]),
            })),
            Err(InputClientError::NotFinite("pose"))
        ));

        // Rejected poses leave the last good one in place
        let pose = s.snapshot().unwrap().pose.unwrap();
        assert_eq!(pose.position_m, Vector3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_recv_errors_retried() {
        assert!(recv_error_is_fatal(zmq::Error::ETERM));
        assert!(!recv_error_is_fatal(zmq::Error::EINTR));
        assert!(!recv_error_is_fatal(zmq::Error::EFSM));
        assert!(!recv_error_is_fatal(zmq::Error::ENOTSOCK));
    }
}
