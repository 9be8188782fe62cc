//! # Output interface
//!
//! The control loop and the path predictor publish through an [`OutputSink`], which keeps them
//! independent of the transport actually carrying the messages.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    ds::{DsOutput, MsgError},
    net::{MonitoredSocketError, zmq},
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Destination for DS outputs.
///
/// Sinks are shared between the control loop and the predictor thread, so they must be usable
/// from a shared reference.
pub trait OutputSink: Send + Sync {
    fn send(&self, msg: DsOutput) -> Result<(), OutputError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not encode the output: {0}")]
    EncodeError(MsgError),

    #[error("Could not send the output: {0}")]
    SendError(zmq::Error),

    #[error("The output sink is poisoned")]
    PoisonError,
}

impl<G> From<std::sync::PoisonError<G>> for OutputError {
    fn from(_: std::sync::PoisonError<G>) -> Self {
        Self::PoisonError
    }
}
