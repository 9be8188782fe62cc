//! # Output Server
//!
//! Publishes the DS outputs on a `PUB` socket, one `"<topic> <json>"` frame per message.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Mutex;

use comms_if::{
    ds::DsOutput,
    net::{MonitoredSocket, NetParams, SocketOptions, zmq},
};

use crate::output::{OutputError, OutputSink};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Output server.
///
/// The socket is shared by the control loop and the predictor thread, zmq sockets are not thread
/// safe so it is kept behind a lock.
pub struct OutputServer {
    socket: Mutex<MonitoredSocket>
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutputServer {
    /// Create a new instance of the output server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, OutputError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
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
            zmq::PUB,
            socket_options,
            &params.ds_output_endpoint
        ).map_err(OutputError::SocketError)?;

        Ok(Self {
            socket: Mutex::new(socket)
        })
    }

    /// True if at least one subscriber is connected.
    pub fn connected(&self) -> bool {
        match self.socket.lock() {
            Ok(s) => s.connected(),
            Err(_) => false
        }
    }
}

impl OutputSink for OutputServer {
    fn send(&self, msg: DsOutput) -> Result<(), OutputError> {
        let frame = msg.to_frame().map_err(OutputError::EncodeError)?;

        self.socket.lock()?
            .send(frame.as_str(), 0)
            .map_err(OutputError::SendError)
    }
}
