//! Worker thread running the path predictions off the control loop.

// -----------------------------------------------------------------------------------------------
// INCLUDES
// -----------------------------------------------------------------------------------------------

use std::sync::{
    mpsc::{Receiver, RecvTimeoutError},
    Arc,
};

use comms_if::ds::DsOutput;
use log::{trace, warn};

use crate::{cycle_ds::CycleDs, output::OutputSink, shared::Shared};

use super::{predict_path, PredictorError, PredictorParams};

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug)]
pub enum WorkerSignal {
    /// The worker should stop
    Stop,

    /// Predict a path immediately
    Predict,
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

pub(super) fn worker_thread(
    shared: Arc<Shared>,
    sink: Arc<dyn OutputSink>,
    params: PredictorParams,
    main_reciever: Receiver<WorkerSignal>,
) -> Result<(), PredictorError> {
    let ds = CycleDs::new(*shared.plane());
    let period = params.period()?;

    loop {
        // Waiting on the channel doubles as the period sleep
        match main_reciever.recv_timeout(period) {
            Ok(WorkerSignal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(WorkerSignal::Predict) | Err(RecvTimeoutError::Timeout) => (),
        }

        let snapshot = shared.snapshot().map_err(PredictorError::SharedError)?;

        let pose = match snapshot.pose {
            Some(p) => p,
            None => continue,
        };

        let path = predict_path(
            &ds,
            &pose.position_m,
            &snapshot.target_m,
            &snapshot.params,
            params.num_points,
            params.step_s,
        );

        trace!("Predicted path of {} points", path.len());

        let path = path.iter().map(|p| [p[0], p[1], p[2]]).collect();

        if let Err(e) = sink.send(DsOutput::Path(path)) {
            warn!("Could not publish the predicted path: {}", e);
        }
    }

    Ok(())
}
