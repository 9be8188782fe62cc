//! Main DS executable entry point.
//!
//! # Architecture
//!
//! The executable runs three activities around a single shared state:
//!
//!     - The input client thread, writing poses, objects, orientations and reconfigurations into
//!       the shared state as they arrive.
//!     - The control loop (on the main thread), which at a fixed rate:
//!         - Takes a snapshot of the shared state
//!         - Evaluates the limit cycle at the latest pose
//!         - Clamps and filters the velocity command
//!         - Publishes the target, the commands and the orientation
//!     - The predictor thread, publishing the predicted path.
//!
//! Ctrl-C stops the loop, after which the predictor and the input client are stopped and joined.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::info;
use std::{env, sync::{Arc, atomic::{AtomicBool, Ordering}}};

// Internal
use comms_if::net::NetParams;
use ds_lib::{
    driver::{Driver, DriverInit},
    input_client::InputClient,
    output::OutputSink,
    output_server::OutputServer,
    params::DsExecParams,
    predictor::Predictor,
    shared::Shared,
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new(
        "ds_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Cycle DS Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    // An optional argument overrides the default parameter file
    let args: Vec<String> = env::args().collect();
    let ds_params_file = match args.len() {
        1 => "ds.toml",
        2 => args[1].as_str(),
        n => return Err(eyre!("Expected zero or one argument, found {}", n - 1))
    };

    let ds_params: DsExecParams = util::params::load(ds_params_file)
        .wrap_err("Could not load DS params")?;
    ds_params.validate()
        .wrap_err("Invalid DS params")?;

    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load net params")?;

    info!("Exec parameters loaded from \"{}\"", ds_params_file);

    // ---- INITIALISE MODULES ----

    let plane = ds_params.plane()
        .wrap_err("Invalid plane normal")?;

    let shared = Arc::new(
        Shared::new(ds_params.initial, ds_params.center(), plane)
            .and_then(|s| s.with_max_filter_wn(ds_params.max_filter_wn()))
            .wrap_err("Failed to create the shared state")?
    );

    let mut driver = Driver::default();
    driver.init(DriverInit {
        frequency_hz: ds_params.frequency_hz,
        plane,
        filter_wn: ds_params.initial.filter_wn,
        pose_timeout_s: ds_params.pose_timeout_s,
        filter: ds_params.filter,
    }).wrap_err("Failed to initialise the Driver")?;
    info!("Driver init complete");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let output_server: Arc<dyn OutputSink> = {
        let s = OutputServer::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise OutputServer")?;
        info!("OutputServer initialised");
        Arc::new(s)
    };

    let mut input_client = {
        let c = InputClient::new(&zmq_ctx, &net_params, shared.clone())
            .wrap_err("Failed to initialise InputClient")?;
        info!("InputClient initialised");
        c
    };

    info!("Network initialisation complete");

    // ---- START PREDICTOR ----

    let mut predictor = Predictor::spawn(
        shared.clone(),
        output_server.clone(),
        ds_params.predictor
    ).wrap_err("Failed to start the Predictor")?;

    // ---- MAIN LOOP ----

    let run = Arc::new(AtomicBool::new(true));
    {
        let run = run.clone();
        ctrlc::set_handler(move || run.store(false, Ordering::Relaxed))
            .wrap_err("Failed to set the Ctrl-C handler")?;
    }

    info!("Begining main loop\n");

    let loop_result = driver.run(&shared, output_server.as_ref(), &run);

    // ---- SHUTDOWN ----

    info!("Shutting down");

    predictor.stop().wrap_err("Predictor exited with an error")?;
    input_client.stop();

    loop_result.wrap_err("Driver loop failed")?;

    info!("End of execution");

    Ok(())
}
