//! # DS library.
//!
//! This library allows the executables and tests in the workspace to access items defined inside
//! the DS crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Critically damped filter - smooths the velocity command
pub mod cd_filter;

/// Cycle DS - the limit cycle control law
pub mod cycle_ds;

/// Control loop driver - runs the DS at a fixed rate and publishes the commands
pub mod driver;

/// Input client - recieves poses, objects and reconfigurations from the network
pub mod input_client;

/// Localisation module - the sensed state of the controlled point and the tracked object
pub mod loc;

/// Output interface shared by the driver and the predictor
pub mod output;

/// Output server - publishes the DS outputs on the network
pub mod output_server;

/// Executable parameters
pub mod params;

/// Path predictor - rolls the limit cycle forward on its own thread
pub mod predictor;

/// State shared between the DS threads
pub mod shared;
