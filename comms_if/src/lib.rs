//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the motion generator.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Messages consumed and produced by the DS node
pub mod ds;

/// Network module
pub mod net;
