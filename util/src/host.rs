//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
///
/// Parameter files are found in `$CYCLE_DS_SW_ROOT/params` and sessions are
/// written into `$CYCLE_DS_SW_ROOT/sessions`.
pub const SW_ROOT_ENV_VAR: &str = "CYCLE_DS_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
