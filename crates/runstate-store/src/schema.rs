//! Run-state schema
//!
//! Creates the `RunStateMachine` type and the `/RunState` variables a
//! coordinator expects to find.

use runstate_core::{
    RunStateResult, BOOL_TYPE, GLOBAL_STATE_PATH, INTEGER_TYPE, PARENT_DIR_PATH,
    RECORDING_PATH, RUN_NUMBER_PATH, RUN_STATE_DIR, RUN_STATE_MACHINE, STRING_TYPE, TIMEOUT_PATH,
    TITLE_PATH,
};
use runstate_types::run_state_machine;
use tracing::debug;

use crate::VariableStore;

pub const DEFAULT_TITLE: &str = "No Title Set";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Install the run-state type and variables into a store.
///
/// Fails with `AlreadyExists` if any part of the schema is already present.
pub fn install_run_state_schema(store: &dyn VariableStore) -> RunStateResult<()> {
    store.create_state_machine(RUN_STATE_MACHINE, &run_state_machine())?;

    store.mkdir(RUN_STATE_DIR)?;

    store.declare(GLOBAL_STATE_PATH, RUN_STATE_MACHINE, None)?;
    store.declare(TITLE_PATH, STRING_TYPE, Some(DEFAULT_TITLE))?;
    store.declare(RUN_NUMBER_PATH, INTEGER_TYPE, Some("0"))?;
    store.declare(RECORDING_PATH, BOOL_TYPE, Some("false"))?;
    store.declare(TIMEOUT_PATH, INTEGER_TYPE, Some(&DEFAULT_TIMEOUT_SECS.to_string()))?;
    store.declare(PARENT_DIR_PATH, STRING_TYPE, Some(""))?;

    debug!(dir = RUN_STATE_DIR, "run-state schema installed");
    Ok(())
}
