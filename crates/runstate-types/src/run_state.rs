//! Standard run-control state machine
//!
//! ```text
//! 0Initial -> NotReady -> Readying -> Ready -> Beginning -> Active
//! Active -> Pausing -> Paused -> Resuming -> Active
//! Active | Paused -> Ending -> Ready
//! ```
//!
//! Every state except `0Initial` can fall back to `NotReady`.

use crate::TransitionMap;

pub const INITIAL: &str = "0Initial";
pub const NOT_READY: &str = "NotReady";
pub const READYING: &str = "Readying";
pub const READY: &str = "Ready";
pub const BEGINNING: &str = "Beginning";
pub const ACTIVE: &str = "Active";
pub const PAUSING: &str = "Pausing";
pub const PAUSED: &str = "Paused";
pub const RESUMING: &str = "Resuming";
pub const ENDING: &str = "Ending";

/// Transition map of the global run-control state machine
pub fn run_state_machine() -> TransitionMap {
    TransitionMap::new()
        .transition(INITIAL, [INITIAL, NOT_READY])
        .transition(NOT_READY, [INITIAL, READYING])
        .transition(READYING, [NOT_READY, READY])
        .transition(READY, [BEGINNING, NOT_READY])
        .transition(BEGINNING, [ACTIVE, NOT_READY])
        .transition(ACTIVE, [ENDING, NOT_READY, PAUSING])
        .transition(PAUSING, [NOT_READY, PAUSED])
        .transition(PAUSED, [ENDING, NOT_READY, RESUMING])
        .transition(RESUMING, [ACTIVE, NOT_READY])
        .transition(ENDING, [NOT_READY, READY])
}
