//! RunState Types - Data type engine
//!
//! This crate implements the type engine consumed by the variable store
//! whenever a typed variable is declared or written:
//! - Closed data type variant (integer, real, string, enum, state machine)
//! - Legality checks against an explicit creation/existing context
//! - State machine creation with all-or-nothing edge validation
//! - Transition map introspection
//! - The standard run-control state machine

pub mod datatype;
pub mod transition;
pub mod registry;
pub mod run_state;

pub use datatype::*;
pub use transition::*;
pub use registry::*;
pub use run_state::*;
