//! RunState Coordinator - Global run-state control over a fleet of programs
//!
//! This crate implements:
//! - The program registry kept under the program-parent directory
//! - Run metadata accessors (title, run number, recording, timeout)
//! - The convergence wait: broadcast a global transition, then block until
//!   every active program has echoed it or the timeout expires
//! - Coordinator configuration and tracing initialization

pub mod program;
pub mod config;
pub mod logging;
pub mod coordinator;
pub mod convergence;

pub use program::*;
pub use config::*;
pub use logging::*;
pub use coordinator::*;
pub use convergence::*;
