//! RunState Monitor - Change detection for run-state coordination
//!
//! This crate implements the change monitor:
//! - One background thread per monitor, owning the subscription connection
//! - Classification of raw change records into notifications
//! - A channel-backed queue drained by the consumer with bounded waits
//! - Rebinding to a relocated program-parent directory

pub mod classify;
pub mod monitor;

pub use classify::*;
pub use monitor::*;
