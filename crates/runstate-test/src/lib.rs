//! RunState Test Harness - Fleet simulation and convergence validation
//!
//! This crate provides:
//! - In-process fleets: a store, a coordinator and simulated programs
//! - Echoing programs that follow the global state on their own threads
//! - A seeded fleet fuzzer checking that transitions converge exactly when
//!   every active program echoes

pub mod echo;
pub mod harness;
pub mod fleet_fuzzer;

pub use echo::*;
pub use harness::*;
pub use fleet_fuzzer::*;
