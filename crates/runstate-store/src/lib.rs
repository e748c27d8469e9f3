//! RunState Store - Variable store contracts and the in-memory reference store
//!
//! This crate provides:
//! - `VariableStore`: path-addressed, typed variables in a directory tree
//! - `ChangeFeed`: prefix subscriptions with accept/reject glob filters
//! - `StoreConnector`: turns endpoint descriptors into caller-owned connections
//! - `MemoryStore`: in-process implementation of all three
//! - The run-state schema installer

pub mod traits;
pub mod glob;
pub mod memory;
pub mod feed;
pub mod connector;
pub mod schema;

pub use traits::*;
pub use glob::GlobPattern;
pub use memory::MemoryStore;
pub use feed::MemorySubscription;
pub use connector::MemoryConnector;
pub use schema::install_run_state_schema;
