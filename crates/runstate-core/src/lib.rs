//! RunState Core - Fundamental types shared by every RunState crate
//!
//! This crate defines:
//! - The error taxonomy (NotFound, AlreadyExists, IllegalTransition, ...)
//! - Identifiers for types and variables
//! - The persisted store layout (`/RunState/...` and program directories)
//! - Change records and their wire format
//! - Notifications handed to coordinators
//! - Connection endpoint descriptors

pub mod id;
pub mod error;
pub mod layout;
pub mod record;
pub mod notification;
pub mod endpoint;

pub use id::*;
pub use error::*;
pub use layout::*;
pub use record::*;
pub use notification::*;
pub use endpoint::*;
