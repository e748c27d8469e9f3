//! Store contracts consumed by the monitor and coordinator

use std::sync::Arc;
use std::time::Duration;

use runstate_core::{ChangeRecord, Endpoint, RunStateResult, TypeId};
use runstate_types::TransitionMap;

/// Request/command connection to a variable store.
///
/// Writes are validated by the store's type engine; an illegal value is
/// rejected with `IllegalTransition` and leaves the variable untouched.
pub trait VariableStore: Send + Sync {
    /// Current value of a variable
    fn get(&self, path: &str) -> RunStateResult<String>;

    /// Assign a variable, publishing an `ASSIGN` record on success
    fn set(&self, path: &str, value: &str) -> RunStateResult<()>;

    /// Create a directory, publishing `MKDIR` on success
    fn mkdir(&self, path: &str) -> RunStateResult<()>;

    /// Remove a directory and everything under it, publishing `RMDIR`
    fn rmdir(&self, path: &str) -> RunStateResult<()>;

    /// Declare a typed variable, with the type's default when `initial` is `None`
    fn declare(&self, path: &str, type_name: &str, initial: Option<&str>) -> RunStateResult<()>;

    /// Child directory names, sorted
    fn ls(&self, path: &str) -> RunStateResult<Vec<String>>;

    /// Variable names held directly in a directory, sorted
    fn ls_vars(&self, path: &str) -> RunStateResult<Vec<String>>;

    /// States reachable in one hop from a state machine variable's current value
    fn valid_next_states(&self, path: &str) -> RunStateResult<Vec<String>>;

    /// Register a state machine type
    fn create_state_machine(&self, name: &str, map: &TransitionMap) -> RunStateResult<TypeId>;

    /// Register a plain enumeration type
    fn create_enum(&self, name: &str, values: &[&str]) -> RunStateResult<TypeId>;

    /// Transition map of a registered state machine type
    fn transition_map(&self, type_name: &str) -> RunStateResult<TransitionMap>;
}

/// Filter disposition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Accept,
    Reject,
}

/// Subscription connection delivering change records in commit order
pub trait ChangeFeed: Send {
    /// Start receiving records whose path starts with `prefix`
    fn subscribe(&mut self, prefix: &str) -> RunStateResult<()>;

    /// Stop receiving records for a previously subscribed prefix
    fn unsubscribe(&mut self, prefix: &str) -> RunStateResult<()>;

    /// Install a glob filter on record paths
    fn add_filter(&mut self, kind: FilterKind, pattern: &str) -> RunStateResult<()>;

    /// Drop every installed filter
    fn clear_filters(&mut self);

    /// Block up to `timeout` for a record; true if one can be read
    fn wait_msg(&mut self, timeout: Duration) -> bool;

    /// Take the next record. Malformed frames yield `ProtocolError`.
    fn read(&mut self) -> RunStateResult<ChangeRecord>;
}

/// Opens connections to a store reachable at an endpoint
pub trait StoreConnector {
    fn connect_requests(&self, endpoint: &Endpoint) -> RunStateResult<Arc<dyn VariableStore>>;

    fn connect_subscriptions(&self, endpoint: &Endpoint) -> RunStateResult<Box<dyn ChangeFeed>>;
}
