//! Simulated programs
//!
//! An `EchoingProgram` watches the global state through its own change
//! monitor and copies every new global state into its program `State`, after
//! an optional delay. A silent program watches but never answers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use runstate_core::{layout, program, Notification, RunStateError, RunStateResult};
use runstate_monitor::{ChangeMonitor, MonitorConfig};
use runstate_store::{ChangeFeed, VariableStore};
use tracing::{debug, warn};

/// How a simulated program reacts to a global transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EchoBehavior {
    /// Copy the global state after `delay`
    Echo { delay: Duration },
    /// Never answer
    Silent,
}

impl EchoBehavior {
    pub fn immediate() -> Self {
        EchoBehavior::Echo {
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(ms: u64) -> Self {
        EchoBehavior::Echo {
            delay: Duration::from_millis(ms),
        }
    }

    pub fn echoes(&self) -> bool {
        matches!(self, EchoBehavior::Echo { .. })
    }
}

/// A program thread following the global state
pub struct EchoingProgram {
    name: String,
    behavior: EchoBehavior,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<u64>>,
}

impl EchoingProgram {
    /// Start following the global state.
    ///
    /// The monitor is created before this returns, so no global change made
    /// afterwards is missed.
    pub fn spawn(
        name: &str,
        requests: Arc<dyn VariableStore>,
        feed: Box<dyn ChangeFeed>,
        behavior: EchoBehavior,
    ) -> RunStateResult<Self> {
        let monitor = ChangeMonitor::new(requests.as_ref(), feed, MonitorConfig::responsive())?;
        let state_path = layout::program_var(monitor.program_parent_path(), name, program::STATE);
        let stop = Arc::new(AtomicBool::new(false));

        let thread_stop = Arc::clone(&stop);
        let thread_name = name.to_string();
        let worker = thread::Builder::new()
            .name(format!("echo-{}", name))
            .spawn(move || {
                echo_loop(&thread_name, &monitor, requests.as_ref(), &state_path, behavior, &thread_stop)
            })
            .map_err(|e| RunStateError::Internal(format!("echo thread: {}", e)))?;

        Ok(EchoingProgram {
            name: name.to_string(),
            behavior,
            stop,
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> EchoBehavior {
        self.behavior
    }

    /// Stop the thread and return how many echoes it wrote
    pub fn shutdown(mut self) -> u64 {
        self.halt()
    }

    fn halt(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(echoes)) => echoes,
            Some(Err(_)) => {
                warn!(program = %self.name, "echo thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for EchoingProgram {
    fn drop(&mut self) {
        self.halt();
    }
}

fn echo_loop(
    name: &str,
    monitor: &ChangeMonitor,
    store: &dyn VariableStore,
    state_path: &str,
    behavior: EchoBehavior,
    stop: &AtomicBool,
) -> u64 {
    let mut echoes = 0;
    while !stop.load(Ordering::Acquire) {
        let batch = match monitor.get_notifications(None, Some(Duration::from_millis(20))) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(program = name, error = %e, "echo monitor failed");
                break;
            }
        };

        for notification in batch {
            let Notification::GlobalStateChange { state } = notification else {
                continue;
            };
            let EchoBehavior::Echo { delay } = behavior else {
                continue;
            };
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            match store.set(state_path, &state) {
                Ok(()) => {
                    echoes += 1;
                    debug!(program = name, %state, "echoed");
                }
                // Deleted or relocated under us
                Err(e) => warn!(program = name, %state, error = %e, "echo rejected"),
            }
        }
    }
    echoes
}

#[cfg(test)]
mod tests {
    use super::*;
    use runstate_core::{GLOBAL_STATE_PATH, RUN_STATE_MACHINE};
    use runstate_store::{install_run_state_schema, MemoryStore};
    use std::time::Instant;

    fn store_with_program(name: &str) -> Arc<MemoryStore> {
        let store = MemoryStore::shared();
        install_run_state_schema(store.as_ref()).unwrap();
        let dir = layout::program_dir("/RunState", name);
        store.mkdir(&dir).unwrap();
        store
            .declare(&layout::join(&dir, program::STATE), RUN_STATE_MACHINE, None)
            .unwrap();
        store
    }

    fn wait_for(store: &MemoryStore, path: &str, value: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if store.get(path).unwrap() == value {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_echoes_global_state() {
        let store = store_with_program("evb");
        let echo = EchoingProgram::spawn(
            "evb",
            store.clone(),
            Box::new(store.subscription()),
            EchoBehavior::immediate(),
        )
        .unwrap();

        store.set(GLOBAL_STATE_PATH, "NotReady").unwrap();
        assert!(wait_for(&store, "/RunState/evb/State", "NotReady"));
        assert_eq!(echo.shutdown(), 1);
    }

    #[test]
    fn test_silent_program_stays_put() {
        let store = store_with_program("evb");
        let echo = EchoingProgram::spawn(
            "evb",
            store.clone(),
            Box::new(store.subscription()),
            EchoBehavior::Silent,
        )
        .unwrap();

        store.set(GLOBAL_STATE_PATH, "NotReady").unwrap();
        assert!(!wait_for(&store, "/RunState/evb/State", "NotReady"));
        assert_eq!(echo.shutdown(), 0);
    }
}
