//! State coordinator
//!
//! Owns a request connection and a change monitor. The registry half lives
//! here; the convergence wait is in [`crate::convergence`].

use std::sync::Arc;
use std::time::Duration;

use runstate_core::{
    layout, program, RunStateError, RunStateResult, BOOL_TYPE, GLOBAL_STATE_PATH,
    PARENT_DIR_PATH, RECORDING_PATH, RUN_NUMBER_PATH, RUN_STATE_MACHINE, STRING_TYPE,
    TIMEOUT_PATH, TITLE_PATH,
};
use runstate_monitor::ChangeMonitor;
use runstate_store::{ChangeFeed, StoreConnector, VariableStore};
use tracing::debug;

use crate::{CoordinatorConfig, ProgramDefinition, TransitionTracker};

/// Coordinates the global run state with every registered program
pub struct StateCoordinator {
    pub(crate) store: Arc<dyn VariableStore>,
    pub(crate) monitor: ChangeMonitor,
    pub(crate) tracker: TransitionTracker,
    pub(crate) config: CoordinatorConfig,
}

impl std::fmt::Debug for StateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCoordinator")
            .field("monitor", &self.monitor)
            .field("tracker", &self.tracker)
            .field("config", &self.config)
            .finish()
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn parse_bool(path: &str, text: &str) -> RunStateResult<bool> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(RunStateError::Internal(format!("{} holds non-boolean {}", path, other))),
    }
}

fn parse_int(path: &str, text: &str) -> RunStateResult<i64> {
    text.trim()
        .parse()
        .map_err(|_| RunStateError::Internal(format!("{} holds non-integer {}", path, text)))
}

impl StateCoordinator {
    /// Open both connections through `connector` and start the monitor
    pub fn connect(
        connector: &dyn StoreConnector,
        request_uri: &str,
        subscription_uri: &str,
        config: CoordinatorConfig,
    ) -> RunStateResult<Self> {
        let requests = runstate_core::Endpoint::parse(request_uri)?;
        let subscriptions = runstate_core::Endpoint::parse(subscription_uri)?;

        let store = connector.connect_requests(&requests)?;
        let feed = connector.connect_subscriptions(&subscriptions)?;
        debug!(%requests, %subscriptions, "coordinator connected");
        Self::with_connections(store, feed, config)
    }

    /// Connect to the endpoints named in `config`
    pub fn from_config(
        connector: &dyn StoreConnector,
        config: CoordinatorConfig,
    ) -> RunStateResult<Self> {
        let request_uri = config.request_endpoint.clone();
        let subscription_uri = config.subscription_endpoint.clone();
        Self::connect(connector, &request_uri, &subscription_uri, config)
    }

    /// Build on connections the caller already holds
    pub fn with_connections(
        store: Arc<dyn VariableStore>,
        feed: Box<dyn ChangeFeed>,
        config: CoordinatorConfig,
    ) -> RunStateResult<Self> {
        let monitor = ChangeMonitor::new(store.as_ref(), feed, config.monitor())?;
        Ok(StateCoordinator {
            store,
            monitor,
            tracker: TransitionTracker::default(),
            config,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Request connection
    pub fn store(&self) -> &Arc<dyn VariableStore> {
        &self.store
    }

    pub fn monitor(&self) -> &ChangeMonitor {
        &self.monitor
    }

    fn parent(&self) -> &str {
        self.monitor.program_parent_path()
    }

    fn program_path(&self, name: &str, var: &str) -> String {
        layout::program_var(self.parent(), name, var)
    }

    /// `NotFound` unless `name` is a registered program
    pub(crate) fn require_program(&self, name: &str) -> RunStateResult<()> {
        if !layout::is_valid_component(name) {
            return Err(RunStateError::InvalidArgument(format!("bad program name {:?}", name)));
        }
        if self.store.ls(self.parent())?.iter().any(|p| p == name) {
            Ok(())
        } else {
            Err(RunStateError::NotFound(format!("program {}", name)))
        }
    }

    fn program_bool(&self, name: &str, var: &str) -> RunStateResult<bool> {
        self.require_program(name)?;
        let path = self.program_path(name, var);
        parse_bool(&path, &self.store.get(&path)?)
    }

    fn set_program_bool(&self, name: &str, var: &str, value: bool) -> RunStateResult<()> {
        self.require_program(name)?;
        self.store.set(&self.program_path(name, var), bool_text(value))?;
        debug!(program = name, var, value, "program flag updated");
        Ok(())
    }

    // ---- Program registry ----

    /// Register a program under the program-parent directory.
    ///
    /// The program's `State` starts at the run-state machine's default.
    pub fn add_program(&self, name: &str, def: &ProgramDefinition) -> RunStateResult<()> {
        if !layout::is_valid_component(name) {
            return Err(RunStateError::InvalidArgument(format!("bad program name {:?}", name)));
        }
        let dir = layout::program_dir(self.parent(), name);
        self.store.mkdir(&dir)?;

        if let Err(e) = self.declare_program_vars(&dir, def) {
            // A half-built directory would look like a registered program
            if let Err(cleanup) = self.store.rmdir(&dir) {
                debug!(%dir, error = %cleanup, "could not remove partial program");
            }
            return Err(e);
        }
        debug!(program = name, parent = self.parent(), "program added");
        Ok(())
    }

    fn declare_program_vars(&self, dir: &str, def: &ProgramDefinition) -> RunStateResult<()> {
        let var = |leaf: &str| layout::join(dir, leaf);
        self.store.declare(&var(program::STATE), RUN_STATE_MACHINE, None)?;
        self.store
            .declare(&var(program::ENABLE), BOOL_TYPE, Some(bool_text(def.enabled)))?;
        self.store
            .declare(&var(program::STANDALONE), BOOL_TYPE, Some(bool_text(def.standalone)))?;
        self.store.declare(&var(program::PATH), STRING_TYPE, Some(&def.path))?;
        self.store.declare(&var(program::HOST), STRING_TYPE, Some(&def.host))?;
        self.store.declare(&var(program::OUTRING), STRING_TYPE, Some(&def.outring))?;
        self.store.declare(&var(program::INRING), STRING_TYPE, Some(&def.inring))?;
        Ok(())
    }

    pub fn get_program_definition(&self, name: &str) -> RunStateResult<ProgramDefinition> {
        self.require_program(name)?;
        let get = |var: &str| self.store.get(&self.program_path(name, var));
        Ok(ProgramDefinition {
            enabled: self.program_bool(name, program::ENABLE)?,
            standalone: self.program_bool(name, program::STANDALONE)?,
            path: get(program::PATH)?,
            host: get(program::HOST)?,
            outring: get(program::OUTRING)?,
            inring: get(program::INRING)?,
        })
    }

    /// Overwrite every definition field of an existing program
    pub fn modify_program(&self, name: &str, def: &ProgramDefinition) -> RunStateResult<()> {
        self.require_program(name)?;
        let set = |var: &str, value: &str| self.store.set(&self.program_path(name, var), value);
        set(program::ENABLE, bool_text(def.enabled))?;
        set(program::STANDALONE, bool_text(def.standalone))?;
        set(program::PATH, &def.path)?;
        set(program::HOST, &def.host)?;
        set(program::OUTRING, &def.outring)?;
        set(program::INRING, &def.inring)?;
        debug!(program = name, "program modified");
        Ok(())
    }

    /// Remove a program and all of its variables
    pub fn delete_program(&self, name: &str) -> RunStateResult<()> {
        self.require_program(name)?;
        self.store.rmdir(&layout::program_dir(self.parent(), name))?;
        debug!(program = name, "program deleted");
        Ok(())
    }

    pub fn enable_program(&self, name: &str) -> RunStateResult<()> {
        self.set_program_bool(name, program::ENABLE, true)
    }

    pub fn disable_program(&self, name: &str) -> RunStateResult<()> {
        self.set_program_bool(name, program::ENABLE, false)
    }

    pub fn set_program_standalone(&self, name: &str) -> RunStateResult<()> {
        self.set_program_bool(name, program::STANDALONE, true)
    }

    pub fn set_program_no_standalone(&self, name: &str) -> RunStateResult<()> {
        self.set_program_bool(name, program::STANDALONE, false)
    }

    pub fn is_enabled(&self, name: &str) -> RunStateResult<bool> {
        self.program_bool(name, program::ENABLE)
    }

    pub fn is_standalone(&self, name: &str) -> RunStateResult<bool> {
        self.program_bool(name, program::STANDALONE)
    }

    /// Enabled and not standalone
    pub fn is_active(&self, name: &str) -> RunStateResult<bool> {
        Ok(self.is_enabled(name)? && !self.is_standalone(name)?)
    }

    /// Registered program names, sorted
    pub fn list_programs(&self) -> RunStateResult<Vec<String>> {
        let mut names = self.store.ls(self.parent())?;
        names.sort();
        Ok(names)
    }

    fn list_where(&self, keep: impl Fn(&Self, &str) -> RunStateResult<bool>) -> RunStateResult<Vec<String>> {
        let mut out = Vec::new();
        for name in self.list_programs()? {
            match keep(self, &name) {
                Ok(true) => out.push(name),
                Ok(false) => {}
                // Left between listing and reading
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    pub fn list_enabled_programs(&self) -> RunStateResult<Vec<String>> {
        self.list_where(Self::is_enabled)
    }

    pub fn list_standalone_programs(&self) -> RunStateResult<Vec<String>> {
        self.list_where(Self::is_standalone)
    }

    /// Programs a global transition waits for, sorted
    pub fn list_active_programs(&self) -> RunStateResult<Vec<String>> {
        self.list_where(Self::is_active)
    }

    // ---- States ----

    /// Write a program's state directly. Never waits.
    pub fn set_program_state(&self, name: &str, state: &str) -> RunStateResult<()> {
        self.require_program(name)?;
        self.store.set(&self.program_path(name, program::STATE), state)
    }

    pub fn get_program_state(&self, name: &str) -> RunStateResult<String> {
        self.require_program(name)?;
        self.store.get(&self.program_path(name, program::STATE))
    }

    /// Request a global transition. Use [`Self::wait_transition`] to wait for it.
    pub fn set_global_state(&self, state: &str) -> RunStateResult<()> {
        self.store.set(GLOBAL_STATE_PATH, state)?;
        debug!(state, "global state requested");
        Ok(())
    }

    pub fn get_global_state(&self) -> RunStateResult<String> {
        self.store.get(GLOBAL_STATE_PATH)
    }

    /// States the global state may move to next
    pub fn valid_next_global_states(&self) -> RunStateResult<Vec<String>> {
        self.store.valid_next_states(GLOBAL_STATE_PATH)
    }

    // ---- Run metadata ----

    pub fn title(&self) -> RunStateResult<String> {
        self.store.get(TITLE_PATH)
    }

    pub fn set_title(&self, title: &str) -> RunStateResult<()> {
        self.store.set(TITLE_PATH, title)
    }

    pub fn run_number(&self) -> RunStateResult<u64> {
        let n = parse_int(RUN_NUMBER_PATH, &self.store.get(RUN_NUMBER_PATH)?)?;
        u64::try_from(n)
            .map_err(|_| RunStateError::Internal(format!("{} is negative", RUN_NUMBER_PATH)))
    }

    pub fn set_run_number(&self, run: u64) -> RunStateResult<()> {
        self.store.set(RUN_NUMBER_PATH, &run.to_string())
    }

    pub fn recording(&self) -> RunStateResult<bool> {
        parse_bool(RECORDING_PATH, &self.store.get(RECORDING_PATH)?)
    }

    pub fn set_recording(&self, on: bool) -> RunStateResult<()> {
        self.store.set(RECORDING_PATH, bool_text(on))
    }

    /// Transition timeout in seconds
    pub fn timeout(&self) -> RunStateResult<u64> {
        let secs = parse_int(TIMEOUT_PATH, &self.store.get(TIMEOUT_PATH)?)?;
        Ok(secs.max(0) as u64)
    }

    pub fn set_timeout(&self, secs: u64) -> RunStateResult<()> {
        self.store.set(TIMEOUT_PATH, &secs.to_string())
    }

    /// Budget for one convergence wait
    pub(crate) fn transition_budget(&self) -> RunStateResult<Duration> {
        match self.timeout() {
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(e) if e.is_not_found() => Ok(self.config.default_timeout()),
            Err(e) => Err(e),
        }
    }

    // ---- Program-parent directory ----

    /// Directory holding program directories
    pub fn program_parent_dir(&self) -> &str {
        self.parent()
    }

    /// Move the registry to another existing directory and rebind the monitor
    pub fn set_program_parent_dir(&mut self, dir: &str) -> RunStateResult<()> {
        let dir = layout::normalize(dir).ok_or_else(|| {
            RunStateError::InvalidArgument(format!("program parent {} is not absolute", dir))
        })?;
        self.store.ls(&dir)?;

        let previous = self.parent().to_string();
        self.monitor.update_program_parent_path(&dir)?;
        if let Err(e) = self.store.set(PARENT_DIR_PATH, &dir) {
            self.monitor.update_program_parent_path(&previous)?;
            return Err(e);
        }
        self.tracker.clear();
        debug!(parent = %dir, "program parent moved");
        Ok(())
    }
}
