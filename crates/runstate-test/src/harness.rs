//! In-process fleets
//!
//! A `Fleet` is one in-memory store, the coordinator that drives it and a set
//! of simulated programs. Everything talks through the same connector, the
//! way a real deployment would talk to one store server.

use std::sync::Arc;

use runstate_coord::{CoordinatorConfig, ProgramDefinition, StateCoordinator};
use runstate_core::{layout, RunStateResult};
use runstate_store::{install_run_state_schema, MemoryConnector, MemoryStore, StoreConnector};

use crate::{EchoBehavior, EchoingProgram};

/// One program in a fleet plan
#[derive(Clone, Debug)]
pub struct FleetMember {
    pub name: String,
    pub definition: ProgramDefinition,
    pub behavior: EchoBehavior,
}

impl FleetMember {
    /// Counts toward convergence and answers it
    pub fn answers_transitions(&self) -> bool {
        self.definition.is_active() && self.behavior.echoes()
    }
}

/// Fleet builder
#[derive(Clone, Debug)]
pub struct FleetBuilder {
    store_name: String,
    members: Vec<FleetMember>,
    timeout_secs: u64,
    parent_dir: Option<String>,
}

impl Default for FleetBuilder {
    fn default() -> Self {
        FleetBuilder {
            store_name: "fleet".into(),
            members: Vec::new(),
            timeout_secs: 5,
            parent_dir: None,
        }
    }
}

impl FleetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(mut self, name: &str, definition: ProgramDefinition, behavior: EchoBehavior) -> Self {
        self.members.push(FleetMember {
            name: name.to_string(),
            definition,
            behavior,
        });
        self
    }

    /// Enabled, coordinated program echoing immediately
    pub fn echoing(self, name: &str) -> Self {
        self.program(name, ProgramDefinition::default(), EchoBehavior::immediate())
    }

    /// Transition timeout written to `/RunState/Timeout`
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Keep programs under `dir` instead of `/RunState`
    pub fn parent_dir(mut self, dir: &str) -> Self {
        self.parent_dir = Some(dir.to_string());
        self
    }

    pub fn build(self) -> RunStateResult<Fleet> {
        let store = MemoryStore::shared();
        install_run_state_schema(store.as_ref())?;
        let connector = MemoryConnector::new(self.store_name.clone(), Arc::clone(&store));

        let mut coordinator =
            StateCoordinator::from_config(&connector, CoordinatorConfig::testing(&self.store_name))?;
        coordinator.set_timeout(self.timeout_secs)?;
        if let Some(dir) = &self.parent_dir {
            coordinator.store().mkdir(dir)?;
            coordinator.set_program_parent_dir(dir)?;
        }

        let mut fleet = Fleet {
            store,
            connector,
            coordinator,
            members: Vec::new(),
            programs: Vec::new(),
        };
        for member in self.members {
            fleet.join(member)?;
        }
        Ok(fleet)
    }
}

/// A running fleet
pub struct Fleet {
    store: Arc<MemoryStore>,
    connector: MemoryConnector,
    coordinator: StateCoordinator,
    members: Vec<FleetMember>,
    programs: Vec<EchoingProgram>,
}

impl Fleet {
    pub fn builder() -> FleetBuilder {
        FleetBuilder::new()
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn connector(&self) -> &MemoryConnector {
        &self.connector
    }

    pub fn coordinator(&self) -> &StateCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut StateCoordinator {
        &mut self.coordinator
    }

    pub fn members(&self) -> &[FleetMember] {
        &self.members
    }

    /// Register a program and start its simulated process
    pub fn join(&mut self, member: FleetMember) -> RunStateResult<()> {
        let endpoint = self.connector.endpoint();
        let requests = self.connector.connect_requests(&endpoint)?;
        let feed = self.connector.connect_subscriptions(&endpoint)?;
        let program = EchoingProgram::spawn(&member.name, requests, feed, member.behavior)?;

        self.coordinator.add_program(&member.name, &member.definition)?;
        self.programs.push(program);
        self.members.push(member);
        Ok(())
    }

    /// Stop a program's process and remove it from the registry
    pub fn leave(&mut self, name: &str) -> RunStateResult<()> {
        if let Some(idx) = self.programs.iter().position(|p| p.name() == name) {
            self.programs.remove(idx).shutdown();
        }
        self.members.retain(|m| m.name != name);
        self.coordinator.delete_program(name)
    }

    /// True if every active program answers transitions
    pub fn expects_convergence(&self) -> bool {
        self.members
            .iter()
            .filter(|m| m.definition.is_active())
            .all(FleetMember::answers_transitions)
    }

    /// Drain stale notifications, request `state` and wait for the fleet
    pub fn transition(&mut self, state: &str) -> RunStateResult<()> {
        self.coordinator.process_messages()?;
        self.coordinator.set_global_state(state)?;
        self.coordinator.wait_transition()
    }

    /// Path of a program's state variable under the current parent
    pub fn state_path(&self, name: &str) -> String {
        layout::program_var(
            self.coordinator.program_parent_dir(),
            name,
            runstate_core::program::STATE,
        )
    }
}

impl std::fmt::Debug for Fleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("coordinator", &self.coordinator)
            .field("members", &self.members)
            .finish()
    }
}
