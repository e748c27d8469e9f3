//! Convergence wait
//!
//! After a global transition is requested, [`StateCoordinator::wait_transition`]
//! blocks until every active program has echoed the new state. The set of
//! programs waited for is taken from the registry when the wait starts and is
//! then adjusted as programs join and leave.
//!
//! The first global-state change seen during a wait becomes its target. A
//! stale change still queued from an earlier transition therefore wins over
//! the one just requested; draining with [`StateCoordinator::process_messages`]
//! before requesting a transition avoids that.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use runstate_core::{Notification, RunStateError, RunStateResult};
use tracing::{debug, info, trace, warn};

use crate::StateCoordinator;

/// Last-known states, refreshed from notifications
#[derive(Clone, Debug, Default)]
pub struct TransitionTracker {
    global_state: Option<String>,
    program_states: BTreeMap<String, String>,
}

impl TransitionTracker {
    /// Last global state seen on the feed
    pub fn global_state(&self) -> Option<&str> {
        self.global_state.as_deref()
    }

    /// Last state a program was seen to take
    pub fn program_state(&self, program: &str) -> Option<&str> {
        self.program_states.get(program).map(String::as_str)
    }

    pub fn known_programs(&self) -> impl Iterator<Item = &str> {
        self.program_states.keys().map(String::as_str)
    }

    fn record_global(&mut self, state: &str) {
        self.global_state = Some(state.to_string());
    }

    fn record_program(&mut self, program: &str, state: &str) {
        self.program_states
            .insert(program.to_string(), state.to_string());
    }

    fn forget(&mut self, program: &str) {
        self.program_states.remove(program);
    }

    pub(crate) fn clear(&mut self) {
        self.global_state = None;
        self.program_states.clear();
    }
}

/// Bookkeeping for one wait
#[derive(Debug)]
struct Round {
    active: BTreeSet<String>,
    converged: BTreeSet<String>,
    /// Joined before their flags were readable
    joining: BTreeSet<String>,
    /// Last state echoed by a program still in `joining`
    joiner_states: BTreeMap<String, String>,
    target: Option<String>,
}

impl Round {
    fn new(active: Vec<String>) -> Self {
        Round {
            active: active.into_iter().collect(),
            converged: BTreeSet::new(),
            joining: BTreeSet::new(),
            joiner_states: BTreeMap::new(),
            target: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.target.is_some() && self.joining.is_empty() && self.active.is_subset(&self.converged)
    }

    fn pending(&self) -> Vec<String> {
        let mut pending: BTreeSet<String> =
            self.active.difference(&self.converged).cloned().collect();
        pending.extend(self.joining.iter().cloned());
        pending.into_iter().collect()
    }
}

impl StateCoordinator {
    /// Block until every active program reaches the requested global state.
    ///
    /// The budget is `/RunState/Timeout` seconds. On expiry the error lists
    /// the programs that never echoed. A budget too large to form a deadline
    /// waits without one.
    pub fn wait_transition(&mut self) -> RunStateResult<()> {
        self.wait_transition_with(|_, _| {})
    }

    /// [`Self::wait_transition`], calling `callback(program, state)` for every
    /// program state change seen while waiting.
    pub fn wait_transition_with<F>(&mut self, mut callback: F) -> RunStateResult<()>
    where
        F: FnMut(&str, &str),
    {
        let budget = self.transition_budget()?;
        let started = Instant::now();
        let deadline = started.checked_add(budget);
        let mut round = Round::new(self.list_active_programs()?);
        debug!(active = round.active.len(), budget = %humantime::format_duration(budget), "waiting for transition");

        loop {
            let batch = self.monitor.get_notifications(None, Some(Duration::ZERO))?;
            let idle = batch.is_empty();
            self.dispatch_round(&mut round, batch, &mut callback);
            if !round.joining.is_empty() {
                self.resolve_joiners(&mut round, &mut callback);
            }

            if round.is_complete() {
                info!(
                    state = round.target.as_deref().unwrap_or_default(),
                    programs = round.active.len(),
                    elapsed = %humantime::format_duration(started.elapsed()),
                    "transition complete"
                );
                return Ok(());
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                return Err(self.timed_out(&round, started));
            }
            if !idle {
                continue;
            }

            // Half-created joiners raise no notification when they finish
            let slice = if round.joining.is_empty() {
                remaining
            } else {
                remaining.min(self.config.poll_interval)
            };
            let batch = self.monitor.get_notifications(None, Some(slice))?;
            if batch.is_empty() && round.joining.is_empty() {
                return Err(self.timed_out(&round, started));
            }
            self.dispatch_round(&mut round, batch, &mut callback);
        }
    }

    fn timed_out(&self, round: &Round, started: Instant) -> RunStateError {
        let elapsed = started.elapsed();
        let pending = round.pending();
        warn!(
            target_state = round.target.as_deref().unwrap_or("<none>"),
            ?pending,
            elapsed = %humantime::format_duration(elapsed),
            "transition timed out"
        );
        RunStateError::Timeout {
            waited_ms: elapsed.as_millis() as u64,
            pending,
        }
    }

    /// Settle programs whose join was seen before their flags were declared.
    ///
    /// A program whose directory exists but whose flags are still missing stays
    /// unresolved; one that vanished or cannot be read counts as inactive.
    fn resolve_joiners<F>(&mut self, round: &mut Round, callback: &mut F)
    where
        F: FnMut(&str, &str),
    {
        for program in std::mem::take(&mut round.joining) {
            self.settle_joiner(round, program, callback);
        }
    }

    /// Settle one joiner, crediting the state it echoed while unresolved
    fn settle_joiner<F>(&mut self, round: &mut Round, program: String, callback: &mut F)
    where
        F: FnMut(&str, &str),
    {
        match self.is_active(&program) {
            Ok(true) => {
                if let Some(state) = round.joiner_states.remove(&program) {
                    self.record_echo(round, &program, &state, callback);
                }
                round.active.insert(program);
            }
            Ok(false) => {
                round.joiner_states.remove(&program);
            }
            Err(e) if e.is_not_found() && self.require_program(&program).is_ok() => {
                round.joining.insert(program);
            }
            Err(e) => {
                round.joiner_states.remove(&program);
                trace!(%program, error = %e, "joined program not readable, treating as inactive")
            }
        }
    }

    /// Count an active program's state change toward the round
    fn record_echo<F>(&mut self, round: &mut Round, program: &str, state: &str, callback: &mut F)
    where
        F: FnMut(&str, &str),
    {
        self.tracker.record_program(program, state);
        if round.target.as_deref() == Some(state) {
            round.converged.insert(program.to_string());
        }
        callback(program, state);
    }

    fn dispatch_round<F>(&mut self, round: &mut Round, batch: Vec<Notification>, callback: &mut F)
    where
        F: FnMut(&str, &str),
    {
        for notification in batch {
            trace!(%notification, "dispatch");
            match notification {
                Notification::GlobalStateChange { state } => {
                    self.tracker.record_global(&state);
                    if round.target.is_none() {
                        round.target = Some(state);
                    }
                }
                Notification::ProgramStateChange { program, state } => {
                    if round.joining.remove(&program) {
                        self.settle_joiner(round, program.clone(), callback);
                    }
                    if round.joining.contains(&program) {
                        round.joiner_states.insert(program, state);
                    } else if round.active.contains(&program) {
                        self.record_echo(round, &program, &state, callback);
                    } else {
                        // Not waited for; drop any cached state so it is reread
                        self.tracker.forget(&program);
                    }
                }
                Notification::ProgramJoins { program } => match self.is_active(&program) {
                    Ok(true) => {
                        round.active.insert(program);
                    }
                    Ok(false) => {}
                    Err(_) => {
                        round.joining.insert(program);
                    }
                },
                Notification::ProgramLeaves { program } => {
                    self.tracker.forget(&program);
                    round.active.remove(&program);
                    round.converged.remove(&program);
                    round.joining.remove(&program);
                    round.joiner_states.remove(&program);
                }
                Notification::VarChanged { .. } => {}
            }
        }
    }

    /// Drain queued notifications without blocking, refreshing cached states
    pub fn process_messages(&mut self) -> RunStateResult<usize> {
        self.process_messages_with(|_, _| {})
    }

    /// [`Self::process_messages`], calling `callback(program, state)` for
    /// every program state change. Returns the number of notifications handled.
    pub fn process_messages_with<F>(&mut self, mut callback: F) -> RunStateResult<usize>
    where
        F: FnMut(&str, &str),
    {
        let batch = self.monitor.get_notifications(None, Some(Duration::ZERO))?;
        let handled = batch.len();
        for notification in batch {
            trace!(%notification, "dispatch");
            match notification {
                Notification::GlobalStateChange { state } => self.tracker.record_global(&state),
                Notification::ProgramStateChange { program, state } => {
                    self.tracker.record_program(&program, &state);
                    callback(&program, &state);
                }
                Notification::ProgramLeaves { program } => self.tracker.forget(&program),
                Notification::ProgramJoins { .. } | Notification::VarChanged { .. } => {}
            }
        }
        Ok(handled)
    }

    /// `(program, state)` for every active program, sorted by program.
    ///
    /// Uses the last state seen on the feed, or reads the store for programs
    /// not heard from yet.
    pub fn get_participant_states(&self) -> RunStateResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        for program in self.list_active_programs()? {
            let state = match self.tracker.program_state(&program) {
                Some(state) => state.to_string(),
                None => self.get_program_state(&program)?,
            };
            out.push((program, state));
        }
        Ok(out)
    }

    /// Cached states
    pub fn tracker(&self) -> &TransitionTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoordinatorConfig, ProgramDefinition};
    use runstate_store::{install_run_state_schema, MemoryStore, VariableStore};
    use std::sync::Arc;

    fn coordinator() -> (Arc<MemoryStore>, StateCoordinator) {
        let store = MemoryStore::shared();
        install_run_state_schema(store.as_ref()).unwrap();
        let feed = Box::new(store.subscription());
        let coord = StateCoordinator::with_connections(
            store.clone(),
            feed,
            CoordinatorConfig::testing("vardb"),
        )
        .unwrap();
        (store, coord)
    }

    #[test]
    fn test_echoed_transition_converges() {
        let (_store, mut coord) = coordinator();
        coord.add_program("test", &ProgramDefinition::default()).unwrap();
        coord.set_global_state("NotReady").unwrap();
        coord.set_program_state("test", "NotReady").unwrap();

        let mut seen = Vec::new();
        coord
            .wait_transition_with(|p, s| seen.push((p.to_string(), s.to_string())))
            .unwrap();
        assert_eq!(seen, vec![("test".to_string(), "NotReady".to_string())]);
        assert_eq!(
            coord.get_participant_states().unwrap(),
            vec![("test".to_string(), "NotReady".to_string())]
        );
    }

    #[test]
    fn test_missing_echo_times_out() {
        let (_store, mut coord) = coordinator();
        coord.add_program("test", &ProgramDefinition::default()).unwrap();
        coord.set_timeout(1).unwrap();
        coord.set_global_state("NotReady").unwrap();

        let start = Instant::now();
        let err = coord.wait_transition().unwrap_err();
        let elapsed = start.elapsed();
        match err {
            RunStateError::Timeout { pending, .. } => assert_eq!(pending, vec!["test"]),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(900));
        assert!(elapsed < Duration::from_secs(5));

        assert_eq!(
            coord.get_participant_states().unwrap(),
            vec![("test".to_string(), "0Initial".to_string())]
        );
    }

    #[test]
    fn test_disabled_program_is_not_waited_for() {
        let (_store, mut coord) = coordinator();
        coord
            .add_program("test", &ProgramDefinition::default().enabled(false))
            .unwrap();
        coord.set_global_state("NotReady").unwrap();
        coord.wait_transition().unwrap();
        assert!(coord.get_participant_states().unwrap().is_empty());
    }

    #[test]
    fn test_no_global_change_times_out() {
        let (_store, mut coord) = coordinator();
        coord.set_timeout(0).unwrap();
        coord.process_messages().unwrap();
        let err = coord.wait_transition().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_echo_of_other_state_does_not_count() {
        let (_store, mut coord) = coordinator();
        coord.add_program("a", &ProgramDefinition::default()).unwrap();
        coord.add_program("b", &ProgramDefinition::default()).unwrap();
        coord.set_timeout(1).unwrap();
        coord.set_program_state("b", "NotReady").unwrap();
        coord.set_program_state("b", "0Initial").unwrap();
        coord.set_global_state("NotReady").unwrap();
        coord.set_program_state("a", "NotReady").unwrap();

        match coord.wait_transition().unwrap_err() {
            RunStateError::Timeout { pending, .. } => assert_eq!(pending, vec!["b"]),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_leaving_program_is_dropped() {
        let (store, mut coord) = coordinator();
        coord.add_program("a", &ProgramDefinition::default()).unwrap();
        coord.add_program("b", &ProgramDefinition::default()).unwrap();
        coord.set_global_state("NotReady").unwrap();
        coord.set_program_state("a", "NotReady").unwrap();
        store.rmdir("/RunState/b").unwrap();

        coord.wait_transition().unwrap();
    }

    #[test]
    fn test_process_messages() {
        let (_store, mut coord) = coordinator();
        coord.add_program("evb", &ProgramDefinition::default()).unwrap();
        coord.set_global_state("NotReady").unwrap();
        coord.set_program_state("evb", "NotReady").unwrap();
        coord.set_title("ignored by the feed filters").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut handled = 0;
        let mut changes = Vec::new();
        while handled < 3 && Instant::now() < deadline {
            handled += coord
                .process_messages_with(|p, s| changes.push(format!("{p}={s}")))
                .unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handled, 3);
        assert_eq!(changes, vec!["evb=NotReady"]);
        assert_eq!(coord.tracker().global_state(), Some("NotReady"));
        assert_eq!(coord.tracker().program_state("evb"), Some("NotReady"));
    }

    #[test]
    fn test_unbounded_timeout_still_converges() {
        let (_store, mut coord) = coordinator();
        coord.set_timeout(i64::MAX as u64).unwrap();
        coord.add_program("test", &ProgramDefinition::default()).unwrap();
        coord.set_global_state("NotReady").unwrap();
        coord.set_program_state("test", "NotReady").unwrap();

        coord.wait_transition().unwrap();
        assert_eq!(coord.tracker().program_state("test"), Some("NotReady"));
    }

    #[test]
    fn test_echo_before_flags_counts_once_active() {
        let (store, mut coord) = coordinator();
        coord.set_timeout(3).unwrap();
        coord.set_global_state("NotReady").unwrap();

        // Directory and echo land before the flags exist
        store.mkdir("/RunState/late").unwrap();
        store
            .declare("/RunState/late/State", "RunStateMachine", None)
            .unwrap();
        store.set("/RunState/late/State", "NotReady").unwrap();

        let flags = {
            let store = store.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                store.declare("/RunState/late/enable", "bool", Some("true")).unwrap();
                store
                    .declare("/RunState/late/standalone", "bool", Some("false"))
                    .unwrap();
            })
        };

        let mut seen = Vec::new();
        coord
            .wait_transition_with(|p, s| seen.push(format!("{p}={s}")))
            .unwrap();
        flags.join().unwrap();
        assert_eq!(seen, vec!["late=NotReady"]);
        assert_eq!(coord.tracker().program_state("late"), Some("NotReady"));
    }

    #[test]
    fn test_standalone_changes_are_not_reported() {
        let (_store, mut coord) = coordinator();
        coord
            .add_program("solo", &ProgramDefinition::default().standalone(true))
            .unwrap();
        coord.add_program("main", &ProgramDefinition::default()).unwrap();
        coord.set_global_state("NotReady").unwrap();
        coord.set_program_state("solo", "NotReady").unwrap();
        coord.set_program_state("main", "NotReady").unwrap();

        let mut seen = Vec::new();
        coord
            .wait_transition_with(|p, s| seen.push(format!("{p}={s}")))
            .unwrap();
        assert_eq!(seen, vec!["main=NotReady"]);
        assert_eq!(coord.tracker().program_state("solo"), None);
    }

    #[test]
    fn test_participants_fall_back_to_store() {
        let (_store, coord) = coordinator();
        coord.add_program("b", &ProgramDefinition::default()).unwrap();
        coord.add_program("a", &ProgramDefinition::default()).unwrap();
        coord
            .add_program("solo", &ProgramDefinition::default().standalone(true))
            .unwrap();
        assert_eq!(
            coord.get_participant_states().unwrap(),
            vec![
                ("a".to_string(), "0Initial".to_string()),
                ("b".to_string(), "0Initial".to_string()),
            ]
        );
    }
}
