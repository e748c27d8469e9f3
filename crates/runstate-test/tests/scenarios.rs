//! End-to-end coordination scenarios

use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use runstate_coord::ProgramDefinition;
use runstate_core::{RunStateError, GLOBAL_STATE_PATH};
use runstate_store::{MemoryStore, VariableStore};
use runstate_test::{EchoBehavior, Fleet, FleetMember};
use runstate_types::TransitionMap;

fn silent(name: &str, definition: ProgramDefinition) -> FleetMember {
    FleetMember {
        name: name.into(),
        definition,
        behavior: EchoBehavior::Silent,
    }
}

#[test]
fn three_state_machine() {
    let store = MemoryStore::new();
    let map = TransitionMap::new()
        .transition("first", ["second"])
        .transition("second", ["third"])
        .transition("third", ["first", "second"]);
    store.create_state_machine("abc", &map).unwrap();
    store.mkdir("/m").unwrap();
    store.declare("/m/v", "abc", None).unwrap();

    assert_eq!(store.get("/m/v").unwrap(), "first");
    assert!(matches!(
        store.set("/m/v", "third"),
        Err(RunStateError::IllegalTransition(_))
    ));
    store.set("/m/v", "second").unwrap();
    store.set("/m/v", "third").unwrap();
    assert_eq!(store.valid_next_states("/m/v").unwrap(), vec!["first", "second"]);
    assert_eq!(store.transition_map("abc").unwrap(), map);
}

#[test]
fn single_program_echo_converges() {
    let mut fleet = Fleet::builder().echoing("test").build().unwrap();
    fleet.transition("NotReady").unwrap();
    assert_eq!(
        fleet.coordinator().get_participant_states().unwrap(),
        vec![("test".to_string(), "NotReady".to_string())]
    );
}

#[test]
fn missing_echo_times_out() {
    let mut fleet = Fleet::builder().timeout_secs(1).build().unwrap();
    fleet.join(silent("test", ProgramDefinition::default())).unwrap();

    let start = Instant::now();
    let err = fleet.transition("NotReady").unwrap_err();
    let elapsed = start.elapsed();

    match err {
        RunStateError::Timeout { pending, waited_ms } => {
            assert_eq!(pending, vec!["test"]);
            assert!(waited_ms >= 900);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(elapsed < Duration::from_secs(4));
    assert_eq!(
        fleet.coordinator().get_participant_states().unwrap(),
        vec![("test".to_string(), "0Initial".to_string())]
    );
}

#[test]
fn disabled_program_is_not_waited_for() {
    let mut fleet = Fleet::builder().timeout_secs(1).build().unwrap();
    fleet
        .join(silent("test", ProgramDefinition::default().enabled(false)))
        .unwrap();

    let start = Instant::now();
    fleet.transition("NotReady").unwrap();
    assert!(start.elapsed() < Duration::from_millis(900));
}

#[test]
fn program_joining_mid_wait_is_waited_for() {
    let mut fleet = Fleet::builder()
        .program("first", ProgramDefinition::default(), EchoBehavior::delayed(200))
        .timeout_secs(3)
        .build()
        .unwrap();
    let store = fleet.store().clone();

    fleet.coordinator_mut().process_messages().unwrap();
    fleet.coordinator_mut().set_global_state("NotReady").unwrap();

    // Joins before "first" answers and answers well after it
    let late = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        store.mkdir("/RunState/late").unwrap();
        store
            .declare("/RunState/late/State", "RunStateMachine", None)
            .unwrap();
        store.declare("/RunState/late/enable", "bool", Some("true")).unwrap();
        store
            .declare("/RunState/late/standalone", "bool", Some("false"))
            .unwrap();
        thread::sleep(Duration::from_millis(450));
        store.set("/RunState/late/State", "NotReady").unwrap();
    });

    let start = Instant::now();
    let mut seen = Vec::new();
    fleet
        .coordinator_mut()
        .wait_transition_with(|p, s| seen.push(format!("{p}={s}")))
        .unwrap();
    late.join().unwrap();

    assert!(start.elapsed() >= Duration::from_millis(400));
    assert_eq!(seen, vec!["first=NotReady", "late=NotReady"]);
}

#[test]
fn program_declared_after_its_join_is_counted() {
    let mut fleet = Fleet::builder().timeout_secs(3).build().unwrap();
    let store = fleet.store().clone();

    fleet.coordinator_mut().process_messages().unwrap();
    fleet.coordinator_mut().set_global_state("NotReady").unwrap();
    store.mkdir("/RunState/late").unwrap();

    // Flags and echo arrive together, after the join is already queued
    let late = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        store
            .declare("/RunState/late/State", "RunStateMachine", None)
            .unwrap();
        store.declare("/RunState/late/enable", "bool", Some("true")).unwrap();
        store
            .declare("/RunState/late/standalone", "bool", Some("false"))
            .unwrap();
        store.set("/RunState/late/State", "NotReady").unwrap();
    });

    let result = fleet.coordinator_mut().wait_transition();
    late.join().unwrap();
    result.unwrap();
    assert_eq!(fleet.store().get("/RunState/late/State").unwrap(), "NotReady");
}

#[test]
fn unbounded_timeout_waits_without_a_deadline() {
    let mut fleet = Fleet::builder()
        .program("slow", ProgramDefinition::default(), EchoBehavior::delayed(100))
        .timeout_secs(i64::MAX as u64)
        .build()
        .unwrap();
    fleet.transition("NotReady").unwrap();
    assert_eq!(
        fleet.coordinator().get_participant_states().unwrap(),
        vec![("slow".to_string(), "NotReady".to_string())]
    );
}

#[test]
fn program_leaving_mid_wait_releases_the_wait() {
    let mut fleet = Fleet::builder().echoing("stays").timeout_secs(3).build().unwrap();
    fleet.join(silent("goes", ProgramDefinition::default())).unwrap();
    let store = fleet.store().clone();

    fleet.coordinator_mut().process_messages().unwrap();
    fleet.coordinator_mut().set_global_state("NotReady").unwrap();
    let remover = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        store.rmdir("/RunState/goes").unwrap();
    });

    let start = Instant::now();
    fleet.coordinator_mut().wait_transition().unwrap();
    remover.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
fn relocated_parent_dir() {
    let mut fleet = Fleet::builder().parent_dir("/Readouts").echoing("s800").build().unwrap();
    assert_eq!(fleet.coordinator().program_parent_dir(), "/Readouts");
    assert!(fleet.store().ls("/Readouts/s800").is_ok());
    assert!(fleet.store().ls("/RunState").unwrap().is_empty());

    fleet.transition("NotReady").unwrap();
    assert_eq!(fleet.store().get("/Readouts/s800/State").unwrap(), "NotReady");
}

#[test]
fn active_matrix_in_default_and_relocated_parent() {
    for parent in [None, Some("/Readouts")] {
        let mut builder = Fleet::builder();
        if let Some(dir) = parent {
            builder = builder.parent_dir(dir);
        }
        let fleet = builder.build().unwrap();
        let coord = fleet.coordinator();

        for (name, enabled, standalone) in [
            ("a", true, false),
            ("b", true, true),
            ("c", false, false),
            ("d", false, true),
        ] {
            let def = ProgramDefinition::default().enabled(enabled).standalone(standalone);
            coord.add_program(name, &def).unwrap();
            assert_eq!(coord.is_active(name).unwrap(), enabled && !standalone, "{parent:?} {name}");
        }
        assert_eq!(coord.list_active_programs().unwrap(), vec!["a"]);
    }
}

#[test]
fn programs_list_sorted() {
    let fleet = Fleet::builder().build().unwrap();
    let coord = fleet.coordinator();
    for name in ["zdd", "event-builder", "Readout", "aux"] {
        coord.add_program(name, &ProgramDefinition::default()).unwrap();
    }
    assert_eq!(
        coord.list_programs().unwrap(),
        vec!["Readout", "aux", "event-builder", "zdd"]
    );
}

#[test]
fn malformed_frames_do_not_stop_coordination() {
    let mut fleet = Fleet::builder().echoing("evb").build().unwrap();
    fleet.store().inject_frame(Bytes::from_static(&[0x07, 0x01, 0x00]));
    fleet.store().inject_frame(Bytes::from_static(&[0x01, 0xff, 0xff, 0x00]));

    fleet.transition("NotReady").unwrap();
    assert!(fleet.coordinator().monitor().is_running());
    assert_eq!(fleet.store().get(GLOBAL_STATE_PATH).unwrap(), "NotReady");
}

#[test]
fn run_cycle_with_pause() {
    let mut fleet = Fleet::builder()
        .echoing("readout")
        .program(
            "slow",
            ProgramDefinition::default(),
            EchoBehavior::delayed(30),
        )
        .build()
        .unwrap();

    for state in [
        "NotReady", "Readying", "Ready", "Beginning", "Active", "Pausing", "Paused", "Resuming",
        "Active", "Ending", "Ready",
    ] {
        fleet.transition(state).unwrap();
    }
    assert_eq!(fleet.coordinator().get_global_state().unwrap(), "Ready");
}
