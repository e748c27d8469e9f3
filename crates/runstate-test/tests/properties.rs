//! Property-based tests for the state-machine type engine.

use proptest::prelude::*;

use runstate_core::RunStateError;
use runstate_types::{LegalityContext, TransitionMap, TypeRegistry};

/// Random machine over states `s0..sN`, with at least one edge.
fn state_machine() -> impl Strategy<Value = TransitionMap> {
    (1usize..8).prop_flat_map(|n| {
        prop::collection::vec((0..n, 0..n), 1..16).prop_map(move |edges| {
            let mut map = TransitionMap::new();
            for i in 0..n {
                map.add(&format!("s{}", i), Vec::<String>::new());
            }
            for (from, to) in edges {
                map.add(&format!("s{}", from), [format!("s{}", to)]);
            }
            map
        })
    })
}

proptest! {
    #[test]
    fn fresh_variable_only_takes_the_default(map in state_machine()) {
        let mut types = TypeRegistry::new();
        let id = types.create_state_machine("m", &map).unwrap();
        let default = map.states().next().unwrap().to_string();

        for state in map.states() {
            prop_assert_eq!(
                types.legal(id, state, LegalityContext::Creating).unwrap(),
                state == default
            );
        }
        prop_assert!(!types.legal(id, "bogus", LegalityContext::Creating).unwrap());
    }

    #[test]
    fn dangling_edge_leaves_no_trace(map in state_machine()) {
        let mut types = TypeRegistry::new();
        let before = types.len();
        let from = map.states().last().unwrap().to_string();
        let broken = map.clone().transition(&from, ["ghost"]);

        prop_assert!(matches!(
            types.create_state_machine("m", &broken),
            Err(RunStateError::IllegalTransition(_))
        ));
        prop_assert!(!types.contains("m"));
        prop_assert_eq!(types.len(), before);

        // The name is still free
        prop_assert!(types.create_state_machine("m", &map).is_ok());
    }

    #[test]
    fn next_states_sorted_or_rejected(map in state_machine()) {
        let mut types = TypeRegistry::new();
        let id = types.create_state_machine("m", &map).unwrap();

        for (from, targets) in map.iter() {
            match types.valid_next_states(id, from) {
                Ok(next) => {
                    prop_assert!(!next.is_empty());
                    let mut sorted = next.clone();
                    sorted.sort();
                    prop_assert_eq!(&next, &sorted);
                    prop_assert_eq!(next.len(), targets.len());
                }
                Err(e) => {
                    prop_assert!(targets.is_empty());
                    prop_assert!(matches!(e, RunStateError::IllegalTransition(_)), "unexpected error kind");
                }
            }
        }
        prop_assert!(types.valid_next_states(id, "ghost").is_err());
    }

    #[test]
    fn transition_map_is_returned_unchanged(map in state_machine()) {
        let mut types = TypeRegistry::new();
        let id = types.create_state_machine("m", &map).unwrap();
        prop_assert_eq!(types.transition_map(id).unwrap(), map);
    }

    #[test]
    fn existing_value_follows_edges(map in state_machine()) {
        let mut types = TypeRegistry::new();
        let id = types.create_state_machine("m", &map).unwrap();

        for (from, targets) in map.iter() {
            for to in map.states() {
                prop_assert_eq!(
                    types.legal(id, to, LegalityContext::Existing(from)).unwrap(),
                    targets.contains(to)
                );
            }
        }
    }
}
