use proptest::prelude::*;
use truthmaker_engine::proptest_generators::{arb_possibility, arb_world_frame};
use truthmaker_engine::state::ConcreteSpace;
use truthmaker_engine::{isomorphic, validate_frame};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn possibility_is_closed_under_parts((space, possible) in arb_possibility(5)) {
        prop_assert!(possible.contains(&space.null()));
        for &s in &possible {
            for x in space.states() {
                if space.is_part_of(x, s) {
                    prop_assert!(possible.contains(&x));
                }
            }
        }
    }

    #[test]
    fn every_possible_state_lies_in_a_world(frame in arb_world_frame(5)) {
        prop_assert!(!frame.worlds.is_empty());
        for &s in &frame.possible {
            prop_assert!(frame.worlds.iter().any(|&w| frame.space.is_part_of(s, w)));
        }
        prop_assert!(validate_frame(&frame).is_empty(), "{:?}", validate_frame(&frame));
    }

    #[test]
    fn worlds_are_their_own_alternatives((space, possible) in arb_possibility(4)) {
        let predicate = |s: u64| possible.contains(&s);
        let concrete = ConcreteSpace { space, possible: &predicate };
        let worlds: Vec<u64> = space.states().filter(|&w| concrete.is_world(w)).collect();
        for &w in &worlds {
            for &y in &possible {
                if space.is_part_of(y, w) {
                    prop_assert_eq!(concrete.alternatives(&worlds, y, w), vec![w]);
                }
            }
        }
    }

    #[test]
    fn frames_are_isomorphic_to_themselves(frame in arb_world_frame(4)) {
        prop_assert!(isomorphic(&frame, &frame));
    }
}
