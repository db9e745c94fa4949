//! Proptest strategies for state spaces and decoded frames.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use proptest::prelude::*;

use crate::state::{ConcreteSpace, StateSpace};
use crate::theory::{ModelFrame, ModelPoint};

/// Every part of every seed. Never empty: the null state is always included.
pub fn downward_closure(space: &StateSpace, seeds: &[u64]) -> BTreeSet<u64> {
    let mut closed = BTreeSet::from([space.null()]);
    for &seed in seeds {
        closed.extend(space.states().filter(|&s| space.is_part_of(s, seed)));
    }
    closed
}

/// A space of 1..=`max_bits` atoms and a downward-closed possibility set.
pub fn arb_possibility(max_bits: u32) -> impl Strategy<Value = (StateSpace, BTreeSet<u64>)> {
    (1..=max_bits).prop_flat_map(|n| {
        let space = StateSpace::new(n);
        proptest::collection::vec(0..space.size(), 1..=4)
            .prop_map(move |seeds| (space, downward_closure(&space, &seeds)))
    })
}

/// A proposition-free frame whose worlds are the maximal possible states.
pub fn arb_world_frame(max_bits: u32) -> impl Strategy<Value = ModelFrame> {
    arb_possibility(max_bits).prop_map(|(space, possible)| {
        let predicate = |s: u64| possible.contains(&s);
        let concrete = ConcreteSpace {
            space,
            possible: &predicate,
        };
        let worlds: BTreeSet<u64> = space.states().filter(|&w| concrete.is_world(w)).collect();
        let main = worlds.iter().next().copied().unwrap_or(space.null());
        ModelFrame {
            space,
            possible,
            worlds,
            histories: Vec::new(),
            transitions: BTreeSet::new(),
            propositions: IndexMap::new(),
            main_point: ModelPoint::World(main),
        }
    })
}
