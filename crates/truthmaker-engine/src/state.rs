//! State algebra: bit-vector states under fusion, concretely and symbolically.
//!
//! A state of width `N` is a set of atomic bits. Fusion is bitwise OR and
//! parthood is inclusion. Possibility is an uninterpreted predicate
//! `possible`; everything else (compatibility, world states, alternatives)
//! is defined from it.

use serde::Serialize;
use truthmaker_smt::{SmtSort, SmtTerm};

/// Name of the uninterpreted possibility predicate.
pub const POSSIBLE: &str = "possible";

/// Supplies bound-variable names that never collide within one build.
#[derive(Debug, Default)]
pub struct VarSupply {
    next: usize,
}

impl VarSupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{prefix}!{}", self.next)
    }

    pub fn issued(&self) -> usize {
        self.next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StateSpace {
    n: u32,
}

impl StateSpace {
    pub fn new(n: u32) -> Self {
        Self { n }
    }

    pub fn bits(&self) -> u32 {
        self.n
    }

    pub fn sort(&self) -> SmtSort {
        SmtSort::BitVec(self.n)
    }

    pub fn null(&self) -> u64 {
        0
    }

    pub fn full(&self) -> u64 {
        if self.n >= 64 {
            u64::MAX
        } else {
            (1u64 << self.n) - 1
        }
    }

    /// Number of states, 2^N.
    pub fn size(&self) -> u64 {
        self.full().saturating_add(1)
    }

    pub fn states(&self) -> impl Iterator<Item = u64> {
        0..=self.full()
    }

    pub fn fuse(&self, a: u64, b: u64) -> u64 {
        a | b
    }

    pub fn is_part_of(&self, a: u64, b: u64) -> bool {
        a | b == b
    }

    pub fn compatible_under(&self, possible: impl Fn(u64) -> bool, a: u64, b: u64) -> bool {
        possible(a | b)
    }

    /// Fusion of atomic letters, e.g. `a.c`; the null state prints as `□`.
    pub fn label(&self, state: u64) -> String {
        if state == 0 {
            return "□".to_string();
        }
        (0..self.n)
            .filter(|i| state & (1 << i) != 0)
            .map(atom_name)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Apply a permutation of bit positions: bit `i` moves to `perm[i]`.
    pub fn permute(&self, state: u64, perm: &[u32]) -> u64 {
        perm.iter()
            .enumerate()
            .filter(|(i, _)| state & (1 << i) != 0)
            .fold(0, |acc, (_, &to)| acc | (1 << to))
    }

    // Symbolic counterparts.

    pub fn literal(&self, state: u64) -> SmtTerm {
        SmtTerm::bv(state, self.n)
    }

    pub fn null_term(&self) -> SmtTerm {
        self.literal(self.null())
    }

    pub fn full_term(&self) -> SmtTerm {
        self.literal(self.full())
    }

    pub fn fusion_term(&self, a: &SmtTerm, b: &SmtTerm) -> SmtTerm {
        a.clone().bvor(b.clone())
    }

    pub fn part_of_term(&self, a: &SmtTerm, b: &SmtTerm) -> SmtTerm {
        self.fusion_term(a, b).eq(b.clone())
    }

    pub fn possible_term(&self, state: &SmtTerm) -> SmtTerm {
        SmtTerm::app(POSSIBLE, vec![state.clone()])
    }

    pub fn compatible_term(&self, a: &SmtTerm, b: &SmtTerm) -> SmtTerm {
        self.possible_term(&self.fusion_term(a, b))
    }

    /// Every state whose fusion with `state` is possible is part of it.
    pub fn maximal_term(&self, state: &SmtTerm, vars: &mut VarSupply) -> SmtTerm {
        let x = vars.fresh("x");
        let xv = SmtTerm::var(&x);
        SmtTerm::forall(
            vec![(x, self.sort())],
            self.compatible_term(&xv, state)
                .implies(self.part_of_term(&xv, state)),
        )
    }

    pub fn is_world_term(&self, state: &SmtTerm, vars: &mut VarSupply) -> SmtTerm {
        SmtTerm::and(vec![
            self.possible_term(state),
            self.maximal_term(state, vars),
        ])
    }

    /// `x` is a part of `w` compatible with `y`, and no larger such part
    /// of `w` contains it.
    pub fn max_compatible_part_term(
        &self,
        x: &SmtTerm,
        w: &SmtTerm,
        y: &SmtTerm,
        vars: &mut VarSupply,
    ) -> SmtTerm {
        let z = vars.fresh("z");
        let zv = SmtTerm::var(&z);
        SmtTerm::and(vec![
            self.part_of_term(x, w),
            self.compatible_term(x, y),
            SmtTerm::forall(
                vec![(z, self.sort())],
                SmtTerm::and(vec![
                    self.part_of_term(&zv, w),
                    self.compatible_term(&zv, y),
                    self.part_of_term(x, &zv),
                ])
                .implies(x.clone().eq(zv)),
            ),
        ])
    }

    /// `u` is a world containing `y` and a maximal part of `w` compatible
    /// with `y`.
    pub fn is_alternative_term(
        &self,
        u: &SmtTerm,
        y: &SmtTerm,
        w: &SmtTerm,
        vars: &mut VarSupply,
    ) -> SmtTerm {
        let z = vars.fresh("z");
        let zv = SmtTerm::var(&z);
        SmtTerm::and(vec![
            self.is_world_term(u, vars),
            self.part_of_term(y, u),
            SmtTerm::exists(
                vec![(z, self.sort())],
                SmtTerm::and(vec![
                    self.part_of_term(&zv, u),
                    self.max_compatible_part_term(&zv, w, y, vars),
                ]),
            ),
        ])
    }
}

fn atom_name(bit: u32) -> String {
    if bit < 26 {
        char::from(b'a' + bit as u8).to_string()
    } else {
        format!("a{bit}")
    }
}

/// Concrete world and alternative computations over a decoded possibility
/// predicate.
pub struct ConcreteSpace<'a> {
    pub space: StateSpace,
    pub possible: &'a dyn Fn(u64) -> bool,
}

impl ConcreteSpace<'_> {
    pub fn compatible(&self, a: u64, b: u64) -> bool {
        (self.possible)(a | b)
    }

    pub fn is_world(&self, w: u64) -> bool {
        (self.possible)(w)
            && self
                .space
                .states()
                .all(|x| !self.compatible(x, w) || self.space.is_part_of(x, w))
    }

    pub fn max_compatible_parts(&self, w: u64, y: u64) -> Vec<u64> {
        let candidates: Vec<u64> = self
            .space
            .states()
            .filter(|&x| self.space.is_part_of(x, w) && self.compatible(x, y))
            .collect();
        candidates
            .iter()
            .copied()
            .filter(|&x| {
                candidates
                    .iter()
                    .all(|&z| z == x || !self.space.is_part_of(x, z))
            })
            .collect()
    }

    /// Worlds containing `y` and some maximal part of `w` compatible with it.
    pub fn alternatives(&self, worlds: &[u64], y: u64, w: u64) -> Vec<u64> {
        let parts = self.max_compatible_parts(w, y);
        worlds
            .iter()
            .copied()
            .filter(|&u| {
                self.space.is_part_of(y, u) && parts.iter().any(|&z| self.space.is_part_of(z, u))
            })
            .collect()
    }
}
