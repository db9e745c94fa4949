//! Model extraction and iteration.
//!
//! A [`ModelStructure`] owns the compiled constraints for one argument and
//! moves through `Built -> Solving -> Sat | Unsat | Timeout | Unknown`. On
//! SAT the theory decodes the queried primitives into a [`ModelFrame`] and
//! every sentence is recomputed from that frame through the theory's
//! `evaluate` clauses; solver term names are never consulted again.
//!
//! [`ModelIterator`] asks for further models by blocking each one found.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};
use truthmaker_smt::{Model, ModelValue, SmtSolver, SmtTerm};
use truthmaker_syntax::{CanonId, FormulaArena, Node, NodeId, Syntax};

use crate::constraints::{CheckMode, ModelConstraints};
use crate::errors::CheckError;
use crate::printer::ModelReport;
use crate::settings::Settings;
use crate::solve::{self, SolveOutcome};
use crate::theory::{Constraint, DispatchTable, Extension, ModelFrame, ModelPoint, Theory};

/// Isomorphism checks enumerate all N! bit permutations, so they are
/// limited to small state spaces.
pub const MAX_ISOMORPHISM_BITS: u32 = 6;

/// Exact-frame validation is quadratic in the number of states.
const MAX_VALIDATION_BITS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Built,
    Solving,
    Sat,
    Unsat,
    Timeout,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Timings {
    pub build: Duration,
    pub solve: Duration,
    pub extract: Duration,
}

/// Recomputes sentence extensions from a decoded frame.
pub struct Evaluator<'a> {
    theory: &'a dyn Theory,
    arena: &'a FormulaArena,
    dispatch: &'a DispatchTable<'a>,
    frame: &'a ModelFrame,
    memo: HashMap<(CanonId, ModelPoint), Extension>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        theory: &'a dyn Theory,
        arena: &'a FormulaArena,
        dispatch: &'a DispatchTable<'a>,
        frame: &'a ModelFrame,
    ) -> Self {
        Self {
            theory,
            arena,
            dispatch,
            frame,
            memo: HashMap::new(),
        }
    }

    pub fn frame(&self) -> &'a ModelFrame {
        self.frame
    }

    pub fn extension(&mut self, node: NodeId, point: &ModelPoint) -> Result<Extension, CheckError> {
        let arena = self.arena;
        let key = (arena.canon(node), *point);
        if let Some(ext) = self.memo.get(&key) {
            return Ok(ext.clone());
        }
        let ext = match arena.node(node) {
            Node::Letter(l) => self.theory.evaluate_letter(self.frame, arena.letter_name(*l))?,
            Node::Apply { connective, args } => {
                let clause = self.dispatch.primitive(*connective)?;
                clause.evaluate(self, args, point)?
            }
        };
        self.memo.insert(key, ext.clone());
        Ok(ext)
    }

    fn into_memo(self) -> HashMap<(CanonId, ModelPoint), Extension> {
        self.memo
    }
}

pub struct ModelStructure<'t> {
    theory: &'t dyn Theory,
    dispatch: DispatchTable<'t>,
    constraints: ModelConstraints,
    phase: Phase,
    loaded: bool,
    queries: Vec<SmtTerm>,
    model: Option<Model>,
    frame: Option<ModelFrame>,
    extensions: HashMap<(CanonId, ModelPoint), Extension>,
    core: Vec<String>,
    unknown_reason: Option<String>,
    timings: Timings,
}

impl<'t> ModelStructure<'t> {
    pub fn new(
        theory: &'t dyn Theory,
        syntax: Syntax,
        settings: &Settings,
        mode: CheckMode,
    ) -> Result<Self, CheckError> {
        let started = Instant::now();
        let dispatch = DispatchTable::new(theory)?;
        let constraints = ModelConstraints::build(theory, syntax, settings, mode)?;
        Ok(Self {
            theory,
            dispatch,
            constraints,
            phase: Phase::Built,
            loaded: false,
            queries: Vec::new(),
            model: None,
            frame: None,
            extensions: HashMap::new(),
            core: Vec::new(),
            unknown_reason: None,
            timings: Timings {
                build: started.elapsed(),
                ..Timings::default()
            },
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn theory(&self) -> &'t dyn Theory {
        self.theory
    }

    pub fn constraints(&self) -> &ModelConstraints {
        &self.constraints
    }

    pub fn syntax(&self) -> &Syntax {
        &self.constraints.syntax
    }

    pub fn settings(&self) -> &Settings {
        &self.constraints.settings
    }

    pub fn frame(&self) -> Option<&ModelFrame> {
        self.frame.as_ref()
    }

    pub fn core(&self) -> &[String] {
        &self.core
    }

    pub fn unknown_reason(&self) -> Option<&str> {
        self.unknown_reason.as_deref()
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    fn transition(&mut self, to: Phase) -> Result<(), CheckError> {
        let legal = matches!(
            (self.phase, to),
            (Phase::Built, Phase::Solving)
                | (Phase::Sat, Phase::Solving)
                | (
                    Phase::Solving,
                    Phase::Sat | Phase::Unsat | Phase::Timeout | Phase::Unknown
                )
        );
        if !legal {
            return Err(CheckError::InvalidState(format!(
                "cannot move from {:?} to {to:?}",
                self.phase
            )));
        }
        self.phase = to;
        Ok(())
    }

    /// First solve. Only legal in the `Built` phase.
    pub fn solve<S: SmtSolver>(&mut self, solver: &mut S) -> Result<Phase, CheckError> {
        if self.phase != Phase::Built {
            return Err(CheckError::InvalidState(format!(
                "solve called in phase {:?}",
                self.phase
            )));
        }
        let budget = self.settings().solve_budget();
        self.resolve(solver, budget)
    }

    fn resolve<S: SmtSolver>(&mut self, solver: &mut S, budget: Duration) -> Result<Phase, CheckError> {
        self.transition(Phase::Solving)?;
        if !self.loaded {
            solve::load(solver, &self.constraints)?;
            self.loaded = true;
        }
        self.model = None;
        self.frame = None;
        self.extensions.clear();

        let started = Instant::now();
        let theory = self.theory;
        let letters = self.constraints.syntax.letters().clone();
        let settings = self.constraints.settings.clone();
        let cached = std::mem::take(&mut self.queries);
        let mut computed = None;
        let outcome = solve::check(solver, Some(budget), || {
            let queries = if cached.is_empty() {
                theory.model_queries(&letters, &settings)
            } else {
                cached.clone()
            };
            computed = Some(queries.clone());
            queries
        });
        self.queries = computed.unwrap_or(cached);
        self.timings.solve = started.elapsed();

        match outcome? {
            SolveOutcome::Sat(model) => {
                self.transition(Phase::Sat)?;
                self.model = Some(model);
                if self.constraints.mode == CheckMode::Countermodel {
                    self.extract()?;
                }
            }
            SolveOutcome::Unsat { core } => {
                self.transition(Phase::Unsat)?;
                self.core = core;
            }
            SolveOutcome::Timeout => self.transition(Phase::Timeout)?,
            SolveOutcome::Unknown(reason) => {
                self.transition(Phase::Unknown)?;
                self.unknown_reason = Some(reason);
            }
        }
        debug!(phase = ?self.phase, elapsed = ?self.timings.solve, "solve finished");
        Ok(self.phase)
    }

    fn extract(&mut self) -> Result<(), CheckError> {
        let started = Instant::now();
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| CheckError::InvalidState("no model to extract".into()))?;
        let frame = self.theory.decode(
            model,
            self.constraints.syntax.letters(),
            &self.constraints.settings,
        )?;
        let syntax = &self.constraints.syntax;
        let mut ev = Evaluator::new(self.theory, &syntax.arena, &self.dispatch, &frame);
        let main = frame.main_point;
        for sentence in syntax.sentences() {
            for node in syntax.arena.subformulas(sentence.root) {
                ev.extension(self.constraints.lowering.lowered(node), &main)?;
            }
        }
        self.extensions = ev.into_memo();
        self.frame = Some(frame);
        self.timings.extract = started.elapsed();

        #[cfg(debug_assertions)]
        for problem in self.validate() {
            warn!(%problem, "extracted model failed validation");
        }
        Ok(())
    }

    /// Extension of a parsed node at the main point of the current model.
    pub fn extension(&self, node: NodeId) -> Option<&Extension> {
        let main = self.frame.as_ref()?.main_point;
        let lowered = self.constraints.lowering.lowered(node);
        self.extensions.get(&(self.syntax().arena.canon(lowered), main))
    }

    /// Truth of a parsed node at the main evaluation point.
    pub fn truth(&self, node: NodeId) -> Option<bool> {
        let frame = self.frame.as_ref()?;
        self.extension(node)
            .map(|ext| ext.holds_at(&frame.main_point, &frame.space))
    }

    /// Disjunction saying some queried primitive differs from its current
    /// value. Bit-vector queries are states.
    pub fn blocking_constraint(&self, label: String) -> Result<Constraint, CheckError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| CheckError::InvalidState("no model to block".into()))?;
        let width = self.settings().n;
        let mut differs = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            match model.value_of(query) {
                Some(ModelValue::Bool(true)) => differs.push(query.clone().not()),
                Some(ModelValue::Bool(false)) => differs.push(query.clone()),
                Some(ModelValue::BitVec(v)) => {
                    differs.push(query.clone().eq(SmtTerm::bv(v, width)).not())
                }
                None => {
                    return Err(CheckError::Solver(format!(
                        "model has no value for queried term {query:?}"
                    )))
                }
            }
        }
        Ok(Constraint::new(label, SmtTerm::or(differs)))
    }

    /// Problems with the current model; empty when it is well formed.
    pub fn validate(&self) -> Vec<String> {
        let Some(frame) = self.frame.as_ref() else {
            return vec!["no model to validate".into()];
        };
        let mut problems = validate_frame(frame);
        if self.constraints.mode == CheckMode::Countermodel {
            let syntax = self.syntax();
            for (i, s) in syntax.premises.iter().enumerate() {
                if self.truth(s.root) != Some(true) {
                    problems.push(format!("premise {} is not true at the main point", i + 1));
                }
            }
            if !syntax.conclusions.is_empty()
                && syntax.conclusions.iter().all(|s| self.truth(s.root) != Some(false))
            {
                problems.push("no conclusion is false at the main point".into());
            }
        }
        problems
    }
}

/// Structural checks that hold for every well-formed frame.
pub fn validate_frame(frame: &ModelFrame) -> Vec<String> {
    let space = frame.space;
    let mut problems = Vec::new();
    let possible = |s: u64| frame.possible.contains(&s);

    if frame.histories.is_empty() {
        if space.bits() > MAX_VALIDATION_BITS {
            return problems;
        }
        if !possible(space.null()) {
            problems.push("the null state is not possible".into());
        }
        for &s in &frame.possible {
            if let Some(p) = space.states().find(|&p| space.is_part_of(p, s) && !possible(p)) {
                problems.push(format!(
                    "{} is possible but its part {} is not",
                    space.label(s),
                    space.label(p)
                ));
            }
        }
        for &w in &frame.worlds {
            let maximal = possible(w)
                && space
                    .states()
                    .all(|x| !possible(x | w) || space.is_part_of(x, w));
            if !maximal {
                problems.push(format!("world {} is not a maximal possible state", space.label(w)));
            }
        }
        if let Some(w) = frame.main_world() {
            if !frame.worlds.contains(&w) {
                problems.push(format!("main point {} is not a world", space.label(w)));
            }
        }
        for (letter, ext) in &frame.propositions {
            let Some((ver, fal)) = ext.exact() else {
                continue;
            };
            for (name, set) in [("verifiers", ver), ("falsifiers", fal)] {
                let closed = set
                    .iter()
                    .all(|&x| set.iter().all(|&y| set.contains(&(x | y))));
                if !closed {
                    problems.push(format!("{name} of {letter} are not closed under fusion"));
                }
            }
            if ver.iter().any(|&v| fal.iter().any(|&f| possible(v | f))) {
                problems.push(format!("{letter} has a compatible verifier and falsifier"));
            }
            let gap = frame.possible.iter().find(|&&s| {
                !ver.iter().chain(fal.iter()).any(|&t| possible(s | t))
            });
            if let Some(&s) = gap {
                problems.push(format!(
                    "{} is compatible with no verifier or falsifier of {letter}",
                    space.label(s)
                ));
            }
        }
    } else {
        for (i, history) in frame.histories.iter().enumerate() {
            if history.world != i {
                problems.push(format!("world ids are not contiguous at slot {i}"));
            }
            if !history.contains(0) || history.states.is_empty() {
                problems.push(format!("interval of world {i} does not contain 0"));
            }
            for pair in history.states.windows(2) {
                if !frame.transitions.contains(&(pair[0], pair[1])) {
                    problems.push(format!(
                        "world {i} moves from {} to {} without a lawful transition",
                        space.label(pair[0]),
                        space.label(pair[1])
                    ));
                }
            }
        }
    }
    problems
}

fn permutations(n: u32) -> Vec<Vec<u32>> {
    fn extend(prefix: &mut Vec<u32>, used: &mut Vec<bool>, out: &mut Vec<Vec<u32>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i as u32);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }
    let mut out = Vec::new();
    extend(&mut Vec::new(), &mut vec![false; n as usize], &mut out);
    out
}

fn map_set(set: &BTreeSet<u64>, f: impl Fn(u64) -> u64) -> BTreeSet<u64> {
    set.iter().map(|&s| f(s)).collect()
}

/// Whether some permutation of state bits maps `a` onto `b`.
pub fn isomorphic(a: &ModelFrame, b: &ModelFrame) -> bool {
    if a.space != b.space
        || a.possible.len() != b.possible.len()
        || a.worlds.len() != b.worlds.len()
        || a.histories.len() != b.histories.len()
        || a.propositions.len() != b.propositions.len()
    {
        return false;
    }
    let space = a.space;
    permutations(space.bits()).iter().any(|perm| {
        let m = |s: u64| space.permute(s, perm);
        let point = match a.main_point {
            ModelPoint::World(w) => ModelPoint::World(m(w)),
            other => other,
        };
        point == b.main_point
            && map_set(&a.possible, m) == b.possible
            && map_set(&a.worlds, m) == b.worlds
            && a.histories.iter().zip(&b.histories).all(|(x, y)| {
                x.start == y.start
                    && x.states.len() == y.states.len()
                    && x.states.iter().zip(&y.states).all(|(&s, &t)| m(s) == t)
            })
            && a.propositions.iter().all(|(letter, ext)| {
                let mapped = match ext {
                    Extension::Exact {
                        verifiers,
                        falsifiers,
                    } => Extension::Exact {
                        verifiers: map_set(verifiers, m),
                        falsifiers: map_set(falsifiers, m),
                    },
                    temporal => temporal.clone(),
                };
                b.propositions.get(letter) == Some(&mapped)
            })
    })
}

/// Enumerates further models of a structure that has already found one.
pub struct ModelIterator<'s, 't, S: SmtSolver> {
    structure: &'s mut ModelStructure<'t>,
    solver: &'s mut S,
    distinct: Vec<ModelFrame>,
    deadline: Instant,
    skipped: usize,
    blocks: usize,
    done: bool,
}

impl<'s, 't, S: SmtSolver> ModelIterator<'s, 't, S> {
    pub fn new(structure: &'s mut ModelStructure<'t>, solver: &'s mut S) -> Result<Self, CheckError> {
        let first = structure
            .frame()
            .cloned()
            .ok_or_else(|| CheckError::InvalidState("iteration needs a first model".into()))?;
        let deadline = Instant::now() + structure.settings().iteration_budget();
        Ok(Self {
            structure,
            solver,
            distinct: vec![first],
            deadline,
            skipped: 0,
            blocks: 0,
            done: false,
        })
    }

    /// Models found so far, including the first.
    pub fn found(&self) -> usize {
        self.distinct.len()
    }

    /// Pairwise distinct frames in the order they were found.
    pub fn frames(&self) -> &[ModelFrame] {
        &self.distinct
    }

    pub fn structure(&self) -> &ModelStructure<'t> {
        self.structure
    }

    /// Report for the next distinct model, or `None` once iteration stops.
    pub fn next_model(&mut self) -> Result<Option<ModelReport>, CheckError> {
        let settings = self.structure.settings().clone();
        loop {
            if self.done || self.distinct.len() >= settings.iterate {
                self.done = true;
                return Ok(None);
            }
            let now = Instant::now();
            if now >= self.deadline {
                info!(found = self.distinct.len(), "iteration budget exhausted");
                self.done = true;
                return Ok(None);
            }

            let block = self
                .structure
                .blocking_constraint(format!("block:{}", self.blocks))?;
            self.blocks += 1;
            solve::assert_constraint(self.solver, &block)?;
            let budget = settings.solve_budget().min(self.deadline - now);
            if self.structure.resolve(self.solver, budget)? != Phase::Sat {
                debug!(phase = ?self.structure.phase(), "iteration stopped");
                self.done = true;
                return Ok(None);
            }

            let Some(frame) = self.structure.frame().cloned() else {
                self.done = true;
                return Ok(None);
            };
            if frame.space.bits() <= MAX_ISOMORPHISM_BITS
                && self.distinct.iter().any(|f| isomorphic(f, &frame))
            {
                self.skipped += 1;
                if self.skipped > settings.iteration_attempts {
                    warn!(
                        attempts = settings.iteration_attempts,
                        "only isomorphic models remain; stopping iteration"
                    );
                    self.done = true;
                    return Ok(None);
                }
                continue;
            }
            self.skipped = 0;
            self.distinct.push(frame);
            return ModelReport::from_structure(self.structure).map(Some);
        }
    }
}
