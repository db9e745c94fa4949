//! The contract between the engine and a semantic theory.
//!
//! A theory supplies an operator registry, a clause per registered
//! connective (primitive or defined), frame and proposition constraints,
//! and the model-side hooks the extractor needs to read a solver model
//! back into a [`ModelFrame`].

use std::collections::{BTreeSet, HashMap};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use truthmaker_smt::{Model, SmtSort, SmtTerm};
use truthmaker_syntax::{Connective, FormulaArena, Node, NodeId, OperatorRegistry, Syntax};

use crate::constraints::Builder;
use crate::errors::{CheckError, ConfigurationError};
use crate::model::Evaluator;
use crate::settings::Settings;
use crate::state::StateSpace;

/// Where a sentence is evaluated during constraint compilation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EvalPoint {
    /// A (possibly bound) world-state term.
    World(SmtTerm),
    /// A concrete time in a concrete world-history slot.
    WorldTime { world: usize, time: i64 },
}

impl EvalPoint {
    pub fn world_term(&self) -> Option<&SmtTerm> {
        match self {
            EvalPoint::World(w) => Some(w),
            EvalPoint::WorldTime { .. } => None,
        }
    }

    pub fn world_time(&self) -> Option<(usize, i64)> {
        match self {
            EvalPoint::World(_) => None,
            EvalPoint::WorldTime { world, time } => Some((*world, *time)),
        }
    }
}

/// An evaluation point in a decoded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ModelPoint {
    World(u64),
    WorldTime { world: usize, time: i64 },
}

impl ModelPoint {
    pub fn label(&self, space: &StateSpace) -> String {
        match self {
            ModelPoint::World(w) => space.label(*w),
            ModelPoint::WorldTime { world, time } => format!("world {world}, time {time}"),
        }
    }
}

/// A labelled assertion. Labels name unsat-core members.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub label: String,
    pub term: SmtTerm,
}

impl Constraint {
    pub fn new(label: impl Into<String>, term: SmtTerm) -> Self {
        Self {
            label: label.into(),
            term,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Const { name: String, sort: SmtSort },
    Fun {
        name: String,
        args: Vec<SmtSort>,
        ret: SmtSort,
    },
}

/// Semantic value of a sentence in a decoded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Extension {
    /// Exact verifier and falsifier states.
    Exact {
        verifiers: BTreeSet<u64>,
        falsifiers: BTreeSet<u64>,
    },
    /// World-time points where the sentence is true or false.
    Temporal {
        true_at: BTreeSet<(usize, i64)>,
        false_at: BTreeSet<(usize, i64)>,
    },
}

impl Extension {
    pub fn holds_at(&self, point: &ModelPoint, space: &StateSpace) -> bool {
        match (self, point) {
            (Extension::Exact { verifiers, .. }, ModelPoint::World(w)) => {
                verifiers.iter().any(|&v| space.is_part_of(v, *w))
            }
            (Extension::Temporal { true_at, .. }, ModelPoint::WorldTime { world, time }) => {
                true_at.contains(&(*world, *time))
            }
            _ => false,
        }
    }

    pub fn fails_at(&self, point: &ModelPoint, space: &StateSpace) -> bool {
        match (self, point) {
            (Extension::Exact { falsifiers, .. }, ModelPoint::World(w)) => {
                falsifiers.iter().any(|&f| space.is_part_of(f, *w))
            }
            (Extension::Temporal { false_at, .. }, ModelPoint::WorldTime { world, time }) => {
                false_at.contains(&(*world, *time))
            }
            _ => false,
        }
    }

    pub fn exact(&self) -> Option<(&BTreeSet<u64>, &BTreeSet<u64>)> {
        match self {
            Extension::Exact {
                verifiers,
                falsifiers,
            } => Some((verifiers, falsifiers)),
            Extension::Temporal { .. } => None,
        }
    }

    /// Swap the positive and negative halves.
    pub fn negated(self) -> Extension {
        match self {
            Extension::Exact {
                verifiers,
                falsifiers,
            } => Extension::Exact {
                verifiers: falsifiers,
                falsifiers: verifiers,
            },
            Extension::Temporal { true_at, false_at } => Extension::Temporal {
                true_at: false_at,
                false_at: true_at,
            },
        }
    }
}

/// One world history of a temporal model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct History {
    pub world: usize,
    /// First time of the interval; the interval always contains 0.
    pub start: i64,
    pub states: Vec<u64>,
}

impl History {
    pub fn end(&self) -> i64 {
        self.start + self.states.len() as i64 - 1
    }

    pub fn contains(&self, time: i64) -> bool {
        time >= self.start && time <= self.end()
    }

    pub fn state_at(&self, time: i64) -> Option<u64> {
        if self.contains(time) {
            self.states.get((time - self.start) as usize).copied()
        } else {
            None
        }
    }

    pub fn times(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end()
    }
}

/// Primitive values read out of a solver model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFrame {
    pub space: StateSpace,
    pub possible: BTreeSet<u64>,
    pub worlds: BTreeSet<u64>,
    pub histories: Vec<History>,
    /// Decoded lawful transitions between consecutive history states.
    pub transitions: BTreeSet<(u64, u64)>,
    pub propositions: IndexMap<String, Extension>,
    pub main_point: ModelPoint,
}

impl ModelFrame {
    pub fn is_possible(&self, state: u64) -> bool {
        self.possible.contains(&state)
    }

    pub fn main_world(&self) -> Option<u64> {
        match self.main_point {
            ModelPoint::World(w) => Some(w),
            ModelPoint::WorldTime { .. } => None,
        }
    }

    /// Every decoded evaluation point.
    pub fn points(&self) -> Vec<ModelPoint> {
        if self.histories.is_empty() {
            self.worlds.iter().map(|&w| ModelPoint::World(w)).collect()
        } else {
            self.histories
                .iter()
                .flat_map(|h| {
                    h.times().map(move |time| ModelPoint::WorldTime {
                        world: h.world,
                        time,
                    })
                })
                .collect()
        }
    }
}

/// Constraint-side and model-side semantics of one primitive connective.
pub trait SemanticClause: Send + Sync {
    fn true_at(
        &self,
        b: &mut Builder<'_>,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError>;

    fn false_at(
        &self,
        b: &mut Builder<'_>,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError>;

    /// Defaults to verification by the null state exactly when true.
    fn extended_verify(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        let holds = self.true_at(b, args, point)?;
        Ok(SmtTerm::and(vec![
            state.clone().eq(b.space().null_term()),
            holds,
        ]))
    }

    /// Defaults to falsification by the null state exactly when false.
    fn extended_falsify(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        let fails = self.false_at(b, args, point)?;
        Ok(SmtTerm::and(vec![
            state.clone().eq(b.space().null_term()),
            fails,
        ]))
    }

    /// Extension at `point` in the decoded model.
    fn evaluate(
        &self,
        ev: &mut Evaluator<'_>,
        args: &[NodeId],
        point: &ModelPoint,
    ) -> Result<Extension, CheckError>;
}

/// An operator defined by rewriting into others.
pub trait DefinedOperator: Send + Sync {
    /// Append the definiens for `args` to the arena and return its root.
    fn expand(&self, arena: &mut FormulaArena, args: &[NodeId]) -> NodeId;
}

#[derive(Clone, Copy)]
pub enum Clause<'t> {
    Primitive(&'t dyn SemanticClause),
    Defined(&'t dyn DefinedOperator),
}

pub trait Theory: Send + Sync {
    fn name(&self) -> &str;

    fn registry(&self) -> &OperatorRegistry;

    fn clause(&self, connective: Connective) -> Option<Clause<'_>>;

    fn default_settings(&self) -> Settings;

    fn declarations(&self, letters: &IndexSet<String>, settings: &Settings) -> Vec<Declaration>;

    fn frame_constraints(&self, settings: &Settings) -> Vec<Constraint>;

    fn proposition_constraints(
        &self,
        letter: &str,
        all_letters: &IndexSet<String>,
        settings: &Settings,
    ) -> Vec<Constraint>;

    /// Point at which premises and conclusions are evaluated.
    fn main_point(&self, settings: &Settings) -> EvalPoint;

    fn letter_true_at(
        &self,
        b: &mut Builder<'_>,
        letter: &str,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError>;

    fn letter_false_at(
        &self,
        b: &mut Builder<'_>,
        letter: &str,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError>;

    fn letter_extended_verify(
        &self,
        b: &mut Builder<'_>,
        letter: &str,
        state: &SmtTerm,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError>;

    fn letter_extended_falsify(
        &self,
        b: &mut Builder<'_>,
        letter: &str,
        state: &SmtTerm,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError>;

    /// Ground primitive terms that determine a model.
    fn model_queries(&self, letters: &IndexSet<String>, settings: &Settings) -> Vec<SmtTerm>;

    fn decode(
        &self,
        model: &Model,
        letters: &IndexSet<String>,
        settings: &Settings,
    ) -> Result<ModelFrame, CheckError>;

    fn evaluate_letter(&self, frame: &ModelFrame, letter: &str) -> Result<Extension, CheckError> {
        frame
            .propositions
            .get(letter)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownLetter(letter.to_string()).into())
    }
}

/// Maximum chain of definition expansions before declaring a cycle.
const MAX_EXPANSIONS: usize = 64;

/// Clause per registered connective, resolved once per theory instance.
pub struct DispatchTable<'t> {
    clauses: IndexMap<Connective, Clause<'t>>,
}

impl<'t> DispatchTable<'t> {
    pub fn new(theory: &'t dyn Theory) -> Result<Self, ConfigurationError> {
        let mut clauses = IndexMap::new();
        for connective in theory.registry().connectives() {
            let clause = theory
                .clause(connective)
                .ok_or(ConfigurationError::MissingClause(connective))?;
            clauses.insert(connective, clause);
        }
        Ok(Self { clauses })
    }

    pub fn clause(&self, connective: Connective) -> Option<Clause<'t>> {
        self.clauses.get(&connective).copied()
    }

    pub fn primitive(&self, connective: Connective) -> Result<&'t dyn SemanticClause, ConfigurationError> {
        match self.clause(connective) {
            Some(Clause::Primitive(c)) => Ok(c),
            Some(Clause::Defined(_)) => Err(ConfigurationError::DefinitionCycle(connective)),
            None => Err(ConfigurationError::MissingClause(connective)),
        }
    }

    /// Rewrite defined operators in every sentence into primitives.
    pub fn lower(&self, syntax: &mut Syntax) -> Result<Lowering, ConfigurationError> {
        let mut lowering = Lowering::default();
        let roots: Vec<NodeId> = syntax.sentences().map(|s| s.root).collect();
        for root in roots {
            self.lower_node(&mut syntax.arena, root, 0, &mut lowering)?;
        }
        Ok(lowering)
    }

    fn lower_node(
        &self,
        arena: &mut FormulaArena,
        id: NodeId,
        expansions: usize,
        lowering: &mut Lowering,
    ) -> Result<NodeId, ConfigurationError> {
        if let Some(&done) = lowering.map.get(&id) {
            return Ok(done);
        }
        let lowered = match arena.node(id).clone() {
            Node::Letter(_) => id,
            Node::Apply { connective, args } => match self.clause(connective) {
                None => return Err(ConfigurationError::MissingClause(connective)),
                Some(Clause::Defined(def)) => {
                    if expansions >= MAX_EXPANSIONS {
                        return Err(ConfigurationError::DefinitionCycle(connective));
                    }
                    let expanded = def.expand(arena, &args);
                    self.lower_node(arena, expanded, expansions + 1, lowering)?
                }
                Some(Clause::Primitive(_)) => {
                    let mut lowered_args = Vec::with_capacity(args.len());
                    for &arg in &args {
                        lowered_args.push(self.lower_node(arena, arg, expansions, lowering)?);
                    }
                    if lowered_args == args {
                        id
                    } else {
                        arena.apply(connective, lowered_args)
                    }
                }
            },
        };
        lowering.map.insert(id, lowered);
        Ok(lowered)
    }
}

/// Map from parsed nodes to their primitive-only counterparts.
#[derive(Debug, Clone, Default)]
pub struct Lowering {
    map: HashMap<NodeId, NodeId>,
}

impl Lowering {
    pub fn lowered(&self, id: NodeId) -> NodeId {
        self.map.get(&id).copied().unwrap_or(id)
    }
}
