//! Constraint compilation.
//!
//! [`ModelConstraints::build`] lowers defined operators, then walks each
//! premise and conclusion depth-first through the theory's clauses. Results
//! are memoized per structural formula identity and evaluation point.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use truthmaker_smt::SmtTerm;
use truthmaker_syntax::{CanonId, FormulaArena, Node, NodeId, Syntax};

use crate::errors::CheckError;
use crate::settings::Settings;
use crate::state::{StateSpace, VarSupply};
use crate::theory::{Constraint, Declaration, DispatchTable, EvalPoint, Lowering, Theory};

/// What the caller hopes the solver answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    /// Look for a model with true premises and some false conclusion.
    #[default]
    Countermodel,
    /// Same constraints; UNSAT establishes validity up to the bound.
    Validity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ClauseMode {
    True,
    False,
    Verify,
    Falsify,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    canon: CanonId,
    mode: ClauseMode,
    state: Option<SmtTerm>,
    point: EvalPoint,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub memo_hits: usize,
    pub memo_misses: usize,
    pub bound_vars: usize,
}

/// Recursive clause compiler handed to theory clauses.
pub struct Builder<'a> {
    theory: &'a dyn Theory,
    arena: &'a FormulaArena,
    dispatch: &'a DispatchTable<'a>,
    settings: &'a Settings,
    space: StateSpace,
    vars: VarSupply,
    memo: HashMap<MemoKey, SmtTerm>,
    hits: usize,
    misses: usize,
}

impl<'a> Builder<'a> {
    pub fn new(
        theory: &'a dyn Theory,
        arena: &'a FormulaArena,
        dispatch: &'a DispatchTable<'a>,
        settings: &'a Settings,
    ) -> Self {
        Self {
            theory,
            arena,
            dispatch,
            settings,
            space: StateSpace::new(settings.n),
            vars: VarSupply::new(),
            memo: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn space(&self) -> StateSpace {
        self.space
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub fn arena(&self) -> &'a FormulaArena {
        self.arena
    }

    pub fn vars(&mut self) -> &mut VarSupply {
        &mut self.vars
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        self.vars.fresh(prefix)
    }

    pub fn true_at(&mut self, node: NodeId, point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        self.compile(node, ClauseMode::True, None, point)
    }

    pub fn false_at(&mut self, node: NodeId, point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        self.compile(node, ClauseMode::False, None, point)
    }

    pub fn extended_verify(
        &mut self,
        state: &SmtTerm,
        node: NodeId,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        self.compile(node, ClauseMode::Verify, Some(state), point)
    }

    pub fn extended_falsify(
        &mut self,
        state: &SmtTerm,
        node: NodeId,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        self.compile(node, ClauseMode::Falsify, Some(state), point)
    }

    fn compile(
        &mut self,
        node: NodeId,
        mode: ClauseMode,
        state: Option<&SmtTerm>,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        let arena = self.arena;
        let key = MemoKey {
            canon: arena.canon(node),
            mode,
            state: state.cloned(),
            point: point.clone(),
        };
        if let Some(term) = self.memo.get(&key) {
            self.hits += 1;
            return Ok(term.clone());
        }
        self.misses += 1;

        let theory = self.theory;
        let term = match arena.node(node) {
            Node::Letter(letter) => {
                let name = arena.letter_name(*letter);
                match (mode, state) {
                    (ClauseMode::True, _) => theory.letter_true_at(self, name, point)?,
                    (ClauseMode::False, _) => theory.letter_false_at(self, name, point)?,
                    (ClauseMode::Verify, Some(s)) => {
                        theory.letter_extended_verify(self, name, s, point)?
                    }
                    (ClauseMode::Falsify, Some(s)) => {
                        theory.letter_extended_falsify(self, name, s, point)?
                    }
                    (_, None) => {
                        return Err(CheckError::InvalidState(
                            "extended clause without a state".into(),
                        ))
                    }
                }
            }
            Node::Apply { connective, args } => {
                let clause = self.dispatch.primitive(*connective)?;
                match (mode, state) {
                    (ClauseMode::True, _) => clause.true_at(self, args, point)?,
                    (ClauseMode::False, _) => clause.false_at(self, args, point)?,
                    (ClauseMode::Verify, Some(s)) => clause.extended_verify(self, s, args, point)?,
                    (ClauseMode::Falsify, Some(s)) => {
                        clause.extended_falsify(self, s, args, point)?
                    }
                    (_, None) => {
                        return Err(CheckError::InvalidState(
                            "extended clause without a state".into(),
                        ))
                    }
                }
            }
        };
        self.memo.insert(key, term.clone());
        Ok(term)
    }

    fn stats(&self) -> BuildStats {
        BuildStats {
            memo_hits: self.hits,
            memo_misses: self.misses,
            bound_vars: self.vars.issued(),
        }
    }
}

/// Everything asserted for one argument check.
#[derive(Debug, Clone)]
pub struct ModelConstraints {
    pub settings: Settings,
    pub mode: CheckMode,
    pub syntax: Syntax,
    pub lowering: Lowering,
    pub declarations: Vec<Declaration>,
    pub frame: Vec<Constraint>,
    pub model: Vec<Constraint>,
    pub premises: Vec<Constraint>,
    pub conclusions: Vec<Constraint>,
    pub stats: BuildStats,
}

impl ModelConstraints {
    pub fn build(
        theory: &dyn Theory,
        mut syntax: Syntax,
        settings: &Settings,
        mode: CheckMode,
    ) -> Result<Self, CheckError> {
        settings.validate()?;
        let dispatch = DispatchTable::new(theory)?;
        let lowering = dispatch.lower(&mut syntax)?;
        let letters = syntax.letters().clone();

        let declarations = theory.declarations(&letters, settings);
        let frame = theory.frame_constraints(settings);
        let model: Vec<Constraint> = letters
            .iter()
            .flat_map(|l| theory.proposition_constraints(l, &letters, settings))
            .collect();

        let main = theory.main_point(settings);
        let mut builder = Builder::new(theory, &syntax.arena, &dispatch, settings);

        let mut premises = Vec::with_capacity(syntax.premises.len());
        for (k, sentence) in syntax.premises.iter().enumerate() {
            let term = builder.true_at(lowering.lowered(sentence.root), &main)?;
            premises.push(Constraint::new(format!("premise:{k}"), term));
        }

        let mut falsified = Vec::with_capacity(syntax.conclusions.len());
        for sentence in &syntax.conclusions {
            falsified.push(builder.false_at(lowering.lowered(sentence.root), &main)?);
        }
        let conclusions = if falsified.is_empty() {
            Vec::new()
        } else {
            vec![Constraint::new("conclusion", SmtTerm::or(falsified))]
        };

        let stats = builder.stats();
        drop(builder);
        debug!(
            theory = theory.name(),
            frame = frame.len(),
            model = model.len(),
            premises = premises.len(),
            conclusions = conclusions.len(),
            memo_hits = stats.memo_hits,
            memo_misses = stats.memo_misses,
            bound_vars = stats.bound_vars,
            "built constraints"
        );

        Ok(Self {
            settings: settings.clone(),
            mode,
            syntax,
            lowering,
            declarations,
            frame,
            model,
            premises,
            conclusions,
            stats,
        })
    }

    /// Constraints in assertion order: frame, model, premises, conclusion.
    pub fn all(&self) -> impl Iterator<Item = &Constraint> {
        self.frame
            .iter()
            .chain(&self.model)
            .chain(&self.premises)
            .chain(&self.conclusions)
    }

    pub fn len(&self) -> usize {
        self.frame.len() + self.model.len() + self.premises.len() + self.conclusions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
