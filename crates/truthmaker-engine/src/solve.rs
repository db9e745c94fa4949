//! Solver adapter: declare, assert, check within a budget.

use std::time::Duration;

use tracing::debug;
use truthmaker_smt::{Model, SatResult, SmtSolver, SmtTerm};

use crate::constraints::ModelConstraints;
use crate::errors::CheckError;
use crate::theory::{Constraint, Declaration};

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Sat(Model),
    Unsat { core: Vec<String> },
    Timeout,
    Unknown(String),
}

impl SolveOutcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolveOutcome::Sat(_))
    }
}

pub(crate) fn solver_error(e: impl std::fmt::Display) -> CheckError {
    CheckError::Solver(e.to_string())
}

/// Declare every symbol and assert every constraint under its label.
pub fn load<S: SmtSolver>(solver: &mut S, constraints: &ModelConstraints) -> Result<(), CheckError> {
    for decl in &constraints.declarations {
        let declared = match decl {
            Declaration::Const { name, sort } => solver.declare_const(name, sort),
            Declaration::Fun { name, args, ret } => solver.declare_fun(name, args, ret),
        };
        declared.map_err(solver_error)?;
    }
    for constraint in constraints.all() {
        assert_constraint(solver, constraint)?;
    }
    debug!(assertions = constraints.len(), "loaded constraints");
    Ok(())
}

pub fn assert_constraint<S: SmtSolver>(solver: &mut S, constraint: &Constraint) -> Result<(), CheckError> {
    solver
        .assert_named(&constraint.label, &constraint.term)
        .map_err(solver_error)
}

/// Check the loaded assertions. Queries are built only on SAT, so a
/// timeout on a huge state space never materializes them.
pub fn check<S: SmtSolver>(
    solver: &mut S,
    budget: Option<Duration>,
    queries: impl FnOnce() -> Vec<SmtTerm>,
) -> Result<SolveOutcome, CheckError> {
    solver.set_time_budget(budget).map_err(solver_error)?;
    match solver.check_sat().map_err(solver_error)? {
        SatResult::Sat => {
            let model = solver.get_values(&queries()).map_err(solver_error)?;
            Ok(SolveOutcome::Sat(model))
        }
        SatResult::Unsat => {
            let core = if solver.supports_unsat_core() {
                solver.unsat_core().map_err(solver_error)?
            } else {
                Vec::new()
            };
            Ok(SolveOutcome::Unsat { core })
        }
        SatResult::Timeout => Ok(SolveOutcome::Timeout),
        SatResult::Unknown(reason) => Ok(SolveOutcome::Unknown(reason)),
    }
}

/// Load and check in one step.
pub fn solve<S: SmtSolver>(
    solver: &mut S,
    constraints: &ModelConstraints,
    budget: Option<Duration>,
    queries: impl FnOnce() -> Vec<SmtTerm>,
) -> Result<SolveOutcome, CheckError> {
    load(solver, constraints)?;
    check(solver, budget, queries)
}
