#![doc = include_str!("../README.md")]

//! Truthmaker checking engine.
//!
//! A [`Theory`] supplies frame axioms and per-operator clauses; the engine
//! compiles an argument into a bounded constraint problem, solves it with
//! an [`SmtSolver`](truthmaker_smt::SmtSolver) and decodes the answer into
//! a [`ModelReport`].

pub mod batch;
pub mod check;
pub mod constraints;
pub mod errors;
pub mod model;
pub mod printer;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod settings;
pub mod solve;
pub mod state;
pub mod theories;
pub mod theory;

pub use batch::{run_batch, Example};
pub use check::{check_argument, CheckReport, Verdict};
pub use constraints::{CheckMode, ModelConstraints};
pub use errors::{CheckError, ConfigurationError};
pub use model::{isomorphic, validate_frame, ModelIterator, ModelStructure, Phase};
pub use printer::{print_report, ModelReport, SentenceReport};
pub use settings::Settings;
pub use solve::{solve, SolveOutcome};
pub use state::StateSpace;
pub use theories::{BimodalTheory, HyperintensionalTheory};
pub use theory::{
    Clause, Constraint, DefinedOperator, EvalPoint, Extension, ModelFrame, ModelPoint,
    SemanticClause, Theory,
};
