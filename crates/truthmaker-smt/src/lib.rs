#![doc = include_str!("../README.md")]

//! Solver-agnostic constraint IR and solver integration.
//!
//! Constraints are quantified formulas over booleans, fixed-width
//! bit-vectors and uninterpreted boolean functions. Every quantifier ranges
//! over a finite bit-vector sort. The Z3 backend hands them to the `z3`
//! crate; the process backend writes them to an SMT-LIB solver unchanged.

pub mod backends;
pub mod solver;
pub mod sorts;
pub mod terms;

pub use backends::process::{Dialect, ProcessError, ProcessSolver};
pub use backends::z3_backend::{Z3Error, Z3Solver};
pub use solver::{Model, ModelValue, SatResult, SmtSolver};
pub use sorts::SmtSort;
pub use terms::SmtTerm;
