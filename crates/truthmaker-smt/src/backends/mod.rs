//! Solver backends.

pub mod process;
pub mod smtlib_printer;
pub mod z3_backend;
