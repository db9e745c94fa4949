use std::collections::HashMap;
use std::time::Duration;

use crate::backends::smtlib_printer::to_smtlib;
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The wall-clock budget ran out before an answer was found.
    Timeout,
    Unknown(String),
}

/// Values of queried ground terms, extracted from a SAT result.
///
/// Keys are the SMT-LIB rendering of each queried term, so the same model
/// can be read back regardless of which backend produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelValue {
    Bool(bool),
    BitVec(u64),
}

impl Model {
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_bv(&self, name: &str) -> Option<u64> {
        match self.values.get(name) {
            Some(ModelValue::BitVec(v)) => Some(*v),
            _ => None,
        }
    }

    /// Value of a queried term.
    pub fn value_of(&self, term: &SmtTerm) -> Option<ModelValue> {
        self.values.get(&to_smtlib(term)).copied()
    }

    pub fn bool_of(&self, term: &SmtTerm) -> Option<bool> {
        self.get_bool(&to_smtlib(term))
    }

    pub fn bv_of(&self, term: &SmtTerm) -> Option<u64> {
        self.get_bv(&to_smtlib(term))
    }

    pub fn insert(&mut self, term: &SmtTerm, value: ModelValue) {
        self.values.insert(to_smtlib(term), value);
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new constant.
    fn declare_const(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Declare an uninterpreted function.
    fn declare_fun(
        &mut self,
        name: &str,
        args: &[SmtSort],
        ret: &SmtSort,
    ) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Assert a constraint that may appear in an UNSAT core under `name`.
    fn assert_named(&mut self, _name: &str, term: &SmtTerm) -> Result<(), Self::Error> {
        self.assert(term)
    }

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Bound the wall-clock time of subsequent checks. `None` removes the bound.
    fn set_time_budget(&mut self, budget: Option<Duration>) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Values of ground terms in the model of the previous SAT check.
    fn get_values(&mut self, queries: &[SmtTerm]) -> Result<Model, Self::Error>;

    /// Check satisfiability and read back the given ground terms if SAT.
    fn check_sat_with_model(
        &mut self,
        queries: &[SmtTerm],
    ) -> Result<(SatResult, Option<Model>), Self::Error> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }
        let model = self.get_values(queries)?;
        Ok((result, Some(model)))
    }

    /// Returns true when named assertions are reported by [`Self::unsat_core`].
    fn supports_unsat_core(&self) -> bool {
        false
    }

    /// Names of the assertions in the UNSAT core of the previous check.
    fn unsat_core(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(Vec::new())
    }

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct MockSolver {
        sat_result: SatResult,
        check_sat_calls: usize,
        reset_calls: usize,
        asserted: Vec<SmtTerm>,
    }

    impl MockSolver {
        fn new(sat_result: SatResult) -> Self {
            Self {
                sat_result,
                check_sat_calls: 0,
                reset_calls: 0,
                asserted: Vec::new(),
            }
        }
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_const(&mut self, _name: &str, _sort: &SmtSort) -> Result<(), Self::Error> {
            Ok(())
        }

        fn declare_fun(
            &mut self,
            _name: &str,
            _args: &[SmtSort],
            _ret: &SmtSort,
        ) -> Result<(), Self::Error> {
            Ok(())
        }

        fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error> {
            self.asserted.push(term.clone());
            Ok(())
        }

        fn push(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn pop(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_time_budget(&mut self, _budget: Option<Duration>) -> Result<(), Self::Error> {
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
            self.check_sat_calls += 1;
            Ok(self.sat_result.clone())
        }

        fn get_values(&mut self, queries: &[SmtTerm]) -> Result<Model, Self::Error> {
            let mut model = Model::default();
            for q in queries {
                model.insert(q, ModelValue::Bool(true));
            }
            Ok(model)
        }

        fn reset(&mut self) -> Result<(), Self::Error> {
            self.reset_calls += 1;
            Ok(())
        }
    }

    #[test]
    fn model_getters_return_typed_values_only() {
        let mut model = Model::default();
        let state = SmtTerm::var("w");
        let flag = SmtTerm::app("possible", vec![SmtTerm::bv(3, 2)]);
        model.insert(&state, ModelValue::BitVec(2));
        model.insert(&flag, ModelValue::Bool(true));

        assert_eq!(model.bv_of(&state), Some(2));
        assert_eq!(model.bool_of(&flag), Some(true));
        assert_eq!(model.get_bool("(possible #b11)"), Some(true));
        assert_eq!(model.bv_of(&flag), None);
        assert_eq!(model.bool_of(&state), None);
        assert_eq!(model.get_bool("missing"), None);
    }

    #[test]
    fn provided_check_with_model_reads_values_only_when_sat() {
        let query = SmtTerm::app("possible", vec![SmtTerm::bv(0, 2)]);
        let mut sat = MockSolver::new(SatResult::Sat);
        let (result, model) = sat.check_sat_with_model(&[query.clone()]).unwrap();
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.and_then(|m| m.bool_of(&query)), Some(true));

        let mut unsat = MockSolver::new(SatResult::Unsat);
        let (result, model) = unsat.check_sat_with_model(&[query]).unwrap();
        assert_eq!(result, SatResult::Unsat);
        assert!(model.is_none());
    }

    #[test]
    fn default_unsat_core_support_is_disabled() {
        let solver = MockSolver::new(SatResult::Sat);
        assert!(!solver.supports_unsat_core());
    }

    #[test]
    fn default_assert_named_delegates_to_assert() {
        let mut solver = MockSolver::new(SatResult::Unsat);
        solver
            .assert_named("premise:0", &SmtTerm::var("p"))
            .expect("assert_named should succeed");
        assert_eq!(solver.asserted, vec![SmtTerm::var("p")]);
        assert_eq!(solver.check_sat().expect("check"), SatResult::Unsat);
        assert_eq!(solver.check_sat_calls, 1);
    }

    #[test]
    fn default_unsat_core_returns_empty_and_reset_is_callable() {
        let mut solver = MockSolver::new(SatResult::Timeout);
        let core = solver
            .unsat_core()
            .expect("default unsat core query should succeed");
        assert!(core.is_empty());

        solver.reset().expect("reset should succeed");
        assert_eq!(solver.reset_calls, 1);
    }
}
