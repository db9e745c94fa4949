use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;
use z3::ast::{Bool, Dynamic, BV};
use z3::SatResult as Z3SatResult;

use crate::backends::smtlib_printer::to_smtlib;
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("Symbol declared twice: {0}")]
    Redeclared(String),
    #[error("Sort mismatch: {0}")]
    SortMismatch(String),
    #[error("pop without matching push")]
    ScopeUnderflow,
}

#[derive(Debug, Clone, Copy)]
struct ScopeMark {
    consts: usize,
    funs: usize,
    trackers: usize,
}

/// In-process backend on the `z3` crate.
///
/// Finite quantifiers are passed through as `forall_const`/`exists_const`
/// over fresh bit-vector constants; named assertions are tracked with
/// fresh boolean literals so the core can be mapped back to labels.
pub struct Z3Solver {
    solver: z3::Solver,
    consts: HashMap<String, Z3Term>,
    const_order: Vec<String>,
    funs: HashMap<String, (z3::FuncDecl, SmtSort)>,
    fun_order: Vec<String>,
    trackers: Vec<(String, Bool)>,
    scopes: Vec<ScopeMark>,
    budget: Option<Duration>,
    params: Option<z3::Params>,
    last_core: Vec<String>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            consts: HashMap::new(),
            const_order: Vec::new(),
            funs: HashMap::new(),
            fun_order: Vec::new(),
            trackers: Vec::new(),
            scopes: Vec::new(),
            budget: None,
            params: None,
            last_core: Vec::new(),
        }
    }

    pub fn with_time_budget(budget: Duration) -> Self {
        let mut solver = Self::new();
        solver.apply_budget(Some(budget));
        solver
    }

    fn apply_budget(&mut self, budget: Option<Duration>) {
        // Z3's own default timeout is UINT_MAX, i.e. unbounded.
        let timeout_ms = budget.map_or(u32::MAX, |b| {
            u32::try_from(b.as_millis()).unwrap_or(u32::MAX).max(1)
        });
        let mut params = z3::Params::new();
        params.set_u32("timeout", timeout_ms);
        self.solver.set_params(&params);
        self.params = Some(params);
        self.budget = budget;
    }

    fn check_fresh(&self, name: &str) -> Result<(), Z3Error> {
        if self.consts.contains_key(name) || self.funs.contains_key(name) {
            return Err(Z3Error::Redeclared(name.to_string()));
        }
        Ok(())
    }

    fn translate(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        self.translate_term(term, &mut Vec::new())
    }

    fn translate_term(
        &self,
        term: &SmtTerm,
        bound: &mut Vec<(String, Z3Term)>,
    ) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some((_, v)) = bound.iter().rev().find(|(n, _)| n == name) {
                    return Ok(v.clone());
                }
                if let Some(v) = self.consts.get(name) {
                    return Ok(v.clone());
                }
                // Nullary functions may be referenced without arguments.
                match self.funs.get(name) {
                    Some((decl, ret)) => Z3Term::from_dynamic(decl.apply(&[]), ret, name),
                    None => Err(Z3Error::UnknownSymbol(name.clone())),
                }
            }
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(Bool::from_bool(*b))),
            SmtTerm::BvLit { value, width } => Ok(Z3Term::BitVec(BV::from_u64(*value, *width))),
            SmtTerm::App(name, args) => {
                let (decl, ret) = self
                    .funs
                    .get(name)
                    .ok_or_else(|| Z3Error::UnknownSymbol(name.clone()))?;
                let args = args
                    .iter()
                    .map(|a| self.translate_term(a, bound))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&dyn z3::ast::Ast> = args.iter().map(Z3Term::as_ast).collect();
                Z3Term::from_dynamic(decl.apply(&refs), ret, name)
            }
            SmtTerm::BvOr(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::BitVec(l.bvor(&r)))
            }
            SmtTerm::BvAnd(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::BitVec(l.bvand(&r)))
            }
            SmtTerm::BvNot(inner) => {
                let v = self.translate_term(inner, bound)?.into_bv()?;
                Ok(Z3Term::BitVec(v.bvnot()))
            }
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?;
                let r = self.translate_term(rhs, bound)?;
                match (l, r) {
                    (Z3Term::BitVec(lv), Z3Term::BitVec(rv)) => {
                        if lv.get_size() != rv.get_size() {
                            return Err(Z3Error::SortMismatch(format!(
                                "`=` over widths {} and {}",
                                lv.get_size(),
                                rv.get_size()
                            )));
                        }
                        Ok(Z3Term::Bool(lv.eq(&rv)))
                    }
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    _ => Err(Z3Error::SortMismatch("`=` over Bool and BitVec".into())),
                }
            }
            SmtTerm::And(terms) => {
                let bools = self.translate_bools(terms, bound)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_bools(terms, bound)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner, bound)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bool()?;
                let r = self.translate_term(rhs, bound)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond, bound)?.into_bool()?;
                let t = self.translate_term(then, bound)?;
                let e = self.translate_term(els, bound)?;
                match (t, e) {
                    (Z3Term::BitVec(tv), Z3Term::BitVec(ev)) => Ok(Z3Term::BitVec(c.ite(&tv, &ev))),
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    _ => Err(Z3Error::SortMismatch("branches of `ite`".into())),
                }
            }
            SmtTerm::ForAll(bindings, body) | SmtTerm::Exists(bindings, body) => {
                let depth = bound.len();
                for (name, sort) in bindings {
                    let var = match sort {
                        SmtSort::Bool => Z3Term::Bool(Bool::fresh_const(name.as_str())),
                        SmtSort::BitVec(w) => Z3Term::BitVec(BV::fresh_const(name.as_str(), *w)),
                    };
                    bound.push((name.clone(), var));
                }
                let body = self.translate_term(body, bound);
                let vars: Vec<Z3Term> = bound.drain(depth..).map(|(_, v)| v).collect();
                let body = body?.into_bool()?;
                let refs: Vec<&dyn z3::ast::Ast> = vars.iter().map(Z3Term::as_ast).collect();
                let quantified = if matches!(term, SmtTerm::ForAll(..)) {
                    z3::ast::forall_const(&refs, &[], &body)
                } else {
                    z3::ast::exists_const(&refs, &[], &body)
                };
                Ok(Z3Term::Bool(quantified))
            }
        }
    }

    fn translate_bools(
        &self,
        terms: &[SmtTerm],
        bound: &mut Vec<(String, Z3Term)>,
    ) -> Result<Vec<Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t, bound).and_then(Z3Term::into_bool))
            .collect()
    }

    fn query_value(&self, model: &z3::Model, query: &SmtTerm) -> Result<ModelValue, Z3Error> {
        let value = match self.translate(query)? {
            Z3Term::Bool(b) => model
                .eval(&b, true)
                .and_then(|v| v.as_bool())
                .map(ModelValue::Bool),
            Z3Term::BitVec(v) => model
                .eval(&v, true)
                .and_then(|v| v.as_u64())
                .map(ModelValue::BitVec),
        };
        value.ok_or_else(|| Z3Error::Internal(format!("no value for {}", to_smtlib(query))))
    }
}

#[derive(Clone)]
enum Z3Term {
    Bool(Bool),
    BitVec(BV),
}

impl Z3Term {
    fn from_dynamic(value: Dynamic, sort: &SmtSort, name: &str) -> Result<Self, Z3Error> {
        let converted = match sort {
            SmtSort::Bool => value.as_bool().map(Z3Term::Bool),
            SmtSort::BitVec(_) => value.as_bv().map(Z3Term::BitVec),
        };
        converted.ok_or_else(|| Z3Error::SortMismatch(format!("result of `{name}`")))
    }

    fn as_ast(&self) -> &dyn z3::ast::Ast {
        match self {
            Z3Term::Bool(b) => b,
            Z3Term::BitVec(v) => v,
        }
    }

    fn into_bool(self) -> Result<Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::BitVec(_) => Err(Z3Error::SortMismatch("expected Bool, got BitVec".into())),
        }
    }

    fn into_bv(self) -> Result<BV, Z3Error> {
        match self {
            Z3Term::BitVec(v) => Ok(v),
            Z3Term::Bool(_) => Err(Z3Error::SortMismatch("expected BitVec, got Bool".into())),
        }
    }
}

fn z3_sort(sort: &SmtSort) -> z3::Sort {
    match sort {
        SmtSort::Bool => z3::Sort::bool(),
        SmtSort::BitVec(w) => z3::Sort::bitvector(*w),
    }
}

fn is_timeout_reason(reason: &str) -> bool {
    reason.contains("timeout") || reason.contains("canceled")
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_const(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        self.check_fresh(name)?;
        let v = match sort {
            SmtSort::Bool => Z3Term::Bool(Bool::new_const(name)),
            SmtSort::BitVec(w) => Z3Term::BitVec(BV::new_const(name, *w)),
        };
        self.consts.insert(name.to_string(), v);
        self.const_order.push(name.to_string());
        Ok(())
    }

    fn declare_fun(&mut self, name: &str, args: &[SmtSort], ret: &SmtSort) -> Result<(), Z3Error> {
        self.check_fresh(name)?;
        let domain: Vec<z3::Sort> = args.iter().map(z3_sort).collect();
        let domain_refs: Vec<&z3::Sort> = domain.iter().collect();
        let decl = z3::FuncDecl::new(name, &domain_refs, &z3_sort(ret));
        self.funs.insert(name.to_string(), (decl, ret.clone()));
        self.fun_order.push(name.to_string());
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let b = self.translate(term)?.into_bool()?;
        self.solver.assert(&b);
        Ok(())
    }

    fn assert_named(&mut self, name: &str, term: &SmtTerm) -> Result<(), Z3Error> {
        let b = self.translate(term)?.into_bool()?;
        let tracker = Bool::fresh_const("track");
        self.solver.assert_and_track(&b, &tracker);
        self.trackers.push((name.to_string(), tracker));
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        self.scopes.push(ScopeMark {
            consts: self.const_order.len(),
            funs: self.fun_order.len(),
            trackers: self.trackers.len(),
        });
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        let mark = self.scopes.pop().ok_or(Z3Error::ScopeUnderflow)?;
        self.solver.pop(1);
        for name in self.const_order.drain(mark.consts..) {
            self.consts.remove(&name);
        }
        for name in self.fun_order.drain(mark.funs..) {
            self.funs.remove(&name);
        }
        self.trackers.truncate(mark.trackers);
        Ok(())
    }

    fn set_time_budget(&mut self, budget: Option<Duration>) -> Result<(), Z3Error> {
        self.apply_budget(budget);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        self.last_core.clear();
        let started = Instant::now();
        let result = match self.solver.check() {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => {
                let core = self.solver.get_unsat_core();
                self.last_core = self
                    .trackers
                    .iter()
                    .filter(|(_, lit)| core.iter().any(|c| c == lit))
                    .map(|(name, _)| name.clone())
                    .collect();
                SatResult::Unsat
            }
            Z3SatResult::Unknown => {
                let reason = self
                    .solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into());
                let over_budget = self.budget.is_some_and(|b| started.elapsed() >= b);
                if over_budget || is_timeout_reason(&reason) {
                    SatResult::Timeout
                } else {
                    SatResult::Unknown(reason)
                }
            }
        };
        debug!(
            result = ?result,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "z3 check finished"
        );
        Ok(result)
    }

    fn get_values(&mut self, queries: &[SmtTerm]) -> Result<Model, Z3Error> {
        let z3_model = self
            .solver
            .get_model()
            .ok_or_else(|| Z3Error::Internal("no model available".into()))?;
        let mut model = Model::default();
        for query in queries {
            let value = self.query_value(&z3_model, query)?;
            model.insert(query, value);
        }
        Ok(model)
    }

    fn supports_unsat_core(&self) -> bool {
        true
    }

    fn unsat_core(&mut self) -> Result<Vec<String>, Z3Error> {
        Ok(self.last_core.clone())
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply the budget.
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.consts.clear();
        self.const_order.clear();
        self.funs.clear();
        self.fun_order.clear();
        self.trackers.clear();
        self.scopes.clear();
        self.last_core.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> SmtTerm {
        SmtTerm::var(name)
    }

    #[test]
    fn bitvector_constant_is_pinned_by_equalities() {
        let mut s = Z3Solver::new();
        s.declare_const("w", &SmtSort::BitVec(3)).unwrap();
        s.assert(&var("w").bvor(SmtTerm::bv(1, 3)).eq(SmtTerm::bv(5, 3)))
            .unwrap();
        s.assert(&var("w").eq(SmtTerm::bv(5, 3)).not()).unwrap();
        let (result, model) = s.check_sat_with_model(&[var("w")]).unwrap();
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.unwrap().bv_of(&var("w")), Some(4));
    }

    #[test]
    fn quantified_downward_closure_forces_null_possible() {
        let mut s = Z3Solver::new();
        let sort = SmtSort::BitVec(2);
        s.declare_fun("possible", &[sort.clone()], &SmtSort::Bool)
            .unwrap();
        let (x, y) = (var("x"), var("y"));
        s.assert(&SmtTerm::forall(
            vec![("x".into(), sort.clone()), ("y".into(), sort.clone())],
            SmtTerm::and(vec![
                SmtTerm::app("possible", vec![y.clone()]),
                x.clone().bvor(y.clone()).eq(y),
            ])
            .implies(SmtTerm::app("possible", vec![x])),
        ))
        .unwrap();
        s.assert(&SmtTerm::app("possible", vec![SmtTerm::bv(3, 2)]))
            .unwrap();

        let queries: Vec<SmtTerm> = (0..4)
            .map(|v| SmtTerm::app("possible", vec![SmtTerm::bv(v, 2)]))
            .collect();
        let (result, model) = s.check_sat_with_model(&queries).unwrap();
        assert_eq!(result, SatResult::Sat);
        let model = model.unwrap();
        for q in &queries {
            assert_eq!(model.bool_of(q), Some(true));
        }
    }

    #[test]
    fn binder_names_shadow_declared_constants() {
        let mut s = Z3Solver::new();
        s.declare_const("x", &SmtSort::BitVec(2)).unwrap();
        s.assert(&var("x").eq(SmtTerm::bv(2, 2))).unwrap();
        s.assert(&SmtTerm::exists(
            vec![("x".into(), SmtSort::BitVec(2))],
            var("x").eq(SmtTerm::bv(1, 2)),
        ))
        .unwrap();
        let (result, model) = s.check_sat_with_model(&[var("x")]).unwrap();
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.unwrap().bv_of(&var("x")), Some(2));
    }

    #[test]
    fn uninterpreted_application_on_symbolic_argument() {
        let mut s = Z3Solver::new();
        s.declare_const("w", &SmtSort::BitVec(2)).unwrap();
        s.declare_fun("f", &[SmtSort::BitVec(2)], &SmtSort::Bool)
            .unwrap();
        s.assert(&SmtTerm::app("f", vec![var("w")])).unwrap();
        for v in 0..3 {
            s.assert(&SmtTerm::app("f", vec![SmtTerm::bv(v, 2)]).not())
                .unwrap();
        }
        let (result, model) = s.check_sat_with_model(&[var("w")]).unwrap();
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.unwrap().bv_of(&var("w")), Some(3));
    }

    #[test]
    fn named_assertions_produce_core() {
        let mut s = Z3Solver::new();
        s.declare_const("p", &SmtSort::Bool).unwrap();
        s.declare_const("q", &SmtSort::Bool).unwrap();
        s.assert_named("a", &var("p")).unwrap();
        s.assert_named("b", &var("q")).unwrap();
        s.assert_named("c", &var("p").not()).unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
        let core = s.unsat_core().unwrap();
        assert!(core.contains(&"a".to_string()));
        assert!(core.contains(&"c".to_string()));
        assert!(!core.contains(&"b".to_string()));
    }

    #[test]
    fn push_pop_restores_satisfiability() {
        let mut s = Z3Solver::new();
        s.declare_const("p", &SmtSort::Bool).unwrap();
        s.assert(&var("p")).unwrap();
        s.push().unwrap();
        s.declare_const("q", &SmtSort::Bool).unwrap();
        s.assert_named("inner", &var("p").not()).unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
        s.pop().unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
        assert!(matches!(s.assert(&var("q")), Err(Z3Error::UnknownSymbol(_))));
        assert!(matches!(s.pop(), Err(Z3Error::ScopeUnderflow)));
    }

    #[test]
    fn tiny_budget_on_pigeonhole_times_out() {
        let mut s = Z3Solver::with_time_budget(Duration::from_millis(1));
        let wide = SmtSort::BitVec(24);
        s.declare_fun("g", &[wide.clone()], &SmtSort::BitVec(20))
            .unwrap();
        let (x, y) = (var("x"), var("y"));
        s.assert(&SmtTerm::forall(
            vec![("x".into(), wide.clone()), ("y".into(), wide)],
            x.clone()
                .eq(y.clone())
                .not()
                .implies(SmtTerm::app("g", vec![x]).eq(SmtTerm::app("g", vec![y])).not()),
        ))
        .unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Timeout);
    }

    #[test]
    fn budget_survives_reset() {
        let mut s = Z3Solver::with_time_budget(Duration::from_secs(2));
        s.declare_const("p", &SmtSort::Bool).unwrap();
        s.reset().unwrap();
        assert!(s.params.is_some());
        assert_eq!(s.budget, Some(Duration::from_secs(2)));
        s.declare_const("p", &SmtSort::Bool).unwrap();
        s.assert(&var("p")).unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
    }

    #[test]
    fn redeclaration_and_sort_errors_are_rejected() {
        let mut s = Z3Solver::new();
        s.declare_const("w", &SmtSort::BitVec(2)).unwrap();
        assert!(matches!(
            s.declare_fun("w", &[], &SmtSort::Bool),
            Err(Z3Error::Redeclared(_))
        ));
        assert!(matches!(s.assert(&var("w")), Err(Z3Error::SortMismatch(_))));
        assert!(matches!(
            s.assert(&var("w").eq(SmtTerm::bv(1, 3))),
            Err(Z3Error::SortMismatch(_))
        ));
    }
}
