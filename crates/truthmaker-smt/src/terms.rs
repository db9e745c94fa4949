use crate::sorts::SmtSort;

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtTerm {
    /// Constant or bound-variable reference by name.
    Var(String),
    /// Boolean literal.
    BoolLit(bool),
    /// Bit-vector literal of the given width.
    BvLit { value: u64, width: u32 },
    /// Application of a declared uninterpreted function.
    App(String, Vec<SmtTerm>),

    // Bit-vector operations
    BvOr(Box<SmtTerm>, Box<SmtTerm>),
    BvAnd(Box<SmtTerm>, Box<SmtTerm>),
    BvNot(Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // Quantifiers over finite sorts
    ForAll(Vec<(String, SmtSort)>, Box<SmtTerm>),
    Exists(Vec<(String, SmtSort)>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn bv(value: u64, width: u32) -> Self {
        SmtTerm::BvLit { value, width }
    }

    pub fn app(name: impl Into<String>, args: Vec<SmtTerm>) -> Self {
        SmtTerm::App(name.into(), args)
    }

    pub fn bvor(self, other: SmtTerm) -> Self {
        SmtTerm::BvOr(Box::new(self), Box::new(other))
    }

    pub fn bvand(self, other: SmtTerm) -> Self {
        SmtTerm::BvAnd(Box::new(self), Box::new(other))
    }

    pub fn bvnot(self) -> Self {
        SmtTerm::BvNot(Box::new(self))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    pub fn forall(bindings: Vec<(String, SmtSort)>, body: SmtTerm) -> Self {
        if bindings.is_empty() {
            return body;
        }
        SmtTerm::ForAll(bindings, Box::new(body))
    }

    pub fn exists(bindings: Vec<(String, SmtSort)>, body: SmtTerm) -> Self {
        if bindings.is_empty() {
            return body;
        }
        SmtTerm::Exists(bindings, Box::new(body))
    }

    /// True when the term is a literal with no free names.
    pub fn is_literal(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(_) | SmtTerm::BvLit { .. })
    }

    /// Collect the names of free variables (constants and unbound
    /// quantifier variables) occurring in the term.
    pub fn free_vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut bound = Vec::new();
        collect_free_vars(self, &mut bound, &mut out);
        out
    }
}

fn collect_free_vars(term: &SmtTerm, bound: &mut Vec<String>, out: &mut Vec<String>) {
    match term {
        SmtTerm::Var(name) => {
            if !bound.iter().any(|b| b == name) && !out.iter().any(|o| o == name) {
                out.push(name.clone());
            }
        }
        SmtTerm::BoolLit(_) | SmtTerm::BvLit { .. } => {}
        SmtTerm::App(_, args) | SmtTerm::And(args) | SmtTerm::Or(args) => {
            for arg in args {
                collect_free_vars(arg, bound, out);
            }
        }
        SmtTerm::BvNot(inner) | SmtTerm::Not(inner) => collect_free_vars(inner, bound, out),
        SmtTerm::BvOr(lhs, rhs)
        | SmtTerm::BvAnd(lhs, rhs)
        | SmtTerm::Eq(lhs, rhs)
        | SmtTerm::Implies(lhs, rhs) => {
            collect_free_vars(lhs, bound, out);
            collect_free_vars(rhs, bound, out);
        }
        SmtTerm::ForAll(bindings, body) | SmtTerm::Exists(bindings, body) => {
            let depth = bound.len();
            bound.extend(bindings.iter().map(|(n, _)| n.clone()));
            collect_free_vars(body, bound, out);
            bound.truncate(depth);
        }
        SmtTerm::Ite(c, t, e) => {
            collect_free_vars(c, bound, out);
            collect_free_vars(t, bound, out);
            collect_free_vars(e, bound, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_binder_lists_collapse_to_body() {
        let body = SmtTerm::var("p");
        assert_eq!(SmtTerm::forall(vec![], body.clone()), body);
        assert_eq!(SmtTerm::exists(vec![], body.clone()), body);
    }

    #[test]
    fn free_vars_skip_bound_names() {
        let term = SmtTerm::forall(
            vec![("x".into(), SmtSort::BitVec(2))],
            SmtTerm::app("possible", vec![SmtTerm::var("x").bvor(SmtTerm::var("w"))]),
        );
        assert_eq!(term.free_vars(), vec!["w".to_string()]);
    }
}
