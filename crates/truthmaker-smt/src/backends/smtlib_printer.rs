use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => name.clone(),
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::BvLit { value, width } => bv_literal(*value, *width),
        SmtTerm::App(name, args) => {
            if args.is_empty() {
                name.clone()
            } else {
                let inner: Vec<String> = args.iter().map(to_smtlib).collect();
                format!("({name} {})", inner.join(" "))
            }
        }
        SmtTerm::BvOr(lhs, rhs) => format!("(bvor {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvAnd(lhs, rhs) => format!("(bvand {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvNot(inner) => format!("(bvnot {})", to_smtlib(inner)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => {
            if terms.is_empty() {
                "true".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        }
        SmtTerm::Or(terms) => {
            if terms.is_empty() {
                "false".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        }
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::ForAll(bindings, body) => {
            let vars: Vec<String> = bindings.iter().map(|(n, s)| format!("({n} {s})")).collect();
            format!("(forall ({}) {})", vars.join(" "), to_smtlib(body))
        }
        SmtTerm::Exists(bindings, body) => {
            let vars: Vec<String> = bindings.iter().map(|(n, s)| format!("({n} {s})")).collect();
            format!("(exists ({}) {})", vars.join(" "), to_smtlib(body))
        }
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
    }
}

/// Render a bit-vector literal in `#b` notation, most significant bit first.
pub fn bv_literal(value: u64, width: u32) -> String {
    let mut out = String::with_capacity(width as usize + 2);
    out.push_str("#b");
    for bit in (0..width).rev() {
        out.push(if (value >> bit) & 1 == 1 { '1' } else { '0' });
    }
    out
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> String {
    sort.to_string()
}
