//! Backend parity tests: the Z3 crate backend and an external SMT-LIB solver
//! must agree on SAT/UNSAT verdicts for small quantified formulas.
//!
//! External-solver tests are gated behind `#[ignore]` so they can be skipped
//! when `z3` is not installed. Run with `cargo test -- --ignored` to include them.

use std::time::Duration;

use truthmaker_smt::backends::process::{Dialect, ProcessSolver};
use truthmaker_smt::solver::{SatResult, SmtSolver};
use truthmaker_smt::sorts::SmtSort;
use truthmaker_smt::terms::SmtTerm;
use truthmaker_smt::Z3Solver;

fn state() -> SmtSort {
    SmtSort::BitVec(3)
}

/// Downward-closed `possible` with a maximal possible `w`.
fn world_frame<S: SmtSolver>(s: &mut S)
where
    S::Error: std::fmt::Debug,
{
    s.declare_fun("possible", &[state()], &SmtSort::Bool)
        .unwrap();
    s.declare_const("w", &state()).unwrap();
    let (x, y) = (SmtTerm::var("x"), SmtTerm::var("y"));
    s.assert_named(
        "frame:closure",
        &SmtTerm::forall(
            vec![("x".into(), state()), ("y".into(), state())],
            SmtTerm::and(vec![
                SmtTerm::app("possible", vec![y.clone()]),
                x.clone().bvor(y.clone()).eq(y),
            ])
            .implies(SmtTerm::app("possible", vec![x])),
        ),
    )
    .unwrap();
    let x = SmtTerm::var("x");
    let w = SmtTerm::var("w");
    s.assert_named(
        "frame:world",
        &SmtTerm::and(vec![
            SmtTerm::app("possible", vec![w.clone()]),
            SmtTerm::forall(
                vec![("x".into(), state())],
                SmtTerm::app("possible", vec![x.clone().bvor(w.clone())])
                    .implies(x.bvor(w.clone()).eq(w)),
            ),
        ]),
    )
    .unwrap();
}

fn check<S: SmtSolver>(s: &mut S, extra: &[SmtTerm]) -> SatResult
where
    S::Error: std::fmt::Debug,
{
    world_frame(s);
    for (i, t) in extra.iter().enumerate() {
        s.assert_named(&format!("extra:{i}"), t).unwrap();
    }
    s.set_time_budget(Some(Duration::from_secs(10))).unwrap();
    s.check_sat().unwrap()
}

fn sat_case() -> Vec<SmtTerm> {
    vec![SmtTerm::app("possible", vec![SmtTerm::bv(3, 3)])]
}

fn unsat_case() -> Vec<SmtTerm> {
    // A world that is possible, impossible to extend, yet a proper part of
    // another possible state.
    vec![
        SmtTerm::var("w").eq(SmtTerm::bv(1, 3)),
        SmtTerm::app("possible", vec![SmtTerm::bv(3, 3)]),
    ]
}

#[test]
fn in_process_world_frame_sat() {
    assert_eq!(check(&mut Z3Solver::new(), &sat_case()), SatResult::Sat);
}

#[test]
fn in_process_world_frame_unsat_with_core() {
    let mut s = Z3Solver::new();
    assert_eq!(check(&mut s, &unsat_case()), SatResult::Unsat);
    let core = s.unsat_core().unwrap();
    assert!(core.contains(&"frame:world".to_string()));
    assert!(core.contains(&"extra:0".to_string()));
    assert!(core.contains(&"extra:1".to_string()));
}

// ---- external solver parity tests (ignored by default) ----

#[test]
#[ignore = "requires z3 on PATH"]
fn z3_agrees_on_world_frame() {
    if !ProcessSolver::is_available("z3") {
        return;
    }
    let mut z3 = ProcessSolver::with_command("z3", Dialect::Z3).unwrap();
    assert_eq!(check(&mut z3, &sat_case()), SatResult::Sat);

    let mut z3 = ProcessSolver::z3().unwrap();
    assert_eq!(check(&mut z3, &unsat_case()), SatResult::Unsat);
    let core = z3.unsat_core().unwrap();
    assert!(core.contains(&"frame:world".to_string()));
}

#[test]
#[ignore = "requires z3 on PATH"]
fn z3_reads_back_queried_values() {
    if !ProcessSolver::is_available("z3") {
        return;
    }
    let mut z3 = ProcessSolver::z3().unwrap();
    world_frame(&mut z3);
    z3.assert(&SmtTerm::var("w").eq(SmtTerm::bv(6, 3))).unwrap();
    let queries = vec![
        SmtTerm::var("w"),
        SmtTerm::app("possible", vec![SmtTerm::bv(2, 3)]),
    ];
    let (result, model) = z3.check_sat_with_model(&queries).unwrap();
    assert_eq!(result, SatResult::Sat);
    let model = model.unwrap();
    assert_eq!(model.bv_of(&queries[0]), Some(6));
    assert_eq!(model.bool_of(&queries[1]), Some(true));

    let mut in_process = Z3Solver::new();
    world_frame(&mut in_process);
    in_process
        .assert(&SmtTerm::var("w").eq(SmtTerm::bv(6, 3)))
        .unwrap();
    let (_, local) = in_process.check_sat_with_model(&queries).unwrap();
    assert_eq!(local, Some(model));
}
