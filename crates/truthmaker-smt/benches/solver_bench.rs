use criterion::{black_box, criterion_group, criterion_main, Criterion};
use truthmaker_smt::{SmtSolver, SmtSort, SmtTerm, Z3Solver};

fn closure_frame(width: u32) -> SmtTerm {
    let sort = SmtSort::BitVec(width);
    let (x, y) = (SmtTerm::var("x"), SmtTerm::var("y"));
    SmtTerm::forall(
        vec![("x".into(), sort.clone()), ("y".into(), sort)],
        SmtTerm::and(vec![
            SmtTerm::app("possible", vec![y.clone()]),
            x.clone().bvor(y.clone()).eq(y),
        ])
        .implies(SmtTerm::app("possible", vec![x])),
    )
}

/// Closure plus a possible full state, so the solver has to build a model.
fn solve_closure(width: u32) {
    let mut solver = Z3Solver::new();
    let sort = SmtSort::BitVec(width);
    solver
        .declare_fun("possible", &[sort], &SmtSort::Bool)
        .unwrap();
    solver.assert(&closure_frame(width)).unwrap();
    let full = (1u64 << width) - 1;
    solver
        .assert(&SmtTerm::app("possible", vec![SmtTerm::bv(full, width)]))
        .unwrap();
    solver.check_sat().unwrap();
}

fn bench_closure_n3(c: &mut Criterion) {
    c.bench_function("z3_closure_n3", |b| b.iter(|| solve_closure(black_box(3))));
}

fn bench_closure_n5(c: &mut Criterion) {
    c.bench_function("z3_closure_n5", |b| b.iter(|| solve_closure(black_box(5))));
}

criterion_group!(benches, bench_closure_n3, bench_closure_n5);
criterion_main!(benches);
