use criterion::{black_box, criterion_group, criterion_main, Criterion};
use truthmaker_engine::{check_argument, CheckMode, HyperintensionalTheory, ModelConstraints, Settings, Theory};
use truthmaker_smt::Z3Solver;
use truthmaker_syntax::parse_argument;

const PREMISES: [&str; 1] = ["□(p ∨ q)"];
const CONCLUSIONS: [&str; 1] = ["□p ∨ □q"];

fn settings(theory: &HyperintensionalTheory, n: u32) -> Settings {
    Settings {
        n,
        max_time: 60.0,
        ..theory.default_settings()
    }
}

// ---------------------------------------------------------------------------
// Constraint building
// ---------------------------------------------------------------------------

fn bench_build_constraints(c: &mut Criterion) {
    let theory = HyperintensionalTheory::new().unwrap();
    for n in [3, 8] {
        let settings = settings(&theory, n);
        c.bench_function(&format!("engine_build_distribution_n{n}"), |b| {
            b.iter(|| {
                let syntax = parse_argument(&PREMISES, &CONCLUSIONS, theory.registry()).unwrap();
                ModelConstraints::build(&theory, syntax, black_box(&settings), CheckMode::Countermodel)
                    .unwrap()
            })
        });
    }
}

fn bench_build_counterfactual(c: &mut Criterion) {
    let theory = HyperintensionalTheory::new().unwrap();
    let settings = settings(&theory, 4);
    c.bench_function("engine_build_counterfactual_n4", |b| {
        b.iter(|| {
            let syntax = parse_argument(
                &["(p \\boxright r)"],
                &["((p \\wedge q) \\boxright r)"],
                theory.registry(),
            )
            .unwrap();
            ModelConstraints::build(&theory, syntax, black_box(&settings), CheckMode::Countermodel)
                .unwrap()
        })
    });
}

// ---------------------------------------------------------------------------
// Full check (parse -> build -> solve -> extract)
// ---------------------------------------------------------------------------

fn bench_check_distribution(c: &mut Criterion) {
    let theory = HyperintensionalTheory::new().unwrap();
    let settings = settings(&theory, 3);
    let mut group = c.benchmark_group("engine_check");
    group.sample_size(10);
    group.bench_function("distribution_n3", |b| {
        b.iter(|| {
            check_argument(
                "distribution",
                &theory,
                black_box(&PREMISES),
                black_box(&CONCLUSIONS),
                &settings,
                CheckMode::Countermodel,
                &mut Z3Solver::new(),
            )
            .unwrap()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_build_constraints,
    bench_build_counterfactual,
    bench_check_distribution
);
criterion_main!(benches);
