#![allow(dead_code)]

use std::sync::Once;

use truthmaker_engine::{
    check_argument, CheckMode, CheckReport, ModelStructure, Settings, Theory,
};
use truthmaker_smt::Z3Solver;
use truthmaker_syntax::parse_argument;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Theory defaults with `N` replaced and a generous solve budget.
pub fn settings_for(theory: &dyn Theory, n: u32) -> Settings {
    Settings {
        n,
        max_time: 60.0,
        ..theory.default_settings()
    }
}

pub fn run(
    theory: &dyn Theory,
    premises: &[&str],
    conclusions: &[&str],
    settings: &Settings,
    mode: CheckMode,
) -> CheckReport {
    init_tracing();
    check_argument(
        "test",
        theory,
        premises,
        conclusions,
        settings,
        mode,
        &mut Z3Solver::new(),
    )
    .unwrap_or_else(|e| panic!("check of {premises:?} / {conclusions:?} failed: {e}"))
}

/// Builds and solves a structure, leaving it in its terminal phase.
pub fn solved<'t>(
    theory: &'t dyn Theory,
    premises: &[&str],
    conclusions: &[&str],
    settings: &Settings,
    mode: CheckMode,
    solver: &mut Z3Solver,
) -> ModelStructure<'t> {
    init_tracing();
    let syntax = parse_argument(premises, conclusions, theory.registry()).unwrap();
    let mut structure = ModelStructure::new(theory, syntax, settings, mode).unwrap();
    structure.solve(solver).unwrap();
    structure
}
