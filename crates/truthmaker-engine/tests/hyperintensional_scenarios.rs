mod common;

use common::{run, settings_for, solved};
use truthmaker_engine::{
    validate_frame, CheckError, CheckMode, ConfigurationError, HyperintensionalTheory, ModelPoint,
    ModelReport, Phase, Settings, Theory, Verdict,
};
use truthmaker_smt::Z3Solver;
use truthmaker_syntax::{parse_sentence, Connective, FormulaArena, OperatorRegistry, OperatorSpec};

fn theory() -> HyperintensionalTheory {
    HyperintensionalTheory::new().unwrap()
}

fn assert_countermodel(premises: &[&str], conclusions: &[&str], n: u32) -> ModelReport {
    let t = theory();
    let report = run(&t, premises, conclusions, &settings_for(&t, n), CheckMode::Countermodel);
    assert_eq!(
        report.verdict,
        Verdict::Countermodel,
        "{premises:?} / {conclusions:?} should have a countermodel"
    );
    report.models.into_iter().next().unwrap()
}

fn assert_no_countermodel(premises: &[&str], conclusions: &[&str], n: u32) {
    let t = theory();
    let report = run(&t, premises, conclusions, &settings_for(&t, n), CheckMode::Countermodel);
    assert!(
        matches!(report.verdict, Verdict::NoCountermodel { .. }),
        "{premises:?} / {conclusions:?} gave {:?}",
        report.verdict
    );
    assert!(report.models.is_empty());
}

#[test]
fn distribution_of_necessity_over_disjunction_fails() {
    let model = assert_countermodel(&["□(p ∨ q)"], &["□p ∨ □q"], 3);

    let labels: Vec<&str> = model.states.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["□", "a", "b", "a.b", "c", "a.c", "b.c", "a.b.c"]);
    assert!(model.states.iter().filter(|s| s.world).count() >= 2);
    let ModelPoint::World(main) = model.point else {
        panic!("expected a world point, got {:?}", model.point);
    };
    assert!(model.states[main as usize].world);

    assert!(model.premises[0].truth);
    assert!(!model.conclusions[0].truth);
    let text = model.to_string();
    assert!(text.contains("INTERPRETED PREMISES:"));
    assert!(text.contains("(world)"));
}

#[test]
fn k_axiom_has_no_countermodel() {
    assert_no_countermodel(&["□(p → q)", "□p"], &["□q"], 3);

    let t = theory();
    let report = run(
        &t,
        &[],
        &["(□(p → q) → (□p → □q))"],
        &settings_for(&t, 3),
        CheckMode::Validity,
    );
    assert!(matches!(report.verdict, Verdict::Valid { .. }), "{:?}", report.verdict);
}

#[test]
fn truth_is_necessarily_possible_at_every_small_bound() {
    for n in 1..=3 {
        assert_no_countermodel(&["p"], &["□◇p"], n);
    }
}

#[test]
fn large_space_with_tiny_budget_times_out() {
    let t = theory();
    let settings = Settings {
        n: 24,
        max_time: 0.001,
        ..t.default_settings()
    };
    let report = run(&t, &["□(p ∨ q)"], &["□p ∨ □q"], &settings, CheckMode::Countermodel);
    assert_eq!(report.verdict, Verdict::Timeout);
    assert!(report.models.is_empty());
    assert_eq!(report.matches_expectation(), None);
}

#[test]
fn solved_models_respect_frame_and_letter_constraints() {
    let t = theory();
    let mut solver = Z3Solver::new();
    let structure = solved(
        &t,
        &["(p ∨ q)", "\\neg r"],
        &["(p ∧ q)"],
        &settings_for(&t, 3),
        CheckMode::Countermodel,
        &mut solver,
    );
    assert_eq!(structure.phase(), Phase::Sat);
    assert!(structure.validate().is_empty(), "{:?}", structure.validate());

    let frame = structure.frame().unwrap();
    assert!(validate_frame(frame).is_empty());
    let space = frame.space;
    for &s in &frame.possible {
        for part in space.states().filter(|&x| space.is_part_of(x, s)) {
            assert!(frame.is_possible(part), "{} possible but its part {} is not", s, part);
        }
    }
    for (letter, ext) in &frame.propositions {
        let (verifiers, falsifiers) = ext.exact().unwrap();
        for &v in verifiers {
            for &f in falsifiers {
                assert!(!frame.is_possible(v | f), "{letter}: {v} and {f} are compatible");
            }
        }
        for &s in &frame.possible {
            assert!(
                verifiers.iter().chain(falsifiers).any(|&x| frame.is_possible(s | x)),
                "{letter}: {s} is compatible with no verifier or falsifier"
            );
        }
    }
}

#[test]
fn double_negation_keeps_exact_content() {
    let model = assert_countermodel(&["\\neg \\neg p"], &["q"], 3);
    let root = &model.premises[0];
    let inner = &root.subformulas[0].subformulas[0];
    assert_eq!(inner.text, "p");
    assert_eq!(root.extension, inner.extension);
}

#[test]
fn de_morgan_holds_exactly() {
    let t = theory();
    let report = run(
        &t,
        &[],
        &["(\\neg (p \\wedge q) \\leftrightarrow (\\neg p \\vee \\neg q))"],
        &settings_for(&t, 3),
        CheckMode::Validity,
    );
    assert!(matches!(report.verdict, Verdict::Valid { .. }), "{:?}", report.verdict);

    let model = assert_countermodel(
        &["\\neg (p \\wedge q)", "(\\neg p \\vee \\neg q)"],
        &["\\bot"],
        3,
    );
    assert_eq!(model.premises[0].extension, model.premises[1].extension);
}

#[test]
fn absorption_is_not_an_identity() {
    let model = assert_countermodel(&[], &["((p \\wedge (p \\vee q)) \\equiv p)"], 3);
    let identity = &model.conclusions[0];
    let [left, right] = &identity.subformulas[..] else {
        panic!("identity has two arguments");
    };
    assert_eq!(right.text, "p");
    assert_ne!(left.extension, right.extension);
}

#[test]
fn displayed_formulas_parse_back_to_the_same_shape() {
    let t = theory();
    let mut solver = Z3Solver::new();
    let structure = solved(
        &t,
        &["□(p ∨ q)", "(p \\boxright \\neg q)"],
        &["(◇p ∧ ¬q)"],
        &settings_for(&t, 3),
        CheckMode::Countermodel,
        &mut solver,
    );
    let report = ModelReport::from_structure(&structure).unwrap();
    let parsed = &structure.syntax().arena;
    let mut reparsed = FormulaArena::new();
    let mut checked = 0;
    for sentence in report.sentences() {
        let node = parse_sentence(&mut reparsed, t.registry(), &sentence.text, "<report>")
            .unwrap_or_else(|e| panic!("`{}` does not parse: {e}", sentence.text));
        assert!(
            parsed.same_shape(sentence.node, &reparsed, node),
            "`{}` changed shape",
            sentence.text
        );
        checked += 1;
    }
    assert!(checked >= 10);
    assert!(!report.to_string().contains("verify_"));
}

#[test]
fn counterfactual_antecedent_strengthening_fails() {
    assert_countermodel(&["(p \\boxright r)"], &["((p \\wedge q) \\boxright r)"], 3);
}

#[test]
fn true_antecedent_and_consequent_do_not_make_a_counterfactual() {
    assert_countermodel(&["p", "q"], &["(p \\boxright q)"], 3);
}

#[test]
fn counterfactual_modus_ponens() {
    assert_no_countermodel(&["p", "(p \\boxright q)"], &["q"], 3);
}

#[test]
fn ground_does_not_give_essence_but_gives_relevance() {
    assert_countermodel(&["(p \\leq q)"], &["(p \\sqsubseteq q)"], 3);
    assert_no_countermodel(&["(p \\leq q)"], &["(p \\preceq q)"], 3);
}

#[test]
fn identity_is_reflexive() {
    assert_no_countermodel(&[], &["(p \\equiv p)"], 3);
    assert_countermodel(&["(p \\equiv q)"], &["p"], 3);
}

#[test]
fn expectation_is_compared_with_the_verdict() {
    let t = theory();
    let settings = Settings {
        expectation: Some(true),
        ..settings_for(&t, 2)
    };
    let report = run(&t, &["p"], &["q"], &settings, CheckMode::Countermodel);
    assert_eq!(report.matches_expectation(), Some(true));
}

#[test]
fn duplicate_registration_is_a_configuration_error() {
    let mut registry = OperatorRegistry::with_standard(&HyperintensionalTheory::CONNECTIVES).unwrap();
    let err = registry
        .register(OperatorSpec::new(Connective::Always, "\\Box", 1))
        .unwrap_err();
    assert!(matches!(
        ConfigurationError::from(err),
        ConfigurationError::Registry(_)
    ));
}

#[test]
fn operator_without_a_clause_is_rejected() {
    let mut connectives = HyperintensionalTheory::CONNECTIVES.to_vec();
    connectives.push(Connective::Next);
    let t = HyperintensionalTheory::with_registry(OperatorRegistry::with_standard(&connectives).unwrap());
    let err = truthmaker_engine::check_argument(
        "missing",
        &t,
        &["p"],
        &["q"],
        &settings_for(&t, 2),
        CheckMode::Countermodel,
        &mut Z3Solver::new(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CheckError::Configuration(ConfigurationError::MissingClause(Connective::Next))
    ));
}
