//! Printing a parsed sentence and parsing it again yields the same tree.

use proptest::prelude::*;
use truthmaker_syntax::proptest_generators::{arb_formula, FormulaShape};
use truthmaker_syntax::{parse_argument, parse_sentence, Connective, FormulaArena, OperatorRegistry};

fn full_registry() -> OperatorRegistry {
    OperatorRegistry::with_standard(&Connective::ALL).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn rendered_formulas_reparse_to_the_same_tree(
        shape in arb_formula(Connective::ALL.to_vec(), vec!["p", "q", "r2"], 4)
    ) {
        let registry = full_registry();
        let text = shape.render(&registry);
        let mut arena = FormulaArena::new();
        let root = parse_sentence(&mut arena, &registry, &text, "generated").unwrap();
        prop_assert!(shape.matches(&arena, root), "{text}");
        prop_assert_eq!(arena.infix(root, &registry), text);
    }

    #[test]
    fn canon_ids_agree_with_structure(
        a in arb_formula(vec![Connective::Neg, Connective::And], vec!["p", "q"], 3),
        b in arb_formula(vec![Connective::Neg, Connective::And], vec!["p", "q"], 3),
    ) {
        let mut arena = FormulaArena::new();
        let x = a.build(&mut arena);
        let y = b.build(&mut arena);
        prop_assert_eq!(arena.canon(x) == arena.canon(y), a == b);
    }
}

#[test]
fn unicode_and_latex_spellings_share_structure() {
    let registry = full_registry();
    let syntax = parse_argument(
        &["(\\Box \\neg p \\boxright (q \\wedge \\top))"],
        &["(□¬p \\boxright (q ∧ ⊤))"],
        &registry,
    )
    .unwrap();
    let arena = &syntax.arena;
    assert_eq!(
        arena.canon(syntax.premises[0].root),
        arena.canon(syntax.conclusions[0].root)
    );
}

#[test]
fn letters_are_collected_in_first_seen_order() {
    let registry = full_registry();
    let syntax = parse_argument(&["(r ∧ p)", "q"], &["(p ∨ s)"], &registry).unwrap();
    let letters: Vec<_> = syntax.letters().iter().cloned().collect();
    assert_eq!(letters, ["r", "p", "q", "s"]);
    assert_eq!(syntax.sentences().count(), 3);
}

#[test]
fn shapes_render_with_custom_symbols() {
    let mut registry = OperatorRegistry::new();
    registry
        .register(truthmaker_syntax::OperatorSpec::new(Connective::And, "&", 2))
        .unwrap();
    let shape = FormulaShape::Apply(
        Connective::And,
        vec![
            FormulaShape::Letter("a".into()),
            FormulaShape::Letter("b".into()),
        ],
    );
    assert_eq!(shape.render(&registry), "(a & b)");
}
