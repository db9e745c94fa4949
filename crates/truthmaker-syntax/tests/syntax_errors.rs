//! Malformed sentences are reported with their kind and location.

use truthmaker_syntax::{
    parse_sentence, Connective, FormulaArena, OperatorRegistry, ParseError, Span, SyntaxErrorKind,
    MAX_DEPTH,
};

fn parse(source: &str) -> Result<(), ParseError> {
    let registry = OperatorRegistry::with_standard(&[
        Connective::Neg,
        Connective::And,
        Connective::Or,
        Connective::Necessity,
        Connective::Top,
    ])
    .unwrap();
    let mut arena = FormulaArena::new();
    parse_sentence(&mut arena, &registry, source, "input").map(|_| ())
}

fn kind(source: &str) -> SyntaxErrorKind {
    parse(source).unwrap_err().kind()
}

#[test]
fn unbalanced_parentheses() {
    let err = parse("((p ∧ q)").unwrap_err();
    assert_eq!(err.kind(), SyntaxErrorKind::UnbalancedParentheses);
    assert_eq!(err.span(), Span::new(0, 1));

    let err = parse("(p ∧ q))").unwrap_err();
    assert_eq!(err.kind(), SyntaxErrorKind::UnbalancedParentheses);
    assert_eq!(err.span().start, "(p ∧ q)".len());
}

#[test]
fn unknown_operator() {
    let err = parse("(p \\boxright q)").unwrap_err();
    assert_eq!(err.kind(), SyntaxErrorKind::UnknownOperator);
    assert!(err.to_string().contains("\\boxright"));
    assert_eq!(kind("◇p"), SyntaxErrorKind::UnknownOperator);
}

#[test]
fn arity_mismatch() {
    assert_eq!(kind("∧ p"), SyntaxErrorKind::ArityMismatch);
    assert_eq!(kind("(p ¬ q)"), SyntaxErrorKind::ArityMismatch);
    assert_eq!(kind("p ⊤ q"), SyntaxErrorKind::ArityMismatch);
}

#[test]
fn unexpected_token_and_end() {
    assert_eq!(kind("p q"), SyntaxErrorKind::UnexpectedToken);
    assert_eq!(kind("(p q)"), SyntaxErrorKind::UnexpectedToken);
    assert_eq!(kind(""), SyntaxErrorKind::UnexpectedEnd);
    assert_eq!(kind("   "), SyntaxErrorKind::UnexpectedEnd);
    assert_eq!(kind("¬"), SyntaxErrorKind::UnexpectedEnd);
    assert_eq!(kind("p ∧"), SyntaxErrorKind::UnexpectedEnd);
}

#[test]
fn invalid_token() {
    let err = parse("p ∧ \\ q").unwrap_err();
    assert_eq!(err.kind(), SyntaxErrorKind::InvalidToken);
    assert!(err.span().start >= "p ∧ ".len());
}

#[test]
fn diagnostics_render_with_source() {
    let err = parse("(p ∧ q").unwrap_err();
    let report = miette::Report::new(err);
    assert!(format!("{report:?}").contains("Unbalanced parentheses"));
}

#[test]
fn deeply_nested_negation_is_rejected_not_overflowed() {
    let source = format!("{}p", "\\neg ".repeat(1000));
    let err = parse(&source).unwrap_err();
    assert_eq!(err.kind(), SyntaxErrorKind::NestingTooDeep);
    assert!(err.to_string().contains(&MAX_DEPTH.to_string()));

    let shallow = format!("{}p", "\\neg ".repeat(MAX_DEPTH - 1));
    assert!(parse(&shallow).is_ok());
}
