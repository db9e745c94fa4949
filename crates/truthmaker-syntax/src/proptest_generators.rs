//! Proptest strategies for generating well-formed sentences.

use proptest::prelude::*;

use crate::formula::{FormulaArena, Node, NodeId};
use crate::registry::{Connective, OperatorRegistry};

/// A formula tree independent of any arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaShape {
    Letter(String),
    Apply(Connective, Vec<FormulaShape>),
}

impl FormulaShape {
    /// Sentence text in canonical parenthesisation.
    pub fn render(&self, registry: &OperatorRegistry) -> String {
        match self {
            FormulaShape::Letter(name) => name.clone(),
            FormulaShape::Apply(c, args) => {
                let symbol = registry.symbol(*c);
                match args.as_slice() {
                    [] => symbol.to_string(),
                    [a] => format!("{symbol} {}", a.render(registry)),
                    [a, b] => format!("({} {symbol} {})", a.render(registry), b.render(registry)),
                    _ => unreachable!("arity is at most two"),
                }
            }
        }
    }

    pub fn matches(&self, arena: &FormulaArena, node: NodeId) -> bool {
        match (self, arena.node(node)) {
            (FormulaShape::Letter(name), Node::Letter(l)) => arena.letter_name(*l) == name,
            (FormulaShape::Apply(c, args), Node::Apply { connective, args: ids }) => {
                c == connective
                    && args.len() == ids.len()
                    && args.iter().zip(ids).all(|(s, &id)| s.matches(arena, id))
            }
            _ => false,
        }
    }

    /// Build this shape inside an arena.
    pub fn build(&self, arena: &mut FormulaArena) -> NodeId {
        match self {
            FormulaShape::Letter(name) => arena.letter(name),
            FormulaShape::Apply(c, args) => {
                let ids = args.iter().map(|a| a.build(arena)).collect();
                arena.apply(*c, ids)
            }
        }
    }
}

/// Formulas over `letters` using the given connectives, at most `depth`
/// operators deep.
pub fn arb_formula(
    connectives: Vec<Connective>,
    letters: Vec<&'static str>,
    depth: u32,
) -> impl Strategy<Value = FormulaShape> {
    let leaf = proptest::sample::select(letters).prop_map(|l| FormulaShape::Letter(l.to_string()));
    let nullary: Vec<Connective> = connectives.iter().copied().filter(|c| c.arity() == 0).collect();
    let unary: Vec<Connective> = connectives.iter().copied().filter(|c| c.arity() == 1).collect();
    let binary: Vec<Connective> = connectives.iter().copied().filter(|c| c.arity() == 2).collect();

    let leaf = if nullary.is_empty() {
        leaf.boxed()
    } else {
        prop_oneof![
            4 => leaf,
            1 => proptest::sample::select(nullary).prop_map(|c| FormulaShape::Apply(c, vec![])),
        ]
        .boxed()
    };

    leaf.prop_recursive(depth, 32, 2, move |inner| {
        let mut options: Vec<BoxedStrategy<FormulaShape>> = Vec::new();
        if !unary.is_empty() {
            options.push(
                (proptest::sample::select(unary.clone()), inner.clone())
                    .prop_map(|(c, a)| FormulaShape::Apply(c, vec![a]))
                    .boxed(),
            );
        }
        if !binary.is_empty() {
            options.push(
                (proptest::sample::select(binary.clone()), inner.clone(), inner.clone())
                    .prop_map(|(c, a, b)| FormulaShape::Apply(c, vec![a, b]))
                    .boxed(),
            );
        }
        if options.is_empty() {
            return inner.boxed();
        }
        proptest::strategy::Union::new(options).boxed()
    })
}

/// Formulas built from negation, conjunction and disjunction over `p`, `q`.
pub fn arb_extensional_formula(depth: u32) -> impl Strategy<Value = FormulaShape> {
    arb_formula(
        vec![Connective::Neg, Connective::And, Connective::Or],
        vec!["p", "q"],
        depth,
    )
}
