//! Formula arena.
//!
//! Every parsed occurrence gets its own [`NodeId`] so diagnostics can point
//! at the exact source span. Structurally equal subtrees additionally share a
//! hash-consed [`CanonId`], which is what constraint memoization keys on.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::registry::{Connective, OperatorRegistry};

/// Byte range in a sentence's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.end.saturating_sub(span.start)).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct NodeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct LetterId(u32);

/// Identity of a formula up to structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CanonId(u32);

macro_rules! index_newtype {
    ($($ty:ident),*) => {$(
        impl $ty {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    )*};
}

index_newtype!(NodeId, LetterId, CanonId);

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Node {
    Letter(LetterId),
    Apply {
        connective: Connective,
        args: Vec<NodeId>,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    canon: CanonId,
    span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CanonKey {
    Letter(LetterId),
    Apply(Connective, Vec<CanonId>),
}

#[derive(Debug, Clone, Default)]
pub struct FormulaArena {
    entries: Vec<Entry>,
    letters: IndexSet<String>,
    canon: HashMap<CanonKey, CanonId>,
    representatives: Vec<NodeId>,
}

impl FormulaArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn letter(&mut self, name: &str) -> NodeId {
        self.push_letter(name, None)
    }

    pub fn letter_at(&mut self, name: &str, span: Span) -> NodeId {
        self.push_letter(name, Some(span))
    }

    pub fn apply(&mut self, connective: Connective, args: Vec<NodeId>) -> NodeId {
        self.push_apply(connective, args, None)
    }

    pub fn apply_at(&mut self, connective: Connective, args: Vec<NodeId>, span: Span) -> NodeId {
        self.push_apply(connective, args, Some(span))
    }

    fn push_letter(&mut self, name: &str, span: Option<Span>) -> NodeId {
        let (index, _) = self.letters.insert_full(name.to_string());
        let letter = LetterId(index as u32);
        self.push(Node::Letter(letter), CanonKey::Letter(letter), span)
    }

    fn push_apply(&mut self, connective: Connective, args: Vec<NodeId>, span: Option<Span>) -> NodeId {
        let key = CanonKey::Apply(connective, args.iter().map(|&a| self.canon(a)).collect());
        self.push(Node::Apply { connective, args }, key, span)
    }

    fn push(&mut self, node: Node, key: CanonKey, span: Option<Span>) -> NodeId {
        let id = NodeId(self.entries.len() as u32);
        let next = CanonId(self.representatives.len() as u32);
        let canon = *self.canon.entry(key).or_insert(next);
        if canon == next {
            self.representatives.push(id);
        }
        self.entries.push(Entry { node, canon, span });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.entries[id.index()].node
    }

    pub fn canon(&self, id: NodeId) -> CanonId {
        self.entries[id.index()].canon
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.entries[id.index()].span
    }

    /// First node created with the given structure.
    pub fn representative(&self, canon: CanonId) -> NodeId {
        self.representatives[canon.index()]
    }

    pub fn canon_count(&self) -> usize {
        self.representatives.len()
    }

    /// Sentence letters in first-seen order.
    pub fn letters(&self) -> &IndexSet<String> {
        &self.letters
    }

    pub fn letter_name(&self, letter: LetterId) -> &str {
        self.letters
            .get_index(letter.index())
            .map_or("", String::as_str)
    }

    pub fn letter_id(&self, name: &str) -> Option<LetterId> {
        self.letters.get_index_of(name).map(|i| LetterId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn args(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Node::Letter(_) => &[],
            Node::Apply { args, .. } => args,
        }
    }

    pub fn connective(&self, id: NodeId) -> Option<Connective> {
        match self.node(id) {
            Node::Letter(_) => None,
            Node::Apply { connective, .. } => Some(*connective),
        }
    }

    /// Operator nesting depth; letters and constants have depth 0.
    pub fn depth(&self, id: NodeId) -> usize {
        match self.node(id) {
            Node::Letter(_) => 0,
            Node::Apply { args, .. } if args.is_empty() => 0,
            Node::Apply { args, .. } => {
                1 + args.iter().map(|&a| self.depth(a)).max().unwrap_or(0)
            }
        }
    }

    /// All nodes of the tree rooted at `id`, parents before children.
    pub fn subformulas(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.args(next).iter().rev().copied());
        }
        out
    }

    /// Whether the tree at `a` here has the same shape as `b` in `other`,
    /// comparing letters by name.
    pub fn same_shape(&self, a: NodeId, other: &FormulaArena, b: NodeId) -> bool {
        match (self.node(a), other.node(b)) {
            (Node::Letter(x), Node::Letter(y)) => self.letter_name(*x) == other.letter_name(*y),
            (
                Node::Apply {
                    connective: c1,
                    args: a1,
                },
                Node::Apply {
                    connective: c2,
                    args: a2,
                },
            ) => {
                c1 == c2
                    && a1.len() == a2.len()
                    && a1
                        .iter()
                        .zip(a2)
                        .all(|(&x, &y)| self.same_shape(x, other, y))
            }
            _ => false,
        }
    }

    /// Infix rendering that parses back to the same tree.
    pub fn infix(&self, id: NodeId, registry: &OperatorRegistry) -> String {
        let mut out = String::new();
        self.render_into(id, registry, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, registry: &OperatorRegistry, out: &mut String) {
        match self.node(id) {
            Node::Letter(l) => out.push_str(self.letter_name(*l)),
            Node::Apply { connective, args } => {
                let symbol = registry.symbol(*connective);
                match args.as_slice() {
                    [] => out.push_str(symbol),
                    [arg] => {
                        out.push_str(symbol);
                        out.push(' ');
                        self.render_into(*arg, registry, out);
                    }
                    [left, right] => {
                        out.push('(');
                        self.render_into(*left, registry, out);
                        out.push(' ');
                        out.push_str(symbol);
                        out.push(' ');
                        self.render_into(*right, registry, out);
                        out.push(')');
                    }
                    _ => {
                        out.push_str(symbol);
                        out.push('(');
                        for (i, arg) in args.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            self.render_into(*arg, registry, out);
                        }
                        out.push(')');
                    }
                }
            }
        }
    }
}

/// One parsed premise or conclusion.
#[derive(Debug, Clone)]
pub struct Sentence {
    pub text: String,
    pub root: NodeId,
}

/// Parsed premises and conclusions sharing a single arena.
#[derive(Debug, Clone, Default)]
pub struct Syntax {
    pub arena: FormulaArena,
    pub premises: Vec<Sentence>,
    pub conclusions: Vec<Sentence>,
}

impl Syntax {
    /// Sentence letters of all sentences, premises first.
    pub fn letters(&self) -> &IndexSet<String> {
        self.arena.letters()
    }

    pub fn sentences(&self) -> impl Iterator<Item = &Sentence> {
        self.premises.iter().chain(&self.conclusions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_nodes_share_a_canon_id() {
        let mut arena = FormulaArena::new();
        let p1 = arena.letter("p");
        let q = arena.letter("q");
        let a = arena.apply(Connective::And, vec![p1, q]);
        let p2 = arena.letter("p");
        let q2 = arena.letter("q");
        let b = arena.apply(Connective::And, vec![p2, q2]);
        let c = arena.apply(Connective::And, vec![q2, p2]);

        assert_ne!(a, b);
        assert_eq!(arena.canon(a), arena.canon(b));
        assert_ne!(arena.canon(a), arena.canon(c));
        assert_eq!(arena.representative(arena.canon(b)), a);
        assert_eq!(arena.letters().len(), 2);
    }

    #[test]
    fn render_parenthesises_binary_only() {
        let reg = OperatorRegistry::with_standard(&[Connective::Neg, Connective::Or, Connective::Top])
            .unwrap();
        let mut arena = FormulaArena::new();
        let p = arena.letter("p");
        let np = arena.apply(Connective::Neg, vec![p]);
        let top = arena.apply(Connective::Top, vec![]);
        let or = arena.apply(Connective::Or, vec![np, top]);
        assert_eq!(arena.infix(or, &reg), "(\\neg p \\vee \\top)");
        assert_eq!(arena.depth(or), 2);
        assert_eq!(arena.subformulas(or), vec![or, np, p, top]);
    }
}
