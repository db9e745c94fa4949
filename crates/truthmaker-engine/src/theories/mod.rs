//! Bundled theories and the operator definitions they share.

pub mod bimodal;
pub mod hyperintensional;

use truthmaker_syntax::{Connective, FormulaArena, NodeId};

use crate::theory::DefinedOperator;

pub use bimodal::BimodalTheory;
pub use hyperintensional::HyperintensionalTheory;

/// `(A → B)` as `(¬A ∨ B)`.
pub struct ConditionalDef;

impl DefinedOperator for ConditionalDef {
    fn expand(&self, arena: &mut FormulaArena, args: &[NodeId]) -> NodeId {
        let not_a = arena.apply(Connective::Neg, vec![args[0]]);
        arena.apply(Connective::Or, vec![not_a, args[1]])
    }
}

/// `(A ↔ B)` as `((A → B) ∧ (B → A))`.
pub struct BiconditionalDef;

impl DefinedOperator for BiconditionalDef {
    fn expand(&self, arena: &mut FormulaArena, args: &[NodeId]) -> NodeId {
        let forward = arena.apply(Connective::Conditional, vec![args[0], args[1]]);
        let backward = arena.apply(Connective::Conditional, vec![args[1], args[0]]);
        arena.apply(Connective::And, vec![forward, backward])
    }
}

/// `¬ op ¬A`: possibility from necessity, eventually from always, and so on.
pub struct DualDef(pub Connective);

impl DefinedOperator for DualDef {
    fn expand(&self, arena: &mut FormulaArena, args: &[NodeId]) -> NodeId {
        let inner = arena.apply(Connective::Neg, vec![args[0]]);
        let applied = arena.apply(self.0, vec![inner]);
        arena.apply(Connective::Neg, vec![applied])
    }
}

/// `(A ◇→ B)` as `¬(A □→ ¬B)`.
pub struct MightCounterfactualDef;

impl DefinedOperator for MightCounterfactualDef {
    fn expand(&self, arena: &mut FormulaArena, args: &[NodeId]) -> NodeId {
        let not_b = arena.apply(Connective::Neg, vec![args[1]]);
        let would = arena.apply(Connective::Counterfactual, vec![args[0], not_b]);
        arena.apply(Connective::Neg, vec![would])
    }
}

pub(crate) static CONDITIONAL: ConditionalDef = ConditionalDef;
pub(crate) static BICONDITIONAL: BiconditionalDef = BiconditionalDef;
pub(crate) static POSSIBILITY: DualDef = DualDef(Connective::Necessity);
pub(crate) static EVENTUALLY: DualDef = DualDef(Connective::Always);
pub(crate) static SOMETIME_PAST: DualDef = DualDef(Connective::Past);
pub(crate) static MIGHT_COUNTERFACTUAL: MightCounterfactualDef = MightCounterfactualDef;
