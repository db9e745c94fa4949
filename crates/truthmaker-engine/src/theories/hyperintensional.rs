//! Exact truthmaker semantics over bit-vector states.
//!
//! Sentence letters denote pairs of verifier and falsifier predicates.
//! Worlds are maximal possible states. Modal, counterfactual and
//! constitutive operators are verified or falsified only by the null state.

use std::collections::BTreeSet;

use indexmap::IndexSet;
use truthmaker_smt::{Model, SmtSort, SmtTerm};
use truthmaker_syntax::{Connective, NodeId, OperatorRegistry, RegistryError};

use crate::constraints::Builder;
use crate::errors::CheckError;
use crate::model::Evaluator;
use crate::settings::Settings;
use crate::state::{ConcreteSpace, StateSpace, VarSupply, POSSIBLE};
use crate::theories::{BICONDITIONAL, CONDITIONAL, MIGHT_COUNTERFACTUAL, POSSIBILITY};
use crate::theory::{
    Clause, Constraint, Declaration, EvalPoint, Extension, ModelFrame, ModelPoint, SemanticClause,
    Theory,
};

/// Name of the main world constant.
pub const MAIN_WORLD: &str = "w";

pub fn verify_fn(letter: &str) -> String {
    format!("verify_{letter}")
}

pub fn falsify_fn(letter: &str) -> String {
    format!("falsify_{letter}")
}

fn verify(letter: &str, state: &SmtTerm) -> SmtTerm {
    SmtTerm::app(verify_fn(letter), vec![state.clone()])
}

fn falsify(letter: &str, state: &SmtTerm) -> SmtTerm {
    SmtTerm::app(falsify_fn(letter), vec![state.clone()])
}

fn world_term(point: &EvalPoint) -> Result<&SmtTerm, CheckError> {
    point.world_term().ok_or_else(|| {
        CheckError::InvalidState("hyperintensional sentences are evaluated at world states".into())
    })
}

fn world_of(point: &ModelPoint) -> Result<u64, CheckError> {
    match point {
        ModelPoint::World(w) => Ok(*w),
        ModelPoint::WorldTime { .. } => Err(CheckError::InvalidState(
            "hyperintensional sentences are evaluated at world states".into(),
        )),
    }
}

type StateSet = BTreeSet<u64>;

fn exact_sets(ext: Extension) -> Result<(StateSet, StateSet), CheckError> {
    match ext {
        Extension::Exact {
            verifiers,
            falsifiers,
        } => Ok((verifiers, falsifiers)),
        Extension::Temporal { .. } => Err(CheckError::InvalidState(
            "expected an exact extension".into(),
        )),
    }
}

/// Verified by the null state when `holds`, falsified by it otherwise.
fn null_extension(space: &StateSpace, holds: bool) -> Extension {
    let null = BTreeSet::from([space.null()]);
    if holds {
        Extension::Exact {
            verifiers: null,
            falsifiers: BTreeSet::new(),
        }
    } else {
        Extension::Exact {
            verifiers: BTreeSet::new(),
            falsifiers: null,
        }
    }
}

fn pairwise_fusions(a: &StateSet, b: &StateSet) -> StateSet {
    a.iter()
        .flat_map(|&x| b.iter().map(move |&y| x | y))
        .collect()
}

fn bound(b: &mut Builder<'_>, prefix: &str) -> (String, SmtTerm) {
    let name = b.fresh(prefix);
    let term = SmtTerm::var(&name);
    (name, term)
}

struct NegClause;

impl SemanticClause for NegClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        b.false_at(args[0], point)
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        b.true_at(args[0], point)
    }

    fn extended_verify(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        b.extended_falsify(state, args[0], point)
    }

    fn extended_falsify(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        b.extended_verify(state, args[0], point)
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        Ok(ev.extension(args[0], point)?.negated())
    }
}

/// Conjunction, or disjunction when `dual` is set.
struct BooleanClause {
    dual: bool,
}

impl BooleanClause {
    /// Fusions of a left and right witness for the product side.
    fn product(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
        verifying: bool,
    ) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let (x, xv) = bound(b, "x");
        let (y, yv) = bound(b, "y");
        let (left, right) = if verifying {
            (
                b.extended_verify(&xv, args[0], point)?,
                b.extended_verify(&yv, args[1], point)?,
            )
        } else {
            (
                b.extended_falsify(&xv, args[0], point)?,
                b.extended_falsify(&yv, args[1], point)?,
            )
        };
        Ok(SmtTerm::exists(
            vec![(x, space.sort()), (y, space.sort())],
            SmtTerm::and(vec![left, right, state.clone().eq(space.fusion_term(&xv, &yv))]),
        ))
    }

    /// Either side's states or a fusion of both.
    fn coproduct(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
        verifying: bool,
    ) -> Result<SmtTerm, CheckError> {
        let (left, right) = if verifying {
            (
                b.extended_verify(state, args[0], point)?,
                b.extended_verify(state, args[1], point)?,
            )
        } else {
            (
                b.extended_falsify(state, args[0], point)?,
                b.extended_falsify(state, args[1], point)?,
            )
        };
        let fused = self.product(b, state, args, point, verifying)?;
        Ok(SmtTerm::or(vec![left, right, fused]))
    }
}

impl SemanticClause for BooleanClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let parts = vec![b.true_at(args[0], point)?, b.true_at(args[1], point)?];
        Ok(if self.dual {
            SmtTerm::or(parts)
        } else {
            SmtTerm::and(parts)
        })
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let parts = vec![b.false_at(args[0], point)?, b.false_at(args[1], point)?];
        Ok(if self.dual {
            SmtTerm::and(parts)
        } else {
            SmtTerm::or(parts)
        })
    }

    fn extended_verify(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        if self.dual {
            self.coproduct(b, state, args, point, true)
        } else {
            self.product(b, state, args, point, true)
        }
    }

    fn extended_falsify(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        if self.dual {
            self.product(b, state, args, point, false)
        } else {
            self.coproduct(b, state, args, point, false)
        }
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let (va, fa) = exact_sets(ev.extension(args[0], point)?)?;
        let (vb, fb) = exact_sets(ev.extension(args[1], point)?)?;
        let (product, coproduct) = if self.dual { ((&fa, &fb), (&va, &vb)) } else { ((&va, &vb), (&fa, &fb)) };
        let fused = pairwise_fusions(product.0, product.1);
        let mut either = pairwise_fusions(coproduct.0, coproduct.1);
        either.extend(coproduct.0.iter().chain(coproduct.1.iter()).copied());
        Ok(if self.dual {
            Extension::Exact {
                verifiers: either,
                falsifiers: fused,
            }
        } else {
            Extension::Exact {
                verifiers: fused,
                falsifiers: either,
            }
        })
    }
}

/// `⊤` when `top`, otherwise `⊥`.
struct ConstantClause {
    top: bool,
}

impl SemanticClause for ConstantClause {
    fn true_at(&self, _b: &mut Builder<'_>, _args: &[NodeId], _point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        Ok(SmtTerm::bool(self.top))
    }

    fn false_at(&self, _b: &mut Builder<'_>, _args: &[NodeId], _point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        Ok(SmtTerm::bool(!self.top))
    }

    fn extended_verify(
        &self,
        _b: &mut Builder<'_>,
        _state: &SmtTerm,
        _args: &[NodeId],
        _point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        Ok(SmtTerm::bool(self.top))
    }

    fn extended_falsify(
        &self,
        b: &mut Builder<'_>,
        state: &SmtTerm,
        _args: &[NodeId],
        _point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let target = if self.top {
            space.full_term()
        } else {
            space.null_term()
        };
        Ok(state.clone().eq(target))
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, _args: &[NodeId], _point: &ModelPoint) -> Result<Extension, CheckError> {
        let space = ev.frame().space;
        Ok(if self.top {
            Extension::Exact {
                verifiers: space.states().collect(),
                falsifiers: BTreeSet::from([space.full()]),
            }
        } else {
            Extension::Exact {
                verifiers: BTreeSet::new(),
                falsifiers: BTreeSet::from([space.null()]),
            }
        })
    }
}

struct NecessityClause;

impl SemanticClause for NecessityClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], _point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let (u, uv) = bound(b, "u");
        let world = space.is_world_term(&uv, b.vars());
        let holds = b.true_at(args[0], &EvalPoint::World(uv))?;
        Ok(SmtTerm::forall(vec![(u, space.sort())], world.implies(holds)))
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], _point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let (u, uv) = bound(b, "u");
        let world = space.is_world_term(&uv, b.vars());
        let fails = b.false_at(args[0], &EvalPoint::World(uv))?;
        Ok(SmtTerm::exists(
            vec![(u, space.sort())],
            SmtTerm::and(vec![world, fails]),
        ))
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], _point: &ModelPoint) -> Result<Extension, CheckError> {
        let frame = ev.frame();
        let mut holds = true;
        for &u in &frame.worlds {
            let at = ModelPoint::World(u);
            if !ev.extension(args[0], &at)?.holds_at(&at, &frame.space) {
                holds = false;
                break;
            }
        }
        Ok(null_extension(&frame.space, holds))
    }
}

struct CounterfactualClause;

impl CounterfactualClause {
    /// Antecedent verifier `x` and `x`-alternative `u` to the evaluation world.
    fn antecedent(
        b: &mut Builder<'_>,
        args: &[NodeId],
        point: &EvalPoint,
    ) -> Result<(Vec<(String, SmtSort)>, SmtTerm, SmtTerm), CheckError> {
        let space = b.space();
        let w = world_term(point)?.clone();
        let (x, xv) = bound(b, "x");
        let (u, uv) = bound(b, "u");
        let verifies = b.extended_verify(&xv, args[0], point)?;
        let alternative = space.is_alternative_term(&uv, &xv, &w, b.vars());
        Ok((
            vec![(x, space.sort()), (u, space.sort())],
            SmtTerm::and(vec![verifies, alternative]),
            uv,
        ))
    }
}

impl SemanticClause for CounterfactualClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (bindings, antecedent, u) = Self::antecedent(b, args, point)?;
        let consequent = b.true_at(args[1], &EvalPoint::World(u))?;
        Ok(SmtTerm::forall(bindings, antecedent.implies(consequent)))
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (bindings, antecedent, u) = Self::antecedent(b, args, point)?;
        let consequent = b.false_at(args[1], &EvalPoint::World(u))?;
        Ok(SmtTerm::exists(bindings, SmtTerm::and(vec![antecedent, consequent])))
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let w = world_of(point)?;
        let frame = ev.frame();
        let (verifiers, _) = exact_sets(ev.extension(args[0], point)?)?;
        let possible = |s: u64| frame.is_possible(s);
        let concrete = ConcreteSpace {
            space: frame.space,
            possible: &possible,
        };
        let worlds: Vec<u64> = frame.worlds.iter().copied().collect();
        let mut holds = true;
        'outer: for &x in &verifiers {
            for u in concrete.alternatives(&worlds, x, w) {
                let at = ModelPoint::World(u);
                if !ev.extension(args[1], &at)?.holds_at(&at, &frame.space) {
                    holds = false;
                    break 'outer;
                }
            }
        }
        Ok(null_extension(&frame.space, holds))
    }
}

#[derive(Clone, Copy)]
enum Constitution {
    Identity,
    Ground,
    Essence,
    Relevance,
}

struct ConstitutiveClause(Constitution);

impl ConstitutiveClause {
    /// Every fusion of a left and a right state satisfies `right`.
    fn fusion_closed(
        b: &mut Builder<'_>,
        args: &[NodeId],
        point: &EvalPoint,
        verifying: bool,
    ) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let (x, xv) = bound(b, "x");
        let (y, yv) = bound(b, "y");
        let fused = space.fusion_term(&xv, &yv);
        let body = if verifying {
            SmtTerm::and(vec![
                b.extended_verify(&xv, args[0], point)?,
                b.extended_verify(&yv, args[1], point)?,
            ])
            .implies(b.extended_verify(&fused, args[1], point)?)
        } else {
            SmtTerm::and(vec![
                b.extended_falsify(&xv, args[0], point)?,
                b.extended_falsify(&yv, args[1], point)?,
            ])
            .implies(b.extended_falsify(&fused, args[1], point)?)
        };
        Ok(SmtTerm::forall(vec![(x, space.sort()), (y, space.sort())], body))
    }

    /// Left states are right states (and, with `both_ways`, conversely).
    fn included(
        b: &mut Builder<'_>,
        args: &[NodeId],
        point: &EvalPoint,
        verifying: bool,
        both_ways: bool,
    ) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let (x, xv) = bound(b, "x");
        let (left, right) = if verifying {
            (
                b.extended_verify(&xv, args[0], point)?,
                b.extended_verify(&xv, args[1], point)?,
            )
        } else {
            (
                b.extended_falsify(&xv, args[0], point)?,
                b.extended_falsify(&xv, args[1], point)?,
            )
        };
        let body = if both_ways {
            SmtTerm::and(vec![
                left.clone().implies(right.clone()),
                right.implies(left),
            ])
        } else {
            left.implies(right)
        };
        Ok(SmtTerm::forall(vec![(x, space.sort())], body))
    }

    /// Every right state has a part that is a left state.
    fn has_left_part(
        b: &mut Builder<'_>,
        args: &[NodeId],
        point: &EvalPoint,
        verifying: bool,
    ) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let (x, xv) = bound(b, "x");
        let (y, yv) = bound(b, "y");
        let (right, left) = if verifying {
            (
                b.extended_verify(&xv, args[1], point)?,
                b.extended_verify(&yv, args[0], point)?,
            )
        } else {
            (
                b.extended_falsify(&xv, args[1], point)?,
                b.extended_falsify(&yv, args[0], point)?,
            )
        };
        Ok(SmtTerm::forall(
            vec![(x, space.sort())],
            right.implies(SmtTerm::exists(
                vec![(y, space.sort())],
                SmtTerm::and(vec![left, space.part_of_term(&yv, &xv)]),
            )),
        ))
    }
}

fn fusion_closed_sets(left: &StateSet, right: &StateSet) -> bool {
    left.iter()
        .all(|&x| right.iter().all(|&y| right.contains(&(x | y))))
}

fn has_left_part_sets(space: &StateSpace, left: &StateSet, right: &StateSet) -> bool {
    right
        .iter()
        .all(|&x| left.iter().any(|&y| space.is_part_of(y, x)))
}

impl SemanticClause for ConstitutiveClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let parts = match self.0 {
            Constitution::Identity => vec![
                Self::included(b, args, point, true, true)?,
                Self::included(b, args, point, false, true)?,
            ],
            Constitution::Ground => vec![
                Self::included(b, args, point, true, false)?,
                Self::fusion_closed(b, args, point, false)?,
                Self::has_left_part(b, args, point, false)?,
            ],
            Constitution::Essence => vec![
                Self::included(b, args, point, false, false)?,
                Self::fusion_closed(b, args, point, true)?,
                Self::has_left_part(b, args, point, true)?,
            ],
            Constitution::Relevance => vec![
                Self::fusion_closed(b, args, point, true)?,
                Self::fusion_closed(b, args, point, false)?,
            ],
        };
        Ok(SmtTerm::and(parts))
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        Ok(self.true_at(b, args, point)?.not())
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let space = ev.frame().space;
        let (va, fa) = exact_sets(ev.extension(args[0], point)?)?;
        let (vb, fb) = exact_sets(ev.extension(args[1], point)?)?;
        let holds = match self.0 {
            Constitution::Identity => va == vb && fa == fb,
            Constitution::Ground => {
                va.is_subset(&vb) && fusion_closed_sets(&fa, &fb) && has_left_part_sets(&space, &fa, &fb)
            }
            Constitution::Essence => {
                fa.is_subset(&fb) && fusion_closed_sets(&va, &vb) && has_left_part_sets(&space, &va, &vb)
            }
            Constitution::Relevance => fusion_closed_sets(&va, &vb) && fusion_closed_sets(&fa, &fb),
        };
        Ok(null_extension(&space, holds))
    }
}

static NEG: NegClause = NegClause;
static AND: BooleanClause = BooleanClause { dual: false };
static OR: BooleanClause = BooleanClause { dual: true };
static TOP: ConstantClause = ConstantClause { top: true };
static BOTTOM: ConstantClause = ConstantClause { top: false };
static NECESSITY: NecessityClause = NecessityClause;
static COUNTERFACTUAL: CounterfactualClause = CounterfactualClause;
static IDENTITY: ConstitutiveClause = ConstitutiveClause(Constitution::Identity);
static GROUND: ConstitutiveClause = ConstitutiveClause(Constitution::Ground);
static ESSENCE: ConstitutiveClause = ConstitutiveClause(Constitution::Essence);
static RELEVANCE: ConstitutiveClause = ConstitutiveClause(Constitution::Relevance);

/// Extensional, modal, counterfactual and constitutive operators over
/// exact truthmakers.
pub struct HyperintensionalTheory {
    registry: OperatorRegistry,
    defaults: Settings,
}

impl HyperintensionalTheory {
    pub const NAME: &'static str = "hyperintensional";

    pub const CONNECTIVES: [Connective; 15] = [
        Connective::Neg,
        Connective::And,
        Connective::Or,
        Connective::Conditional,
        Connective::Biconditional,
        Connective::Top,
        Connective::Bottom,
        Connective::Necessity,
        Connective::Possibility,
        Connective::Counterfactual,
        Connective::MightCounterfactual,
        Connective::Identity,
        Connective::Ground,
        Connective::Essence,
        Connective::Relevance,
    ];

    pub fn new() -> Result<Self, RegistryError> {
        Ok(Self::with_registry(OperatorRegistry::with_standard(
            &Self::CONNECTIVES,
        )?))
    }

    /// Uses `registry` for parsing; any connective it names must have a
    /// clause here or instantiation fails with `MissingClause`.
    pub fn with_registry(registry: OperatorRegistry) -> Self {
        Self {
            registry,
            defaults: Settings::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: Settings) -> Self {
        self.defaults = defaults;
        self
    }

    fn possible(space: &StateSpace, state: &SmtTerm) -> SmtTerm {
        space.possible_term(state)
    }
}

impl Theory for HyperintensionalTheory {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    fn clause(&self, connective: Connective) -> Option<Clause<'_>> {
        let clause = match connective {
            Connective::Neg => Clause::Primitive(&NEG),
            Connective::And => Clause::Primitive(&AND),
            Connective::Or => Clause::Primitive(&OR),
            Connective::Top => Clause::Primitive(&TOP),
            Connective::Bottom => Clause::Primitive(&BOTTOM),
            Connective::Necessity => Clause::Primitive(&NECESSITY),
            Connective::Counterfactual => Clause::Primitive(&COUNTERFACTUAL),
            Connective::Identity => Clause::Primitive(&IDENTITY),
            Connective::Ground => Clause::Primitive(&GROUND),
            Connective::Essence => Clause::Primitive(&ESSENCE),
            Connective::Relevance => Clause::Primitive(&RELEVANCE),
            Connective::Conditional => Clause::Defined(&CONDITIONAL),
            Connective::Biconditional => Clause::Defined(&BICONDITIONAL),
            Connective::Possibility => Clause::Defined(&POSSIBILITY),
            Connective::MightCounterfactual => Clause::Defined(&MIGHT_COUNTERFACTUAL),
            _ => return None,
        };
        Some(clause)
    }

    fn default_settings(&self) -> Settings {
        self.defaults.clone()
    }

    fn declarations(&self, letters: &IndexSet<String>, settings: &Settings) -> Vec<Declaration> {
        let state = SmtSort::BitVec(settings.n);
        let predicate = |name: String| Declaration::Fun {
            name,
            args: vec![state.clone()],
            ret: SmtSort::Bool,
        };
        let mut decls = vec![
            predicate(POSSIBLE.to_string()),
            Declaration::Const {
                name: MAIN_WORLD.to_string(),
                sort: state.clone(),
            },
        ];
        for letter in letters {
            decls.push(predicate(verify_fn(letter)));
            decls.push(predicate(falsify_fn(letter)));
        }
        decls
    }

    fn frame_constraints(&self, settings: &Settings) -> Vec<Constraint> {
        let space = StateSpace::new(settings.n);
        let mut vars = VarSupply::new();
        let x = vars.fresh("x");
        let y = vars.fresh("y");
        let (xv, yv) = (SmtTerm::var(&x), SmtTerm::var(&y));
        let main = SmtTerm::var(MAIN_WORLD);
        vec![
            Constraint::new(
                "frame:null_possible",
                Self::possible(&space, &space.null_term()),
            ),
            Constraint::new(
                "frame:possibility_downward_closure",
                SmtTerm::forall(
                    vec![(x, space.sort()), (y, space.sort())],
                    SmtTerm::and(vec![
                        Self::possible(&space, &yv),
                        space.part_of_term(&xv, &yv),
                    ])
                    .implies(Self::possible(&space, &xv)),
                ),
            ),
            Constraint::new("frame:main_world", space.is_world_term(&main, &mut vars)),
        ]
    }

    fn proposition_constraints(
        &self,
        letter: &str,
        all_letters: &IndexSet<String>,
        settings: &Settings,
    ) -> Vec<Constraint> {
        let space = StateSpace::new(settings.n);
        let sort = space.sort();
        let mut vars = VarSupply::new();
        let x = vars.fresh("x");
        let y = vars.fresh("y");
        let (xv, yv) = (SmtTerm::var(&x), SmtTerm::var(&y));
        let both = vec![(x.clone(), sort.clone()), (y.clone(), sort.clone())];
        let label = |what: &str| format!("model:{letter}:{what}");
        let closed = |pred: fn(&str, &SmtTerm) -> SmtTerm| {
            SmtTerm::forall(
                both.clone(),
                SmtTerm::and(vec![pred(letter, &xv), pred(letter, &yv)])
                    .implies(pred(letter, &space.fusion_term(&xv, &yv))),
            )
        };

        let mut out = vec![
            Constraint::new(label("verifier_fusion_closure"), closed(verify)),
            Constraint::new(label("falsifier_fusion_closure"), closed(falsify)),
            Constraint::new(
                label("exclusivity"),
                SmtTerm::forall(
                    both.clone(),
                    SmtTerm::and(vec![verify(letter, &xv), falsify(letter, &yv)])
                        .implies(space.compatible_term(&xv, &yv).not()),
                ),
            ),
            Constraint::new(
                label("exhaustivity"),
                SmtTerm::forall(
                    vec![(x.clone(), sort.clone())],
                    Self::possible(&space, &xv).implies(SmtTerm::exists(
                        vec![(y.clone(), sort.clone())],
                        SmtTerm::and(vec![
                            space.compatible_term(&xv, &yv),
                            SmtTerm::or(vec![verify(letter, &yv), falsify(letter, &yv)]),
                        ]),
                    )),
                ),
            ),
        ];

        if settings.contingent {
            out.push(Constraint::new(
                label("contingent"),
                SmtTerm::and(vec![
                    SmtTerm::exists(
                        vec![(x.clone(), sort.clone())],
                        SmtTerm::and(vec![Self::possible(&space, &xv), verify(letter, &xv)]),
                    ),
                    SmtTerm::exists(
                        vec![(y.clone(), sort.clone())],
                        SmtTerm::and(vec![Self::possible(&space, &yv), falsify(letter, &yv)]),
                    ),
                ]),
            ));
        }
        if settings.non_empty {
            out.push(Constraint::new(
                label("non_empty"),
                SmtTerm::and(vec![
                    SmtTerm::exists(vec![(x.clone(), sort.clone())], verify(letter, &xv)),
                    SmtTerm::exists(vec![(y.clone(), sort.clone())], falsify(letter, &yv)),
                ]),
            ));
        }
        if settings.non_null {
            let null = space.null_term();
            out.push(Constraint::new(
                label("non_null"),
                SmtTerm::and(vec![verify(letter, &null).not(), falsify(letter, &null).not()]),
            ));
        }
        if settings.disjoint {
            let null = space.null_term();
            let later = all_letters
                .iter()
                .skip_while(|l| l.as_str() != letter)
                .skip(1);
            for other in later {
                let subject = |l: &str, s: &SmtTerm| {
                    SmtTerm::and(vec![
                        SmtTerm::or(vec![verify(l, s), falsify(l, s)]),
                        s.clone().eq(null.clone()).not(),
                    ])
                };
                out.push(Constraint::new(
                    label(&format!("disjoint:{other}")),
                    SmtTerm::forall(
                        both.clone(),
                        SmtTerm::and(vec![subject(letter, &xv), subject(other.as_str(), &yv)])
                            .implies(xv.clone().bvand(yv.clone()).eq(null.clone())),
                    ),
                ));
            }
        }
        out
    }

    fn main_point(&self, _settings: &Settings) -> EvalPoint {
        EvalPoint::World(SmtTerm::var(MAIN_WORLD))
    }

    fn letter_true_at(&self, b: &mut Builder<'_>, letter: &str, point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let w = world_term(point)?.clone();
        let (x, xv) = bound(b, "x");
        Ok(SmtTerm::exists(
            vec![(x, space.sort())],
            SmtTerm::and(vec![space.part_of_term(&xv, &w), verify(letter, &xv)]),
        ))
    }

    fn letter_false_at(&self, b: &mut Builder<'_>, letter: &str, point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let space = b.space();
        let w = world_term(point)?.clone();
        let (x, xv) = bound(b, "x");
        Ok(SmtTerm::exists(
            vec![(x, space.sort())],
            SmtTerm::and(vec![space.part_of_term(&xv, &w), falsify(letter, &xv)]),
        ))
    }

    fn letter_extended_verify(
        &self,
        _b: &mut Builder<'_>,
        letter: &str,
        state: &SmtTerm,
        _point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        Ok(verify(letter, state))
    }

    fn letter_extended_falsify(
        &self,
        _b: &mut Builder<'_>,
        letter: &str,
        state: &SmtTerm,
        _point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        Ok(falsify(letter, state))
    }

    fn model_queries(&self, letters: &IndexSet<String>, settings: &Settings) -> Vec<SmtTerm> {
        let space = StateSpace::new(settings.n);
        let mut queries = vec![SmtTerm::var(MAIN_WORLD)];
        for s in space.states() {
            let state = space.literal(s);
            queries.push(Self::possible(&space, &state));
            for letter in letters {
                queries.push(verify(letter, &state));
                queries.push(falsify(letter, &state));
            }
        }
        queries
    }

    fn decode(&self, model: &Model, letters: &IndexSet<String>, settings: &Settings) -> Result<ModelFrame, CheckError> {
        let space = StateSpace::new(settings.n);
        let missing = |what: String| CheckError::Solver(format!("model has no value for {what}"));
        let read = |term: SmtTerm| {
            model
                .bool_of(&term)
                .ok_or_else(|| missing(format!("{term:?}")))
        };

        let main = model
            .bv_of(&SmtTerm::var(MAIN_WORLD))
            .ok_or_else(|| missing(MAIN_WORLD.to_string()))?;
        let mut possible = BTreeSet::new();
        for s in space.states() {
            if read(Self::possible(&space, &space.literal(s)))? {
                possible.insert(s);
            }
        }
        let is_possible = |s: u64| possible.contains(&s);
        let concrete = ConcreteSpace {
            space,
            possible: &is_possible,
        };
        let worlds = possible
            .iter()
            .copied()
            .filter(|&s| concrete.is_world(s))
            .collect();

        let mut propositions = indexmap::IndexMap::new();
        for letter in letters {
            let mut verifiers = BTreeSet::new();
            let mut falsifiers = BTreeSet::new();
            for s in space.states() {
                let state = space.literal(s);
                if read(verify(letter, &state))? {
                    verifiers.insert(s);
                }
                if read(falsify(letter, &state))? {
                    falsifiers.insert(s);
                }
            }
            propositions.insert(
                letter.clone(),
                Extension::Exact {
                    verifiers,
                    falsifiers,
                },
            );
        }

        Ok(ModelFrame {
            space,
            possible,
            worlds,
            histories: Vec::new(),
            transitions: BTreeSet::new(),
            propositions,
            main_point: ModelPoint::World(main),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::DispatchTable;
    use indexmap::IndexMap;
    use truthmaker_syntax::parse_sentence;
    use truthmaker_syntax::FormulaArena;

    fn exact(v: &[u64], f: &[u64]) -> Extension {
        Extension::Exact {
            verifiers: v.iter().copied().collect(),
            falsifiers: f.iter().copied().collect(),
        }
    }

    /// N=2 with `a` and `b` incompatible: worlds are `a` and `b`.
    /// `p` is verified by `a`, falsified by `b`; `q` the other way round.
    fn frame() -> ModelFrame {
        let mut propositions = IndexMap::new();
        propositions.insert("p".to_string(), exact(&[1], &[2]));
        propositions.insert("q".to_string(), exact(&[2], &[1]));
        ModelFrame {
            space: StateSpace::new(2),
            possible: BTreeSet::from([0, 1, 2]),
            worlds: BTreeSet::from([1, 2]),
            histories: Vec::new(),
            transitions: BTreeSet::new(),
            propositions,
            main_point: ModelPoint::World(1),
        }
    }

    fn evaluate(text: &str, at: u64) -> Extension {
        let theory = HyperintensionalTheory::new().unwrap();
        let mut arena = FormulaArena::new();
        let node = parse_sentence(&mut arena, theory.registry(), text, "test").unwrap();
        let mut syntax = truthmaker_syntax::Syntax {
            arena,
            premises: vec![truthmaker_syntax::Sentence {
                text: text.to_string(),
                root: node,
            }],
            conclusions: Vec::new(),
        };
        let dispatch = DispatchTable::new(&theory).unwrap();
        let lowering = dispatch.lower(&mut syntax).unwrap();
        let frame = frame();
        let mut ev = Evaluator::new(&theory, &syntax.arena, &dispatch, &frame);
        ev.extension(lowering.lowered(node), &ModelPoint::World(at))
            .unwrap()
    }

    #[test]
    fn conjunction_fuses_verifiers_and_collects_falsifiers() {
        assert_eq!(evaluate("(p ∧ q)", 1), exact(&[3], &[1, 2, 3]));
        assert_eq!(evaluate("(p ∨ q)", 1), exact(&[1, 2, 3], &[3]));
    }

    #[test]
    fn negation_swaps_and_double_negation_is_exact() {
        assert_eq!(evaluate("¬p", 1), exact(&[2], &[1]));
        assert_eq!(evaluate("¬¬p", 1), evaluate("p", 1));
    }

    #[test]
    fn necessity_quantifies_over_worlds() {
        assert_eq!(evaluate("□(p ∨ q)", 1), exact(&[0], &[]));
        assert_eq!(evaluate("□p", 1), exact(&[], &[0]));
        assert_eq!(evaluate("◇p", 2), exact(&[0], &[]));
    }

    #[test]
    fn counterfactual_truth_depends_on_the_world() {
        // The only q-alternative to either world is b, where ¬p holds.
        assert_eq!(evaluate("(q \\boxright ¬p)", 1), exact(&[0], &[]));
        assert_eq!(evaluate("(q \\boxright p)", 1), exact(&[], &[0]));
        assert_eq!(evaluate("□(q \\boxright ¬p)", 1), exact(&[0], &[]));
    }

    #[test]
    fn constitutive_operators_compare_exact_contents() {
        assert_eq!(evaluate("(p ≡ ¬¬p)", 1), exact(&[0], &[]));
        assert_eq!(evaluate("(p ≡ q)", 1), exact(&[], &[0]));
        assert_eq!(evaluate("(p ≤ (p ∨ q))", 1), exact(&[0], &[]));
        assert_eq!(evaluate("(p ⊑ (p ∧ q))", 1), exact(&[0], &[]));
        assert_eq!(evaluate("(p ⪯ (p ∨ q))", 1), exact(&[0], &[]));
    }

    #[test]
    fn constants_have_fixed_contents() {
        assert_eq!(evaluate("⊤", 1), exact(&[0, 1, 2, 3], &[3]));
        assert_eq!(evaluate("⊥", 1), exact(&[], &[0]));
    }

    #[test]
    fn every_registered_connective_has_a_clause() {
        let theory = HyperintensionalTheory::new().unwrap();
        assert!(DispatchTable::new(&theory).is_ok());
        assert!(theory.clause(Connective::Until).is_none());
    }

    #[test]
    fn disjointness_only_pairs_later_letters() {
        let theory = HyperintensionalTheory::new().unwrap();
        let letters: IndexSet<String> = ["p", "q", "r"].iter().map(|s| s.to_string()).collect();
        let settings = Settings {
            disjoint: true,
            ..Settings::default()
        };
        let labels = |l: &str| -> Vec<String> {
            theory
                .proposition_constraints(l, &letters, &settings)
                .into_iter()
                .map(|c| c.label)
                .filter(|c| c.contains("disjoint"))
                .collect()
        };
        assert_eq!(labels("p"), ["model:p:disjoint:q", "model:p:disjoint:r"]);
        assert_eq!(labels("r"), Vec::<String>::new());
    }
}
