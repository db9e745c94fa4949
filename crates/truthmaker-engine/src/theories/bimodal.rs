//! Bimodal logic over finite world histories.
//!
//! Each world slot `w` has an existence flag `exists_w`, one-hot start
//! flags `start_w_k` selecting the interval `[-k, M-1-k]`, and a state per
//! time `hist_w_t`. Letters are classical predicates `truth_p` on states
//! and consecutive states must stand in the `task` relation. Evaluation
//! points are concrete (world, time) pairs, so every temporal and modal
//! quantifier unfolds into a finite conjunction or disjunction.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use indexmap::{IndexMap, IndexSet};
use truthmaker_smt::{Model, SmtSort, SmtTerm};
use truthmaker_syntax::{Connective, NodeId, OperatorRegistry, RegistryError};

use crate::constraints::Builder;
use crate::errors::CheckError;
use crate::model::Evaluator;
use crate::settings::Settings;
use crate::state::{StateSpace, VarSupply};
use crate::theories::{BICONDITIONAL, CONDITIONAL, EVENTUALLY, POSSIBILITY, SOMETIME_PAST};
use crate::theory::{
    Clause, Constraint, Declaration, EvalPoint, Extension, History, ModelFrame, ModelPoint,
    SemanticClause, Theory,
};

pub const TASK: &str = "task";

pub fn exists_name(world: usize) -> String {
    format!("exists_{world}")
}

pub fn start_name(world: usize, k: u32) -> String {
    format!("start_{world}_{k}")
}

pub fn hist_name(world: usize, time: i64) -> String {
    format!("hist_{world}_{time}")
}

pub fn truth_fn(letter: &str) -> String {
    format!("truth_{letter}")
}

/// Every time any history can reach.
pub fn time_range(m: u32) -> RangeInclusive<i64> {
    let reach = i64::from(m) - 1;
    -reach..=reach
}

/// Interval selected by start flag `k`.
fn interval(m: u32, k: u32) -> RangeInclusive<i64> {
    -i64::from(k)..=i64::from(m) - 1 - i64::from(k)
}

fn hist(world: usize, time: i64) -> SmtTerm {
    SmtTerm::var(hist_name(world, time))
}

fn truth(letter: &str, state: SmtTerm) -> SmtTerm {
    SmtTerm::app(truth_fn(letter), vec![state])
}

fn task(from: SmtTerm, to: SmtTerm) -> SmtTerm {
    SmtTerm::app(TASK, vec![from, to])
}

/// `time` lies in the interval of `world`.
pub fn defined(world: usize, time: i64, m: u32) -> SmtTerm {
    let starts: Vec<SmtTerm> = (0..m)
        .filter(|&k| interval(m, k).contains(&time))
        .map(|k| SmtTerm::var(start_name(world, k)))
        .collect();
    if starts.is_empty() {
        SmtTerm::bool(false)
    } else {
        SmtTerm::or(starts)
    }
}

fn point_of(point: &EvalPoint) -> Result<(usize, i64), CheckError> {
    point.world_time().ok_or_else(|| {
        CheckError::InvalidState("bimodal sentences are evaluated at world-time points".into())
    })
}

type Points = BTreeSet<(usize, i64)>;

fn truth_points(ext: Extension) -> Result<Points, CheckError> {
    match ext {
        Extension::Temporal { true_at, .. } => Ok(true_at),
        Extension::Exact { .. } => Err(CheckError::InvalidState(
            "expected a temporal extension".into(),
        )),
    }
}

/// Classical extension: true where `holds`, false at every other point.
fn classify(frame: &ModelFrame, mut holds: impl FnMut(usize, i64) -> bool) -> Extension {
    let mut true_at = BTreeSet::new();
    let mut false_at = BTreeSet::new();
    for h in &frame.histories {
        for t in h.times() {
            if holds(h.world, t) {
                true_at.insert((h.world, t));
            } else {
                false_at.insert((h.world, t));
            }
        }
    }
    Extension::Temporal { true_at, false_at }
}

fn history(frame: &ModelFrame, world: usize) -> Option<&History> {
    frame.histories.get(world)
}

struct NegClause;

impl SemanticClause for NegClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        b.false_at(args[0], point)
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        b.true_at(args[0], point)
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        Ok(ev.extension(args[0], point)?.negated())
    }
}

struct BooleanClause {
    dual: bool,
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

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let a = truth_points(ev.extension(args[0], point)?)?;
        let b = truth_points(ev.extension(args[1], point)?)?;
        Ok(classify(ev.frame(), |w, t| {
            let (x, y) = (a.contains(&(w, t)), b.contains(&(w, t)));
            if self.dual {
                x || y
            } else {
                x && y
            }
        }))
    }
}

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

    fn evaluate(&self, ev: &mut Evaluator<'_>, _args: &[NodeId], _point: &ModelPoint) -> Result<Extension, CheckError> {
        Ok(classify(ev.frame(), |_, _| self.top))
    }
}

/// Truth at every existing world whose interval contains the current time.
struct NecessityClause;

impl SemanticClause for NecessityClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (_, time) = point_of(point)?;
        let settings = b.settings();
        let mut parts = Vec::with_capacity(settings.max_worlds);
        for v in 0..settings.max_worlds {
            let here = EvalPoint::WorldTime { world: v, time };
            let guard = SmtTerm::and(vec![
                SmtTerm::var(exists_name(v)),
                defined(v, time, settings.m),
            ]);
            parts.push(guard.implies(b.true_at(args[0], &here)?));
        }
        Ok(SmtTerm::and(parts))
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (_, time) = point_of(point)?;
        let settings = b.settings();
        let mut parts = Vec::with_capacity(settings.max_worlds);
        for v in 0..settings.max_worlds {
            let here = EvalPoint::WorldTime { world: v, time };
            parts.push(SmtTerm::and(vec![
                SmtTerm::var(exists_name(v)),
                defined(v, time, settings.m),
                b.false_at(args[0], &here)?,
            ]));
        }
        Ok(SmtTerm::or(parts))
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let a = truth_points(ev.extension(args[0], point)?)?;
        let frame = ev.frame();
        Ok(classify(frame, |_, t| {
            frame
                .histories
                .iter()
                .filter(|h| h.contains(t))
                .all(|h| a.contains(&(h.world, t)))
        }))
    }
}

/// Universal quantification over later (or earlier) times of the same
/// history. Vacuously true at the end (or start) of an interval.
struct AlwaysClause {
    future: bool,
}

impl AlwaysClause {
    fn times(&self, time: i64, m: u32) -> Vec<i64> {
        time_range(m)
            .filter(|&u| if self.future { u > time } else { u < time })
            .collect()
    }
}

impl SemanticClause for AlwaysClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (world, time) = point_of(point)?;
        let m = b.settings().m;
        let mut parts = Vec::new();
        for u in self.times(time, m) {
            let there = EvalPoint::WorldTime { world, time: u };
            parts.push(defined(world, u, m).implies(b.true_at(args[0], &there)?));
        }
        Ok(SmtTerm::and(parts))
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (world, time) = point_of(point)?;
        let m = b.settings().m;
        let mut parts = Vec::new();
        for u in self.times(time, m) {
            let there = EvalPoint::WorldTime { world, time: u };
            parts.push(SmtTerm::and(vec![
                defined(world, u, m),
                b.false_at(args[0], &there)?,
            ]));
        }
        Ok(SmtTerm::or(parts))
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let a = truth_points(ev.extension(args[0], point)?)?;
        let frame = ev.frame();
        Ok(classify(frame, |w, t| {
            history(frame, w).map_or(false, |h| {
                h.times()
                    .filter(|&u| if self.future { u > t } else { u < t })
                    .all(|u| a.contains(&(w, u)))
            })
        }))
    }
}

/// Truth at the next (or previous) time, which must exist.
struct StepClause {
    forward: bool,
}

impl StepClause {
    fn target(&self, time: i64) -> i64 {
        if self.forward {
            time + 1
        } else {
            time - 1
        }
    }
}

impl SemanticClause for StepClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (world, time) = point_of(point)?;
        let m = b.settings().m;
        let target = self.target(time);
        if !time_range(m).contains(&target) {
            return Ok(SmtTerm::bool(false));
        }
        let there = EvalPoint::WorldTime {
            world,
            time: target,
        };
        Ok(SmtTerm::and(vec![
            defined(world, target, m),
            b.true_at(args[0], &there)?,
        ]))
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (world, time) = point_of(point)?;
        let m = b.settings().m;
        let target = self.target(time);
        if !time_range(m).contains(&target) {
            return Ok(SmtTerm::bool(true));
        }
        let there = EvalPoint::WorldTime {
            world,
            time: target,
        };
        Ok(SmtTerm::or(vec![
            defined(world, target, m).not(),
            b.false_at(args[0], &there)?,
        ]))
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let a = truth_points(ev.extension(args[0], point)?)?;
        let frame = ev.frame();
        Ok(classify(frame, |w, t| {
            let target = self.target(t);
            history(frame, w).map_or(false, |h| h.contains(target)) && a.contains(&(w, target))
        }))
    }
}

/// Strong until (`forward`) or since: some later (earlier) witness time
/// satisfies the second argument and the first holds from now up to it.
struct UntilClause {
    forward: bool,
}

impl UntilClause {
    /// Witness times among `times` paired with the times the first argument
    /// must cover.
    fn witnesses(&self, time: i64, times: impl Iterator<Item = i64>) -> Vec<(i64, Vec<i64>)> {
        times
            .filter(|&u| if self.forward { u > time } else { u < time })
            .map(|u| {
                let span = if self.forward {
                    (time..u).collect()
                } else {
                    (u + 1..=time).collect()
                };
                (u, span)
            })
            .collect()
    }
}

impl SemanticClause for UntilClause {
    fn true_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (world, time) = point_of(point)?;
        let m = b.settings().m;
        let mut options = Vec::new();
        for (u, span) in self.witnesses(time, time_range(m)) {
            let mut conj = vec![
                defined(world, u, m),
                b.true_at(args[1], &EvalPoint::WorldTime { world, time: u })?,
            ];
            for s in span {
                conj.push(b.true_at(args[0], &EvalPoint::WorldTime { world, time: s })?);
            }
            options.push(SmtTerm::and(conj));
        }
        Ok(SmtTerm::or(options))
    }

    fn false_at(&self, b: &mut Builder<'_>, args: &[NodeId], point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        Ok(self.true_at(b, args, point)?.not())
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>, args: &[NodeId], point: &ModelPoint) -> Result<Extension, CheckError> {
        let a = truth_points(ev.extension(args[0], point)?)?;
        let c = truth_points(ev.extension(args[1], point)?)?;
        let frame = ev.frame();
        Ok(classify(frame, |w, t| {
            let Some(h) = history(frame, w) else {
                return false;
            };
            self.witnesses(t, h.times()).into_iter().any(|(u, span)| {
                c.contains(&(w, u)) && span.iter().all(|&s| a.contains(&(w, s)))
            })
        }))
    }
}

static NEG: NegClause = NegClause;
static AND: BooleanClause = BooleanClause { dual: false };
static OR: BooleanClause = BooleanClause { dual: true };
static TOP: ConstantClause = ConstantClause { top: true };
static BOTTOM: ConstantClause = ConstantClause { top: false };
static NECESSITY: NecessityClause = NecessityClause;
static ALWAYS: AlwaysClause = AlwaysClause { future: true };
static PAST: AlwaysClause = AlwaysClause { future: false };
static NEXT: StepClause = StepClause { forward: true };
static PREVIOUS: StepClause = StepClause { forward: false };
static UNTIL: UntilClause = UntilClause { forward: true };
static SINCE: UntilClause = UntilClause { forward: false };

/// Historical necessity and tense operators over bounded world histories.
pub struct BimodalTheory {
    registry: OperatorRegistry,
    defaults: Settings,
}

impl BimodalTheory {
    pub const NAME: &'static str = "bimodal";

    pub const CONNECTIVES: [Connective; 17] = [
        Connective::Neg,
        Connective::And,
        Connective::Or,
        Connective::Conditional,
        Connective::Biconditional,
        Connective::Top,
        Connective::Bottom,
        Connective::Necessity,
        Connective::Possibility,
        Connective::Always,
        Connective::Eventually,
        Connective::Past,
        Connective::SometimePast,
        Connective::Next,
        Connective::Previous,
        Connective::Until,
        Connective::Since,
    ];

    pub fn new() -> Result<Self, RegistryError> {
        Ok(Self::with_registry(OperatorRegistry::with_standard(
            &Self::CONNECTIVES,
        )?))
    }

    pub fn with_registry(registry: OperatorRegistry) -> Self {
        Self {
            registry,
            defaults: Settings {
                n: 2,
                ..Settings::default()
            },
        }
    }

    pub fn with_defaults(mut self, defaults: Settings) -> Self {
        self.defaults = defaults;
        self
    }
}

impl Theory for BimodalTheory {
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
            Connective::Always => Clause::Primitive(&ALWAYS),
            Connective::Past => Clause::Primitive(&PAST),
            Connective::Next => Clause::Primitive(&NEXT),
            Connective::Previous => Clause::Primitive(&PREVIOUS),
            Connective::Until => Clause::Primitive(&UNTIL),
            Connective::Since => Clause::Primitive(&SINCE),
            Connective::Conditional => Clause::Defined(&CONDITIONAL),
            Connective::Biconditional => Clause::Defined(&BICONDITIONAL),
            Connective::Possibility => Clause::Defined(&POSSIBILITY),
            Connective::Eventually => Clause::Defined(&EVENTUALLY),
            Connective::SometimePast => Clause::Defined(&SOMETIME_PAST),
            _ => return None,
        };
        Some(clause)
    }

    fn default_settings(&self) -> Settings {
        self.defaults.clone()
    }

    fn declarations(&self, letters: &IndexSet<String>, settings: &Settings) -> Vec<Declaration> {
        let state = SmtSort::BitVec(settings.n);
        let mut decls = Vec::new();
        for w in 0..settings.max_worlds {
            decls.push(Declaration::Const {
                name: exists_name(w),
                sort: SmtSort::Bool,
            });
            for k in 0..settings.m {
                decls.push(Declaration::Const {
                    name: start_name(w, k),
                    sort: SmtSort::Bool,
                });
            }
            for t in time_range(settings.m) {
                decls.push(Declaration::Const {
                    name: hist_name(w, t),
                    sort: state.clone(),
                });
            }
        }
        decls.push(Declaration::Fun {
            name: TASK.to_string(),
            args: vec![state.clone(), state.clone()],
            ret: SmtSort::Bool,
        });
        for letter in letters {
            decls.push(Declaration::Fun {
                name: truth_fn(letter),
                args: vec![state.clone()],
                ret: SmtSort::Bool,
            });
        }
        decls
    }

    fn frame_constraints(&self, settings: &Settings) -> Vec<Constraint> {
        let space = StateSpace::new(settings.n);
        let m = settings.m;
        let worlds = settings.max_worlds;
        let times: Vec<i64> = time_range(m).collect();
        let exists = |w: usize| SmtTerm::var(exists_name(w));
        let start = |w: usize, k: u32| SmtTerm::var(start_name(w, k));
        let mut out = vec![Constraint::new("frame:main_world_exists", exists(0))];

        for w in 1..worlds {
            out.push(Constraint::new(
                format!("frame:contiguous_worlds:{w}"),
                exists(w).implies(exists(w - 1)),
            ));
        }

        for w in 0..worlds {
            let mut one = vec![SmtTerm::or((0..m).map(|k| start(w, k)).collect())];
            for j in 0..m {
                for k in j + 1..m {
                    one.push(SmtTerm::and(vec![start(w, j), start(w, k)]).not());
                }
            }
            out.push(Constraint::new(format!("frame:one_start:{w}"), SmtTerm::and(one)));

            let lawful = times
                .windows(2)
                .map(|pair| {
                    SmtTerm::and(vec![
                        exists(w),
                        defined(w, pair[0], m),
                        defined(w, pair[1], m),
                    ])
                    .implies(task(hist(w, pair[0]), hist(w, pair[1])))
                })
                .collect();
            out.push(Constraint::new(format!("frame:lawful:{w}"), SmtTerm::and(lawful)));

            let padding = times
                .iter()
                .map(|&t| defined(w, t, m).not().implies(hist(w, t).eq(space.null_term())))
                .collect();
            out.push(Constraint::new(format!("frame:padding:{w}"), SmtTerm::and(padding)));

            let mut absent = vec![start(w, 0)];
            absent.extend(times.iter().map(|&t| hist(w, t).eq(space.null_term())));
            out.push(Constraint::new(
                format!("frame:absent:{w}"),
                exists(w).not().implies(SmtTerm::and(absent)),
            ));
        }

        for i in 0..worlds {
            for j in i + 1..worlds {
                let mut differ: Vec<SmtTerm> = (0..m)
                    .map(|k| start(i, k).eq(start(j, k)).not())
                    .collect();
                differ.extend(times.iter().map(|&t| hist(i, t).eq(hist(j, t)).not()));
                out.push(Constraint::new(
                    format!("frame:distinct_worlds:{i}:{j}"),
                    SmtTerm::and(vec![exists(i), exists(j)]).implies(SmtTerm::or(differ)),
                ));
            }
        }

        let mut vars = VarSupply::new();
        let s = vars.fresh("s");
        let u = vars.fresh("u");
        let (sv, uv) = (SmtTerm::var(&s), SmtTerm::var(&u));
        let mut occurrences = Vec::new();
        for w in 0..worlds {
            for pair in times.windows(2) {
                occurrences.push(SmtTerm::and(vec![
                    exists(w),
                    defined(w, pair[0], m),
                    defined(w, pair[1], m),
                    hist(w, pair[0]).eq(sv.clone()),
                    hist(w, pair[1]).eq(uv.clone()),
                ]));
            }
        }
        out.push(Constraint::new(
            "frame:task_witnessed",
            SmtTerm::forall(
                vec![(s, space.sort()), (u, space.sort())],
                task(sv.clone(), uv.clone()).implies(SmtTerm::or(occurrences)),
            ),
        ));
        out
    }

    fn proposition_constraints(
        &self,
        _letter: &str,
        _all_letters: &IndexSet<String>,
        _settings: &Settings,
    ) -> Vec<Constraint> {
        Vec::new()
    }

    fn main_point(&self, _settings: &Settings) -> EvalPoint {
        EvalPoint::WorldTime { world: 0, time: 0 }
    }

    fn letter_true_at(&self, _b: &mut Builder<'_>, letter: &str, point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (world, time) = point_of(point)?;
        Ok(truth(letter, hist(world, time)))
    }

    fn letter_false_at(&self, _b: &mut Builder<'_>, letter: &str, point: &EvalPoint) -> Result<SmtTerm, CheckError> {
        let (world, time) = point_of(point)?;
        Ok(truth(letter, hist(world, time)).not())
    }

    fn letter_extended_verify(
        &self,
        b: &mut Builder<'_>,
        letter: &str,
        state: &SmtTerm,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        Ok(SmtTerm::and(vec![
            state.clone().eq(b.space().null_term()),
            self.letter_true_at(b, letter, point)?,
        ]))
    }

    fn letter_extended_falsify(
        &self,
        b: &mut Builder<'_>,
        letter: &str,
        state: &SmtTerm,
        point: &EvalPoint,
    ) -> Result<SmtTerm, CheckError> {
        Ok(SmtTerm::and(vec![
            state.clone().eq(b.space().null_term()),
            self.letter_false_at(b, letter, point)?,
        ]))
    }

    fn model_queries(&self, letters: &IndexSet<String>, settings: &Settings) -> Vec<SmtTerm> {
        let times: Vec<i64> = time_range(settings.m).collect();
        let mut queries = Vec::new();
        for w in 0..settings.max_worlds {
            queries.push(SmtTerm::var(exists_name(w)));
            queries.extend((0..settings.m).map(|k| SmtTerm::var(start_name(w, k))));
            for &t in &times {
                queries.push(hist(w, t));
                for letter in letters {
                    queries.push(truth(letter, hist(w, t)));
                }
            }
            for pair in times.windows(2) {
                queries.push(task(hist(w, pair[0]), hist(w, pair[1])));
            }
        }
        queries
    }

    fn decode(&self, model: &Model, letters: &IndexSet<String>, settings: &Settings) -> Result<ModelFrame, CheckError> {
        let space = StateSpace::new(settings.n);
        let missing = |what: &str| CheckError::Solver(format!("model has no value for {what}"));
        let bool_var = |name: String| model.bool_of(&SmtTerm::var(&name)).ok_or_else(|| missing(&name));

        let mut histories = Vec::new();
        let mut transitions = BTreeSet::new();
        for w in 0..settings.max_worlds {
            if !bool_var(exists_name(w))? {
                break;
            }
            let mut k = None;
            for candidate in 0..settings.m {
                if bool_var(start_name(w, candidate))? {
                    k = Some(candidate);
                    break;
                }
            }
            let k = k.ok_or_else(|| missing(&format!("the start of world {w}")))?;
            let mut states = Vec::new();
            for t in interval(settings.m, k) {
                let name = hist_name(w, t);
                states.push(model.bv_of(&hist(w, t)).ok_or_else(|| missing(&name))?);
            }
            for (i, pair) in states.windows(2).enumerate() {
                let t = -i64::from(k) + i as i64;
                if model.bool_of(&task(hist(w, t), hist(w, t + 1))) == Some(true) {
                    transitions.insert((pair[0], pair[1]));
                }
            }
            histories.push(History {
                world: w,
                start: -i64::from(k),
                states,
            });
        }

        let possible = histories
            .iter()
            .flat_map(|h| h.states.iter().copied())
            .collect();

        let mut propositions = IndexMap::new();
        for letter in letters {
            let mut true_at = BTreeSet::new();
            let mut false_at = BTreeSet::new();
            for h in &histories {
                for t in h.times() {
                    let value = model
                        .bool_of(&truth(letter, hist(h.world, t)))
                        .ok_or_else(|| missing(&format!("{} at ({}, {t})", truth_fn(letter), h.world)))?;
                    if value {
                        true_at.insert((h.world, t));
                    } else {
                        false_at.insert((h.world, t));
                    }
                }
            }
            propositions.insert(letter.clone(), Extension::Temporal { true_at, false_at });
        }

        Ok(ModelFrame {
            space,
            possible,
            worlds: BTreeSet::new(),
            histories,
            transitions,
            propositions,
            main_point: ModelPoint::WorldTime { world: 0, time: 0 },
        })
    }
}
