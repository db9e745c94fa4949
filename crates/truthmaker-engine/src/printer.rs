//! Plain-text model reports.

use std::fmt::{self, Write};

use serde::Serialize;
use truthmaker_syntax::NodeId;

use crate::errors::CheckError;
use crate::model::{ModelStructure, Timings};
use crate::state::StateSpace;
use crate::theory::{Extension, History, ModelPoint};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReport {
    pub state: u64,
    pub label: String,
    pub possible: bool,
    pub world: bool,
}

/// One sentence occurrence with its subformulas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceReport {
    #[serde(skip)]
    pub node: NodeId,
    pub text: String,
    pub extension: Extension,
    pub truth: bool,
    pub subformulas: Vec<SentenceReport>,
}

impl SentenceReport {
    /// This report followed by all nested subformula reports, pre-order.
    pub fn walk(&self) -> Vec<&SentenceReport> {
        let mut out = vec![self];
        for sub in &self.subformulas {
            out.extend(sub.walk());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    pub theory: String,
    pub space: StateSpace,
    pub states: Vec<StateReport>,
    pub point: ModelPoint,
    pub point_label: String,
    pub histories: Vec<History>,
    pub premises: Vec<SentenceReport>,
    pub conclusions: Vec<SentenceReport>,
    pub timings: Timings,
}

impl ModelReport {
    pub fn from_structure(structure: &ModelStructure<'_>) -> Result<Self, CheckError> {
        let frame = structure
            .frame()
            .ok_or_else(|| CheckError::InvalidState("no model to report".into()))?;
        let space = frame.space;
        let states = space
            .states()
            .map(|s| StateReport {
                state: s,
                label: space.label(s),
                possible: frame.is_possible(s),
                world: frame.worlds.contains(&s),
            })
            .collect();

        let syntax = structure.syntax();
        let sentence = |node| sentence_report(structure, node);
        let premises = syntax
            .premises
            .iter()
            .map(|s| sentence(s.root))
            .collect::<Result<_, _>>()?;
        let conclusions = syntax
            .conclusions
            .iter()
            .map(|s| sentence(s.root))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            theory: structure.theory().name().to_string(),
            space,
            states,
            point: frame.main_point,
            point_label: frame.main_point.label(&space),
            histories: frame.histories.clone(),
            premises,
            conclusions,
            timings: structure.timings(),
        })
    }

    pub fn sentences(&self) -> impl Iterator<Item = &SentenceReport> {
        self.premises
            .iter()
            .chain(&self.conclusions)
            .flat_map(SentenceReport::walk)
    }
}

fn sentence_report(structure: &ModelStructure<'_>, node: NodeId) -> Result<SentenceReport, CheckError> {
    let arena = &structure.syntax().arena;
    let extension = structure
        .extension(node)
        .cloned()
        .ok_or_else(|| CheckError::InvalidState(format!("no extension for node {}", node.index())))?;
    let truth = structure.truth(node).unwrap_or(false);
    let subformulas = arena
        .args(node)
        .iter()
        .map(|&arg| sentence_report(structure, arg))
        .collect::<Result<_, _>>()?;
    Ok(SentenceReport {
        node,
        text: arena.infix(node, structure.theory().registry()),
        extension,
        truth,
        subformulas,
    })
}

fn state_set(space: &StateSpace, states: &std::collections::BTreeSet<u64>) -> String {
    if states.is_empty() {
        return "∅".to_string();
    }
    let labels: Vec<String> = states.iter().map(|&s| space.label(s)).collect();
    format!("{{{}}}", labels.join(", "))
}

fn point_set(points: &std::collections::BTreeSet<(usize, i64)>) -> String {
    if points.is_empty() {
        return "∅".to_string();
    }
    let labels: Vec<String> = points.iter().map(|(w, t)| format!("({w},{t})")).collect();
    format!("{{{}}}", labels.join(", "))
}

fn print_sentence(
    report: &SentenceReport,
    space: &StateSpace,
    point: &str,
    depth: usize,
    out: &mut impl Write,
) -> fmt::Result {
    let indent = "   ".repeat(depth);
    let value = if report.truth { "True" } else { "False" };
    match &report.extension {
        Extension::Exact {
            verifiers,
            falsifiers,
        } => writeln!(
            out,
            "{indent}|{}| = < {}, {} >  ({value} in {point})",
            report.text,
            state_set(space, verifiers),
            state_set(space, falsifiers)
        )?,
        Extension::Temporal { true_at, false_at } => writeln!(
            out,
            "{indent}|{}|: true at {}, false at {}  ({value} at {point})",
            report.text,
            point_set(true_at),
            point_set(false_at)
        )?,
    }
    for sub in &report.subformulas {
        print_sentence(sub, space, point, depth + 1, out)?;
    }
    Ok(())
}

pub fn print_report(report: &ModelReport, out: &mut impl Write) -> fmt::Result {
    let space = &report.space;
    writeln!(out, "Theory: {}", report.theory)?;
    writeln!(out, "State space (N={}):", space.bits())?;
    let width = space.bits() as usize;
    for state in &report.states {
        let tag = if state.world {
            "world"
        } else if state.possible {
            "possible"
        } else {
            "impossible"
        };
        writeln!(out, "  #b{:0width$b} = {} ({tag})", state.state, state.label)?;
    }
    if !report.histories.is_empty() {
        writeln!(out, "World histories:")?;
        for h in &report.histories {
            let steps: Vec<String> = h
                .times()
                .zip(&h.states)
                .map(|(t, &s)| format!("({t}) {}", space.label(s)))
                .collect();
            writeln!(out, "  W_{} [{}..{}]: {}", h.world, h.start, h.end(), steps.join(" → "))?;
        }
    }
    writeln!(out, "The evaluation point is: {}", report.point_label)?;

    for (title, sentences) in [
        ("INTERPRETED PREMISES", &report.premises),
        ("INTERPRETED CONCLUSIONS", &report.conclusions),
    ] {
        if sentences.is_empty() {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "{title}:")?;
        for (i, sentence) in sentences.iter().enumerate() {
            write!(out, "{}. ", i + 1)?;
            print_sentence(sentence, space, &report.point_label, 0, out)?;
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "Built in {:.4} s, solved in {:.4} s, extracted in {:.4} s",
        report.timings.build.as_secs_f64(),
        report.timings.solve.as_secs_f64(),
        report.timings.extract.as_secs_f64()
    )
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        print_report(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn exact(v: &[u64], f: &[u64]) -> Extension {
        Extension::Exact {
            verifiers: v.iter().copied().collect(),
            falsifiers: f.iter().copied().collect(),
        }
    }

    fn report() -> ModelReport {
        let space = StateSpace::new(2);
        let mut arena = truthmaker_syntax::FormulaArena::new();
        let p = arena.letter("p");
        let leaf = SentenceReport {
            node: p,
            text: "p".into(),
            extension: exact(&[1], &[2]),
            truth: true,
            subformulas: Vec::new(),
        };
        let root = SentenceReport {
            node: arena.apply(truthmaker_syntax::Connective::Neg, vec![p]),
            text: "\\neg p".into(),
            extension: exact(&[2], &[1]),
            truth: false,
            subformulas: vec![leaf],
        };
        ModelReport {
            theory: "hyperintensional".into(),
            space,
            states: space
                .states()
                .map(|s| StateReport {
                    state: s,
                    label: space.label(s),
                    possible: s != 3,
                    world: s == 1 || s == 2,
                })
                .collect(),
            point: ModelPoint::World(1),
            point_label: space.label(1),
            histories: Vec::new(),
            premises: Vec::new(),
            conclusions: vec![root],
            timings: Timings {
                solve: Duration::from_millis(5),
                ..Timings::default()
            },
        }
    }

    #[test]
    fn prints_states_and_nested_sentences() {
        let text = report().to_string();
        assert!(text.contains("#b00 = □ (possible)"));
        assert!(text.contains("#b01 = a (world)"));
        assert!(text.contains("#b11 = a.b (impossible)"));
        assert!(text.contains("The evaluation point is: a"));
        assert!(!text.contains("INTERPRETED PREMISES"));
        assert!(text.contains("1. |\\neg p| = < {b}, {a} >  (False in a)"));
        assert!(text.contains("   |p| = < {a}, {b} >  (True in a)"));
    }

    #[test]
    fn sentences_walks_every_occurrence() {
        let r = report();
        let texts: Vec<&str> = r.sentences().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["\\neg p", "p"]);
    }

    #[test]
    fn temporal_extensions_print_points() {
        let mut r = report();
        r.conclusions[0].extension = Extension::Temporal {
            true_at: BTreeSet::from([(0, 0), (1, -1)]),
            false_at: BTreeSet::new(),
        };
        let text = r.to_string();
        assert!(text.contains("true at {(0,0), (1,-1)}, false at ∅"));
    }

    #[test]
    fn reports_serialize_without_node_ids() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["conclusions"][0]["text"], "\\neg p");
        assert!(json["conclusions"][0].get("node").is_none());
    }
}
