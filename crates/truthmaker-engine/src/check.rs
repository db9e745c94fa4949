//! One argument check: parse, compile, solve, extract, iterate.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;
use truthmaker_smt::SmtSolver;
use truthmaker_syntax::parse_argument;

use crate::constraints::CheckMode;
use crate::errors::CheckError;
use crate::model::{ModelIterator, ModelStructure, Phase};
use crate::printer::ModelReport;
use crate::settings::Settings;
use crate::theory::Theory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Premises true and some conclusion false in a found model.
    Countermodel,
    /// No countermodel within the bound; `core` names the responsible
    /// constraints when the solver reports them.
    NoCountermodel { core: Vec<String> },
    /// Validity mode: UNSAT.
    Valid { core: Vec<String> },
    /// Validity mode: SAT.
    Invalid,
    Timeout,
    Unknown(String),
}

impl Verdict {
    /// `Some(true)` when a countermodel exists, `None` when undecided.
    pub fn found_countermodel(&self) -> Option<bool> {
        match self {
            Verdict::Countermodel | Verdict::Invalid => Some(true),
            Verdict::NoCountermodel { .. } | Verdict::Valid { .. } => Some(false),
            Verdict::Timeout | Verdict::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub theory: String,
    pub verdict: Verdict,
    /// Decoded models, first one first. Empty unless a countermodel was found.
    pub models: Vec<ModelReport>,
    pub expectation: Option<bool>,
    pub constraints: usize,
    pub elapsed: Duration,
}

impl CheckReport {
    /// Whether the verdict agrees with the `expectation` setting. `None`
    /// when nothing was expected or the solver gave no answer.
    pub fn matches_expectation(&self) -> Option<bool> {
        let expected = self.expectation?;
        let found = self.verdict.found_countermodel()?;
        Some(expected == found)
    }
}

pub fn check_argument<S, P, C>(
    name: &str,
    theory: &dyn Theory,
    premises: &[P],
    conclusions: &[C],
    settings: &Settings,
    mode: CheckMode,
    solver: &mut S,
) -> Result<CheckReport, CheckError>
where
    S: SmtSolver,
    P: AsRef<str>,
    C: AsRef<str>,
{
    let started = Instant::now();
    info!(
        name,
        theory = theory.name(),
        premises = premises.len(),
        conclusions = conclusions.len(),
        n = settings.n,
        "checking argument"
    );
    let syntax = parse_argument(premises, conclusions, theory.registry())?;
    let mut structure = ModelStructure::new(theory, syntax, settings, mode)?;
    let constraints = structure.constraints().len();
    let phase = structure.solve(solver)?;

    let mut models = Vec::new();
    let verdict = match (mode, phase) {
        (_, Phase::Timeout) => Verdict::Timeout,
        (_, Phase::Unknown) => {
            Verdict::Unknown(structure.unknown_reason().unwrap_or_default().to_string())
        }
        (CheckMode::Countermodel, Phase::Sat) => {
            models.push(ModelReport::from_structure(&structure)?);
            if settings.iterate > 1 {
                let mut iterator = ModelIterator::new(&mut structure, solver)?;
                while let Some(report) = iterator.next_model()? {
                    models.push(report);
                }
            }
            Verdict::Countermodel
        }
        (CheckMode::Countermodel, Phase::Unsat) => Verdict::NoCountermodel {
            core: structure.core().to_vec(),
        },
        (CheckMode::Validity, Phase::Sat) => Verdict::Invalid,
        (CheckMode::Validity, Phase::Unsat) => Verdict::Valid {
            core: structure.core().to_vec(),
        },
        (_, Phase::Built | Phase::Solving) => {
            return Err(CheckError::InvalidState(format!(
                "solve returned in phase {phase:?}"
            )))
        }
    };

    let elapsed = started.elapsed();
    info!(name, ?verdict, models = models.len(), ?elapsed, "check finished");
    Ok(CheckReport {
        name: name.to_string(),
        theory: theory.name().to_string(),
        verdict,
        models,
        expectation: settings.expectation,
        constraints,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdict: Verdict, expectation: Option<bool>) -> CheckReport {
        CheckReport {
            name: "t".into(),
            theory: "hyperintensional".into(),
            verdict,
            models: Vec::new(),
            expectation,
            constraints: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn expectation_compares_countermodel_existence() {
        assert_eq!(report(Verdict::Countermodel, Some(true)).matches_expectation(), Some(true));
        assert_eq!(report(Verdict::Invalid, Some(false)).matches_expectation(), Some(false));
        assert_eq!(
            report(Verdict::NoCountermodel { core: Vec::new() }, Some(false)).matches_expectation(),
            Some(true)
        );
        assert_eq!(
            report(Verdict::Valid { core: Vec::new() }, Some(true)).matches_expectation(),
            Some(false)
        );
    }

    #[test]
    fn undecided_or_unstated_is_none() {
        assert_eq!(report(Verdict::Timeout, Some(true)).matches_expectation(), None);
        assert_eq!(report(Verdict::Unknown("incomplete".into()), Some(false)).matches_expectation(), None);
        assert_eq!(report(Verdict::Countermodel, None).matches_expectation(), None);
    }
}
