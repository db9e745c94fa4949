//! Parallel checking of independent examples.
//!
//! Every worker thread builds its own theory from the factory and its own
//! solver, so nothing mutable is shared between checks.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use truthmaker_smt::{SmtSolver, Z3Solver};

use crate::check::{check_argument, CheckReport};
use crate::constraints::CheckMode;
use crate::errors::CheckError;
use crate::settings::Settings;
use crate::theory::Theory;

/// A named argument with per-example setting overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    #[serde(default)]
    pub premises: Vec<String>,
    #[serde(default)]
    pub conclusions: Vec<String>,
    /// Overrides on top of the theory's defaults.
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub mode: CheckMode,
}

impl Example {
    pub fn new(
        name: impl Into<String>,
        premises: &[&str],
        conclusions: &[&str],
        settings: Value,
    ) -> Self {
        Self {
            name: name.into(),
            premises: premises.iter().map(|s| s.to_string()).collect(),
            conclusions: conclusions.iter().map(|s| s.to_string()).collect(),
            settings,
            mode: CheckMode::Countermodel,
        }
    }

    pub fn with_mode(mut self, mode: CheckMode) -> Self {
        self.mode = mode;
        self
    }

    /// Settings after merging the overrides into `theory`'s defaults.
    pub fn resolved_settings(&self, theory: &dyn Theory) -> Result<Settings, CheckError> {
        Ok(Settings::merged(&theory.default_settings(), &self.settings)?)
    }

    /// Check with a fresh [`Z3Solver`].
    pub fn check(&self, theory: &dyn Theory) -> Result<CheckReport, CheckError> {
        self.check_with(theory, &mut Z3Solver::new())
    }

    pub fn check_with<S: SmtSolver>(
        &self,
        theory: &dyn Theory,
        solver: &mut S,
    ) -> Result<CheckReport, CheckError> {
        let settings = self.resolved_settings(theory)?;
        check_argument(
            &self.name,
            theory,
            &self.premises,
            &self.conclusions,
            &settings,
            self.mode,
            solver,
        )
    }
}

/// Runs every example on its own thread. Results come back in input order.
///
/// `factory` is called once per worker; an error from it is that example's
/// result. A panicking worker is reported as [`CheckError::InvalidState`].
pub fn run_batch<T, E, F>(examples: Vec<Example>, factory: F) -> Vec<Result<CheckReport, CheckError>>
where
    T: Theory + 'static,
    E: Into<CheckError>,
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
{
    let factory = Arc::new(factory);
    let handles: Vec<_> = examples
        .into_iter()
        .map(|example| {
            let factory = Arc::clone(&factory);
            let name = example.name.clone();
            let handle = thread::spawn(move || {
                let theory = factory().map_err(Into::<CheckError>::into)?;
                example.check(&theory)
            });
            (name, handle)
        })
        .collect();
    debug!(workers = handles.len(), "batch started");

    handles
        .into_iter()
        .map(|(name, handle)| match handle.join() {
            Ok(result) => result,
            Err(_) => Err(CheckError::InvalidState(format!(
                "worker for `{name}` panicked"
            ))),
        })
        .collect()
}
