//! Per-check settings.
//!
//! Settings arrive as loosely typed JSON objects (one per example, on top of
//! the theory's defaults). Unknown keys are ignored with a debug log.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Bit width of states.
    #[serde(rename = "N")]
    pub n: u32,
    /// Length of world histories (temporal theories).
    #[serde(rename = "M")]
    pub m: u32,
    pub contingent: bool,
    pub non_empty: bool,
    pub non_null: bool,
    pub disjoint: bool,
    /// Per-solve budget in seconds.
    pub max_time: f64,
    /// Whether a countermodel is expected; `None` when unstated.
    pub expectation: Option<bool>,
    /// Number of distinct models to find.
    pub iterate: usize,
    /// Global budget for the iteration loop, in seconds.
    pub iteration_timeout: f64,
    /// Consecutive isomorphic models tolerated before iteration gives up.
    pub iteration_attempts: usize,
    /// Number of world-history slots (temporal theories).
    pub max_worlds: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            n: 3,
            m: 2,
            contingent: false,
            non_empty: false,
            non_null: false,
            disjoint: false,
            max_time: 1.0,
            expectation: None,
            iterate: 1,
            iteration_timeout: 1.0,
            iteration_attempts: 5,
            max_worlds: 2,
        }
    }
}

impl Settings {
    /// Default settings overlaid with a JSON object.
    pub fn from_json(text: &str) -> Result<Settings, ConfigurationError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ConfigurationError::invalid("<json>", e.to_string()))?;
        Settings::merged(&Settings::default(), &value)
    }

    /// `defaults` with every recognised key of `overrides` replaced.
    pub fn merged(defaults: &Settings, overrides: &Value) -> Result<Settings, ConfigurationError> {
        let overrides = match overrides {
            Value::Null => return Ok(defaults.clone()),
            Value::Object(map) => map,
            other => {
                return Err(ConfigurationError::invalid(
                    "<settings>",
                    format!("expected an object, found {other}"),
                ))
            }
        };
        let mut base = match serde_json::to_value(defaults) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in overrides {
            if base.contains_key(key) {
                base.insert(key.clone(), value.clone());
            } else {
                debug!(%key, "ignoring unknown setting");
            }
        }
        let settings: Settings = serde_json::from_value(Value::Object(base))
            .map_err(|e| ConfigurationError::invalid("<settings>", e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(1..=32).contains(&self.n) {
            return Err(ConfigurationError::invalid("N", format!("{} is outside 1..=32", self.n)));
        }
        if self.m == 0 {
            return Err(ConfigurationError::invalid("M", "must be at least 1"));
        }
        if !self.max_time.is_finite() || self.max_time < 0.0 {
            return Err(ConfigurationError::invalid(
                "max_time",
                format!("{} is not a non-negative number of seconds", self.max_time),
            ));
        }
        if !self.iteration_timeout.is_finite() || self.iteration_timeout < 0.0 {
            return Err(ConfigurationError::invalid(
                "iteration_timeout",
                "must be a non-negative number of seconds",
            ));
        }
        if self.iterate == 0 {
            return Err(ConfigurationError::invalid("iterate", "must be at least 1"));
        }
        if self.max_worlds == 0 {
            return Err(ConfigurationError::invalid("max_worlds", "must be at least 1"));
        }
        Ok(())
    }

    pub fn solve_budget(&self) -> Duration {
        Duration::from_secs_f64(self.max_time)
    }

    pub fn iteration_budget(&self) -> Duration {
        Duration::from_secs_f64(self.iteration_timeout)
    }
}
