//! Scenario Description - the declarative input of a run.
//!
//! A scenario names a duration plus groups of nodes and load-producing
//! applications. Each group may be instantiated several times and is active
//! within a `[start, end]` window of the run:
//!
//! ```yaml
//! name: small
//! duration: 60
//! nodes:
//!   - name: validator
//!     instances: 2
//! applications:
//!   - name: load
//!     users: 10
//!     start: 5
//!     end: 55
//!     rate:
//!       wave: { min: 10, max: 100, period: 20 }
//! ```
//!
//! Missing values fall back to `instances = 1`, `start = 0` and
//! `end = duration`. Parsing does not validate semantics; see
//! [`Scenario::check`](crate::validation).

use norma_env::Time;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Application type used when a group does not name one.
pub const DEFAULT_APPLICATION_TYPE: &str = "counter";

/// Errors raised while reading a scenario description.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A complete scenario description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Scenario name (for logging and reports)
    pub name: String,

    /// Total run time in seconds
    #[serde(alias = "duration_seconds")]
    pub duration: f64,

    /// Node groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeGroup>,

    /// Application groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<ApplicationGroup>,

    /// Cheating attempts; scheduled and logged, but not acted upon
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cheats: Vec<Cheat>,
}

/// A group of identically configured nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeGroup {
    pub name: String,

    /// Number of nodes, `None` = 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<i64>,

    /// Start offset in seconds, `None` = 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,

    /// End offset in seconds, `None` = end of scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,

    /// Whether the nodes take part in validation, `None` = false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<bool>,
}

/// A group of identically configured load applications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationGroup {
    pub name: String,

    /// On-chain application producing the traffic, `None` = "counter"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub app_type: Option<String>,

    /// Number of applications, `None` = 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<i64>,

    /// Number of users (accounts and workers) per application, `None` = 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,

    /// Start offset in seconds, `None` = 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,

    /// End offset in seconds, `None` = end of scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,

    /// Traffic shape while active
    #[serde(default)]
    pub rate: Rate,
}

/// Traffic shape of an application. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rate {
    /// Constant Tx/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<f64>,

    /// Event-counted ramp, frequency raised once per emitted second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear: Option<Ramp>,

    /// Time-indexed ramp `f(t) = start + increment * t`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope: Option<Ramp>,

    /// Sinusoid between `min` and `max`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<Wave>,

    /// Backlog-adaptive AIMD rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<Auto>,
}

/// Ramp parameters shared by `linear` and `slope`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ramp {
    /// Starting Tx/s
    pub start: f64,
    /// Tx/s added per second
    pub increment: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Wave {
    /// Tx/s, `None` = 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Tx/s
    pub max: f64,
    /// Seconds
    pub period: f64,
}

impl Wave {
    pub fn min(&self) -> f64 {
        self.min.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Auto {
    /// Additive increase in Tx/s per second, `None` = 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increase: Option<f64>,
    /// Multiplicative decrease on overload, `None` = 0.2 (20%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrease: Option<f64>,
}

impl Auto {
    pub fn increase(&self) -> f64 {
        self.increase.unwrap_or(1.0)
    }

    pub fn decrease(&self) -> f64 {
        self.decrease.unwrap_or(0.2)
    }
}

/// A cheating attempt, such as validators sharing a key started together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cheat {
    pub name: String,

    /// Offset in seconds, `None` = 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
}

impl Cheat {
    pub fn start_time(&self) -> Time {
        Time::from_secs_f64(self.start.unwrap_or(0.0))
    }
}

impl Scenario {
    /// Parses a scenario from YAML text.
    pub fn parse_str(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parses a scenario from a YAML file.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_str(&yaml)
    }

    /// Returns the end of the scenario.
    pub fn end_time(&self) -> Time {
        Time::from_secs_f64(self.duration)
    }
}

/// Instance count with the default applied; negative counts schedule nothing.
fn instance_count(instances: Option<i64>) -> usize {
    instances.unwrap_or(1).max(0) as usize
}

impl NodeGroup {
    pub fn instances(&self) -> usize {
        instance_count(self.instances)
    }

    pub fn start_time(&self) -> Time {
        Time::from_secs_f64(self.start.unwrap_or(0.0))
    }

    pub fn end_time(&self, scenario_end: Time) -> Time {
        self.end.map(Time::from_secs_f64).unwrap_or(scenario_end)
    }

    pub fn is_validator(&self) -> bool {
        self.validator.unwrap_or(false)
    }
}

impl ApplicationGroup {
    pub fn instances(&self) -> usize {
        instance_count(self.instances)
    }

    pub fn users(&self) -> usize {
        self.users.unwrap_or(1).max(1) as usize
    }

    pub fn app_type(&self) -> &str {
        self.app_type.as_deref().unwrap_or(DEFAULT_APPLICATION_TYPE)
    }

    pub fn start_time(&self) -> Time {
        Time::from_secs_f64(self.start.unwrap_or(0.0))
    }

    pub fn end_time(&self, scenario_end: Time) -> Time {
        self.end.map(Time::from_secs_f64).unwrap_or(scenario_end)
    }
}
