//! Built-in scenarios, addressable by name.

use norma_core::scenario::ScenarioError;
use norma_core::Scenario;

/// Built-in scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinScenario {
    /// One validator, steady load
    Smoke,

    /// Two load groups ramping up, by time and by emitted seconds
    Ramp,

    /// Sinusoidal load against a small validator set
    Wave,

    /// Backlog-driven adaptive load
    Adaptive,

    /// Nodes joining and leaving under constant load
    Churn,
}

const SMOKE: &str = r#"
name: smoke
duration: 10
nodes:
  - name: validator
    validator: true
applications:
  - name: counter
    users: 2
    rate:
      constant: 5
"#;

const RAMP: &str = r#"
name: ramp
duration: 60
nodes:
  - name: validator
    instances: 2
    validator: true
applications:
  - name: slope
    users: 4
    rate:
      slope: { start: 0, increment: 1 }
  - name: linear
    users: 4
    start: 10
    end: 50
    rate:
      linear: { start: 5, increment: 2 }
"#;

const WAVE: &str = r#"
name: wave
duration: 120
nodes:
  - name: validator
    instances: 3
    validator: true
applications:
  - name: wave
    users: 8
    rate:
      wave: { min: 10, max: 60, period: 30 }
"#;

const ADAPTIVE: &str = r#"
name: adaptive
duration: 60
nodes:
  - name: validator
    instances: 2
    validator: true
applications:
  - name: auto
    users: 4
    rate:
      auto: { increase: 2, decrease: 0.25 }
"#;

const CHURN: &str = r#"
name: churn
duration: 90
nodes:
  - name: validator
    instances: 2
    validator: true
  - name: observer
    instances: 3
    start: 10
    end: 40
  - name: late
    start: 50
applications:
  - name: counter
    users: 4
    rate:
      constant: 20
"#;

impl BuiltinScenario {
    /// Returns a list of all built-in scenarios.
    pub fn all() -> Vec<BuiltinScenario> {
        vec![
            BuiltinScenario::Smoke,
            BuiltinScenario::Ramp,
            BuiltinScenario::Wave,
            BuiltinScenario::Adaptive,
            BuiltinScenario::Churn,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinScenario::Smoke => "smoke",
            BuiltinScenario::Ramp => "ramp",
            BuiltinScenario::Wave => "wave",
            BuiltinScenario::Adaptive => "adaptive",
            BuiltinScenario::Churn => "churn",
        }
    }

    /// Returns a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            BuiltinScenario::Smoke => "One validator under 5 Tx/s for 10s",
            BuiltinScenario::Ramp => "Time-indexed and event-counted ramps side by side",
            BuiltinScenario::Wave => "10-60 Tx/s sinusoid with a 30s period",
            BuiltinScenario::Adaptive => "AIMD load that backs off when the chain falls behind",
            BuiltinScenario::Churn => "Observers join and leave while load stays constant",
        }
    }

    /// Returns the YAML description.
    pub fn yaml(&self) -> &'static str {
        match self {
            BuiltinScenario::Smoke => SMOKE,
            BuiltinScenario::Ramp => RAMP,
            BuiltinScenario::Wave => WAVE,
            BuiltinScenario::Adaptive => ADAPTIVE,
            BuiltinScenario::Churn => CHURN,
        }
    }

    pub fn scenario(&self) -> Result<Scenario, ScenarioError> {
        Scenario::parse_str(self.yaml())
    }
}

impl std::fmt::Display for BuiltinScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for BuiltinScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinScenario::all()
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown scenario: {}", s))
    }
}
