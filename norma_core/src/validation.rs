//! Validation Module - Semantic checks of scenario descriptions
//! ============================================================
//!
//! Parsing only guarantees that a scenario is well-formed YAML. Before the
//! executor schedules anything, the scenario is checked for semantic issues:
//! - names (pattern, uniqueness per group kind)
//! - instance and user counts
//! - `[start, end]` windows within the scenario duration
//! - exactly one, well-parameterised traffic shape per application
//! - unique cheat names with a start inside the scenario
//!
//! Numeric comparisons are written so that NaN fails them.
//!
//! Checks are aggregated, not fail-fast: a caller sees every issue at once.
//!
//! Usage:
//! ```ignore
//! let scenario = Scenario::parse_file("scenarios/small.yml")?;
//! if let Err(errors) = scenario.check() {
//!     for issue in errors.issues() {
//!         eprintln!("{issue}");
//!     }
//! }
//! ```

use crate::scenario::{ApplicationGroup, Auto, Cheat, NodeGroup, Ramp, Rate, Scenario, Wave};
use std::collections::HashSet;
use std::fmt;

/// Application types the load side knows how to produce traffic for.
pub const SUPPORTED_APPLICATION_TYPES: &[&str] = &["counter"];

/// Human-readable form of the name pattern, for messages.
const NAME_PATTERN: &str = "^[A-Za-z0-9-]+$";

// =============================================================================
// ERRORS
// =============================================================================

/// All issues found in a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    issues: Vec<String>,
}

impl ValidationErrors {
    /// Returns every issue found, in the order they were detected.
    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.issues.join("\n"))
    }
}

impl std::error::Error for ValidationErrors {}

/// Collects issues while walking a scenario.
#[derive(Default)]
struct Issues(Vec<String>);

impl Issues {
    fn push(&mut self, issue: impl Into<String>) {
        self.0.push(issue.into());
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { issues: self.0 })
        }
    }
}

// =============================================================================
// SCENARIO CHECKS
// =============================================================================

impl Scenario {
    /// Checks semantic constraints of this scenario, reporting all issues.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut issues = Issues::default();

        if self.name.trim().is_empty() {
            issues.push("scenario name must not be empty");
        }
        if !(self.duration > 0.0 && self.duration.is_finite()) {
            issues.push(format!("scenario duration must be > 0, got {}", self.duration));
        }

        let mut names = HashSet::new();
        for node in &self.nodes {
            check_node(node, self.duration, &mut issues);
            if !names.insert(node.name.as_str()) {
                issues.push(format!(
                    "node names must be unique, {} encountered multiple times",
                    node.name
                ));
            }
        }

        let mut names = HashSet::new();
        for app in &self.applications {
            check_application(app, self.duration, &mut issues);
            if !names.insert(app.name.as_str()) {
                issues.push(format!(
                    "application names must be unique, {} encountered multiple times",
                    app.name
                ));
            }
        }

        let mut names = HashSet::new();
        for cheat in &self.cheats {
            check_cheat(cheat, self.duration, &mut issues);
            if !names.insert(cheat.name.as_str()) {
                issues.push(format!(
                    "cheat names must be unique, {} encountered multiple times",
                    cheat.name
                ));
            }
        }

        issues.into_result()
    }
}

fn check_node(node: &NodeGroup, duration: f64, issues: &mut Issues) {
    if !is_valid_name(&node.name) {
        issues.push(format!("node name must match {NAME_PATTERN}, got {:?}", node.name));
    }
    if let Some(instances) = node.instances {
        if instances < 0 {
            issues.push(format!(
                "node {}: number of instances must be >= 0, is {instances}",
                node.name
            ));
        }
    }
    check_time_interval(&node.name, node.start, node.end, duration, issues);
}

fn check_application(app: &ApplicationGroup, duration: f64, issues: &mut Issues) {
    if !is_valid_name(&app.name) {
        issues.push(format!(
            "application name must match {NAME_PATTERN}, got {:?}",
            app.name
        ));
    }
    if !SUPPORTED_APPLICATION_TYPES.contains(&app.app_type()) {
        issues.push(format!(
            "application {}: unknown application type: {}",
            app.name,
            app.app_type()
        ));
    }
    if let Some(instances) = app.instances {
        if instances < 0 {
            issues.push(format!(
                "application {}: number of instances must be >= 0, is {instances}",
                app.name
            ));
        }
    }
    if let Some(users) = app.users {
        if users < 1 {
            issues.push(format!(
                "application {}: number of users must be >= 1, is {users}",
                app.name
            ));
        }
    }
    check_time_interval(&app.name, app.start, app.end, duration, issues);
    check_rate(&app.name, &app.rate, issues);
}

fn check_cheat(cheat: &Cheat, duration: f64, issues: &mut Issues) {
    if !is_valid_name(&cheat.name) {
        issues.push(format!("cheat name must match {NAME_PATTERN}, got {:?}", cheat.name));
    }
    check_time_interval(&cheat.name, cheat.start, None, duration, issues);
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Checks a start/end pair against the scenario duration.
fn check_time_interval(
    group: &str,
    start: Option<f64>,
    end: Option<f64>,
    duration: f64,
    issues: &mut Issues,
) {
    let start = start.unwrap_or(0.0);
    let end = end.unwrap_or(duration);

    if !(start >= 0.0) {
        issues.push(format!("{group}: start time must be >= 0, is {start}"));
    }
    if start > duration {
        issues.push(format!(
            "{group}: start time must be <= scenario duration (={duration}s), is {start}"
        ));
    }
    if !(end >= start) {
        issues.push(format!(
            "{group}: end time must be >= start time, end={end}s, start={start}s"
        ));
    } else if end > duration {
        issues.push(format!(
            "{group}: end time must be <= scenario duration, end={end}s, duration={duration}s"
        ));
    }
}

// =============================================================================
// RATE CHECKS
// =============================================================================

fn check_rate(group: &str, rate: &Rate, issues: &mut Issues) {
    let count = [
        rate.constant.is_some(),
        rate.linear.is_some(),
        rate.slope.is_some(),
        rate.wave.is_some(),
        rate.auto.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    if count != 1 {
        issues.push(format!(
            "{group}: application must specify exactly one load shape, got {count}"
        ));
        return;
    }

    if let Some(constant) = rate.constant {
        if !(constant >= 0.0 && constant.is_finite()) {
            issues.push(format!(
                "{group}: constant transaction rate must be >= 0, got {constant}"
            ));
        }
    }
    if let Some(ramp) = &rate.linear {
        check_ramp(group, ramp, issues);
    }
    if let Some(ramp) = &rate.slope {
        check_ramp(group, ramp, issues);
    }
    if let Some(wave) = &rate.wave {
        check_wave(group, wave, issues);
    }
    if let Some(auto) = &rate.auto {
        check_auto(group, auto, issues);
    }
}

fn check_ramp(group: &str, ramp: &Ramp, issues: &mut Issues) {
    if !(ramp.start >= 0.0 && ramp.start.is_finite()) {
        issues.push(format!(
            "{group}: initial transaction rate must be >= 0, got {}",
            ramp.start
        ));
    }
    if !ramp.increment.is_finite() {
        issues.push(format!(
            "{group}: transaction rate increment must be finite, got {}",
            ramp.increment
        ));
    }
}

fn check_wave(group: &str, wave: &Wave, issues: &mut Issues) {
    let min = wave.min();
    let max = wave.max;

    if !(min >= 0.0) {
        issues.push(format!("{group}: minimum transaction rate must be >= 0, got {min}"));
    }
    if !(max >= 0.0 && max.is_finite()) {
        issues.push(format!("{group}: maximum transaction rate must be >= 0, got {max}"));
    }
    if min > max {
        issues.push(format!(
            "{group}: minimum transaction rate must be <= maximum rate, got {min} > {max}"
        ));
    }
    if !(wave.period > 0.0 && wave.period.is_finite()) {
        issues.push(format!("{group}: wave period must be > 0, got {}", wave.period));
    }
}

fn check_auto(group: &str, auto: &Auto, issues: &mut Issues) {
    if let Some(increase) = auto.increase {
        if !(increase > 0.0 && increase.is_finite()) {
            issues.push(format!(
                "{group}: traffic rate increase per second must be positive, got {increase}"
            ));
        }
    }
    if let Some(decrease) = auto.decrease {
        if !(0.0..=1.0).contains(&decrease) {
            issues.push(format!(
                "{group}: traffic decrease rate must be between 0 and 1, got {decrease}"
            ));
        }
    }
}
