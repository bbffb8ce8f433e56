//! Scenario runner - executes a scenario against a [`SimNetwork`].

use crate::network::{ApplicationReport, SimNetwork, SimNetworkConfig};
use norma_core::executor::EventRecord;
use norma_core::{ControllerConfig, DriverError, Executor, ExecutorError, Network, Scenario};
use norma_env::{Clock, SimClock, Time, WallClock};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Time source driving the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Virtual time, jumps straight to each event. Applications still pace
    /// on wall time, so load is mostly skipped.
    Simulated,
    /// Real time
    Wall,
}

impl std::fmt::Display for ClockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockMode::Simulated => write!(f, "simulated"),
            ClockMode::Wall => write!(f, "wall"),
        }
    }
}

/// Runner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Master seed for accounts and RPC selection
    pub seed: u64,
    pub clock_mode: ClockMode,
    pub controller: ControllerConfig,
    /// Abort the run on Ctrl+C
    pub handle_ctrl_c: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            clock_mode: ClockMode::Wall,
            controller: ControllerConfig::default(),
            handle_ctrl_c: true,
        }
    }
}

impl RunnerConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_clock_mode(mut self, clock_mode: ClockMode) -> Self {
        self.clock_mode = clock_mode;
        self
    }

    pub fn with_controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_ctrl_c(mut self, handle: bool) -> Self {
        self.handle_ctrl_c = handle;
        self
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Scenario run failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Network shutdown failed: {0}")]
    Shutdown(#[source] DriverError),
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub scenario: String,
    pub seed: u64,
    pub clock_mode: ClockMode,

    /// Clock time when the last event was processed
    pub final_time: Time,

    /// Processed events, in order
    pub events: Vec<EventRecord>,

    pub applications: Vec<ApplicationReport>,

    /// Nodes created over the whole run
    pub nodes: usize,

    /// Transactions rejected by the chain
    pub rejected: u64,
}

impl RunReport {
    pub fn total_sent(&self) -> u64 {
        self.applications.iter().map(|a| a.sent).sum()
    }

    pub fn total_received(&self) -> u64 {
        self.applications.iter().map(|a| a.received).sum()
    }
}

/// Runs one scenario on a fresh simulated network.
pub struct ScenarioRunner {
    config: RunnerConfig,
    network: Arc<SimNetwork>,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let network_config = SimNetworkConfig::default()
            .with_seed(config.seed)
            .with_controller(config.controller.clone());
        let network = SimNetwork::new(network_config, WallClock::shared());
        Self { config, network }
    }

    /// The network the scenario will run on, for fault injection.
    pub fn network(&self) -> &Arc<SimNetwork> {
        &self.network
    }

    /// Runs `scenario` to completion, or until Ctrl+C if enabled.
    pub async fn run(self, scenario: &Scenario) -> Result<RunReport, RunnerError> {
        let abort = CancellationToken::new();
        let signal = self.config.handle_ctrl_c.then(|| {
            let abort = abort.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, aborting run");
                    abort.cancel();
                }
            })
        });

        let result = self.run_until(scenario, abort).await;
        if let Some(signal) = signal {
            signal.abort();
        }
        result
    }

    /// Runs `scenario` until it completes or `abort` is cancelled.
    ///
    /// The network is shut down in both cases.
    pub async fn run_until(
        self,
        scenario: &Scenario,
        abort: CancellationToken,
    ) -> Result<RunReport, RunnerError> {
        let clock: Arc<dyn Clock> = match self.config.clock_mode {
            ClockMode::Simulated => SimClock::shared(),
            ClockMode::Wall => WallClock::shared(),
        };
        info!(
            "Running scenario {} (seed={}, clock={})",
            scenario.name, self.config.seed, self.config.clock_mode
        );

        let network: Arc<dyn Network> = self.network.clone();
        let outcome = Executor::run(clock, network.clone(), scenario, abort).await;
        let shutdown = network.shutdown().await;

        let log = match outcome {
            Ok(log) => log,
            Err(e) => {
                if let Err(shutdown_err) = shutdown {
                    warn!("Network shutdown failed after aborted run: {}", shutdown_err);
                }
                return Err(e.into());
            }
        };
        shutdown.map_err(RunnerError::Shutdown)?;

        let report = RunReport {
            run_id: Uuid::new_v4(),
            scenario: scenario.name.clone(),
            seed: self.config.seed,
            clock_mode: self.config.clock_mode,
            final_time: log.final_time,
            events: log.events,
            applications: self.network.application_reports(),
            nodes: self.network.nodes_created(),
            rejected: self.network.chain().rejected(),
        };
        info!(
            "Scenario {} finished at {}: {} sent, {} received, {} nodes",
            report.scenario,
            report.final_time,
            report.total_sent(),
            report.total_received(),
            report.nodes
        );
        Ok(report)
    }
}
