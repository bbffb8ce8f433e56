//! Norma simulated network and scenario runner.
//!
//! Runs scenarios end to end without a real chain:
//! - **Chain**: in-memory ledger checking Ed25519 signatures and nonces
//! - **Network**: nodes, RPC endpoints and applications, with fault injection
//! - **Accounts**: signing keys derived from a single 64-bit seed
//!
//! # Usage
//!
//! ```ignore
//! use norma_sim::{BuiltinScenario, RunnerConfig, ScenarioRunner};
//!
//! let scenario = BuiltinScenario::Smoke.scenario()?;
//! let report = ScenarioRunner::new(RunnerConfig::default()).run(&scenario).await?;
//! println!("{} transactions sent", report.total_sent());
//! ```

mod accounts;
mod application;
mod chain;
mod exporter;
pub mod network;
pub mod runner;
pub mod scenarios;

pub use accounts::{Account, DeterministicAccounts};
pub use application::{CounterApplication, CounterGenerator};
pub use chain::{ChainError, SimChain};
pub use network::{
    ApplicationReport, NetworkCall, SimNetwork, SimNetworkConfig, SimNetworkController, SimNode,
    SimRpcClient,
};
pub use runner::{ClockMode, RunReport, RunnerConfig, RunnerError, ScenarioRunner};
pub use scenarios::BuiltinScenario;
