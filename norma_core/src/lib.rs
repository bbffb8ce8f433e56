//! Norma Core - Time-and-Rate Control for Scenario Runs
//!
//! This library turns a declarative scenario into a timed run against a
//! network under test:
//! 1. **Scheduling**: a discrete-event executor drives node and application
//!    lifecycles on a pluggable [`Clock`](norma_env::Clock)
//! 2. **Shaping**: traffic profiles (constant, ramps, waves, AIMD) decide when
//!    the next transaction is due
//! 3. **Load control**: a bounded worker pool turns those decisions into
//!    submitted transactions under backpressure

pub mod application;
pub mod controller;
pub mod driver;
pub mod executor;
pub mod load;
pub mod metrics;
pub mod scenario;
pub mod shaper;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use application::ManagedApplication;
pub use controller::{AppController, ControllerConfig};
pub use driver::{
    Application, ApplicationConfig, DriverError, Network, Node, NodeConfig, RpcClient, Transaction,
};
pub use executor::{
    Action, Event, EventQueue, Executor, ExecutorError, LifecycleError, Phase, RunLog,
};
pub use load::{LoadApplication, LoadError, LoadInfoSource, TransactionGenerator};
pub use metrics::{ControllerStats, SentCounters, StatsSnapshot};
pub use scenario::{ApplicationGroup, Cheat, NodeGroup, Rate, Scenario, ScenarioError};
pub use shaper::Shaper;
pub use validation::ValidationErrors;
