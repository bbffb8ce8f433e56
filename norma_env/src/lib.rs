//! Norma Environment Abstraction Layer
//!
//! This crate provides the notion of time used by scenario runs, so that the
//! executor and the load controllers can run both against a **simulated**
//! clock (deterministic, instantaneous) and against the **wall** clock
//! (real evaluations).
//!
//! # Core Concept: Scenario Time
//!
//! Every run starts at `t = 0`. A [`Clock`] defines how time progresses from
//! there:
//! - `SimClock`: time only moves when somebody sleeps on it
//! - `WallClock`: time follows the (tokio) system clock
//!
//! # Example
//!
//! ```ignore
//! use norma_env::{Clock, SimClock, Time};
//!
//! async fn wait_for_start<C: Clock>(clock: &C) {
//!     clock.sleep_until(Time::from_secs(3)).await.unwrap();
//!     assert!(clock.now() >= Time::from_secs(3));
//! }
//! ```

mod clock;
mod error;
mod sim_clock;
mod time;
mod wall_clock;

pub use clock::Clock;
pub use error::EnvError;
pub use sim_clock::SimClock;
pub use time::Time;
pub use wall_clock::WallClock;
