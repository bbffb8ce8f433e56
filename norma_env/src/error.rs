//! Error types for the Norma environment abstraction.

use thiserror::Error;

/// Errors that can occur while waiting on a clock.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The requested deadline cannot be represented by this clock
    #[error("Invalid deadline: {0}")]
    InvalidDeadline(String),
}
