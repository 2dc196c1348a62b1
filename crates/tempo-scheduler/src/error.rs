//! Error types for the scheduler.

use thiserror::Error;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A submission carried a negative delay. The queue is unmodified.
    #[error("{name} can not be negative (got {millis} ms)")]
    NegativeDelay {
        /// Which argument was rejected.
        name: &'static str,
        /// The rejected value.
        millis: i64,
    },
}
