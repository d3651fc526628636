//! Error types for the health scheduler.

use thiserror::Error;

/// Lifecycle errors from the health scheduler.
///
/// Probe failures never surface here; they are absorbed into endpoint
/// state transitions.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// Starting with an empty repository is a configuration mistake
    #[error("no endpoints configured")]
    NoEndpoints,

    /// `start` was called on a running scheduler
    #[error("health scheduler already running")]
    AlreadyRunning,
}
