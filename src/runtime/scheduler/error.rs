//! Scheduler errors.

use super::task::TaskId;
use crate::util::config::ConfigError;

/// Errors surfaced by registration, the scheduling policy and task execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The runtime context was not initialized when a task was registered.
    #[error("global runtime context is not accessible")]
    RuntimeUnavailable,

    /// The scheduling policy refused the record.
    #[error("queue submission failed: {reason}")]
    QueueSubmissionFailure { reason: String },

    /// A task returned while still holding tracked locks.
    #[error("{task} completed while holding {held} lock(s)")]
    LockLeakDetected { task: TaskId, held: usize },

    /// The task's callable panicked.
    #[error("{task} failed: {message}")]
    TaskCallableFailure { task: TaskId, message: String },

    /// The record was dropped at shutdown without running.
    #[error("{0} was abandoned before it ran")]
    Abandoned(TaskId),

    /// The scheduler configuration was rejected.
    #[error("invalid scheduler configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {reason}")]
    WorkerSpawn { reason: String },

    /// No suspended record with this id is known to the pool.
    #[error("{0} is not known to this scheduler")]
    UnknownTask(TaskId),

    /// The task exists but is not suspended.
    #[error("{0} is not suspended")]
    NotSuspended(TaskId),
}

impl SchedulerError {
    /// Shorthand for a [`SchedulerError::QueueSubmissionFailure`].
    pub fn submission(reason: impl Into<String>) -> Self {
        SchedulerError::QueueSubmissionFailure {
            reason: reason.into(),
        }
    }

    /// Whether the caller can reasonably try the same call again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulerError::RuntimeUnavailable)
    }
}

impl From<ConfigError> for SchedulerError {
    fn from(err: ConfigError) -> Self {
        SchedulerError::InvalidConfig {
            reason: err.to_string(),
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
