//! Diagnostics sink.
//!
//! The scheduler reports each lifecycle milestone as one [`SchedulerEvent`]
//! through [`DiagnosticsSink::emit`]. Sinks only observe; nothing they do
//! feeds back into scheduling.

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::config::DrainPolicy;
use super::error::SchedulerError;
use super::task::{TaskId, TaskOutcome, TaskState};

/// A structured scheduler milestone.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    PoolCreated { pool: String, workers: usize },
    WorkerStarted { pool: String, worker: usize },
    WorkerStopped { pool: String, worker: usize, executed: usize },
    /// A worker thread died outside any task, e.g. inside a sink.
    WorkerPanicked { pool: String, worker: usize, message: String },
    RegistrationStarted { description: String },
    RuntimeChecked { description: String },
    RecordBuilt { task: TaskId, stack_size: usize },
    RecordSubmitted { task: TaskId, state: TaskState },
    RegistrationFailed { description: String, error: SchedulerError },
    TaskResumed { task: TaskId },
    TaskStarted { task: TaskId, worker: usize },
    TaskTerminated { task: TaskId, worker: usize, outcome: TaskOutcome },
    LockLeakDetected { task: TaskId, worker: usize, held: usize },
    TaskFailed { task: TaskId, worker: usize, message: String },
    ShutdownRequested { pool: String, drain: DrainPolicy },
    TasksAbandoned { pool: String, count: usize },
    PoolStopped { pool: String },
}

impl SchedulerEvent {
    /// Short stable name, handy for filtering.
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::PoolCreated { .. } => "pool_created",
            SchedulerEvent::WorkerStarted { .. } => "worker_started",
            SchedulerEvent::WorkerStopped { .. } => "worker_stopped",
            SchedulerEvent::WorkerPanicked { .. } => "worker_panicked",
            SchedulerEvent::RegistrationStarted { .. } => "registration_started",
            SchedulerEvent::RuntimeChecked { .. } => "runtime_checked",
            SchedulerEvent::RecordBuilt { .. } => "record_built",
            SchedulerEvent::RecordSubmitted { .. } => "record_submitted",
            SchedulerEvent::RegistrationFailed { .. } => "registration_failed",
            SchedulerEvent::TaskResumed { .. } => "task_resumed",
            SchedulerEvent::TaskStarted { .. } => "task_started",
            SchedulerEvent::TaskTerminated { .. } => "task_terminated",
            SchedulerEvent::LockLeakDetected { .. } => "lock_leak_detected",
            SchedulerEvent::TaskFailed { .. } => "task_failed",
            SchedulerEvent::ShutdownRequested { .. } => "shutdown_requested",
            SchedulerEvent::TasksAbandoned { .. } => "tasks_abandoned",
            SchedulerEvent::PoolStopped { .. } => "pool_stopped",
        }
    }
}

/// Receiver of scheduler events.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(
        &self,
        event: &SchedulerEvent,
    );
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(
        &self,
        event: &SchedulerEvent,
    ) {
        match event {
            SchedulerEvent::PoolCreated { pool, workers } => {
                info!(pool = %pool, workers, "creating custom scheduler");
            }
            SchedulerEvent::WorkerStarted { pool, worker } => {
                debug!(pool = %pool, worker, "worker started");
            }
            SchedulerEvent::WorkerStopped {
                pool,
                worker,
                executed,
            } => {
                debug!(pool = %pool, worker, executed, "worker stopped");
            }
            SchedulerEvent::WorkerPanicked {
                pool,
                worker,
                message,
            } => {
                error!(pool = %pool, worker, message = %message, "worker thread panicked");
            }
            SchedulerEvent::RegistrationStarted { description } => {
                debug!(description = %description, "registering task");
            }
            SchedulerEvent::RuntimeChecked { description } => {
                debug!(description = %description, "runtime context available");
            }
            SchedulerEvent::RecordBuilt { task, stack_size } => {
                debug!(task = %task, stack_size, "task record built");
            }
            SchedulerEvent::RecordSubmitted { task, state } => {
                debug!(task = %task, state = ?state, "task record submitted");
            }
            SchedulerEvent::RegistrationFailed { description, error } => {
                warn!(description = %description, error = %error, "task registration failed");
            }
            SchedulerEvent::TaskResumed { task } => {
                debug!(task = %task, "task resumed");
            }
            SchedulerEvent::TaskStarted { task, worker } => {
                debug!(task = %task, worker, "task started");
            }
            SchedulerEvent::TaskTerminated {
                task,
                worker,
                outcome,
            } => {
                debug!(task = %task, worker, outcome = ?outcome, "task terminated");
            }
            SchedulerEvent::LockLeakDetected { task, worker, held } => {
                error!(task = %task, worker, held, "task completed while holding locks");
            }
            SchedulerEvent::TaskFailed {
                task,
                worker,
                message,
            } => {
                warn!(task = %task, worker, message = %message, "task panicked");
            }
            SchedulerEvent::ShutdownRequested { pool, drain } => {
                info!(pool = %pool, drain = ?drain, "shutdown requested");
            }
            SchedulerEvent::TasksAbandoned { pool, count } => {
                warn!(pool = %pool, count, "abandoned undequeued tasks");
            }
            SchedulerEvent::PoolStopped { pool } => {
                info!(pool = %pool, "pool stopped");
            }
        }
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn emit(
        &self,
        _event: &SchedulerEvent,
    ) {
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events with the given [`SchedulerEvent::name`].
    pub fn count(
        &self,
        name: &str,
    ) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(
        &self,
        event: &SchedulerEvent,
    ) {
        self.events.lock().push(event.clone());
    }
}
