//! Scheduler statistics.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use super::task::TaskOutcome;

/// Counters updated by registration and the workers.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Registrations that produced a task.
    pub tasks_registered: AtomicUsize,
    /// Registrations that failed.
    pub tasks_rejected: AtomicUsize,
    /// Tasks a worker ran, whatever the outcome.
    pub tasks_executed: AtomicUsize,
    /// Tasks whose callable panicked.
    pub tasks_failed: AtomicUsize,
    /// Tasks that returned while holding locks.
    pub lock_leaks: AtomicUsize,
    /// Records dropped at shutdown.
    pub tasks_abandoned: AtomicUsize,
}

impl SchedulerStats {
    #[inline]
    pub fn record_registered(&self) {
        self.tasks_registered.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn record_abandoned(
        &self,
        count: usize,
    ) {
        self.tasks_abandoned.fetch_add(count, Ordering::SeqCst);
    }

    /// Record a task a worker finished running.
    pub fn record_outcome(
        &self,
        outcome: &TaskOutcome,
    ) {
        self.tasks_executed.fetch_add(1, Ordering::SeqCst);
        match outcome {
            TaskOutcome::Failed { .. } => {
                self.tasks_failed.fetch_add(1, Ordering::SeqCst);
            }
            TaskOutcome::LockLeak { .. } => {
                self.lock_leaks.fetch_add(1, Ordering::SeqCst);
            }
            TaskOutcome::Completed | TaskOutcome::Abandoned => {}
        }
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_registered: self.tasks_registered.load(Ordering::SeqCst),
            tasks_rejected: self.tasks_rejected.load(Ordering::SeqCst),
            tasks_executed: self.tasks_executed.load(Ordering::SeqCst),
            tasks_failed: self.tasks_failed.load(Ordering::SeqCst),
            lock_leaks: self.lock_leaks.load(Ordering::SeqCst),
            tasks_abandoned: self.tasks_abandoned.load(Ordering::SeqCst),
        }
    }
}

/// Plain copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub tasks_registered: usize,
    pub tasks_rejected: usize,
    pub tasks_executed: usize,
    pub tasks_failed: usize,
    pub lock_leaks: usize,
    pub tasks_abandoned: usize,
}
