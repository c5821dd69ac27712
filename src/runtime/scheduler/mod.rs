//! Cooperative task scheduler.
//!
//! A [`Scheduler`] owns a [`ThreadPool`] of OS worker threads bound to one
//! [`SchedulingPolicy`]. Producers register zero-argument callables as
//! lightweight tasks; workers dequeue and run them to completion, checking
//! after each one that it released every tracked lock.
//!
//! ```text
//! register ─► runtime check ─► build record ─► policy.push
//!                                                  │
//!              handle ◄── terminate ◄── wrapper ◄── worker pop
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lock_registry;
pub mod pool;
pub mod queue;
pub mod stats;
pub mod task;
pub mod wrapper;

#[cfg(test)]
mod tests;

pub use config::{DrainPolicy, LockLeakPolicy, SchedulerConfig};
pub use diagnostics::{DiagnosticsSink, NullSink, RecordingSink, SchedulerEvent, TracingSink};
pub use error::{SchedulerError, SchedulerResult};
pub use lock_registry::{TrackedMutex, TrackedMutexGuard};
pub use pool::{current_worker_index, ThreadPool};
pub use queue::{SchedulingPolicy, StaticQueuePolicy};
pub use stats::{SchedulerStats, StatsSnapshot};
pub use task::{
    InitialState, StackSize, StackSizeTable, TaskBuilder, TaskHandle, TaskId, TaskIdGenerator,
    TaskOutcome, TaskPriority, TaskRecord, TaskState, TaskStatus, UNKNOWN_DESCRIPTION,
};
pub use wrapper::wrap_nullary;

use std::sync::Arc;

use crate::runtime::context::RuntimeContext;

/// Registration front end over a thread pool.
#[derive(Debug)]
pub struct Scheduler {
    context: RuntimeContext,
    pool: ThreadPool,
    ids: TaskIdGenerator,
}

impl Scheduler {
    /// Create a scheduler that reports to `tracing`.
    pub fn new(
        context: RuntimeContext,
        config: SchedulerConfig,
    ) -> SchedulerResult<Self> {
        Self::with_sink(context, config, Arc::new(TracingSink))
    }

    /// Create a scheduler using the default [`StaticQueuePolicy`].
    pub fn with_sink(
        context: RuntimeContext,
        config: SchedulerConfig,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> SchedulerResult<Self> {
        let policy = Arc::new(StaticQueuePolicy::new(
            config.num_workers,
            config.steal_affine,
        ));
        Self::with_policy(context, config, policy, sink)
    }

    /// Create a scheduler over a caller-provided policy.
    pub fn with_policy(
        context: RuntimeContext,
        config: SchedulerConfig,
        policy: Arc<dyn SchedulingPolicy>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> SchedulerResult<Self> {
        config.validate()?;
        let pool = ThreadPool::new(policy, config, sink)?;
        Ok(Self {
            context,
            pool,
            ids: TaskIdGenerator::new(),
        })
    }

    /// Register `func` as a new task.
    ///
    /// Fails with [`SchedulerError::RuntimeUnavailable`] before creating
    /// anything if the runtime context is not initialized, and with
    /// [`SchedulerError::QueueSubmissionFailure`] if the policy refuses the
    /// record. Neither failure is retried.
    pub fn register<F>(
        &self,
        func: F,
        options: TaskBuilder,
    ) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let sink = self.pool.sink();
        let description = options.description_or_default().to_string();
        sink.emit(&SchedulerEvent::RegistrationStarted {
            description: description.clone(),
        });

        if !self.context.is_available() {
            return Err(self.reject(description, SchedulerError::RuntimeUnavailable));
        }
        sink.emit(&SchedulerEvent::RuntimeChecked {
            description: description.clone(),
        });

        if self.pool.policy().is_closed() {
            let err = SchedulerError::submission(format!(
                "pool '{}' is shutting down",
                self.pool.name()
            ));
            return Err(self.reject(description, err));
        }

        let stack_size = self.pool.config().stack_size(options.stack_size);
        let status = Arc::new(TaskStatus::new(
            self.ids.next_id(),
            description.clone(),
            options.priority,
            options.worker_affinity,
            stack_size,
            options.initial_state,
        ));
        let task = status.id();
        let record = TaskRecord::new(status.clone(), wrap_nullary(func));
        sink.emit(&SchedulerEvent::RecordBuilt { task, stack_size });

        let policy = self.pool.policy();
        let submitted = match options.initial_state {
            InitialState::Pending => policy.push(record),
            InitialState::Suspended => policy.park(record),
        };
        if let Err(err) = submitted {
            return Err(self.reject(description, err));
        }

        self.pool.stats().record_registered();
        sink.emit(&SchedulerEvent::RecordSubmitted {
            task,
            state: options.initial_state.into(),
        });
        if options.initial_state == InitialState::Pending {
            self.pool.notify();
        }
        Ok(TaskHandle::new(status))
    }

    /// Register `func` with default options, returning
    /// [`TaskHandle::invalid`] on failure.
    pub fn spawn<F>(
        &self,
        func: F,
    ) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_with(func, TaskBuilder::new())
    }

    /// Register `func`, returning [`TaskHandle::invalid`] on failure.
    pub fn spawn_with<F>(
        &self,
        func: F,
        options: TaskBuilder,
    ) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(func, options)
            .unwrap_or_else(|_| TaskHandle::invalid())
    }

    /// Make a task registered as suspended eligible to run.
    pub fn resume(
        &self,
        handle: &TaskHandle,
    ) -> SchedulerResult<()> {
        match handle.state() {
            None => return Err(SchedulerError::UnknownTask(handle.id())),
            Some(TaskState::Suspended) => {}
            Some(_) => return Err(SchedulerError::NotSuspended(handle.id())),
        }
        self.pool.policy().unpark(handle.id())?;
        self.pool
            .sink()
            .emit(&SchedulerEvent::TaskResumed { task: handle.id() });
        self.pool.notify();
        Ok(())
    }

    fn reject(
        &self,
        description: String,
        error: SchedulerError,
    ) -> SchedulerError {
        self.pool.stats().record_rejected();
        self.pool.sink().emit(&SchedulerEvent::RegistrationFailed {
            description,
            error: error.clone(),
        });
        error
    }

    /// Start the workers of a scheduler created with `autostart = false`.
    pub fn start(&self) -> SchedulerResult<()> {
        self.pool.start()
    }

    /// Stop accepting tasks and wait for the workers to exit.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// Records waiting to be dequeued.
    #[inline]
    pub fn queue_len(&self) -> usize {
        self.pool.policy().len()
    }

    /// Records registered as suspended and not yet resumed.
    #[inline]
    pub fn parked_len(&self) -> usize {
        self.pool.policy().parked_len()
    }

    #[inline]
    pub fn stats(&self) -> StatsSnapshot {
        self.pool.stats().snapshot()
    }

    #[inline]
    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    #[inline]
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        self.pool.config()
    }
}
