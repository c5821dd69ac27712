//! Thread pool driving the dequeue → execute loop.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::config::{DrainPolicy, LockLeakPolicy, SchedulerConfig};
use super::diagnostics::{DiagnosticsSink, SchedulerEvent};
use super::error::{SchedulerError, SchedulerResult};
use super::queue::SchedulingPolicy;
use super::stats::SchedulerStats;
use super::task::{TaskOutcome, TaskRecord};
use super::wrapper::panic_message;

thread_local! {
    static CURRENT_WORKER: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Index of the pool worker running on the current thread, if any.
pub fn current_worker_index() -> Option<usize> {
    CURRENT_WORKER.with(|w| w.get())
}

/// Shutdown flag and idle wake-up shared by the pool and its workers.
#[derive(Debug, Default)]
struct PoolSignal {
    shutdown: AtomicBool,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl PoolSignal {
    #[inline]
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn notify_one(&self) {
        let _guard = self.wake_lock.lock();
        self.wake.notify_one();
    }

    fn notify_all(&self) {
        let _guard = self.wake_lock.lock();
        self.wake.notify_all();
    }
}

/// Everything one worker thread needs.
struct WorkerContext {
    worker: usize,
    pool: String,
    policy: Arc<dyn SchedulingPolicy>,
    sink: Arc<dyn DiagnosticsSink>,
    stats: Arc<SchedulerStats>,
    signal: Arc<PoolSignal>,
    drain_policy: DrainPolicy,
    lock_leak_policy: LockLeakPolicy,
    idle_timeout: Duration,
}

impl WorkerContext {
    /// Worker thread main loop.
    fn run(self) {
        CURRENT_WORKER.with(|w| w.set(Some(self.worker)));
        self.sink.emit(&SchedulerEvent::WorkerStarted {
            pool: self.pool.clone(),
            worker: self.worker,
        });

        let mut executed = 0;
        loop {
            if self.signal.is_shutdown() && self.drain_policy == DrainPolicy::Abandon {
                break;
            }

            if let Some(record) = self.policy.pop(self.worker) {
                if self.execute(record) {
                    executed += 1;
                }
                continue;
            }

            if self.signal.is_shutdown() {
                break;
            }
            self.idle();
        }

        self.sink.emit(&SchedulerEvent::WorkerStopped {
            pool: self.pool.clone(),
            worker: self.worker,
            executed,
        });
        CURRENT_WORKER.with(|w| w.set(None));
    }

    /// Sleep until woken or until the idle timeout elapses.
    ///
    /// Records this worker cannot take (another worker's affinity queue with
    /// stealing off) do not keep it awake.
    fn idle(&self) {
        let mut guard = self.signal.wake_lock.lock();
        if self.signal.is_shutdown() || self.policy.has_work_for(self.worker) {
            return;
        }
        self.signal.wake.wait_for(&mut guard, self.idle_timeout);
    }

    /// Run one record. Returns false if the record was no longer pending.
    fn execute(
        &self,
        record: TaskRecord,
    ) -> bool {
        let task = record.id();
        let status = record.status().clone();

        self.sink.emit(&SchedulerEvent::TaskStarted {
            task,
            worker: self.worker,
        });
        let Some(outcome) = record.run() else {
            return false;
        };

        self.stats.record_outcome(&outcome);
        match &outcome {
            TaskOutcome::LockLeak { held } => {
                self.sink.emit(&SchedulerEvent::LockLeakDetected {
                    task,
                    worker: self.worker,
                    held: *held,
                });
                if self.lock_leak_policy == LockLeakPolicy::Abort {
                    std::process::abort();
                }
            }
            TaskOutcome::Failed { message } => {
                self.sink.emit(&SchedulerEvent::TaskFailed {
                    task,
                    worker: self.worker,
                    message: message.clone(),
                });
            }
            TaskOutcome::Completed | TaskOutcome::Abandoned => {}
        }

        self.sink.emit(&SchedulerEvent::TaskTerminated {
            task,
            worker: self.worker,
            outcome: outcome.clone(),
        });
        status.terminate(outcome);
        true
    }
}

/// A fixed set of worker threads bound to one scheduling policy.
pub struct ThreadPool {
    name: String,
    config: SchedulerConfig,
    policy: Arc<dyn SchedulingPolicy>,
    sink: Arc<dyn DiagnosticsSink>,
    stats: Arc<SchedulerStats>,
    signal: Arc<PoolSignal>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("num_workers", &self.config.num_workers)
            .field("queued", &self.policy.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ThreadPool {
    /// Create the pool, starting its workers unless `config.autostart` is off.
    pub fn new(
        policy: Arc<dyn SchedulingPolicy>,
        config: SchedulerConfig,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> SchedulerResult<Self> {
        let pool = Self {
            name: config.pool_name.clone(),
            policy,
            sink,
            stats: Arc::new(SchedulerStats::default()),
            signal: Arc::new(PoolSignal::default()),
            workers: Mutex::new(Vec::with_capacity(config.num_workers)),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            config,
        };

        pool.sink.emit(&SchedulerEvent::PoolCreated {
            pool: pool.name.clone(),
            workers: pool.config.num_workers,
        });

        if pool.config.autostart {
            pool.start()?;
        }
        Ok(pool)
    }

    /// Spawn the worker threads. Does nothing if they are already running.
    pub fn start(&self) -> SchedulerResult<()> {
        if self.signal.is_shutdown() {
            return Err(SchedulerError::WorkerSpawn {
                reason: format!("pool '{}' has been shut down", self.name),
            });
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let stack_size = self.config.stack_sizes.largest();
        let mut workers = self.workers.lock();
        for worker in 0..self.config.num_workers {
            let ctx = WorkerContext {
                worker,
                pool: self.name.clone(),
                policy: self.policy.clone(),
                sink: self.sink.clone(),
                stats: self.stats.clone(),
                signal: self.signal.clone(),
                drain_policy: self.config.drain_policy,
                lock_leak_policy: self.config.lock_leak_policy,
                idle_timeout: self.config.idle_timeout(),
            };

            let handle = thread::Builder::new()
                .name(format!("{}-worker-{}", self.name, worker))
                .stack_size(stack_size)
                .spawn(move || ctx.run())
                .map_err(|e| SchedulerError::WorkerSpawn {
                    reason: e.to_string(),
                })?;
            workers.push(handle);
        }
        Ok(())
    }

    /// Wake one idle worker.
    pub fn notify(&self) {
        self.signal.notify_one();
    }

    /// Stop the workers, wait for in-flight tasks and abandon what is left.
    ///
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.policy.close();
        self.signal.shutdown.store(true, Ordering::SeqCst);
        self.sink.emit(&SchedulerEvent::ShutdownRequested {
            pool: self.name.clone(),
            drain: self.config.drain_policy,
        });
        self.signal.notify_all();

        let handles = std::mem::take(&mut *self.workers.lock());
        let me = thread::current().id();
        for (worker, handle) in handles.into_iter().enumerate() {
            if handle.thread().id() == me {
                continue;
            }
            if let Err(payload) = handle.join() {
                self.sink.emit(&SchedulerEvent::WorkerPanicked {
                    pool: self.name.clone(),
                    worker,
                    message: panic_message(payload.as_ref()),
                });
            }
        }

        let abandoned = self
            .policy
            .drain()
            .into_iter()
            .map(TaskRecord::abandon)
            .filter(|abandoned| *abandoned)
            .count();
        if abandoned > 0 {
            self.stats.record_abandoned(abandoned);
            self.sink.emit(&SchedulerEvent::TasksAbandoned {
                pool: self.name.clone(),
                count: abandoned,
            });
        }

        self.sink.emit(&SchedulerEvent::PoolStopped {
            pool: self.name.clone(),
        });
    }

    /// Whether the workers are started and no shutdown was requested.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.signal.is_shutdown()
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.signal.is_shutdown()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn policy(&self) -> &Arc<dyn SchedulingPolicy> {
        &self.policy
    }

    #[inline]
    pub fn sink(&self) -> &Arc<dyn DiagnosticsSink> {
        &self.sink
    }

    #[inline]
    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
