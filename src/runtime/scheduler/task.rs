//! Task definitions for the scheduler.
//!
//! A registered unit of work lives in two halves: the [`TaskRecord`], which
//! owns the callable and travels through the scheduling policy to exactly one
//! worker, and the shared [`TaskStatus`], which the caller observes through a
//! [`TaskHandle`].

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};

/// Description used when a task is registered without one.
pub const UNKNOWN_DESCRIPTION: &str = "<unknown>";

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Sentinel carried by handles of failed registrations.
    pub const INVALID: TaskId = TaskId(0);

    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }

    /// Whether this id names a real task.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl From<TaskId> for usize {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "Task({})", self.0)
        } else {
            write!(f, "Task(invalid)")
        }
    }
}

/// Task lifecycle state.
///
/// `Suspended → Pending → Running → Terminated`, or `Abandoned` when the pool
/// drops a record that was never dequeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Queued and ready to be dequeued.
    Pending,
    /// Registered but parked until resumed.
    Suspended,
    /// Currently executing on a worker.
    Running,
    /// Finished executing.
    Terminated,
    /// Dropped by the pool at shutdown without running.
    Abandoned,
}

impl TaskState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => TaskState::Pending,
            1 => TaskState::Suspended,
            2 => TaskState::Running,
            3 => TaskState::Terminated,
            4 => TaskState::Abandoned,
            _ => TaskState::Pending,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::Suspended => 1,
            TaskState::Running => 2,
            TaskState::Terminated => 3,
            TaskState::Abandoned => 4,
        }
    }

    /// Whether no further transition can happen from this state.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Terminated | TaskState::Abandoned)
    }
}

/// State a task is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    /// Enqueue immediately.
    #[default]
    Pending,
    /// Park until [`Scheduler::resume`](super::Scheduler::resume) is called.
    Suspended,
}

impl From<InitialState> for TaskState {
    fn from(state: InitialState) -> Self {
        match state {
            InitialState::Pending => TaskState::Pending,
            InitialState::Suspended => TaskState::Suspended,
        }
    }
}

/// Task priority levels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Low priority tasks.
    Low = 0,
    /// Normal priority (default).
    #[default]
    Normal = 1,
    /// High priority tasks.
    High = 2,
    /// Critical priority tasks.
    Critical = 3,
}

impl TaskPriority {
    /// Number of priority levels.
    pub const COUNT: usize = 4;

    /// All levels, highest first. This is the dequeue order.
    pub const DESCENDING: [TaskPriority; 4] = [
        TaskPriority::Critical,
        TaskPriority::High,
        TaskPriority::Normal,
        TaskPriority::Low,
    ];

    /// Slot index used by per-priority queue arrays.
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "normal" | "default" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Stack-size class requested for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackSize {
    Small,
    Medium,
    Large,
    Huge,
    /// Whatever the pool is configured to use by default.
    #[default]
    Default,
}

impl StackSize {
    /// All declared classes.
    pub const ALL: [StackSize; 5] = [
        StackSize::Small,
        StackSize::Medium,
        StackSize::Large,
        StackSize::Huge,
        StackSize::Default,
    ];

    /// Parse a class name. Unrecognised names map to [`StackSize::Default`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "small" => StackSize::Small,
            "medium" => StackSize::Medium,
            "large" => StackSize::Large,
            "huge" => StackSize::Huge,
            _ => StackSize::Default,
        }
    }

    /// Lower-case class name.
    pub fn name(&self) -> &'static str {
        match self {
            StackSize::Small => "small",
            StackSize::Medium => "medium",
            StackSize::Large => "large",
            StackSize::Huge => "huge",
            StackSize::Default => "default",
        }
    }
}

/// Concrete byte sizes for each [`StackSize`] class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSizeTable {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
    pub huge: usize,
    pub default: usize,
}

impl Default for StackSizeTable {
    fn default() -> Self {
        Self {
            small: 0x8000,       // 32KB
            medium: 0x20000,     // 128KB
            large: 0x200000,     // 2MB
            huge: 0x2000000,     // 32MB
            default: 0x20000,    // 128KB
        }
    }
}

impl StackSizeTable {
    /// Smallest size ever handed out.
    pub const MIN_STACK_SIZE: usize = 0x4000;

    /// Resolve a class to a byte size. Never fails and never returns zero.
    pub fn resolve(
        &self,
        class: StackSize,
    ) -> usize {
        let size = match class {
            StackSize::Small => self.small,
            StackSize::Medium => self.medium,
            StackSize::Large => self.large,
            StackSize::Huge => self.huge,
            StackSize::Default => self.default,
        };
        if size == 0 {
            self.default.max(Self::MIN_STACK_SIZE)
        } else {
            size
        }
    }

    /// Resolve a class given by name; unknown names use the default size.
    pub fn resolve_name(
        &self,
        name: &str,
    ) -> usize {
        self.resolve(StackSize::from_name(name))
    }

    /// The largest configured size, used for the worker threads themselves.
    pub fn largest(&self) -> usize {
        StackSize::ALL
            .iter()
            .map(|class| self.resolve(*class))
            .max()
            .unwrap_or(Self::MIN_STACK_SIZE)
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The callable returned normally and released every lock.
    Completed,
    /// The callable panicked.
    Failed { message: String },
    /// The callable returned while still holding locks.
    LockLeak { held: usize },
    /// The record was dropped at shutdown and never ran.
    Abandoned,
}

impl TaskOutcome {
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }

    /// The outcome of `task` as a `Result`.
    pub fn into_result(
        self,
        task: TaskId,
    ) -> SchedulerResult<()> {
        match self {
            TaskOutcome::Completed => Ok(()),
            TaskOutcome::Failed { message } => {
                Err(SchedulerError::TaskCallableFailure { task, message })
            }
            TaskOutcome::LockLeak { held } => Err(SchedulerError::LockLeakDetected { task, held }),
            TaskOutcome::Abandoned => Err(SchedulerError::Abandoned(task)),
        }
    }
}

/// Shared, observable status of a task.
#[derive(Debug)]
pub struct TaskStatus {
    id: TaskId,
    description: String,
    priority: TaskPriority,
    worker_affinity: usize,
    stack_size: usize,
    state: AtomicU8,
    outcome: Mutex<Option<TaskOutcome>>,
    done: Condvar,
}

impl TaskStatus {
    pub(crate) fn new(
        id: TaskId,
        description: String,
        priority: TaskPriority,
        worker_affinity: usize,
        stack_size: usize,
        initial: InitialState,
    ) -> Self {
        Self {
            id,
            description,
            priority,
            worker_affinity,
            stack_size,
            state: AtomicU8::new(TaskState::from(initial).as_u8()),
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    #[inline]
    pub fn worker_affinity(&self) -> usize {
        self.worker_affinity
    }

    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`. Returns false if the task was not in `from`.
    pub(crate) fn transition(
        &self,
        from: TaskState,
        to: TaskState,
    ) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// `Running → Terminated`, publishing the outcome and waking waiters.
    pub(crate) fn terminate(
        &self,
        outcome: TaskOutcome,
    ) -> bool {
        let mut slot = self.outcome.lock();
        if !self.transition(TaskState::Running, TaskState::Terminated) {
            return false;
        }
        *slot = Some(outcome);
        self.done.notify_all();
        true
    }

    /// `Pending | Suspended → Abandoned`.
    pub(crate) fn abandon(&self) -> bool {
        let mut slot = self.outcome.lock();
        let abandoned = self.transition(TaskState::Pending, TaskState::Abandoned)
            || self.transition(TaskState::Suspended, TaskState::Abandoned);
        if abandoned {
            *slot = Some(TaskOutcome::Abandoned);
            self.done.notify_all();
        }
        abandoned
    }

    /// The outcome, once the task is terminal.
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.outcome.lock().clone()
    }

    /// Block until the task is terminal.
    pub fn wait(&self) -> TaskOutcome {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.done.wait(&mut slot);
        }
    }

    /// Block until the task is terminal or `timeout` elapses.
    pub fn wait_timeout(
        &self,
        timeout: Duration,
    ) -> Option<TaskOutcome> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return Some(outcome.clone());
            }
            if self.done.wait_until(&mut slot, deadline).timed_out() {
                return slot.clone();
            }
        }
    }
}

/// The callable a worker runs: the user function already wrapped with the
/// post-execution checks.
pub type WrappedFn = Box<dyn FnOnce() -> TaskOutcome + Send + 'static>;

/// An enqueued unit of work. Owned by exactly one queue or worker at a time.
pub struct TaskRecord {
    status: Arc<TaskStatus>,
    callable: WrappedFn,
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.status.id)
            .field("description", &self.status.description)
            .field("state", &self.status.state())
            .field("priority", &self.status.priority)
            .field("worker_affinity", &self.status.worker_affinity)
            .field("stack_size", &self.status.stack_size)
            .finish()
    }
}

impl TaskRecord {
    pub(crate) fn new(
        status: Arc<TaskStatus>,
        callable: WrappedFn,
    ) -> Self {
        Self { status, callable }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.status.id
    }

    #[inline]
    pub fn priority(&self) -> TaskPriority {
        self.status.priority
    }

    #[inline]
    pub fn worker_affinity(&self) -> usize {
        self.status.worker_affinity
    }

    #[inline]
    pub fn status(&self) -> &Arc<TaskStatus> {
        &self.status
    }

    /// Consume the record and run its callable, leaving the task `Running`.
    /// The caller publishes the outcome with [`TaskStatus::terminate`].
    ///
    /// Returns `None` without running anything if the record is not `Pending`.
    pub(crate) fn run(self) -> Option<TaskOutcome> {
        if !self.status.transition(TaskState::Pending, TaskState::Running) {
            return None;
        }
        Some((self.callable)())
    }

    /// Drop the record without running it.
    pub(crate) fn abandon(self) -> bool {
        self.status.abandon()
    }
}

/// Caller-side view of a registered task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    status: Option<Arc<TaskStatus>>,
}

impl TaskHandle {
    /// The handle returned when registration fails.
    pub fn invalid() -> Self {
        Self {
            id: TaskId::INVALID,
            status: None,
        }
    }

    pub(crate) fn new(status: Arc<TaskStatus>) -> Self {
        Self {
            id: status.id,
            status: Some(status),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.status.is_some()
    }

    pub fn state(&self) -> Option<TaskState> {
        self.status.as_ref().map(|s| s.state())
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.status.as_ref().and_then(|s| s.outcome())
    }

    pub fn description(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.description())
    }

    pub fn priority(&self) -> Option<TaskPriority> {
        self.status.as_ref().map(|s| s.priority())
    }

    pub fn stack_size(&self) -> Option<usize> {
        self.status.as_ref().map(|s| s.stack_size())
    }

    /// Block until the task is terminal. `None` for the invalid handle.
    pub fn wait(&self) -> Option<TaskOutcome> {
        self.status.as_ref().map(|s| s.wait())
    }

    /// Block until the task is terminal and convert the outcome to a `Result`.
    pub fn join(&self) -> SchedulerResult<()> {
        match self.wait() {
            Some(outcome) => outcome.into_result(self.id),
            None => Err(SchedulerError::UnknownTask(self.id)),
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(
        &self,
        timeout: Duration,
    ) -> Option<TaskOutcome> {
        self.status.as_ref().and_then(|s| s.wait_timeout(timeout))
    }
}

impl PartialEq for TaskHandle {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskHandle {}

/// Registration options.
#[derive(Debug, Clone, Default)]
pub struct TaskBuilder {
    pub(crate) description: Option<String>,
    pub(crate) initial_state: InitialState,
    pub(crate) priority: TaskPriority,
    pub(crate) worker_affinity: usize,
    pub(crate) stack_size: StackSize,
}

impl TaskBuilder {
    /// Create a new task builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task description.
    #[inline]
    pub fn description(
        mut self,
        description: impl Into<String>,
    ) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the initial state.
    #[inline]
    pub fn initial_state(
        mut self,
        state: InitialState,
    ) -> Self {
        self.initial_state = state;
        self
    }

    /// Shorthand for `initial_state(InitialState::Suspended)`.
    #[inline]
    pub fn suspended(self) -> Self {
        self.initial_state(InitialState::Suspended)
    }

    /// Set the task priority.
    #[inline]
    pub fn priority(
        mut self,
        priority: TaskPriority,
    ) -> Self {
        self.priority = priority;
        self
    }

    /// Prefer worker `worker - 1`. Zero means any worker.
    #[inline]
    pub fn worker_affinity(
        mut self,
        worker: usize,
    ) -> Self {
        self.worker_affinity = worker;
        self
    }

    /// Set the stack-size class.
    #[inline]
    pub fn stack_size(
        mut self,
        class: StackSize,
    ) -> Self {
        self.stack_size = class;
        self
    }

    /// The description the task will be registered with.
    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or(UNKNOWN_DESCRIPTION)
    }
}

/// Hands out task ids. Starts at 1; 0 is reserved for [`TaskId::INVALID`].
#[derive(Debug)]
pub struct TaskIdGenerator {
    next_id: AtomicUsize,
}

impl TaskIdGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
        }
    }

    /// Generate the next task ID.
    #[inline]
    pub fn next_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TaskIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
