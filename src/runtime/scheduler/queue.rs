//! Scheduling policies.
//!
//! A policy owns every record that has been registered but not yet handed to
//! a worker. Pushes may come from any thread and pops from any worker, so all
//! state sits behind lock-free queues or short critical sections.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use super::error::{SchedulerError, SchedulerResult};
use super::task::{TaskId, TaskPriority, TaskRecord, TaskState};

/// Queuing discipline that decides which record a worker receives next.
pub trait SchedulingPolicy: Send + Sync + std::fmt::Debug {
    /// Enqueue a pending record.
    fn push(
        &self,
        record: TaskRecord,
    ) -> SchedulerResult<()>;

    /// Dequeue the next record for `worker`. Never blocks.
    fn pop(
        &self,
        worker: usize,
    ) -> Option<TaskRecord>;

    /// Hold a suspended record until it is unparked.
    fn park(
        &self,
        record: TaskRecord,
    ) -> SchedulerResult<()>;

    /// Move a parked record to the ready queues.
    fn unpark(
        &self,
        id: TaskId,
    ) -> SchedulerResult<()>;

    /// Number of records ready to be dequeued.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `pop(worker)` could return a record right now.
    fn has_work_for(
        &self,
        _worker: usize,
    ) -> bool {
        !self.is_empty()
    }

    /// Number of parked records.
    fn parked_len(&self) -> usize;

    /// Refuse every later push, park and unpark.
    ///
    /// Once this returns, no submission that was accepted can still be on
    /// its way into the queues, so a following `drain` sees all of them.
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Remove every ready and parked record.
    fn drain(&self) -> Vec<TaskRecord>;
}

/// One FIFO per priority level.
#[derive(Debug, Default)]
struct PriorityQueues {
    levels: [SegQueue<TaskRecord>; TaskPriority::COUNT],
}

impl PriorityQueues {
    fn push(
        &self,
        record: TaskRecord,
    ) {
        self.levels[record.priority().index()].push(record);
    }

    /// Highest priority first, FIFO within a level.
    fn pop(&self) -> Option<TaskRecord> {
        TaskPriority::DESCENDING
            .iter()
            .find_map(|priority| self.levels[priority.index()].pop())
    }

    fn is_empty(&self) -> bool {
        self.levels.iter().all(SegQueue::is_empty)
    }
}

/// Priority queues shared by all workers, plus a private set per worker for
/// records registered with a worker affinity.
#[derive(Debug)]
pub struct StaticQueuePolicy {
    shared: PriorityQueues,
    affine: Vec<PriorityQueues>,
    parked: Mutex<HashMap<TaskId, TaskRecord>>,
    ready: AtomicUsize,
    /// Held shared across check-and-enqueue, exclusively by `close`.
    closed: RwLock<bool>,
    steal_affine: bool,
}

impl StaticQueuePolicy {
    /// Create a policy serving `num_workers` workers.
    pub fn new(
        num_workers: usize,
        steal_affine: bool,
    ) -> Self {
        let num_workers = num_workers.max(1);
        Self {
            shared: PriorityQueues::default(),
            affine: (0..num_workers).map(|_| PriorityQueues::default()).collect(),
            parked: Mutex::new(HashMap::new()),
            ready: AtomicUsize::new(0),
            closed: RwLock::new(false),
            steal_affine,
        }
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.affine.len()
    }

    /// Worker index a 1-based affinity hint routes to. Zero means any.
    #[inline]
    pub fn affine_worker(
        &self,
        affinity: usize,
    ) -> Option<usize> {
        if affinity == 0 {
            None
        } else {
            Some((affinity - 1) % self.num_workers())
        }
    }

    fn enqueue(
        &self,
        record: TaskRecord,
    ) {
        self.ready.fetch_add(1, Ordering::SeqCst);
        match self.affine_worker(record.worker_affinity()) {
            Some(worker) => self.affine[worker].push(record),
            None => self.shared.push(record),
        }
    }

    fn dequeue(
        &self,
        worker: usize,
    ) -> Option<TaskRecord> {
        let n = self.num_workers();
        let own = self.affine.get(worker).and_then(PriorityQueues::pop);
        let record = own.or_else(|| self.shared.pop()).or_else(|| {
            if !self.steal_affine {
                return None;
            }
            (1..=n).find_map(|offset| self.affine[(worker + offset) % n].pop())
        })?;
        self.ready.fetch_sub(1, Ordering::SeqCst);
        Some(record)
    }

    /// Run `submit` unless the policy is closed, keeping `close` out until
    /// it has finished.
    fn while_open<T>(
        &self,
        submit: impl FnOnce() -> SchedulerResult<T>,
    ) -> SchedulerResult<T> {
        let closed = self.closed.read();
        if *closed {
            return Err(SchedulerError::submission("scheduling policy is closed"));
        }
        submit()
    }
}

impl SchedulingPolicy for StaticQueuePolicy {
    fn push(
        &self,
        record: TaskRecord,
    ) -> SchedulerResult<()> {
        self.while_open(|| {
            self.enqueue(record);
            Ok(())
        })
    }

    fn pop(
        &self,
        worker: usize,
    ) -> Option<TaskRecord> {
        self.dequeue(worker)
    }

    fn park(
        &self,
        record: TaskRecord,
    ) -> SchedulerResult<()> {
        self.while_open(|| {
            self.parked.lock().insert(record.id(), record);
            Ok(())
        })
    }

    fn unpark(
        &self,
        id: TaskId,
    ) -> SchedulerResult<()> {
        self.while_open(|| {
            let record = self
                .parked
                .lock()
                .remove(&id)
                .ok_or(SchedulerError::UnknownTask(id))?;
            if !record
                .status()
                .transition(TaskState::Suspended, TaskState::Pending)
            {
                self.parked.lock().insert(id, record);
                return Err(SchedulerError::NotSuspended(id));
            }
            self.enqueue(record);
            Ok(())
        })
    }

    fn len(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    fn parked_len(&self) -> usize {
        self.parked.lock().len()
    }

    fn has_work_for(
        &self,
        worker: usize,
    ) -> bool {
        let own = self.affine.get(worker).is_some_and(|q| !q.is_empty());
        own || !self.shared.is_empty()
            || (self.steal_affine && self.affine.iter().any(|q| !q.is_empty()))
    }

    fn close(&self) {
        *self.closed.write() = true;
    }

    fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    fn drain(&self) -> Vec<TaskRecord> {
        let mut drained = Vec::new();
        for worker in 0..self.num_workers() {
            while let Some(record) = self.dequeue(worker) {
                drained.push(record);
            }
        }
        while let Some(record) = self.shared.pop() {
            self.ready.fetch_sub(1, Ordering::SeqCst);
            drained.push(record);
        }
        drained.extend(self.parked.lock().drain().map(|(_, record)| record));
        drained
    }
}
