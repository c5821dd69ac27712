//! Per-worker held-lock bookkeeping.
//!
//! Every lock acquired through [`TrackedMutex`] is recorded in a thread-local
//! registry and removed again when its guard drops. After a task returns, the
//! execution wrapper checks that the registry of the worker it ran on is
//! empty; anything left over is a leaked lock.
//!
//! Other synchronization primitives can take part by calling
//! [`register_lock`] and [`unregister_lock`] themselves.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

/// Identity of a tracked lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(usize);

static NEXT_LOCK_ID: AtomicUsize = AtomicUsize::new(1);

impl LockId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        LockId(NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

/// Locks held by the current thread, in acquisition order.
pub type HeldLocks = SmallVec<[LockId; 4]>;

thread_local! {
    static HELD_LOCKS: RefCell<HeldLocks> = RefCell::new(SmallVec::new());
}

/// Record that the current thread acquired `id`.
pub fn register_lock(id: LockId) {
    HELD_LOCKS.with(|held| held.borrow_mut().push(id));
}

/// Record that the current thread released `id`.
///
/// Returns false if the lock was not registered on this thread.
pub fn unregister_lock(id: LockId) -> bool {
    HELD_LOCKS.with(|held| {
        let mut held = held.borrow_mut();
        match held.iter().rposition(|h| *h == id) {
            Some(pos) => {
                held.remove(pos);
                true
            }
            None => false,
        }
    })
}

/// Number of locks the current thread holds.
pub fn held_lock_count() -> usize {
    HELD_LOCKS.with(|held| held.borrow().len())
}

/// Snapshot of the locks the current thread holds.
pub fn held_locks() -> HeldLocks {
    HELD_LOCKS.with(|held| held.borrow().clone())
}

/// Forget every lock registered on the current thread, returning them.
pub fn clear_held_locks() -> HeldLocks {
    HELD_LOCKS.with(|held| std::mem::take(&mut *held.borrow_mut()))
}

/// Fails with the held locks if the current thread still holds any.
pub fn force_error_on_lock() -> Result<(), HeldLocks> {
    let held = held_locks();
    if held.is_empty() {
        Ok(())
    } else {
        Err(held)
    }
}

/// A `parking_lot::Mutex` whose guards are tracked in the held-lock registry.
#[derive(Debug)]
pub struct TrackedMutex<T> {
    id: LockId,
    inner: Mutex<T>,
}

impl<T> TrackedMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: LockId::next(),
            inner: Mutex::new(value),
        }
    }

    #[inline]
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire the lock, registering it on the current thread.
    pub fn lock(&self) -> TrackedMutexGuard<'_, T> {
        let guard = self.inner.lock();
        register_lock(self.id);
        TrackedMutexGuard { id: self.id, guard }
    }

    /// Acquire the lock if it is free.
    pub fn try_lock(&self) -> Option<TrackedMutexGuard<'_, T>> {
        let guard = self.inner.try_lock()?;
        register_lock(self.id);
        Some(TrackedMutexGuard { id: self.id, guard })
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for TrackedMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Guard for [`TrackedMutex`]. Unregisters the lock when dropped.
pub struct TrackedMutexGuard<'a, T> {
    id: LockId,
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for TrackedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for TrackedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<T> Drop for TrackedMutexGuard<'_, T> {
    fn drop(&mut self) {
        unregister_lock(self.id);
    }
}
