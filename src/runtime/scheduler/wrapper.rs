//! Task execution wrapper.
//!
//! Registration wraps every user callable before it is enqueued, so the
//! post-execution checks travel with the record and cannot be skipped by
//! whichever worker ends up running it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::lock_registry::{clear_held_locks, force_error_on_lock};
use super::task::{TaskOutcome, WrappedFn};

/// Wrap `func` into the callable stored in a task record.
pub fn wrap_nullary<F>(func: F) -> WrappedFn
where
    F: FnOnce() + Send + 'static,
{
    Box::new(move || thread_function_nullary(func))
}

/// Run `func` to completion on the current thread and check that it released
/// every tracked lock it acquired.
///
/// A panic is captured as [`TaskOutcome::Failed`]. Unwinding drops any live
/// guards, so whatever is still registered afterwards is discarded rather
/// than reported.
pub fn thread_function_nullary<F>(func: F) -> TaskOutcome
where
    F: FnOnce(),
{
    match panic::catch_unwind(AssertUnwindSafe(func)) {
        Ok(()) => match force_error_on_lock() {
            Ok(()) => TaskOutcome::Completed,
            Err(held) => {
                clear_held_locks();
                TaskOutcome::LockLeak { held: held.len() }
            }
        },
        Err(payload) => {
            clear_held_locks();
            TaskOutcome::Failed {
                message: panic_message(payload.as_ref()),
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
