//! Runtime context guard.
//!
//! Tasks may only be registered once the runtime context (the dispatcher
//! that owns the process-wide execution environment) has been initialized.
//! The scheduler holds a [`RuntimeContext`] handle and queries it on every
//! registration; it never initializes or tears it down itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use tracing::debug;

static GLOBAL_CONTEXT: LazyLock<RuntimeContext> = LazyLock::new(RuntimeContext::new);

#[derive(Debug, Default)]
struct ContextState {
    available: AtomicBool,
}

/// Cheaply cloneable handle to a runtime context.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    state: Arc<ContextState>,
}

impl RuntimeContext {
    /// A context that is not yet initialized.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that is already initialized.
    pub fn initialized() -> Self {
        let ctx = Self::new();
        ctx.initialize();
        ctx
    }

    /// The process-wide context.
    pub fn global() -> &'static RuntimeContext {
        &GLOBAL_CONTEXT
    }

    /// Make the context available to registrations.
    pub fn initialize(&self) {
        if !self.state.available.swap(true, Ordering::SeqCst) {
            debug!("runtime context initialized");
        }
    }

    /// Withdraw the context; later registrations fail.
    pub fn teardown(&self) {
        if self.state.available.swap(false, Ordering::SeqCst) {
            debug!("runtime context torn down");
        }
    }

    /// Whether registrations may proceed.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same context.
    pub fn ptr_eq(
        &self,
        other: &RuntimeContext,
    ) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
