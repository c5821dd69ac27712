//! fiberpool
//!
//! A cooperative scheduler for lightweight tasks over a fixed pool of OS
//! worker threads.
//!
//! # Example
//!
//! ```no_run
//! use fiberpool::{RuntimeContext, Scheduler, SchedulerConfig, TaskBuilder, TaskPriority};
//!
//! let context = RuntimeContext::initialized();
//! let scheduler = Scheduler::new(context, SchedulerConfig::with_workers(2)).unwrap();
//!
//! let handle = scheduler
//!     .register(
//!         || println!("hello from a lightweight task"),
//!         TaskBuilder::new()
//!             .description("greeting")
//!             .priority(TaskPriority::High),
//!     )
//!     .unwrap();
//! handle.join().unwrap();
//! scheduler.shutdown();
//! ```

#![doc(html_root_url = "https://docs.rs/fiberpool")]
#![warn(rust_2018_idioms)]

pub mod runtime;
pub mod util;

pub use runtime::context::RuntimeContext;
pub use runtime::scheduler::{
    DiagnosticsSink, DrainPolicy, InitialState, LockLeakPolicy, Scheduler, SchedulerConfig,
    SchedulerError, SchedulerEvent, SchedulerResult, StackSize, TaskBuilder, TaskHandle, TaskId,
    TaskOutcome, TaskPriority, TaskState, TrackedMutex,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "fiberpool";
