//! Scheduler behaviour through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fiberpool::{
    RuntimeContext, Scheduler, SchedulerConfig, SchedulerError, StackSize, TaskBuilder,
    TaskOutcome, TaskPriority, TaskState, TrackedMutex,
};

fn paused(workers: usize) -> SchedulerConfig {
    SchedulerConfig {
        autostart: false,
        ..SchedulerConfig::with_workers(workers)
    }
}

#[test]
fn test_register_and_join() {
    let scheduler = Scheduler::new(RuntimeContext::initialized(), SchedulerConfig::with_workers(2)).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let handle = {
        let hits = hits.clone();
        scheduler
            .register(
                move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                },
                TaskBuilder::new()
                    .description("count")
                    .priority(TaskPriority::Critical)
                    .stack_size(StackSize::Small),
            )
            .unwrap()
    };

    handle.join().unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), Some(TaskState::Terminated));
    assert_eq!(handle.description(), Some("count"));
    assert_eq!(handle.stack_size(), Some(0x8000));
    scheduler.shutdown();
}

#[test]
fn test_uninitialized_runtime_rejects() {
    let context = RuntimeContext::new();
    let scheduler = Scheduler::new(context.clone(), paused(1)).unwrap();

    assert_eq!(
        scheduler.register(|| {}, TaskBuilder::new()).unwrap_err(),
        SchedulerError::RuntimeUnavailable
    );
    assert!(!scheduler.spawn(|| {}).is_valid());

    context.initialize();
    assert!(scheduler.spawn(|| {}).is_valid());

    context.teardown();
    assert!(!scheduler.spawn(|| {}).is_valid());
    assert_eq!(scheduler.queue_len(), 1);
}

#[test]
fn test_global_context_is_shared() {
    let global = RuntimeContext::global();
    global.initialize();
    assert!(global.ptr_eq(RuntimeContext::global()));
    assert!(RuntimeContext::global().is_available());
}

#[test]
fn test_mixed_priorities_single_worker() {
    let scheduler = Scheduler::new(RuntimeContext::initialized(), paused(1)).unwrap();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let plan = [
        TaskPriority::Low,
        TaskPriority::Critical,
        TaskPriority::Normal,
        TaskPriority::High,
        TaskPriority::Normal,
    ];
    let handles: Vec<_> = plan
        .iter()
        .enumerate()
        .map(|(tag, priority)| {
            let order = order.clone();
            scheduler
                .register(
                    move || order.lock().push(tag),
                    TaskBuilder::new().priority(*priority),
                )
                .unwrap()
        })
        .collect();

    scheduler.start().unwrap();
    for handle in &handles {
        handle.join().unwrap();
    }
    assert_eq!(*order.lock(), vec![1, 3, 2, 4, 0]);
}

#[test]
fn test_failures_are_isolated() {
    let scheduler = Scheduler::new(RuntimeContext::initialized(), SchedulerConfig::with_workers(2)).unwrap();
    let shared = Arc::new(TrackedMutex::new(Vec::<u32>::new()));

    let panics = scheduler.spawn(|| panic!("task exploded"));
    let leaks = {
        let shared = shared.clone();
        scheduler.spawn(move || std::mem::forget(shared.lock()))
    };
    let fine = {
        let shared = shared.clone();
        scheduler.spawn(move || {
            if let Some(mut guard) = shared.try_lock() {
                guard.push(1);
            }
        })
    };

    assert!(matches!(
        panics.join(),
        Err(SchedulerError::TaskCallableFailure { .. })
    ));
    assert_eq!(
        leaks.wait_timeout(Duration::from_secs(10)),
        Some(TaskOutcome::LockLeak { held: 1 })
    );
    assert_eq!(fine.join(), Ok(()));

    let stats = scheduler.stats();
    assert_eq!(stats.tasks_executed, 3);
    assert_eq!(stats.tasks_failed, 1);
    assert_eq!(stats.lock_leaks, 1);
}

#[test]
fn test_suspend_resume_then_shutdown() {
    let scheduler = Scheduler::new(RuntimeContext::initialized(), SchedulerConfig::with_workers(1)).unwrap();

    let resumed = scheduler.spawn_with(|| {}, TaskBuilder::new().suspended());
    let forgotten = scheduler.spawn_with(|| {}, TaskBuilder::new().suspended());
    assert_eq!(scheduler.parked_len(), 2);

    scheduler.resume(&resumed).unwrap();
    resumed.join().unwrap();

    scheduler.shutdown();
    assert_eq!(forgotten.outcome(), Some(TaskOutcome::Abandoned));
    assert_eq!(scheduler.stats().tasks_abandoned, 1);
}
