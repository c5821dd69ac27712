//! Scheduler configuration.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::task::{StackSize, StackSizeTable};
use crate::util::config::ConfigError;

/// What happens to records still queued when the pool shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Stop dequeuing at once and abandon whatever is left.
    #[default]
    Abandon,
    /// Keep dequeuing until the ready queues are empty.
    Drain,
}

impl std::str::FromStr for DrainPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abandon" => Ok(DrainPolicy::Abandon),
            "drain" => Ok(DrainPolicy::Drain),
            other => Err(format!("unknown drain policy '{}'", other)),
        }
    }
}

/// How a leaked lock is escalated once it has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockLeakPolicy {
    /// Record it in the task's outcome and keep the worker running.
    #[default]
    Report,
    /// Abort the process.
    Abort,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name of the pool, used for worker thread names.
    pub pool_name: String,
    /// Number of worker threads.
    pub num_workers: usize,
    /// How long an idle worker sleeps before polling again.
    pub idle_timeout_ms: u64,
    /// Shutdown behaviour for queued records.
    pub drain_policy: DrainPolicy,
    /// Escalation for leaked locks.
    pub lock_leak_policy: LockLeakPolicy,
    /// Whether idle workers take affinity-routed records of other workers.
    pub steal_affine: bool,
    /// Start the workers on construction.
    pub autostart: bool,
    /// Byte sizes of the stack-size classes.
    pub stack_sizes: StackSizeTable,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let num_cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            pool_name: "custom-pool".to_string(),
            num_workers: num_cpus,
            idle_timeout_ms: 1,
            drain_policy: DrainPolicy::default(),
            lock_leak_policy: LockLeakPolicy::default(),
            steal_affine: true,
            autostart: true,
            stack_sizes: StackSizeTable::default(),
        }
    }
}

impl SchedulerConfig {
    /// Default configuration with `num_workers` workers.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Resolve a stack-size class against this configuration.
    #[inline]
    pub fn stack_size(
        &self,
        class: StackSize,
    ) -> usize {
        self.stack_sizes.resolve(class)
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::Invalid(
                "num_workers must be at least 1".to_string(),
            ));
        }
        if self.pool_name.trim().is_empty() {
            return Err(ConfigError::Invalid("pool_name must not be empty".to_string()));
        }
        let table = &self.stack_sizes;
        for (name, size) in [
            ("small", table.small),
            ("medium", table.medium),
            ("large", table.large),
            ("huge", table.huge),
            ("default", table.default),
        ] {
            if size == 0 {
                return Err(ConfigError::Invalid(format!(
                    "stack size for class '{}' must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}
