//! Scheduler 单元测试
//!
//! 测试任务状态、优先级、栈大小解析、配置和锁登记


use std::sync::Arc;

use crate::runtime::scheduler::{
    wrap_nullary, InitialState, SchedulerConfig, StackSize, StackSizeTable, TaskId,
    TaskPriority, TaskRecord, TaskState, TaskStatus,
};

/// Config with `workers` workers that does not start them on construction.
pub(super) fn paused_config(workers: usize) -> SchedulerConfig {
    SchedulerConfig {
        autostart: false,
        ..SchedulerConfig::with_workers(workers)
    }
}

/// A pending record that does nothing when run.
pub(super) fn record(
    id: usize,
    priority: TaskPriority,
    affinity: usize,
) -> TaskRecord {
    let status = Arc::new(TaskStatus::new(
        TaskId(id),
        format!("t{}", id),
        priority,
        affinity,
        StackSizeTable::default().resolve(StackSize::Default),
        InitialState::Pending,
    ));
    TaskRecord::new(status, wrap_nullary(|| {}))
}

#[cfg(test)]
mod task_id_tests {
    use super::*;

    #[test]
    fn test_task_id_invalid_sentinel() {
        assert!(!TaskId::INVALID.is_valid());
        assert!(TaskId(1).is_valid());
        assert_eq!(TaskId::INVALID.inner(), 0);
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(7).to_string(), "Task(7)");
        assert_eq!(TaskId::INVALID.to_string(), "Task(invalid)");
    }

    #[test]
    fn test_task_id_generator_skips_invalid() {
        let ids = crate::runtime::scheduler::TaskIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_eq!(first, TaskId(1));
        assert_eq!(second, TaskId(2));
    }
}

#[cfg(test)]
mod task_state_tests {
    use super::*;

    #[test]
    fn test_task_state_u8_roundtrip() {
        for state in [
            TaskState::Pending,
            TaskState::Suspended,
            TaskState::Running,
            TaskState::Terminated,
            TaskState::Abandoned,
        ] {
            assert_eq!(TaskState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_task_state_terminal() {
        assert!(TaskState::Terminated.is_terminal());
        assert!(TaskState::Abandoned.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn test_status_refuses_skipped_transition() {
        let rec = record(1, TaskPriority::Normal, 0);
        let status = rec.status().clone();

        // Pending cannot jump straight to Terminated.
        assert!(!status.terminate(crate::runtime::scheduler::TaskOutcome::Completed));
        assert_eq!(status.state(), TaskState::Pending);
        assert!(status.outcome().is_none());
    }

    #[test]
    fn test_record_runs_once_and_terminates() {
        let rec = record(1, TaskPriority::Normal, 0);
        let status = rec.status().clone();

        let outcome = rec.run().unwrap();
        assert!(outcome.is_completed());
        assert_eq!(status.state(), TaskState::Running);

        assert!(status.terminate(outcome));
        assert_eq!(status.state(), TaskState::Terminated);
        assert!(!status.abandon());
        assert_eq!(status.state(), TaskState::Terminated);
    }

    #[test]
    fn test_abandon_pending_record() {
        let rec = record(1, TaskPriority::Normal, 0);
        let status = rec.status().clone();
        assert!(rec.abandon());
        assert_eq!(status.state(), TaskState::Abandoned);
        assert_eq!(
            status.outcome(),
            Some(crate::runtime::scheduler::TaskOutcome::Abandoned)
        );
    }
}

#[cfg(test)]
mod task_priority_tests {
    use super::*;

    #[test]
    fn test_task_priority_values() {
        assert_eq!(TaskPriority::Low as u8, 0);
        assert_eq!(TaskPriority::Normal as u8, 1);
        assert_eq!(TaskPriority::High as u8, 2);
        assert_eq!(TaskPriority::Critical as u8, 3);
    }

    #[test]
    fn test_task_priority_ord() {
        assert!(TaskPriority::Low < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Critical);
    }

    #[test]
    fn test_task_priority_descending_covers_all() {
        let mut indices: Vec<usize> = TaskPriority::DESCENDING.iter().map(|p| p.index()).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(TaskPriority::DESCENDING[0], TaskPriority::Critical);
    }

    #[test]
    fn test_task_priority_from_str() {
        assert_eq!("HIGH".parse::<TaskPriority>(), Ok(TaskPriority::High));
        assert_eq!("default".parse::<TaskPriority>(), Ok(TaskPriority::Normal));
        assert!("urgent".parse::<TaskPriority>().is_err());
    }
}

#[cfg(test)]
mod stack_size_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_every_class_is_positive() {
        let table = StackSizeTable::default();
        for class in StackSize::ALL {
            assert!(table.resolve(class) > 0, "{:?}", class);
        }
    }

    #[test]
    fn test_default_table_values() {
        let table = StackSizeTable::default();
        assert_eq!(table.resolve(StackSize::Small), 0x8000);
        assert_eq!(table.resolve(StackSize::Medium), 0x20000);
        assert_eq!(table.resolve(StackSize::Large), 0x200000);
        assert_eq!(table.resolve(StackSize::Huge), 0x2000000);
        assert_eq!(table.largest(), 0x2000000);
    }

    #[test]
    fn test_unknown_name_uses_default() {
        let table = StackSizeTable::default();
        assert_eq!(StackSize::from_name("gigantic"), StackSize::Default);
        assert_eq!(table.resolve_name("gigantic"), table.default);
        assert_eq!(table.resolve_name(" Large "), table.large);
    }

    #[test]
    fn test_zero_entry_falls_back() {
        let table = StackSizeTable {
            small: 0,
            ..StackSizeTable::default()
        };
        assert_eq!(table.resolve(StackSize::Small), table.default);

        let empty = StackSizeTable {
            small: 0,
            medium: 0,
            large: 0,
            huge: 0,
            default: 0,
        };
        assert_eq!(
            empty.resolve(StackSize::Small),
            StackSizeTable::MIN_STACK_SIZE
        );
    }

    proptest! {
        #[test]
        fn prop_resolve_name_is_total(name in ".{0,16}") {
            let table = StackSizeTable::default();
            let size = table.resolve_name(&name);
            prop_assert!(size > 0);
            let class = StackSize::from_name(&name);
            if class == StackSize::Default {
                prop_assert_eq!(size, table.default);
            }
        }
    }
}

#[cfg(test)]
mod scheduler_config_tests {
    use super::*;
    use crate::runtime::scheduler::{DrainPolicy, LockLeakPolicy};
    use crate::util::config::{
        apply_overrides, from_toml_str, load_file, to_toml_string, ConfigError, ENV_DRAIN,
        ENV_WORKERS,
    };
    use std::io::Write;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert!(config.num_workers >= 1);
        assert_eq!(config.pool_name, "custom-pool");
        assert_eq!(config.drain_policy, DrainPolicy::Abandon);
        assert_eq!(config.lock_leak_policy, LockLeakPolicy::Report);
        assert!(config.autostart);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SchedulerConfig::with_workers(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_stack_size_rejected() {
        let mut config = SchedulerConfig::default();
        config.stack_sizes.huge = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("huge"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = from_toml_str(
            r#"
            num_workers = 3
            drain_policy = "drain"

            [stack_sizes]
            small = 65536
            "#,
        )
        .unwrap();
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.drain_policy, DrainPolicy::Drain);
        assert_eq!(config.stack_sizes.small, 65536);
        assert_eq!(config.stack_sizes.large, StackSizeTable::default().large);
        assert_eq!(config.pool_name, "custom-pool");
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let mut config = SchedulerConfig::with_workers(5);
        config.lock_leak_policy = LockLeakPolicy::Abort;
        let rendered = to_toml_string(&config).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(rendered.as_bytes()).unwrap();
        let loaded = load_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = SchedulerConfig::with_workers(2);
        apply_overrides(&mut config, |key| match key {
            k if k == ENV_WORKERS => Some("6".to_string()),
            k if k == ENV_DRAIN => Some("drain".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.num_workers, 6);
        assert_eq!(config.drain_policy, DrainPolicy::Drain);
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = SchedulerConfig::with_workers(2);
        let err = apply_overrides(&mut config, |key| {
            (key == ENV_WORKERS).then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
        assert_eq!(config.num_workers, 2);
    }
}
