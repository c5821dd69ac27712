//! Configuration loading.

use std::io::Write;

use fiberpool::util::config::{load_config, ConfigError};
use fiberpool::{DrainPolicy, LockLeakPolicy, StackSize};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_from_file() {
    let file = write_config(
        r#"
        pool_name = "io-pool"
        num_workers = 3
        idle_timeout_ms = 5
        lock_leak_policy = "report"

        [stack_sizes]
        large = 4194304
        "#,
    );

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.pool_name, "io-pool");
    assert_eq!(config.idle_timeout().as_millis(), 5);
    assert_eq!(config.lock_leak_policy, LockLeakPolicy::Report);
    assert_eq!(config.stack_size(StackSize::Large), 4194304);
    assert_eq!(config.stack_size(StackSize::Small), 0x8000);
    if std::env::var(fiberpool::util::config::ENV_DRAIN).is_err() {
        assert_eq!(config.drain_policy, DrainPolicy::Abandon);
    }
}

#[test]
fn test_load_config_rejects_zero_workers() {
    let file = write_config("num_workers = 0\n");
    if std::env::var(fiberpool::util::config::ENV_WORKERS).is_err() {
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));
    }
}

#[test]
fn test_load_config_rejects_bad_toml() {
    let file = write_config("num_workers = \"lots\"\n");
    assert!(matches!(
        load_config(Some(file.path())),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_load_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        load_config(Some(&missing)),
        Err(ConfigError::IoError(_))
    ));
}
