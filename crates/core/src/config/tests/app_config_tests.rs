use std::io::Write;

use crate::config::models::{AppConfig, StorageBackend};

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    // 验证默认值
    assert_eq!(config.scheduler.max_concurrent_harvests, 8);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert!(config.harvest.cleanup_enabled);
    assert_eq!(config.harvest.broker_timeout_seconds, 120);
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[scheduler]
pool_size = 16
max_concurrent_harvests = 4
shutdown_timeout_seconds = 10

[storage]
backend = "sqlite"
url = "sqlite://data/harvester.db?mode=rwc"
max_connections = 2

[harvest]
cleanup_enabled = false
broker_timeout_seconds = 60
locale = "en"
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.scheduler.pool_size, 16);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(!config.harvest.cleanup_enabled);
    // 未出现的段落使用默认值
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_toml_round_trip() {
    let config = AppConfig::default();
    let toml_str = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&toml_str).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = AppConfig::default();
    config.scheduler.max_concurrent_harvests = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.scheduler.max_concurrent_harvests = config.scheduler.pool_size + 1;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.url = "postgres://localhost/harvester".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[harvest]\nbroker_timeout_seconds = 90").unwrap();

    let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
    assert_eq!(config.harvest.broker_timeout_seconds, 90);
    assert_eq!(config.scheduler.pool_size, 64);
}

#[test]
fn test_load_missing_file_fails() {
    assert!(AppConfig::load(Some("/nonexistent/harvester.toml")).is_err());
}
