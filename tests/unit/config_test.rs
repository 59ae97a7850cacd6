//! Tests for configuration validation

use prometheus_scheduler::config::scheduler::{ENV_DEFAULT_PRIORITY, ENV_NAME, ENV_PROCESSORS};
use prometheus_scheduler::config::SchedulerConfig;
use prometheus_scheduler::util::Priority;

#[test]
fn test_default_config_is_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.name, None);
    assert!(config.processors >= 1);
    assert_eq!(config.default_priority, Priority(100));
}

#[test]
fn test_zero_processors_invalid() {
    let config = SchedulerConfig {
        processors: 0,
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_empty_name_invalid() {
    let config = SchedulerConfig {
        name: Some(String::new()),
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "name": "batch",
        "processors": 4,
        "default_priority": 7
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.name.as_deref(), Some("batch"));
    assert_eq!(config.processors, 4);
    assert_eq!(config.default_priority, Priority(7));
}

#[test]
fn test_config_from_json_defaults() {
    let config = SchedulerConfig::from_json_str("{}").unwrap();
    assert_eq!(config, SchedulerConfig::default());
}

#[test]
fn test_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"processors": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_env() {
    // The only test touching these variables.
    std::env::set_var(ENV_NAME, "from-env");
    std::env::set_var(ENV_PROCESSORS, "3");
    std::env::set_var(ENV_DEFAULT_PRIORITY, "-5");
    let config = SchedulerConfig::from_env();
    std::env::set_var(ENV_PROCESSORS, "many");
    let invalid = SchedulerConfig::from_env();
    std::env::remove_var(ENV_NAME);
    std::env::remove_var(ENV_PROCESSORS);
    std::env::remove_var(ENV_DEFAULT_PRIORITY);

    let config = config.unwrap();
    assert_eq!(config.name.as_deref(), Some("from-env"));
    assert_eq!(config.processors, 3);
    assert_eq!(config.default_priority, Priority(-5));
    assert!(invalid.unwrap_err().contains(ENV_PROCESSORS));
}
