//! Scheduler configuration.

use std::env;

use serde::{Deserialize, Serialize};

use crate::util::types::{Priority, DEFAULT_PRIORITY};

/// Environment variable naming the scheduler.
pub const ENV_NAME: &str = "SCHEDULER_NAME";
/// Environment variable with the initial number of processors.
pub const ENV_PROCESSORS: &str = "SCHEDULER_PROCESSORS";
/// Environment variable with the default job priority.
pub const ENV_DEFAULT_PRIORITY: &str = "SCHEDULER_DEFAULT_PRIORITY";

fn default_processors() -> usize {
    num_cpus::get()
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler name, used for worker thread names. Generated when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Processors started with the scheduler.
    #[serde(default = "default_processors")]
    pub processors: usize,
    /// Priority of jobs whose definition sets none.
    #[serde(default)]
    pub default_priority: Priority,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: None,
            processors: default_processors(),
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.processors == 0 {
            return Err("processors must be greater than 0".into());
        }
        if self.name.as_deref().is_some_and(str::is_empty) {
            return Err("name must not be empty".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Reports parse errors and invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read configuration from the environment, after loading a `.env` file
    /// if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Reports unparsable numbers and invalid values.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Ok(name) = env::var(ENV_NAME) {
            cfg.name = Some(name);
        }
        if let Ok(value) = env::var(ENV_PROCESSORS) {
            cfg.processors = value
                .trim()
                .parse()
                .map_err(|e| format!("{ENV_PROCESSORS}: {e}"))?;
        }
        if let Ok(value) = env::var(ENV_DEFAULT_PRIORITY) {
            cfg.default_priority = Priority(
                value
                    .trim()
                    .parse()
                    .map_err(|e| format!("{ENV_DEFAULT_PRIORITY}: {e}"))?,
            );
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
