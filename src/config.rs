//! Explorer configuration
//!
//! Loaded from YAML (see `cli::runtime::load_config`), then adjusted by
//! `SOULEXPLORER_*` environment variables.

use std::env;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use soulexplorer_scheduler::{InterruptCoordinator, SchedulerOptions};
use soulexplorer_state_center::DeadLoopConfig;

use crate::errors::{ExplorerError, ExplorerResult};

pub const ENV_MAX_ATTEMPTS: &str = "SOULEXPLORER_MAX_ATTEMPTS";
pub const ENV_DEAD_LOOP_WINDOW: &str = "SOULEXPLORER_DEAD_LOOP_WINDOW";
pub const ENV_DEAD_LOOP_DISTINCT: &str = "SOULEXPLORER_DEAD_LOOP_DISTINCT";
pub const ENV_LOG: &str = "SOULEXPLORER_LOG";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub logging: LoggingConfig,
    pub registry: DeadLoopConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_attempts: u32,
    pub interruptible: bool,
    pub stop_keywords: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let defaults = SchedulerOptions::default();
        Self {
            max_attempts: defaults.max_attempts,
            interruptible: defaults.interruptible,
            stop_keywords: defaults.stop_keywords,
        }
    }
}

impl ExplorerConfig {
    pub fn from_yaml_str(content: &str) -> ExplorerResult<Self> {
        let config: ExplorerConfig =
            serde_yaml::from_str(content).map_err(|err| ExplorerError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SOULEXPLORER_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> ExplorerResult<()> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> ExplorerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
            self.scheduler.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_DEAD_LOOP_WINDOW) {
            self.registry.window = parse_number(ENV_DEAD_LOOP_WINDOW, &value)?;
        }
        if let Some(value) = lookup(ENV_DEAD_LOOP_DISTINCT) {
            self.registry.max_distinct = parse_number(ENV_DEAD_LOOP_DISTINCT, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG) {
            let value = value.trim();
            if !value.is_empty() {
                self.logging.level = value.to_string();
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> ExplorerResult<()> {
        if self.scheduler.max_attempts == 0 {
            return Err(ExplorerError::Config(
                "scheduler.max_attempts must be at least 1".into(),
            ));
        }
        if self.registry.window == 0 {
            return Err(ExplorerError::Config(
                "registry.window must be at least 1".into(),
            ));
        }
        if self.registry.max_distinct == 0 || self.registry.max_distinct >= self.registry.window {
            return Err(ExplorerError::Config(format!(
                "registry.max_distinct must be between 1 and {}",
                self.registry.window.saturating_sub(1)
            )));
        }
        Ok(())
    }

    pub fn dead_loop(&self) -> DeadLoopConfig {
        self.registry
    }

    pub fn scheduler_options(
        &self,
        coordinator: Option<Arc<InterruptCoordinator>>,
    ) -> SchedulerOptions {
        let mut options = SchedulerOptions::default()
            .with_max_attempts(self.scheduler.max_attempts)
            .interruptible(self.scheduler.interruptible);
        options.stop_keywords = self.scheduler.stop_keywords.clone();
        options.coordinator = coordinator;
        options
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ExplorerResult<T> {
    value.trim().parse().map_err(|_| {
        ExplorerError::Config(format!("{key} must be a non-negative integer, got {value:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ExplorerConfig::from_yaml_str("registry:\n  window: 8\n").unwrap();
        assert_eq!(config.registry.window, 8);
        assert_eq!(config.registry.max_distinct, 2);
        assert_eq!(config.scheduler.max_attempts, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn env_overrides_win() {
        let mut config = ExplorerConfig::default();
        config
            .apply_overrides_from(|key| match key {
                ENV_MAX_ATTEMPTS => Some("3".into()),
                ENV_DEAD_LOOP_WINDOW => Some("10".into()),
                ENV_LOG => Some("debug".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.scheduler.max_attempts, 3);
        assert_eq!(config.registry.window, 10);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn bad_override_is_a_config_error() {
        let mut config = ExplorerConfig::default();
        let err = config
            .apply_overrides_from(|key| (key == ENV_MAX_ATTEMPTS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ExplorerError::Config(_)));
    }

    #[test]
    fn threshold_must_be_below_window() {
        let err = ExplorerConfig::from_yaml_str("registry:\n  window: 2\n  max_distinct: 2\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_distinct"));
    }

    #[test]
    fn scheduler_options_follow_config() {
        let mut config = ExplorerConfig::default();
        config.scheduler.max_attempts = 4;
        config.scheduler.stop_keywords = vec!["halt".into()];
        let options = config.scheduler_options(None);
        assert_eq!(options.max_attempts, 4);
        assert!(options.is_stop_keyword("HALT"));
        assert!(!options.is_stop_keyword("stop"));
    }
}
