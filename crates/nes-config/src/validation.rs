// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every violation is collected before reporting, so a broken file is fixed in
//! one pass instead of one error at a time.

use crate::{ConfigError, ConfigResult, NesConfig};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &NesConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// All violations in `config`, in section order
pub fn collect_errors(config: &NesConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_simulation(config, &mut errors);
    validate_manager_tasks(config, &mut errors);
    validate_persistence(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn validate_simulation(config: &NesConfig, errors: &mut Vec<ConfigValidationError>) {
    let timestep = config.simulation.timestep_ms;
    if !(timestep.is_finite() && timestep > 0.0) {
        errors.push(invalid(
            "simulation.timestep_ms",
            format!("must be a positive number, got {}", timestep),
        ));
    }
    if config.simulation.worker_poll_interval_ms == 0 {
        errors.push(invalid("simulation.worker_poll_interval_ms", "must be at least 1"));
    }
}

fn validate_manager_tasks(config: &NesConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.manager_tasks.replay_poll_interval_ms == 0 {
        errors.push(invalid("manager_tasks.replay_poll_interval_ms", "must be at least 1"));
    }
}

fn validate_persistence(config: &NesConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.persistence.save_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "persistence.save_dir".to_string(),
        });
    }
}

fn validate_logging(config: &NesConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(invalid(
            "logging.level",
            format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        ));
    }
    if config.logging.file_logging && config.logging.log_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "logging.log_dir".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_collects_every_violation() {
        let mut config = NesConfig::default();
        config.simulation.timestep_ms = 0.0;
        config.simulation.worker_poll_interval_ms = 0;
        config.persistence.save_dir = PathBuf::new();
        config.logging.level = "loud".to_string();

        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 4);

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("simulation.timestep_ms"));
        assert!(message.contains("logging.level"));
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut config = NesConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_nan_timestep_is_rejected() {
        let mut config = NesConfig::default();
        config.simulation.timestep_ms = f64::NAN;
        assert_eq!(collect_errors(&config).len(), 1);
    }
}
