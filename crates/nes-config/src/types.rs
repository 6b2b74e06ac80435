// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to a section of `nes_configuration.toml`. Every field has
//! a default, so a partial (or empty) file is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NesConfig {
    pub system: SystemConfig,
    pub simulation: SimulationConfig,
    pub manager_tasks: ManagerTasksConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Rayon threads for intra-tick neuron updates; 0 = rayon default
    pub max_cores: usize,
    pub debug: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_cores: 0,
            debug: false,
        }
    }
}

/// Simulation runtime configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed integration step
    pub timestep_ms: f64,
    /// Upper bound on how long an idle worker sleeps between flag checks
    pub worker_poll_interval_ms: u64,
    /// Seed used when `Simulation/Create` gives none
    pub default_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep_ms: 0.1,
            worker_poll_interval_ms: 10,
            default_seed: 0,
        }
    }
}

impl SimulationConfig {
    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }
}

/// Manager task (load/save) configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerTasksConfig {
    /// How often a replay checks whether its simulation went idle
    pub replay_poll_interval_ms: u64,
}

impl Default for ManagerTasksConfig {
    fn default() -> Self {
        Self {
            replay_poll_interval_ms: 2,
        }
    }
}

impl ManagerTasksConfig {
    pub fn replay_poll_interval(&self) -> Duration {
        Duration::from_millis(self.replay_poll_interval_ms)
    }
}

/// Saved-simulation storage
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub save_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("SavedSimulations"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
    pub file_logging: bool,
    pub log_dir: PathBuf,
    /// Run folders older than this are deleted at startup
    pub retention_days: u64,
    /// At most this many run folders are kept
    pub max_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("logs"),
            retention_days: 7,
            max_runs: 20,
        }
    }
}
