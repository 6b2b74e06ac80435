// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, NesConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file name searched for on disk
pub const CONFIG_FILE_NAME: &str = "nes_configuration.toml";

/// Find the NES configuration file
///
/// Search order:
/// 1. `NES_CONFIG_PATH` environment variable
/// 2. Current working directory: `./nes_configuration.toml`
/// 3. Parent directory: `../nes_configuration.toml`
/// 4. Workspace root (searches up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NES_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NES_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "NES configuration file '{}' not found in any of these locations:\n{}\n\n\
         Set NES_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NesConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: NesConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NES_SAVE_DIR` -> `persistence.save_dir`
/// - `NES_TIMESTEP_MS` -> `simulation.timestep_ms`
/// - `NES_DEFAULT_SEED` -> `simulation.default_seed`
/// - `NES_WORKER_POLL_MS` -> `simulation.worker_poll_interval_ms`
/// - `NES_MAX_CORES` -> `system.max_cores`
/// - `NES_LOG_LEVEL` -> `logging.level`
/// - `NES_LOG_DIR` -> `logging.log_dir`
/// - `NES_FILE_LOGGING` -> `logging.file_logging`
pub fn apply_environment_overrides(config: &mut NesConfig) {
    if let Ok(value) = env::var("NES_SAVE_DIR") {
        config.persistence.save_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("NES_TIMESTEP_MS") {
        if let Ok(timestep) = value.parse::<f64>() {
            config.simulation.timestep_ms = timestep;
        }
    }
    if let Ok(value) = env::var("NES_DEFAULT_SEED") {
        if let Ok(seed) = value.parse::<u64>() {
            config.simulation.default_seed = seed;
        }
    }
    if let Ok(value) = env::var("NES_WORKER_POLL_MS") {
        if let Ok(poll) = value.parse::<u64>() {
            config.simulation.worker_poll_interval_ms = poll;
        }
    }
    if let Ok(value) = env::var("NES_MAX_CORES") {
        if let Ok(cores) = value.parse::<usize>() {
            config.system.max_cores = cores;
        }
    }
    if let Ok(value) = env::var("NES_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("NES_LOG_DIR") {
        config.logging.log_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("NES_FILE_LOGGING") {
        config.logging.file_logging = parse_flag(&value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - `key=value` pairs, e.g. `{"timestep_ms": "0.05", "save_dir": "/tmp/saves"}`
pub fn apply_cli_overrides(config: &mut NesConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("save_dir") {
        config.persistence.save_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("timestep_ms") {
        if let Ok(timestep) = value.parse::<f64>() {
            config.simulation.timestep_ms = timestep;
        }
    }
    if let Some(value) = cli_args.get("default_seed") {
        if let Ok(seed) = value.parse::<u64>() {
            config.simulation.default_seed = seed;
        }
    }
    if let Some(value) = cli_args.get("max_cores") {
        if let Ok(cores) = value.parse::<usize>() {
            config.system.max_cores = cores;
        }
    }
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = parse_flag(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("file_logging") {
        config.logging.file_logging = parse_flag(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("NES_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("NES_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_reported() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("NES_CONFIG_PATH", "/definitely/not/here.toml");
        let result = find_config_file();
        env::remove_var("NES_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let saved = env::var("NES_TIMESTEP_MS").ok();
        env::remove_var("NES_TIMESTEP_MS");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "timestep_ms = 0.025").unwrap();
        writeln!(file, "[persistence]").unwrap();
        writeln!(file, "save_dir = \"/tmp/nes-saves\"").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.simulation.timestep_ms, 0.025);
        assert_eq!(config.persistence.save_dir, PathBuf::from("/tmp/nes-saves"));
        // Unspecified sections keep their defaults
        assert_eq!(config.logging.level, "info");

        if let Some(value) = saved {
            env::set_var("NES_TIMESTEP_MS", value);
        }
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[simulation\ntimestep_ms = ").unwrap();
        assert!(matches!(
            load_config(Some(&config_path), None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = NesConfig::default();

        env::set_var("NES_SAVE_DIR", "/srv/nes");
        env::set_var("NES_DEFAULT_SEED", "1234");
        env::set_var("NES_TIMESTEP_MS", "not-a-number");

        apply_environment_overrides(&mut config);

        env::remove_var("NES_SAVE_DIR");
        env::remove_var("NES_DEFAULT_SEED");
        env::remove_var("NES_TIMESTEP_MS");

        assert_eq!(config.persistence.save_dir, PathBuf::from("/srv/nes"));
        assert_eq!(config.simulation.default_seed, 1234);
        // Unparseable values are ignored
        assert_eq!(config.simulation.timestep_ms, 0.1);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[logging]").unwrap();
        writeln!(file, "level = \"warn\"").unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "default_seed = 1").unwrap();

        env::set_var("NES_LOG_LEVEL", "debug");
        env::set_var("NES_DEFAULT_SEED", "2");

        let mut cli_args = HashMap::new();
        cli_args.insert("log_level".to_string(), "trace".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("NES_LOG_LEVEL");
        env::remove_var("NES_DEFAULT_SEED");

        // CLI wins for level, env wins for seed (no CLI override)
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.simulation.default_seed, 2);
    }
}
