// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Saved simulations (save/load)
//!
//! A saved simulation is the ordered log of every successful mutating request
//! issued against it, stored as a pretty-printed JSON document. Loading
//! replays the log against a fresh simulation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::Result;

/// One logged request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SavedRequest {
    pub route: String,
    pub params: Value,
}

/// Replayable log of one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SavedSimulation {
    pub saved_sim_name: String,
    pub name: String,
    pub seed: u64,
    #[serde(default)]
    pub requests: Vec<SavedRequest>,
}

impl SavedSimulation {
    /// File a saved simulation called `saved_sim_name` lives in under `save_dir`
    pub fn path_in(save_dir: &Path, saved_sim_name: &str) -> PathBuf {
        save_dir.join(format!("{saved_sim_name}.json"))
    }

    /// Save to `save_dir`, creating the directory if needed. Returns the file path.
    pub fn save_to_dir(&self, save_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(save_dir)?;
        let path = Self::path_in(save_dir, &self.saved_sim_name);
        self.save_to_file(&path)?;
        Ok(path)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, encoded)?;
        debug!(
            target: "nes-state-manager",
            "Saved simulation '{}' ({} requests) to {}",
            self.saved_sim_name,
            self.requests.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn load_from_dir(save_dir: &Path, saved_sim_name: &str) -> Result<Self> {
        Self::load_from_file(&Self::path_in(save_dir, saved_sim_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateError;
    use serde_json::json;

    fn sample() -> SavedSimulation {
        SavedSimulation {
            saved_sim_name: "T1-0".into(),
            name: "T1".into(),
            seed: 7,
            requests: vec![
                SavedRequest {
                    route: "Simulation/Create".into(),
                    params: json!({"Name": "T1", "Seed": 7}),
                },
                SavedRequest {
                    route: "Geometry/Shape/Sphere/Create".into(),
                    params: json!({
                        "SimulationID": 0,
                        "Center_um": [0.0, 0.0, 0.0],
                        "Radius_um": 5.0
                    }),
                },
            ],
        }
    }

    #[test]
    fn test_saved_simulation_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let saved = sample();
        let path = saved.save_to_dir(&dir.path().join("saves")).unwrap();
        assert!(path.ends_with("T1-0.json"));

        let loaded = SavedSimulation::load_from_dir(&dir.path().join("saves"), "T1-0").unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_field_names_are_pascal_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["SavedSimName"], "T1-0");
        assert_eq!(value["Requests"][1]["Route"], "Geometry/Shape/Sphere/Create");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SavedSimulation::load_from_dir(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, StateError::Io(_)));
    }

    #[test]
    fn test_malformed_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{\"Name\": 3}").unwrap();
        let err = SavedSimulation::load_from_file(&path).unwrap_err();
        assert!(matches!(err, StateError::SerializationError(_)));
    }
}
