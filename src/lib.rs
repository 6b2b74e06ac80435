//! # NES - Neuron Emulation Server
//!
//! NES hosts any number of independent biophysical neuron simulations in one
//! process. Clients build a simulation piece by piece (shapes, compartments,
//! receptors, neurons, patch-clamp tools), advance it with `Simulation/RunFor`,
//! and read back recordings. Every request is a route name plus a JSON object;
//! every response is a JSON object carrying a numeric `StatusCode`.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! nes = "0.1"
//! ```
//!
//! ```rust,no_run
//! use nes::prelude::*;
//! use serde_json::json;
//!
//! let config = NesConfig::default();
//! let router = RequestRouter::new(&config);
//!
//! let created = router.handle("Simulation/Create", &json!({ "Name": "demo", "Seed": 7 }));
//! let sim = created["SimulationID"].as_u64().unwrap();
//!
//! router.handle("Simulation/RunFor", &json!({ "SimulationID": sim, "Runtime_ms": 10.0 }));
//! router.registry().wait_all_idle(std::time::Duration::from_millis(1));
//!
//! let status = router.handle("Simulation/GetStatus", &json!({ "SimulationID": sim }));
//! assert_eq!(status["StatusCode"], 0);
//! router.shutdown();
//! ```
//!
//! ## Feature Flags
//!
//! - **`file-logging`**: per-run log folders with one rotating file per crate
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: nes-config, nes-observability              │
//! │  (TOML + env overrides, tracing subscriber setup)       │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Models: nes-npu-neural                                 │
//! │  (BS / SC / LIFC neurons, receptors, STDP)              │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Engine: nes-npu-sim-engine, nes-state-manager          │
//! │  (Simulation aggregate, worker thread, saved logs)      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Services: nes-services                                 │
//! │  (Registry, manager tasks, request router)              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use nes_config as config;
pub use nes_npu_neural as neural;
pub use nes_npu_sim_engine as sim_engine;
pub use nes_observability as observability;
pub use nes_services as services;
pub use nes_state_manager as state_manager;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::{load_config, NesConfig};
    pub use crate::neural::{
        CompartmentId, LIFCNeuronParams, NeuronId, ReceptorId, ResetMethod, ShapeId,
        UpdateMethod, Vec3D,
    };
    pub use crate::observability::{init_logging, CrateDebugFlags, LoggingOptions};
    pub use crate::services::{
        RequestRouter, ServiceError, ServiceResult, SimulationRegistry, StatusCode, TaskStatus,
    };
    pub use crate::sim_engine::{Simulation, SimulationId};
    pub use crate::state_manager::{SavedRequest, SavedSimulation, SimulationTask};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let _neuron = NeuronId(0);
        assert_eq!(StatusCode::SimulationBusy.as_u8(), 3);
    }
}
