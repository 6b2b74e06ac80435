// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # NES Simulation Engine
//!
//! Owns simulations and runs them:
//! - [`Simulation`]: entity collections, connectome wiring, the tick loop,
//!   RESET / RUNFOR / RECORD_ALL / VSDA_CONVERSION tasks
//! - [`SimulationWorker`]: one named thread per simulation, woken through a
//!   channel and supervised by a shutdown flag
//! - [`SimulationRuntime`]: the busy-checked front door used by request handlers
//! - Patch-clamp [tools] and whole-simulation [recording]
//!
//! Neuron updates inside a tick run on rayon's pool.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod recording;
pub mod renderer;
pub mod simulation;
pub mod tools;
pub mod worker;

pub use error::{EngineError, EngineResult};
pub use recording::{NeuronTrace, Recording, RecordingSnapshot};
pub use renderer::{RenderScene, VoxelRenderer};
pub use simulation::{neuron_seed, Simulation, SimulationId};
pub use tools::{PatchClampADC, PatchClampDAC};
pub use worker::{SimulationRuntime, SimulationWorker};
