// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # NES Neural Computation
//!
//! All per-neuron computation in one place:
//! - **Types**: identifiers, errors, geometry, spike histories
//! - **Synapse**: receptor parameter records, per-connection receptor data,
//!   conductance kernels, STDP
//! - **Models**: BS, SC and LIFC neuron models behind the closed [`Neuron`] enum
//!
//! Nothing in this crate knows about threads, requests or simulations; the
//! sim-engine crate owns neurons and drives [`SpikingNeuron::update`] once per tick.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Core type definitions
pub mod types;

// Receptors, kernels, plasticity
pub mod synapse;

// Neuron models
pub mod models;

// Re-export types
pub use types::{
    CompartmentId, NeuralError, NeuralResult, NeuronId, ReceptorId, Shape, ShapeId,
    SpikeHistory, Vec3D, TIME_EPSILON_MS,
};

pub use synapse::{
    BasicReceptorData, DoubleExponential, LIFCReceptor, LIFCReceptorData, Neurotransmitter,
    Receptor, StdpMethod, StdpParams,
};

pub use models::{
    AdpSaturationModel, AhpSaturationModel, BSCompartment, BSNeuron, Compartment,
    ConnectomeTarget, LIFCCompartment, LIFCNeuron, LIFCNeuronParams, Neuron, NeuronCore,
    NeuronType, PassiveSomaParams, ResetMethod, SCNeuron, SpikingNeuron, UpdateMethod,
};
