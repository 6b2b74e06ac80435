// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core type definitions shared by every neuron model

pub mod error;
pub mod ids;
pub mod spatial;
pub mod spike;

pub use error::{NeuralError, NeuralResult};
pub use ids::{CompartmentId, NeuronId, ReceptorId, ShapeId};
pub use spatial::{Shape, Vec3D};
pub use spike::SpikeHistory;

/// Tolerance used when comparing simulation times.
///
/// Tick times are always computed as `tick_index * dt`, so two neurons see
/// bit-identical times for the same tick; the tolerance only absorbs
/// user-supplied stimulation times that are not exact multiples of `dt`.
pub const TIME_EPSILON_MS: f64 = 1e-9;
