// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the simulation engine

use nes_npu_neural::NeuralError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid {kind} ID: {id}")]
    InvalidId { kind: &'static str, id: u64 },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Neural(#[from] NeuralError),

    #[error("Simulation is busy")]
    Busy,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

impl EngineError {
    pub(crate) fn invalid_id(kind: &'static str, id: impl Into<u64>) -> Self {
        EngineError::InvalidId {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
