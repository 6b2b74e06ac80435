// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Service layer error types.

Every failure a request can produce is a [`ServiceError`]; each maps onto
exactly one wire-level [`StatusCode`].

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use nes_npu_neural::NeuralError;
use nes_npu_sim_engine::EngineError;
use nes_state_manager::StateError;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Status code carried by every response as `StatusCode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    GeneralFailure = 1,
    InvalidParametersPassed = 2,
    SimulationBusy = 3,
}

impl StatusCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(StatusCode::Success),
            1 => Some(StatusCode::GeneralFailure),
            2 => Some(StatusCode::InvalidParametersPassed),
            3 => Some(StatusCode::SimulationBusy),
            _ => None,
        }
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// Service layer errors (transport-agnostic)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Missing, mis-typed or out-of-range field, or an unknown ID
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unknown route '{0}'")]
    UnknownRoute(String),

    #[error("Unknown task ID {0}")]
    UnknownTask(u64),

    /// Another operation is in flight on the simulation
    #[error("Simulation is busy")]
    SimulationBusy,

    /// Saved simulation could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A request of a saved simulation failed during replay
    #[error("Replay of request {index} ({route}) failed: {reason}")]
    ReplayFailed {
        index: usize,
        route: String,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::InvalidParameters(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidParameters(_)
            | ServiceError::UnknownRoute(_)
            | ServiceError::UnknownTask(_) => StatusCode::InvalidParametersPassed,
            ServiceError::SimulationBusy => StatusCode::SimulationBusy,
            ServiceError::Persistence(_)
            | ServiceError::ReplayFailed { .. }
            | ServiceError::Internal(_) => StatusCode::GeneralFailure,
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// ============================================================================
// ERROR CONVERSIONS FROM BACKEND
// ============================================================================

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Busy => ServiceError::SimulationBusy,
            EngineError::WorkerSpawn(msg) => ServiceError::Internal(msg),
            EngineError::InvalidId { .. }
            | EngineError::InvalidParameter { .. }
            | EngineError::Neural(_) => ServiceError::InvalidParameters(err.to_string()),
        }
    }
}

impl From<NeuralError> for ServiceError {
    fn from(err: NeuralError) -> Self {
        ServiceError::InvalidParameters(err.to_string())
    }
}

impl From<StateError> for ServiceError {
    fn from(err: StateError) -> Self {
        ServiceError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::InvalidParameters(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_numbering() {
        assert_eq!(StatusCode::Success.as_u8(), 0);
        assert_eq!(StatusCode::GeneralFailure.as_u8(), 1);
        assert_eq!(StatusCode::InvalidParametersPassed.as_u8(), 2);
        assert_eq!(StatusCode::SimulationBusy.as_u8(), 3);
        assert_eq!(StatusCode::from_u8(3), Some(StatusCode::SimulationBusy));
        assert_eq!(StatusCode::from_u8(9), None);
        assert_eq!(serde_json::to_value(StatusCode::SimulationBusy).unwrap(), 3);
    }

    #[test]
    fn test_engine_errors_map_onto_status_codes() {
        assert_eq!(
            ServiceError::from(EngineError::Busy).status_code(),
            StatusCode::SimulationBusy
        );
        let invalid = EngineError::InvalidId {
            kind: "neuron",
            id: 7,
        };
        assert_eq!(
            ServiceError::from(invalid).status_code(),
            StatusCode::InvalidParametersPassed
        );
        assert_eq!(
            ServiceError::from(EngineError::WorkerSpawn("no threads".into())).status_code(),
            StatusCode::GeneralFailure
        );
    }

    #[test]
    fn test_unknown_model_name_is_invalid_parameters() {
        let err = "SIDEWAYS".parse::<nes_npu_neural::UpdateMethod>().unwrap_err();
        assert_eq!(
            ServiceError::from(err).status_code(),
            StatusCode::InvalidParametersPassed
        );
    }
}
