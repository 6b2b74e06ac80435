// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # NES State Manager
//!
//! Runtime state shared between a simulation's request handlers and its worker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   SimulationState                   │  ← Lock-free atomics
//! │   (task claim, worker flags, clock) │     read by GetStatus while busy
//! └─────────────────────────────────────┘
//!           ↓
//! ┌─────────────────────────────────────┐
//! │   SavedSimulation                   │  ← JSON request log on disk
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use nes_state_manager::{SimulationState, SimulationTask};
//!
//! let state = SimulationState::new();
//! assert!(state.try_claim(SimulationTask::RunFor));
//! assert!(state.is_busy());
//! assert!(!state.try_claim(SimulationTask::Reset));
//! ```

pub mod core_state;
pub mod persistence;

pub use core_state::{SimulationState, SimulationTask};
pub use persistence::{SavedRequest, SavedSimulation};

/// State manager error types
#[derive(Debug)]
pub enum StateError {
    /// I/O error (file operations)
    Io(std::io::Error),

    /// Saved simulation could not be encoded or decoded
    SerializationError(String),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::Io(e) => write!(f, "I/O error: {}", e),
            StateError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::Io(e) => Some(e),
            StateError::SerializationError(_) => None,
        }
    }
}

impl From<std::io::Error> for StateError {
    fn from(e: std::io::Error) -> Self {
        StateError::Io(e)
    }
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StateError>;
