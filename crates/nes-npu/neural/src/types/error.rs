// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for neural model construction
//!
//! Models never fail at tick time. Every error here is raised while a
//! parameter set is parsed or validated, before the entity exists.

use thiserror::Error;

/// Errors raised while building neurons, receptors, compartments or shapes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NeuralError {
    /// A numeric parameter is out of its valid range
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// An enumerated model option (update method, reset method, ...) has an unknown name
    #[error("Unknown {kind} '{name}'")]
    UnknownVariant { kind: &'static str, name: String },
}

impl NeuralError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        NeuralError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for neural model construction
pub type NeuralResult<T> = Result<T, NeuralError>;

/// Require `value` to be finite and strictly positive.
pub(crate) fn require_positive(name: &str, value: f64) -> NeuralResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(NeuralError::invalid(name, format!("must be > 0, got {}", value)))
    }
}

/// Require `value` to be finite and not negative.
pub(crate) fn require_non_negative(name: &str, value: f64) -> NeuralResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(NeuralError::invalid(name, format!("must be >= 0, got {}", value)))
    }
}

pub(crate) fn require_finite(name: &str, value: f64) -> NeuralResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NeuralError::invalid(name, format!("must be finite, got {}", value)))
    }
}

pub(crate) fn require_unit_interval(name: &str, value: f64) -> NeuralResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(NeuralError::invalid(name, format!("must be within [0, 1], got {}", value)))
    }
}
