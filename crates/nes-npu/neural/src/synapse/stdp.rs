// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! STDP (Spike-Timing-Dependent Plasticity) computation
//!
//! Pure functions over a single spike pairing. `Δt = t_post − t_pre`:
//!
//! ```text
//! Δt > 0 (pre before post):  Δw = +A_pos × exp(−Δt / τ_pos)
//! Δt < 0 (post before pre):  Δw = −A_neg × exp( Δt / τ_neg)
//! Δt = 0:                    Δw = 0
//! ```
//!
//! The anti-Hebbian policy applies `−Δw`. Weights are clamped to `[0, 1]`.

use std::str::FromStr;

use crate::types::error::{require_non_negative, require_positive};
use crate::types::{NeuralError, NeuralResult};

/// Plasticity policy of a receptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdpMethod {
    #[default]
    None,
    Hebbian,
    AntiHebbian,
}

impl StdpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StdpMethod::None => "NONE",
            StdpMethod::Hebbian => "HEBBIAN",
            StdpMethod::AntiHebbian => "ANTI_HEBBIAN",
        }
    }
}

impl FromStr for StdpMethod {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(StdpMethod::None),
            "HEBBIAN" => Ok(StdpMethod::Hebbian),
            "ANTI_HEBBIAN" => Ok(StdpMethod::AntiHebbian),
            other => Err(NeuralError::UnknownVariant {
                kind: "STDP method",
                name: other.to_string(),
            }),
        }
    }
}

/// STDP configuration parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdpParams {
    pub method: StdpMethod,

    /// Potentiation learning rate (A+)
    pub a_pos: f64,

    /// Depression learning rate (A-)
    pub a_neg: f64,

    /// Potentiation time constant (ms)
    pub tau_pos_ms: f64,

    /// Depression time constant (ms)
    pub tau_neg_ms: f64,
}

impl Default for StdpParams {
    fn default() -> Self {
        Self {
            method: StdpMethod::None,
            a_pos: 0.01,
            a_neg: 0.012,
            tau_pos_ms: 20.0,
            tau_neg_ms: 20.0,
        }
    }
}

impl StdpParams {
    pub fn validate(&self) -> NeuralResult<()> {
        require_non_negative("STDP_A_pos", self.a_pos)?;
        require_non_negative("STDP_A_neg", self.a_neg)?;
        require_positive("STDP_Tau_pos_ms", self.tau_pos_ms)?;
        require_positive("STDP_Tau_neg_ms", self.tau_neg_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.method != StdpMethod::None
    }

    /// Hebbian weight change for one pairing (before the policy's sign)
    #[inline]
    pub fn hebbian_delta(&self, dt_ms: f64) -> f64 {
        if dt_ms > 0.0 {
            self.a_pos * (-dt_ms / self.tau_pos_ms).exp()
        } else if dt_ms < 0.0 {
            -self.a_neg * (dt_ms / self.tau_neg_ms).exp()
        } else {
            0.0
        }
    }

    /// New weight after one pairing with `Δt = t_post − t_pre`
    pub fn apply(&self, weight: f64, dt_ms: f64) -> f64 {
        let delta = match self.method {
            StdpMethod::None => return weight,
            StdpMethod::Hebbian => self.hebbian_delta(dt_ms),
            StdpMethod::AntiHebbian => -self.hebbian_delta(dt_ms),
        };
        (weight + delta).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hebbian() -> StdpParams {
        StdpParams {
            method: StdpMethod::Hebbian,
            a_pos: 0.1,
            a_neg: 0.1,
            tau_pos_ms: 20.0,
            tau_neg_ms: 20.0,
        }
    }

    #[test]
    fn test_pre_before_post_potentiates_to_saturation() {
        let params = hebbian();
        let mut w = 0.5;
        loop {
            let next = params.apply(w, 5.0);
            if w < 1.0 {
                assert!(next > w, "weight must strictly increase below saturation");
            }
            if next == 1.0 && w == 1.0 {
                break;
            }
            w = next;
        }
        assert_eq!(params.apply(1.0, 5.0), 1.0);
    }

    #[test]
    fn test_post_before_pre_depresses_to_zero() {
        let params = hebbian();
        let mut w = 0.5;
        for _ in 0..100 {
            let next = params.apply(w, -5.0);
            if w > 0.0 {
                assert!(next < w);
            }
            w = next;
        }
        assert_eq!(w, 0.0);
    }

    #[test]
    fn test_anti_hebbian_inverts_direction() {
        let mut params = hebbian();
        params.method = StdpMethod::AntiHebbian;
        assert!(params.apply(0.5, 5.0) < 0.5);
        assert!(params.apply(0.5, -5.0) > 0.5);
    }

    #[test]
    fn test_none_and_simultaneous_are_noops() {
        let mut params = hebbian();
        assert_eq!(params.apply(0.3, 0.0), 0.3);
        params.method = StdpMethod::None;
        assert_eq!(params.apply(0.3, 5.0), 0.3);
    }

    #[test]
    fn test_method_names() {
        assert_eq!("ANTI_HEBBIAN".parse::<StdpMethod>().unwrap(), StdpMethod::AntiHebbian);
        assert!("hebbian".parse::<StdpMethod>().is_err());
        assert_eq!(StdpMethod::Hebbian.as_str(), "HEBBIAN");
    }
}
