// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Postsynaptic conductance kernels
//!
//! ```text
//! g(t) = norm × (exp(-t/τ_decay) − exp(-t/τ_rise))     t ≥ 0
//!
//! t_peak = τ_r·τ_d / (τ_d − τ_r) × ln(τ_d / τ_r)
//! norm   = 1 / (exp(-t_peak/τ_d) − exp(-t_peak/τ_r))   → peak value is exactly 1
//! ```
//!
//! Degenerate cases: `τ_rise == 0` is an instantaneous rise (single
//! exponential decay), `τ_rise == τ_decay` is the alpha function
//! `(t/τ)·exp(1 − t/τ)`.

use crate::types::error::{require_non_negative, require_positive};
use crate::types::NeuralResult;

/// Number of decay time constants after which a kernel is treated as zero
const SUPPORT_DECAY_CONSTANTS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum KernelForm {
    Exponential,
    Alpha,
    Difference { norm: f64 },
}

/// Double-exponential rise/decay kernel normalised to unit peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleExponential {
    tau_rise_ms: f64,
    tau_decay_ms: f64,
    form: KernelForm,
}

impl DoubleExponential {
    pub fn new(tau_rise_ms: f64, tau_decay_ms: f64) -> NeuralResult<Self> {
        require_non_negative("tau_rise_ms", tau_rise_ms)?;
        require_positive("tau_decay_ms", tau_decay_ms)?;

        let form = if tau_rise_ms == 0.0 {
            KernelForm::Exponential
        } else if (tau_rise_ms - tau_decay_ms).abs() < 1e-12 {
            KernelForm::Alpha
        } else {
            let t_peak = tau_rise_ms * tau_decay_ms / (tau_decay_ms - tau_rise_ms)
                * (tau_decay_ms / tau_rise_ms).ln();
            let peak = (-t_peak / tau_decay_ms).exp() - (-t_peak / tau_rise_ms).exp();
            KernelForm::Difference { norm: 1.0 / peak }
        };

        Ok(Self {
            tau_rise_ms,
            tau_decay_ms,
            form,
        })
    }

    pub fn tau_rise_ms(&self) -> f64 {
        self.tau_rise_ms
    }

    pub fn tau_decay_ms(&self) -> f64 {
        self.tau_decay_ms
    }

    /// Kernel value `t_ms` after the (delayed) spike; zero for `t_ms <= 0`.
    #[inline]
    pub fn value(&self, t_ms: f64) -> f64 {
        if t_ms <= 0.0 {
            return 0.0;
        }
        match self.form {
            KernelForm::Exponential => (-t_ms / self.tau_decay_ms).exp(),
            KernelForm::Alpha => {
                let x = t_ms / self.tau_decay_ms;
                x * (1.0 - x).exp()
            }
            KernelForm::Difference { norm } => {
                norm * ((-t_ms / self.tau_decay_ms).exp() - (-t_ms / self.tau_rise_ms).exp())
            }
        }
    }

    /// Time after which the kernel is negligible
    pub fn support_ms(&self) -> f64 {
        SUPPORT_DECAY_CONSTANTS * self.tau_decay_ms.max(self.tau_rise_ms)
    }
}

/// Mg²⁺ block factor for voltage-gated (NMDA-type) receptors at 1 mM [Mg²⁺]o
#[inline]
pub fn mg_block(v_mv: f64) -> f64 {
    const MG_CONCENTRATION_MM: f64 = 1.0;
    1.0 / (1.0 + (-0.062 * v_mv).exp() * MG_CONCENTRATION_MM / 3.57)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_of(k: &DoubleExponential) -> f64 {
        (1..20_000)
            .map(|i| k.value(i as f64 * 0.01))
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_difference_kernel_peaks_at_one() {
        let k = DoubleExponential::new(0.5, 5.0).unwrap();
        assert!((peak_of(&k) - 1.0).abs() < 1e-3);
        assert_eq!(k.value(0.0), 0.0);
        assert_eq!(k.value(-1.0), 0.0);
    }

    #[test]
    fn test_alpha_kernel_peaks_at_tau() {
        let k = DoubleExponential::new(2.0, 2.0).unwrap();
        assert!((k.value(2.0) - 1.0).abs() < 1e-12);
        assert!(k.value(1.0) < 1.0 && k.value(3.0) < 1.0);
    }

    #[test]
    fn test_instant_rise_is_single_exponential() {
        let k = DoubleExponential::new(0.0, 4.0).unwrap();
        assert!((k.value(4.0) - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_time_constants() {
        assert!(DoubleExponential::new(-1.0, 5.0).is_err());
        assert!(DoubleExponential::new(1.0, 0.0).is_err());
    }

    #[test]
    fn test_mg_block_relieved_by_depolarisation() {
        assert!(mg_block(-80.0) < mg_block(-20.0));
        assert!(mg_block(40.0) > 0.9);
    }
}
