// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Patch-clamp instruments
//!
//! - [`PatchClampDAC`] injects a piecewise-constant current schedule into the
//!   neuron owning its compartment.
//! - [`PatchClampADC`] samples the membrane potential of the neuron owning its
//!   compartment at a fixed interval.

use nes_npu_neural::{CompartmentId, TIME_EPSILON_MS};

use crate::error::{EngineError, EngineResult};

/// Current injector; `control` holds `(t_ms, current_pA)` breakpoints sorted by time
#[derive(Debug, Clone, PartialEq)]
pub struct PatchClampDAC {
    pub id: u32,
    pub name: String,
    pub destination_compartment: CompartmentId,
    control: Vec<(f64, f64)>,
}

impl PatchClampDAC {
    pub fn new(id: u32, name: impl Into<String>, destination_compartment: CompartmentId) -> Self {
        Self {
            id,
            name: name.into(),
            destination_compartment,
            control: Vec::new(),
        }
    }

    /// Replace the schedule. Breakpoints are sorted by time; times must be finite and `>= 0`.
    pub fn set_output_list(&mut self, mut control: Vec<(f64, f64)>) -> EngineResult<()> {
        for &(t, i) in &control {
            if !t.is_finite() || t < 0.0 {
                return Err(EngineError::invalid(
                    "ControlData",
                    format!("breakpoint time must be finite and >= 0, got {t}"),
                ));
            }
            if !i.is_finite() {
                return Err(EngineError::invalid(
                    "ControlData",
                    format!("current must be finite, got {i}"),
                ));
            }
        }
        control.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.control = control;
        Ok(())
    }

    pub fn output_list(&self) -> &[(f64, f64)] {
        &self.control
    }

    /// Current (pA) at `t_ms`: the value of the last breakpoint at or before `t_ms`, else 0.
    pub fn current_at(&self, t_ms: f64) -> f64 {
        let idx = self
            .control
            .partition_point(|&(t, _)| t <= t_ms + TIME_EPSILON_MS);
        idx.checked_sub(1).map_or(0.0, |i| self.control[i].1)
    }
}

/// Membrane-potential recorder
#[derive(Debug, Clone, PartialEq)]
pub struct PatchClampADC {
    pub id: u32,
    pub name: String,
    pub source_compartment: CompartmentId,
    sample_interval_ms: f64,
    next_sample_ms: f64,
    recorded_mv: Vec<f64>,
}

impl PatchClampADC {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        source_compartment: CompartmentId,
        sample_interval_ms: f64,
    ) -> EngineResult<Self> {
        validate_interval(sample_interval_ms)?;
        Ok(Self {
            id,
            name: name.into(),
            source_compartment,
            sample_interval_ms,
            next_sample_ms: 0.0,
            recorded_mv: Vec::new(),
        })
    }

    pub fn sample_interval_ms(&self) -> f64 {
        self.sample_interval_ms
    }

    /// Change the sampling interval; already recorded samples are dropped.
    pub fn set_sample_interval_ms(
        &mut self,
        sample_interval_ms: f64,
        now_ms: f64,
    ) -> EngineResult<()> {
        validate_interval(sample_interval_ms)?;
        self.sample_interval_ms = sample_interval_ms;
        self.recorded_mv.clear();
        self.next_sample_ms = now_ms;
        Ok(())
    }

    /// Record `vm_mv` if a sample is due at `t_ms`.
    pub fn sample(&mut self, t_ms: f64, vm_mv: f64) {
        if t_ms + TIME_EPSILON_MS >= self.next_sample_ms {
            self.recorded_mv.push(vm_mv);
            self.next_sample_ms += self.sample_interval_ms;
            // Ticks coarser than the interval: one sample per tick
            if self.next_sample_ms < t_ms {
                self.next_sample_ms = t_ms + self.sample_interval_ms;
            }
        }
    }

    pub fn recorded_mv(&self) -> &[f64] {
        &self.recorded_mv
    }

    pub fn clear(&mut self) {
        self.recorded_mv.clear();
        self.next_sample_ms = 0.0;
    }
}

fn validate_interval(sample_interval_ms: f64) -> EngineResult<()> {
    if sample_interval_ms.is_finite() && sample_interval_ms > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(
            "Timestep_ms",
            format!("must be positive, got {sample_interval_ms}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dac_is_piecewise_constant() {
        let mut dac = PatchClampDAC::new(0, "dac", CompartmentId(0));
        dac.set_output_list(vec![(5.0, -20.0), (1.0, 100.0)]).unwrap();
        assert_eq!(dac.current_at(0.5), 0.0);
        assert_eq!(dac.current_at(1.0), 100.0);
        assert_eq!(dac.current_at(4.9), 100.0);
        assert_eq!(dac.current_at(5.0), -20.0);
        assert_eq!(dac.current_at(1000.0), -20.0);
    }

    #[test]
    fn test_dac_rejects_negative_times() {
        let mut dac = PatchClampDAC::new(0, "dac", CompartmentId(0));
        assert!(dac.set_output_list(vec![(-1.0, 1.0)]).is_err());
        assert!(dac.output_list().is_empty());
    }

    #[test]
    fn test_adc_samples_at_interval() {
        let mut adc = PatchClampADC::new(0, "adc", CompartmentId(0), 1.0).unwrap();
        for k in 0..50 {
            let t = k as f64 * 0.1;
            adc.sample(t, t);
        }
        // t = 0, 1, 2, 3, 4
        assert_eq!(adc.recorded_mv().len(), 5);
        assert!((adc.recorded_mv()[3] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_adc_rejects_zero_interval() {
        assert!(PatchClampADC::new(0, "adc", CompartmentId(0), 0.0).is_err());
        let mut adc = PatchClampADC::new(0, "adc", CompartmentId(0), 0.5).unwrap();
        assert!(adc.set_sample_interval_ms(-1.0, 0.0).is_err());
        assert_eq!(adc.sample_interval_ms(), 0.5);
    }
}
