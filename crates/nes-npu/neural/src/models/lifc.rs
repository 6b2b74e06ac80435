// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # LIFC (Leaky Integrate-and-Fire, Conductance-based) Neuron Model
//!
//! ## Model Dynamics
//!
//! ```text
//! Units: mV, ms, nS, pA, pF, MΩ.   G_L = 1000 / R_m  (nS)
//!
//! Currents (pA):
//!     I_L   = G_L   × (V − V_rest)
//!     I_syn = Σ_k g_k × (V − E_k)            one term per receptor data record
//!     I_AHP = g_AHP × (V − E_AHP)
//!     I_ADP = g_ADP × (V − E_ADP)
//!
//! C dV/dt = −I_L − I_syn − I_AHP − I_ADP + I_inj
//!
//! Threshold:
//!     V_th(t) = V_th,0 + floor(t) + ΔV_th × (1 − h(t))
//!     h → 1 with τ_h, floor → 0 with τ_floor
//!     spike: h −= Δh (≥ 0), floor += Δfloor
//! ```
//!
//! ## Tick Order
//!
//! 1. conductances (receptors, AHP, ADP)
//! 2. membrane integration (per [`UpdateMethod`])
//! 3. adaptive threshold, ADP resource and fatigue recovery
//! 4. spike decision: direct stimulation, then spontaneous activity, then
//!    threshold crossing (first match wins)
//! 5. spike side effects: reset (per [`ResetMethod`]), history, threshold
//!    adaptation, ADP depletion, fatigue, STDP

use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::{ConnectomeTarget, NeuronCore, SpikingNeuron};
use crate::synapse::{DoubleExponential, LIFCReceptor, LIFCReceptorData};
use crate::types::error::{require_finite, require_non_negative, require_positive};
use crate::types::{NeuralError, NeuralResult, NeuronId, SpikeHistory, TIME_EPSILON_MS};

/// Grouping key of receptor data records: one record per source neuron and
/// receptor class (reversal potential plus voltage gating).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReceptorKey {
    source: u32,
    reversal_bits: u64,
    voltage_gated: bool,
}

/// Membrane integration scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMethod {
    /// Clamp to the reset value for the absolute refractory period, else forward Euler
    #[default]
    Classical,
    ForwardEuler,
    /// Exponential Euler with total membrane conductance (leak + synaptic)
    ExpEulerRm,
    /// Exponential Euler with the fixed membrane time constant R·C
    ExpEulerCm,
}

impl FromStr for UpdateMethod {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLASSICAL" => Ok(UpdateMethod::Classical),
            "FORWARD_EULER" => Ok(UpdateMethod::ForwardEuler),
            "EXPEULER_RM" => Ok(UpdateMethod::ExpEulerRm),
            "EXPEULER_CM" => Ok(UpdateMethod::ExpEulerCm),
            other => Err(NeuralError::UnknownVariant {
                kind: "update method",
                name: other.to_string(),
            }),
        }
    }
}

/// Post-spike reset policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMethod {
    /// Reset to the membrane potential held before the spike; it becomes the new baseline
    ToVm,
    /// Reset to the reset potential on the tick after the spike
    #[default]
    Onset,
    /// Reset to the reset potential once the refractory period is over
    After,
}

impl FromStr for ResetMethod {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOVM" => Ok(ResetMethod::ToVm),
            "ONSET" => Ok(ResetMethod::Onset),
            "AFTER" => Ok(ResetMethod::After),
            other => Err(NeuralError::UnknownVariant {
                kind: "reset method",
                name: other.to_string(),
            }),
        }
    }
}

/// Saturation of the summed after-hyperpolarization conductance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AhpSaturationModel {
    #[default]
    Clip,
    /// `g_max × tanh(g / g_max)`
    Sigmoid,
}

impl FromStr for AhpSaturationModel {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIP" => Ok(AhpSaturationModel::Clip),
            "SIGMOID" => Ok(AhpSaturationModel::Sigmoid),
            other => Err(NeuralError::UnknownVariant {
                kind: "AHP saturation model",
                name: other.to_string(),
            }),
        }
    }
}

/// Saturation of the summed after-depolarization conductance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdpSaturationModel {
    #[default]
    Clip,
    /// No clipping; saturation comes only from resource depletion
    Resource,
}

impl FromStr for AdpSaturationModel {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIP" => Ok(AdpSaturationModel::Clip),
            "RESOURCE" => Ok(AdpSaturationModel::Resource),
            other => Err(NeuralError::UnknownVariant {
                kind: "ADP saturation model",
                name: other.to_string(),
            }),
        }
    }
}

/// LIFC model parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LIFCNeuronParams {
    pub resting_potential_mv: f64,
    pub reset_potential_mv: f64,
    pub spike_threshold_mv: f64,
    pub membrane_resistance_mohm: f64,
    pub membrane_capacitance_pf: f64,
    pub refractory_period_ms: f64,

    /// Fraction removed from the threshold decay state `h` per spike
    pub adaptive_threshold_diff_per_spike: f64,
    /// Threshold elevation when `h` is fully depleted (mV)
    pub adaptive_threshold_diff_potential_mv: f64,
    pub tau_h_ms: f64,
    pub adaptive_threshold_floor_delta_per_spike_mv: f64,
    pub tau_floor_decay_ms: f64,

    pub ahp_amplitude_ns: f64,
    pub ahp_decay_ms: f64,
    pub ahp_reversal_potential_mv: f64,
    /// Saturation ceiling; `<= 0` disables saturation
    pub ahp_max_ns: f64,
    pub ahp_saturation_model: AhpSaturationModel,

    pub adp_amplitude_ns: f64,
    pub adp_rise_ms: f64,
    pub adp_decay_ms: f64,
    pub adp_reversal_potential_mv: f64,
    pub adp_max_ns: f64,
    /// Fraction of the ADP resource consumed per spike
    pub adp_depletion: f64,
    pub adp_recovery_ms: f64,
    pub adp_saturation_model: AdpSaturationModel,

    /// Spontaneous firing is suppressed while fatigue ≥ this; `<= 0` disables the cap
    pub fatigue_threshold: f64,
    pub fatigue_recovery_ms: f64,

    /// Mean spontaneous inter-spike interval; `<= 0` disables spontaneous activity
    pub spontaneous_isi_mean_ms: f64,
    pub spontaneous_isi_stdev_ms: f64,

    pub update_method: UpdateMethod,
    pub reset_method: ResetMethod,
}

impl Default for LIFCNeuronParams {
    fn default() -> Self {
        Self {
            resting_potential_mv: -60.0,
            reset_potential_mv: -70.0,
            spike_threshold_mv: -50.0,
            membrane_resistance_mohm: 100.0,
            membrane_capacitance_pf: 100.0,
            refractory_period_ms: 2.0,

            adaptive_threshold_diff_per_spike: 0.0,
            adaptive_threshold_diff_potential_mv: 0.0,
            tau_h_ms: 100.0,
            adaptive_threshold_floor_delta_per_spike_mv: 0.0,
            tau_floor_decay_ms: 1000.0,

            ahp_amplitude_ns: 0.0,
            ahp_decay_ms: 30.0,
            ahp_reversal_potential_mv: -90.0,
            ahp_max_ns: 0.0,
            ahp_saturation_model: AhpSaturationModel::Clip,

            adp_amplitude_ns: 0.0,
            adp_rise_ms: 2.0,
            adp_decay_ms: 20.0,
            adp_reversal_potential_mv: -20.0,
            adp_max_ns: 0.0,
            adp_depletion: 0.0,
            adp_recovery_ms: 100.0,
            adp_saturation_model: AdpSaturationModel::Clip,

            fatigue_threshold: 0.0,
            fatigue_recovery_ms: 1000.0,

            spontaneous_isi_mean_ms: 0.0,
            spontaneous_isi_stdev_ms: 0.0,

            update_method: UpdateMethod::Classical,
            reset_method: ResetMethod::Onset,
        }
    }
}

impl LIFCNeuronParams {
    pub fn validate(&self) -> NeuralResult<()> {
        require_finite("RestingPotential_mV", self.resting_potential_mv)?;
        require_finite("ResetPotential_mV", self.reset_potential_mv)?;
        require_finite("SpikeThreshold_mV", self.spike_threshold_mv)?;
        require_positive("MembraneResistance_MOhm", self.membrane_resistance_mohm)?;
        require_positive("MembraneCapacitance_pF", self.membrane_capacitance_pf)?;
        require_non_negative("RefractoryPeriod_ms", self.refractory_period_ms)?;

        require_non_negative(
            "AdaptiveThresholdDiffPerSpike",
            self.adaptive_threshold_diff_per_spike,
        )?;
        require_finite(
            "AdaptiveThresholdDiffPotential_mV",
            self.adaptive_threshold_diff_potential_mv,
        )?;
        require_non_negative("AdaptiveThresholdRecoveryTime_ms", self.tau_h_ms)?;
        require_finite(
            "AdaptiveThresholdFloorDeltaPerSpike_mV",
            self.adaptive_threshold_floor_delta_per_spike_mv,
        )?;
        require_non_negative("AdaptiveThresholdFloorRecoveryTime_ms", self.tau_floor_decay_ms)?;

        require_non_negative("AfterHyperpolarizationAmplitude_nS", self.ahp_amplitude_ns)?;
        require_positive("AfterHyperpolarizationDecay_ms", self.ahp_decay_ms)?;
        require_finite(
            "AfterHyperpolarizationReversalPotential_mV",
            self.ahp_reversal_potential_mv,
        )?;
        require_finite("AfterHyperpolarizationMax_nS", self.ahp_max_ns)?;

        require_non_negative("AfterDepolarizationAmplitude_nS", self.adp_amplitude_ns)?;
        require_non_negative("AfterDepolarizationRise_ms", self.adp_rise_ms)?;
        require_positive("AfterDepolarizationDecay_ms", self.adp_decay_ms)?;
        require_finite(
            "AfterDepolarizationReversalPotential_mV",
            self.adp_reversal_potential_mv,
        )?;
        require_finite("AfterDepolarizationMax_nS", self.adp_max_ns)?;
        require_non_negative("AfterDepolarizationDepletion", self.adp_depletion)?;
        require_non_negative("AfterDepolarizationRecoveryTime_ms", self.adp_recovery_ms)?;

        require_finite("FatigueThreshold", self.fatigue_threshold)?;
        require_non_negative("FatigueRecoveryTime_ms", self.fatigue_recovery_ms)?;

        require_finite("SpontaneousActivityMean_ms", self.spontaneous_isi_mean_ms)?;
        require_non_negative("SpontaneousActivityStDev_ms", self.spontaneous_isi_stdev_ms)?;
        Ok(())
    }

    /// Leak conductance 1/R_m in nS
    pub fn leak_conductance_ns(&self) -> f64 {
        1000.0 / self.membrane_resistance_mohm
    }
}

/// `(1 − exp(−dt/τ))`, the fraction of the distance to a target covered in
/// one tick; `τ == 0` means instantaneous.
#[inline]
fn relax_fraction(dt_ms: f64, tau_ms: f64) -> f64 {
    if tau_ms > 0.0 {
        1.0 - (-dt_ms / tau_ms).exp()
    } else {
        1.0
    }
}

/// LIFC neuron with its inbound receptor data
#[derive(Debug, Clone)]
pub struct LIFCNeuron {
    core: NeuronCore,
    params: LIFCNeuronParams,
    receptors: Vec<LIFCReceptorData>,
    receptor_keys: Vec<ReceptorKey>,
    adp_kernel: DoubleExponential,
    spontaneous_isi: Option<Normal<f64>>,
    seed: u64,
    rng: StdRng,

    vm_mv: f64,
    reset_baseline_mv: f64,
    last_spike_ms: Option<f64>,
    pending_onset_reset: bool,
    pending_after_reset: bool,
    threshold_h: f64,
    threshold_floor_mv: f64,
    g_syn_ns: f64,
    g_ahp_ns: f64,
    g_adp_ns: f64,
    adp_resource: f64,
    /// Own spike times still inside the AHP support
    ahp_events_ms: Vec<f64>,
    /// Own spike times and the ADP resource available at each
    adp_events: Vec<(f64, f64)>,
    fatigue: f64,
    next_spontaneous_ms: Option<f64>,
    injected_current_pa: f64,
}

impl LIFCNeuron {
    /// Build a neuron; `seed` drives its private random stream.
    pub fn new(core: NeuronCore, params: LIFCNeuronParams, seed: u64) -> NeuralResult<Self> {
        params.validate()?;
        let adp_kernel = DoubleExponential::new(params.adp_rise_ms, params.adp_decay_ms)?;
        let spontaneous_isi = if params.spontaneous_isi_mean_ms > 0.0 {
            Some(
                Normal::new(params.spontaneous_isi_mean_ms, params.spontaneous_isi_stdev_ms)
                    .map_err(|e| {
                        NeuralError::invalid("SpontaneousActivityStDev_ms", e.to_string())
                    })?,
            )
        } else {
            None
        };

        let mut neuron = Self {
            core,
            vm_mv: params.resting_potential_mv,
            reset_baseline_mv: params.reset_potential_mv,
            params,
            receptors: Vec::new(),
            receptor_keys: Vec::new(),
            adp_kernel,
            spontaneous_isi,
            seed,
            rng: StdRng::seed_from_u64(seed),
            last_spike_ms: None,
            pending_onset_reset: false,
            pending_after_reset: false,
            threshold_h: 1.0,
            threshold_floor_mv: 0.0,
            g_syn_ns: 0.0,
            g_ahp_ns: 0.0,
            g_adp_ns: 0.0,
            adp_resource: 1.0,
            ahp_events_ms: Vec::new(),
            adp_events: Vec::new(),
            fatigue: 0.0,
            next_spontaneous_ms: None,
            injected_current_pa: 0.0,
        };
        neuron.next_spontaneous_ms = neuron.draw_spontaneous_isi();
        Ok(neuron)
    }

    pub fn params(&self) -> &LIFCNeuronParams {
        &self.params
    }

    pub fn receptors(&self) -> &[LIFCReceptorData] {
        &self.receptors
    }

    /// Current adaptive threshold (mV)
    pub fn threshold_mv(&self) -> f64 {
        self.params.spike_threshold_mv
            + self.threshold_floor_mv
            + self.params.adaptive_threshold_diff_potential_mv * (1.0 - self.threshold_h)
    }

    pub fn synaptic_conductance_ns(&self) -> f64 {
        self.g_syn_ns
    }

    pub fn ahp_conductance_ns(&self) -> f64 {
        self.g_ahp_ns
    }

    pub fn adp_conductance_ns(&self) -> f64 {
        self.g_adp_ns
    }

    pub fn adp_resource(&self) -> f64 {
        self.adp_resource
    }

    pub fn fatigue(&self) -> f64 {
        self.fatigue
    }

    pub fn last_spike_ms(&self) -> Option<f64> {
        self.last_spike_ms
    }

    fn receptor_key(source: NeuronId, receptor: &LIFCReceptor) -> ReceptorKey {
        ReceptorKey {
            source: source.0,
            reversal_bits: receptor.reversal_potential_mv.to_bits(),
            voltage_gated: receptor.voltage_gated,
        }
    }

    /// False when `receptor` would join a record whose aggregate is already
    /// frozen; such a receptor could never contribute.
    pub fn accepts_receptor(&self, source: NeuronId, receptor: &LIFCReceptor) -> bool {
        let key = Self::receptor_key(source, receptor);
        self.receptor_keys
            .iter()
            .position(|k| *k == key)
            .map_or(true, |idx| !self.receptors[idx].is_aggregated())
    }

    /// Add `receptor` to the record for `(source, receptor class)`, creating it if needed.
    pub fn attach_receptor(
        &mut self,
        source: NeuronId,
        source_spikes: SpikeHistory,
        receptor: &Arc<LIFCReceptor>,
    ) {
        let key = Self::receptor_key(source, receptor);
        let idx = match self.receptor_keys.iter().position(|k| *k == key) {
            Some(idx) => idx,
            None => {
                self.receptor_keys.push(key);
                self.receptors.push(LIFCReceptorData::new(source, source_spikes));
                self.receptors.len() - 1
            }
        };
        self.receptors[idx].add_receptor(receptor);
    }

    /// Aggregate every pending receptor record; returns the number of usable records.
    pub fn finalize_receptors(&mut self) -> usize {
        self.receptors
            .iter_mut()
            .map(|r| r.ensure_aggregated())
            .filter(|ok| *ok)
            .count()
    }

    fn draw_spontaneous_isi(&mut self) -> Option<f64> {
        let normal = self.spontaneous_isi?;
        Some(normal.sample(&mut self.rng).max(TIME_EPSILON_MS))
    }

    fn in_refractory(&self, t_ms: f64) -> bool {
        self.last_spike_ms
            .is_some_and(|s| t_ms < s + self.params.refractory_period_ms - TIME_EPSILON_MS)
    }

    fn reset_target_mv(&self) -> f64 {
        match self.params.reset_method {
            ResetMethod::ToVm => self.reset_baseline_mv,
            ResetMethod::Onset | ResetMethod::After => self.params.reset_potential_mv,
        }
    }

    // Step 1
    fn update_conductances(&mut self, t_ms: f64) {
        let v = self.vm_mv;
        let last_post = self.last_spike_ms;
        self.g_syn_ns = 0.0;
        for r in &mut self.receptors {
            self.g_syn_ns += r.update_conductance(t_ms, v, last_post);
        }

        let p = &self.params;
        let ahp_support = 10.0 * p.ahp_decay_ms;
        self.ahp_events_ms.retain(|&s| t_ms - s <= ahp_support);
        let ahp_sum: f64 = self
            .ahp_events_ms
            .iter()
            .map(|&s| p.ahp_amplitude_ns * (-(t_ms - s) / p.ahp_decay_ms).exp())
            .sum();
        self.g_ahp_ns = if p.ahp_max_ns > 0.0 {
            match p.ahp_saturation_model {
                AhpSaturationModel::Clip => ahp_sum.min(p.ahp_max_ns),
                AhpSaturationModel::Sigmoid => p.ahp_max_ns * (ahp_sum / p.ahp_max_ns).tanh(),
            }
        } else {
            ahp_sum
        };

        let adp_support = self.adp_kernel.support_ms();
        self.adp_events.retain(|&(s, _)| t_ms - s <= adp_support);
        let kernel = self.adp_kernel;
        let adp_sum: f64 = self
            .adp_events
            .iter()
            .map(|&(s, resource)| p.adp_amplitude_ns * resource * kernel.value(t_ms - s))
            .sum();
        self.g_adp_ns = match p.adp_saturation_model {
            AdpSaturationModel::Clip if p.adp_max_ns > 0.0 => adp_sum.min(p.adp_max_ns),
            AdpSaturationModel::Clip | AdpSaturationModel::Resource => adp_sum,
        };
    }

    /// Sum of `g × E` over every conductance except the leak, and the summed conductance
    fn driving_terms(&self) -> (f64, f64) {
        let mut g_total = self.g_ahp_ns + self.g_adp_ns;
        let mut ge_total = self.g_ahp_ns * self.params.ahp_reversal_potential_mv
            + self.g_adp_ns * self.params.adp_reversal_potential_mv;
        for r in &self.receptors {
            g_total += r.conductance_ns();
            ge_total += r.conductance_ns() * r.reversal_potential_mv();
        }
        (g_total, ge_total)
    }

    fn forward_euler(&self, v: f64, dt_ms: f64) -> f64 {
        let p = &self.params;
        let (g, ge) = self.driving_terms();
        let i_leak = p.leak_conductance_ns() * (v - p.resting_potential_mv);
        let i_cond = g * v - ge;
        v + dt_ms * (-i_leak - i_cond + self.injected_current_pa) / p.membrane_capacitance_pf
    }

    // Step 2
    fn integrate_membrane(&mut self, t_ms: f64, dt_ms: f64) {
        let p = &self.params;
        let v = self.vm_mv;
        self.vm_mv = match p.update_method {
            UpdateMethod::Classical => {
                if self.in_refractory(t_ms) {
                    match p.reset_method {
                        ResetMethod::After => v,
                        ResetMethod::ToVm | ResetMethod::Onset => self.reset_target_mv(),
                    }
                } else {
                    self.forward_euler(v, dt_ms)
                }
            }
            UpdateMethod::ForwardEuler => self.forward_euler(v, dt_ms),
            UpdateMethod::ExpEulerRm => {
                let (g, ge) = self.driving_terms();
                let g_l = p.leak_conductance_ns();
                let g_total = g_l + g;
                let v_inf =
                    (g_l * p.resting_potential_mv + ge + self.injected_current_pa) / g_total;
                let tau = p.membrane_capacitance_pf / g_total;
                v_inf + (v - v_inf) * (-dt_ms / tau).exp()
            }
            UpdateMethod::ExpEulerCm => {
                let (g, ge) = self.driving_terms();
                let g_l = p.leak_conductance_ns();
                let i_cond = g * v - ge;
                let v_inf = p.resting_potential_mv + (self.injected_current_pa - i_cond) / g_l;
                let tau = p.membrane_capacitance_pf / g_l;
                v_inf + (v - v_inf) * (-dt_ms / tau).exp()
            }
        };
    }

    // Step 3
    fn recover(&mut self, dt_ms: f64) {
        let p = &self.params;
        self.threshold_h += (1.0 - self.threshold_h) * relax_fraction(dt_ms, p.tau_h_ms);
        self.threshold_floor_mv -=
            self.threshold_floor_mv * relax_fraction(dt_ms, p.tau_floor_decay_ms);
        self.adp_resource += (1.0 - self.adp_resource) * relax_fraction(dt_ms, p.adp_recovery_ms);
        self.fatigue -= self.fatigue * relax_fraction(dt_ms, p.fatigue_recovery_ms);
    }

    fn fatigue_capped(&self) -> bool {
        self.params.fatigue_threshold > 0.0 && self.fatigue >= self.params.fatigue_threshold
    }

    /// True when a spontaneous spike is due and allowed at `t_ms`; schedules the next draw.
    fn spontaneous_fires(&mut self, t_ms: f64) -> bool {
        let Some(next) = self.next_spontaneous_ms else {
            return false;
        };
        if t_ms + TIME_EPSILON_MS < next {
            return false;
        }
        self.next_spontaneous_ms = self.draw_spontaneous_isi().map(|isi| t_ms + isi);
        !self.fatigue_capped()
    }

    // Step 5
    fn fire(&mut self, t_ms: f64, v_pre_mv: f64) {
        self.last_spike_ms = Some(t_ms);
        match self.params.reset_method {
            ResetMethod::ToVm => {
                self.reset_baseline_mv = v_pre_mv;
                self.vm_mv = v_pre_mv;
            }
            ResetMethod::Onset => self.pending_onset_reset = true,
            ResetMethod::After => self.pending_after_reset = true,
        }

        self.core.record_spike(t_ms);

        let p = &self.params;
        self.threshold_h = (self.threshold_h - p.adaptive_threshold_diff_per_spike).max(0.0);
        self.threshold_floor_mv += p.adaptive_threshold_floor_delta_per_spike_mv;

        if p.ahp_amplitude_ns > 0.0 {
            self.ahp_events_ms.push(t_ms);
        }
        if p.adp_amplitude_ns > 0.0 {
            self.adp_events.push((t_ms, self.adp_resource));
        }
        self.adp_resource = (self.adp_resource - p.adp_depletion).max(0.0);
        self.fatigue += 1.0;

        for r in &mut self.receptors {
            r.on_post_spike(t_ms);
        }
    }
}

impl SpikingNeuron for LIFCNeuron {
    fn core(&self) -> &NeuronCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NeuronCore {
        &mut self.core
    }

    fn update(&mut self, t_ms: f64, dt_ms: f64) -> bool {
        if self.pending_onset_reset {
            self.vm_mv = self.params.reset_potential_mv;
            self.pending_onset_reset = false;
        }
        if self.pending_after_reset && !self.in_refractory(t_ms) {
            self.vm_mv = self.params.reset_potential_mv;
            self.pending_after_reset = false;
        }
        let v_pre = self.vm_mv;

        self.update_conductances(t_ms);
        self.integrate_membrane(t_ms, dt_ms);
        self.recover(dt_ms);

        let refractory = self.in_refractory(t_ms);
        let fires = self.core.consume_direct_stim(t_ms)
            || (!refractory && self.spontaneous_fires(t_ms))
            || (!refractory && self.vm_mv >= self.threshold_mv());

        if fires {
            self.fire(t_ms, v_pre);
        }
        fires
    }

    fn spike(&mut self, t_ms: f64) {
        let v = self.vm_mv;
        self.fire(t_ms, v);
    }

    fn membrane_potential_mv(&self) -> f64 {
        self.vm_mv
    }

    fn set_injected_current_pa(&mut self, current_pa: f64) {
        self.injected_current_pa = current_pa;
    }

    fn connectome_targets(&self) -> Vec<ConnectomeTarget> {
        self.receptors
            .iter()
            .map(|r| ConnectomeTarget {
                source_neuron: r.source_neuron(),
                receptor_ids: r.receptor_ids().to_vec(),
                weight: r.weight(),
                conductance_ns: r.conductance_ns(),
            })
            .collect()
    }

    fn reset_dynamics(&mut self) {
        self.core.reset();
        self.receptors.clear();
        self.receptor_keys.clear();
        self.rng = StdRng::seed_from_u64(self.seed);
        self.vm_mv = self.params.resting_potential_mv;
        self.reset_baseline_mv = self.params.reset_potential_mv;
        self.last_spike_ms = None;
        self.pending_onset_reset = false;
        self.pending_after_reset = false;
        self.threshold_h = 1.0;
        self.threshold_floor_mv = 0.0;
        self.g_syn_ns = 0.0;
        self.g_ahp_ns = 0.0;
        self.g_adp_ns = 0.0;
        self.adp_resource = 1.0;
        self.ahp_events_ms.clear();
        self.adp_events.clear();
        self.fatigue = 0.0;
        self.injected_current_pa = 0.0;
        self.next_spontaneous_ms = self.draw_spontaneous_isi();
    }
}
