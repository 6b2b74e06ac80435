// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Neuron Model Architecture
//!
//! The set of neuron models is closed: [`Neuron`] is an enum over
//! {BS, SC, LIFC} and every operation is an exhaustive `match`. Each variant
//! implements the [`SpikingNeuron`] capability trait, and the enum implements
//! it too by delegation, so callers never care which model they hold.
//!
//! ## Adding a New Neuron Model
//!
//! 1. Create `src/models/your_model.rs`
//! 2. Implement `SpikingNeuron`
//! 3. Add a `Neuron` variant and extend every `match` in this file

pub mod compartment;
pub mod lifc;
pub mod passive;

use std::sync::Arc;

use serde::Serialize;

use crate::synapse::{LIFCReceptor, Neurotransmitter, Receptor};
use crate::types::{NeuralResult, NeuronId, ReceptorId, SpikeHistory, Vec3D, TIME_EPSILON_MS};

pub use compartment::{BSCompartment, Compartment, LIFCCompartment};
pub use lifc::{
    AdpSaturationModel, AhpSaturationModel, LIFCNeuron, LIFCNeuronParams, ResetMethod,
    UpdateMethod,
};
pub use passive::{BSNeuron, PassiveSomaParams, SCNeuron};

/// Neurotransmitter class of a neuron's outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum NeuronType {
    #[default]
    Unknown,
    Excitatory,
    Inhibitory,
}

impl NeuronType {
    pub fn from_neurotransmitter(nt: Neurotransmitter) -> Self {
        if nt.is_inhibitory() {
            NeuronType::Inhibitory
        } else {
            NeuronType::Excitatory
        }
    }
}

/// One inbound connection as reported by [`SpikingNeuron::connectome_targets`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectomeTarget {
    #[serde(rename = "SourceNeuronID")]
    pub source_neuron: NeuronId,
    #[serde(rename = "ReceptorIDs")]
    pub receptor_ids: Vec<ReceptorId>,
    pub weight: f64,
    #[serde(rename = "Conductance_nS")]
    pub conductance_ns: f64,
}

/// Fields shared by every neuron model
#[derive(Debug, Clone)]
pub struct NeuronCore {
    id: NeuronId,
    name: String,
    t_act: SpikeHistory,
    direct_stim_ms: Vec<f64>,
    direct_stim_cursor: usize,
    neuron_type: NeuronType,
    opto_tagged: bool,
    center_um: Vec3D,
}

impl NeuronCore {
    pub fn new(id: NeuronId, name: impl Into<String>, center_um: Vec3D) -> Self {
        Self {
            id,
            name: name.into(),
            t_act: SpikeHistory::new(),
            direct_stim_ms: Vec::new(),
            direct_stim_cursor: 0,
            neuron_type: NeuronType::Unknown,
            opto_tagged: false,
            center_um,
        }
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to this neuron's spike times
    pub fn spike_history(&self) -> &SpikeHistory {
        &self.t_act
    }

    pub fn spike_times(&self) -> Vec<f64> {
        self.t_act.snapshot()
    }

    pub(crate) fn record_spike(&self, t_ms: f64) {
        self.t_act.push(t_ms);
    }

    /// Queue a forced spike. Returns `false` if `t_ms` is earlier than a
    /// stimulation time that has already been delivered.
    pub fn add_direct_stim(&mut self, t_ms: f64) -> bool {
        let pos = self.direct_stim_ms.partition_point(|&s| s <= t_ms);
        if pos < self.direct_stim_cursor {
            return false;
        }
        self.direct_stim_ms.insert(pos, t_ms);
        true
    }

    /// True if one or more forced spike times are due at `t_ms`
    pub(crate) fn consume_direct_stim(&mut self, t_ms: f64) -> bool {
        let mut due = false;
        while self.direct_stim_cursor < self.direct_stim_ms.len()
            && self.direct_stim_ms[self.direct_stim_cursor] <= t_ms + TIME_EPSILON_MS
        {
            self.direct_stim_cursor += 1;
            due = true;
        }
        due
    }

    pub fn direct_stim_times(&self) -> &[f64] {
        &self.direct_stim_ms
    }

    pub fn neuron_type(&self) -> NeuronType {
        self.neuron_type
    }

    /// Set the neurotransmitter class; only the first Unknown→known transition sticks.
    pub fn set_type_once(&mut self, neuron_type: NeuronType) -> bool {
        if self.neuron_type == NeuronType::Unknown && neuron_type != NeuronType::Unknown {
            self.neuron_type = neuron_type;
            return true;
        }
        false
    }

    pub fn opto_tagged(&self) -> bool {
        self.opto_tagged
    }

    pub fn set_opto_tagged(&mut self, tagged: bool) {
        self.opto_tagged = tagged;
    }

    pub fn center_um(&self) -> Vec3D {
        self.center_um
    }

    /// Return to the pre-run state; stimulation times are kept, spikes are dropped.
    pub(crate) fn reset(&mut self) {
        self.t_act.clear();
        self.direct_stim_cursor = 0;
    }
}

/// Capability set of every neuron model
pub trait SpikingNeuron {
    fn core(&self) -> &NeuronCore;

    fn core_mut(&mut self) -> &mut NeuronCore;

    /// Advance one tick of length `dt_ms` at time `t_ms`.
    ///
    /// Returns `true` if the neuron spiked during this tick.
    fn update(&mut self, t_ms: f64, dt_ms: f64) -> bool;

    /// Emit a spike at `t_ms` with all of the model's side effects.
    fn spike(&mut self, t_ms: f64);

    fn membrane_potential_mv(&self) -> f64;

    /// Constant current injected by a patch-clamp DAC (pA)
    fn set_injected_current_pa(&mut self, current_pa: f64);

    /// Inbound connections with their current weights
    fn connectome_targets(&self) -> Vec<ConnectomeTarget>;

    /// Return all dynamic state to its initial value and drop inbound connections.
    fn reset_dynamics(&mut self);

    fn cell_center(&self) -> Vec3D {
        self.core().center_um()
    }

    fn add_specific_ap_time(&mut self, t_ms: f64) -> bool {
        self.core_mut().add_direct_stim(t_ms)
    }
}

/// Closed set of neuron models
#[derive(Debug, Clone)]
pub enum Neuron {
    BS(BSNeuron),
    SC(SCNeuron),
    LIFC(LIFCNeuron),
}

impl Neuron {
    pub fn id(&self) -> NeuronId {
        self.core().id()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Neuron::BS(_) => "BS",
            Neuron::SC(_) => "SC",
            Neuron::LIFC(_) => "LIFC",
        }
    }

    pub fn spike_history(&self) -> &SpikeHistory {
        self.core().spike_history()
    }

    /// Wire an LIFC receptor into this neuron. Returns `false` for non-LIFC neurons.
    pub fn attach_lifc_receptor(
        &mut self,
        source: NeuronId,
        source_spikes: SpikeHistory,
        receptor: &Arc<LIFCReceptor>,
    ) -> bool {
        match self {
            Neuron::LIFC(n) => {
                n.attach_receptor(source, source_spikes, receptor);
                true
            }
            Neuron::BS(_) | Neuron::SC(_) => false,
        }
    }

    /// Whether an LIFC receptor from `source` can still be wired into this
    /// neuron. Always true for models without aggregated receptor records.
    pub fn accepts_lifc_receptor(&self, source: NeuronId, receptor: &LIFCReceptor) -> bool {
        match self {
            Neuron::LIFC(n) => n.accepts_receptor(source, receptor),
            Neuron::BS(_) | Neuron::SC(_) => true,
        }
    }

    /// Wire a basic receptor into this neuron. Returns `Ok(false)` for LIFC neurons.
    pub fn attach_basic_receptor(
        &mut self,
        source: NeuronId,
        source_spikes: SpikeHistory,
        receptor: &Arc<Receptor>,
    ) -> NeuralResult<bool> {
        match self {
            Neuron::BS(n) => n.attach_receptor(source, source_spikes, receptor).map(|_| true),
            Neuron::SC(n) => n.attach_receptor(source, source_spikes, receptor).map(|_| true),
            Neuron::LIFC(_) => Ok(false),
        }
    }

    /// Compute receptor aggregates that are still pending. Returns how many
    /// inbound connections are usable.
    pub fn finalize_receptors(&mut self) -> usize {
        match self {
            Neuron::LIFC(n) => n.finalize_receptors(),
            Neuron::BS(n) => n.receptor_count(),
            Neuron::SC(n) => n.receptor_count(),
        }
    }
}

impl SpikingNeuron for Neuron {
    fn core(&self) -> &NeuronCore {
        match self {
            Neuron::BS(n) => n.core(),
            Neuron::SC(n) => n.core(),
            Neuron::LIFC(n) => n.core(),
        }
    }

    fn core_mut(&mut self) -> &mut NeuronCore {
        match self {
            Neuron::BS(n) => n.core_mut(),
            Neuron::SC(n) => n.core_mut(),
            Neuron::LIFC(n) => n.core_mut(),
        }
    }

    fn update(&mut self, t_ms: f64, dt_ms: f64) -> bool {
        match self {
            Neuron::BS(n) => n.update(t_ms, dt_ms),
            Neuron::SC(n) => n.update(t_ms, dt_ms),
            Neuron::LIFC(n) => n.update(t_ms, dt_ms),
        }
    }

    fn spike(&mut self, t_ms: f64) {
        match self {
            Neuron::BS(n) => n.spike(t_ms),
            Neuron::SC(n) => n.spike(t_ms),
            Neuron::LIFC(n) => n.spike(t_ms),
        }
    }

    fn membrane_potential_mv(&self) -> f64 {
        match self {
            Neuron::BS(n) => n.membrane_potential_mv(),
            Neuron::SC(n) => n.membrane_potential_mv(),
            Neuron::LIFC(n) => n.membrane_potential_mv(),
        }
    }

    fn set_injected_current_pa(&mut self, current_pa: f64) {
        match self {
            Neuron::BS(n) => n.set_injected_current_pa(current_pa),
            Neuron::SC(n) => n.set_injected_current_pa(current_pa),
            Neuron::LIFC(n) => n.set_injected_current_pa(current_pa),
        }
    }

    fn connectome_targets(&self) -> Vec<ConnectomeTarget> {
        match self {
            Neuron::BS(n) => n.connectome_targets(),
            Neuron::SC(n) => n.connectome_targets(),
            Neuron::LIFC(n) => n.connectome_targets(),
        }
    }

    fn reset_dynamics(&mut self) {
        match self {
            Neuron::BS(n) => n.reset_dynamics(),
            Neuron::SC(n) => n.reset_dynamics(),
            Neuron::LIFC(n) => n.reset_dynamics(),
        }
    }

    fn cell_center(&self) -> Vec3D {
        match self {
            Neuron::BS(n) => n.cell_center(),
            Neuron::SC(n) => n.cell_center(),
            Neuron::LIFC(n) => n.cell_center(),
        }
    }

    fn add_specific_ap_time(&mut self, t_ms: f64) -> bool {
        match self {
            Neuron::BS(n) => n.add_specific_ap_time(t_ms),
            Neuron::SC(n) => n.add_specific_ap_time(t_ms),
            Neuron::LIFC(n) => n.add_specific_ap_time(t_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_is_set_at_most_once() {
        let mut core = NeuronCore::new(NeuronId(0), "n", Vec3D::default());
        assert!(!core.set_type_once(NeuronType::Unknown));
        assert!(core.set_type_once(NeuronType::Inhibitory));
        assert!(!core.set_type_once(NeuronType::Excitatory));
        assert_eq!(core.neuron_type(), NeuronType::Inhibitory);
    }

    #[test]
    fn test_direct_stim_is_sorted_and_consumed_once() {
        let mut core = NeuronCore::new(NeuronId(0), "n", Vec3D::default());
        assert!(core.add_direct_stim(5.0));
        assert!(core.add_direct_stim(1.0));
        assert_eq!(core.direct_stim_times(), &[1.0, 5.0]);

        assert!(!core.consume_direct_stim(0.5));
        assert!(core.consume_direct_stim(1.0));
        assert!(!core.consume_direct_stim(1.1));
        // Already delivered window
        assert!(!core.add_direct_stim(0.2));
        assert!(core.consume_direct_stim(5.0));

        core.reset();
        assert!(core.consume_direct_stim(1.0));
    }
}
