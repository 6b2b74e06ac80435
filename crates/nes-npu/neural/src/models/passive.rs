// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Passive ball-and-stick (BS) and staple-cell (SC) neurons
//!
//! ```text
//! V(t) = V_rest + (V_0 − V_rest)·e^(−t/τ)
//!      + Σ PSP_k(t)
//!      − A_AHP·e^(−(t − t_spike)/τ)
//!      + I_inj·R_in / 1000
//! ```
//!
//! Spikes on direct stimulation, or when `V ≥ V_th` outside the absolute
//! refractory period.

use std::sync::Arc;

use super::{ConnectomeTarget, NeuronCore, SpikingNeuron};
use crate::synapse::{BasicReceptorData, Receptor};
use crate::types::error::{require_finite, require_non_negative, require_positive};
use crate::types::{CompartmentId, NeuralResult, NeuronId, SpikeHistory, TIME_EPSILON_MS};

/// Fixed input resistance of passive somas (MΩ)
pub const PASSIVE_INPUT_RESISTANCE_MOHM: f64 = 100.0;

/// Absolute refractory period of passive neurons (ms)
pub const PASSIVE_REFRACTORY_MS: f64 = 2.0;

/// Membrane parameters of a passive soma compartment
#[derive(Debug, Clone, PartialEq)]
pub struct PassiveSomaParams {
    /// Initial membrane potential
    pub membrane_potential_mv: f64,
    pub spike_threshold_mv: f64,
    pub decay_time_ms: f64,
    pub resting_potential_mv: f64,
    pub ahp_amplitude_mv: f64,
}

impl Default for PassiveSomaParams {
    fn default() -> Self {
        Self {
            membrane_potential_mv: -60.0,
            spike_threshold_mv: -50.0,
            decay_time_ms: 30.0,
            resting_potential_mv: -60.0,
            ahp_amplitude_mv: 0.0,
        }
    }
}

impl PassiveSomaParams {
    pub fn validate(&self) -> NeuralResult<()> {
        require_finite("MembranePotential_mV", self.membrane_potential_mv)?;
        require_finite("SpikeThreshold_mV", self.spike_threshold_mv)?;
        require_positive("DecayTime_ms", self.decay_time_ms)?;
        require_finite("RestingPotential_mV", self.resting_potential_mv)?;
        require_non_negative("AfterHyperpolarizationAmplitude_mV", self.ahp_amplitude_mv)
    }
}

#[derive(Debug, Clone)]
struct PassiveDynamics {
    params: PassiveSomaParams,
    receptors: Vec<BasicReceptorData>,
    vm_mv: f64,
    last_spike_ms: Option<f64>,
    injected_current_pa: f64,
}

impl PassiveDynamics {
    fn new(params: PassiveSomaParams) -> NeuralResult<Self> {
        params.validate()?;
        Ok(Self {
            vm_mv: params.membrane_potential_mv,
            params,
            receptors: Vec::new(),
            last_spike_ms: None,
            injected_current_pa: 0.0,
        })
    }

    fn attach(
        &mut self,
        source: NeuronId,
        source_spikes: SpikeHistory,
        receptor: &Arc<Receptor>,
    ) -> NeuralResult<()> {
        self.receptors
            .push(BasicReceptorData::new(source, source_spikes, receptor)?);
        Ok(())
    }

    fn in_refractory(&self, t_ms: f64) -> bool {
        self.last_spike_ms
            .is_some_and(|s| t_ms < s + PASSIVE_REFRACTORY_MS - TIME_EPSILON_MS)
    }

    fn update(&mut self, core: &mut NeuronCore, t_ms: f64) -> bool {
        let p = &self.params;
        let tau = p.decay_time_ms;

        let mut v = p.resting_potential_mv
            + (p.membrane_potential_mv - p.resting_potential_mv) * (-t_ms / tau).exp();
        for r in &mut self.receptors {
            v += r.psp_mv(t_ms, p.resting_potential_mv, PASSIVE_INPUT_RESISTANCE_MOHM);
        }
        if let Some(s) = self.last_spike_ms {
            v -= p.ahp_amplitude_mv * (-(t_ms - s) / tau).exp();
        }
        v += self.injected_current_pa * PASSIVE_INPUT_RESISTANCE_MOHM / 1000.0;
        self.vm_mv = v;

        let fires = core.consume_direct_stim(t_ms)
            || (!self.in_refractory(t_ms) && self.vm_mv >= self.params.spike_threshold_mv);
        if fires {
            self.fire(core, t_ms);
        }
        fires
    }

    fn fire(&mut self, core: &NeuronCore, t_ms: f64) {
        self.last_spike_ms = Some(t_ms);
        core.record_spike(t_ms);
    }

    fn connectome_targets(&self) -> Vec<ConnectomeTarget> {
        self.receptors
            .iter()
            .filter(|r| r.is_live())
            .map(|r| ConnectomeTarget {
                source_neuron: r.source_neuron(),
                receptor_ids: vec![r.receptor_id()],
                weight: 1.0,
                conductance_ns: r.conductance_ns(),
            })
            .collect()
    }

    fn reset(&mut self) {
        self.receptors.clear();
        self.vm_mv = self.params.membrane_potential_mv;
        self.last_spike_ms = None;
        self.injected_current_pa = 0.0;
    }
}

/// Ball-and-stick neuron: one soma and one axon compartment
#[derive(Debug, Clone)]
pub struct BSNeuron {
    core: NeuronCore,
    soma: CompartmentId,
    axon: CompartmentId,
    dynamics: PassiveDynamics,
}

impl BSNeuron {
    pub fn new(
        core: NeuronCore,
        soma: CompartmentId,
        axon: CompartmentId,
        membrane: PassiveSomaParams,
    ) -> NeuralResult<Self> {
        Ok(Self {
            core,
            soma,
            axon,
            dynamics: PassiveDynamics::new(membrane)?,
        })
    }

    pub fn soma(&self) -> CompartmentId {
        self.soma
    }

    pub fn axon(&self) -> CompartmentId {
        self.axon
    }

    pub fn attach_receptor(
        &mut self,
        source: NeuronId,
        source_spikes: SpikeHistory,
        receptor: &Arc<Receptor>,
    ) -> NeuralResult<()> {
        self.dynamics.attach(source, source_spikes, receptor)
    }

    pub fn receptor_count(&self) -> usize {
        self.dynamics.receptors.len()
    }
}

/// Staple cell: sets of soma, dendrite and axon compartments
#[derive(Debug, Clone)]
pub struct SCNeuron {
    core: NeuronCore,
    somas: Vec<CompartmentId>,
    dendrites: Vec<CompartmentId>,
    axons: Vec<CompartmentId>,
    dynamics: PassiveDynamics,
}

impl SCNeuron {
    pub fn new(
        core: NeuronCore,
        somas: Vec<CompartmentId>,
        dendrites: Vec<CompartmentId>,
        axons: Vec<CompartmentId>,
        membrane: PassiveSomaParams,
    ) -> NeuralResult<Self> {
        Ok(Self {
            core,
            somas,
            dendrites,
            axons,
            dynamics: PassiveDynamics::new(membrane)?,
        })
    }

    pub fn somas(&self) -> &[CompartmentId] {
        &self.somas
    }

    pub fn dendrites(&self) -> &[CompartmentId] {
        &self.dendrites
    }

    pub fn axons(&self) -> &[CompartmentId] {
        &self.axons
    }

    pub fn attach_receptor(
        &mut self,
        source: NeuronId,
        source_spikes: SpikeHistory,
        receptor: &Arc<Receptor>,
    ) -> NeuralResult<()> {
        self.dynamics.attach(source, source_spikes, receptor)
    }

    pub fn receptor_count(&self) -> usize {
        self.dynamics.receptors.len()
    }
}

macro_rules! impl_passive_neuron {
    ($ty:ty) => {
        impl SpikingNeuron for $ty {
            fn core(&self) -> &NeuronCore {
                &self.core
            }

            fn core_mut(&mut self) -> &mut NeuronCore {
                &mut self.core
            }

            fn update(&mut self, t_ms: f64, _dt_ms: f64) -> bool {
                self.dynamics.update(&mut self.core, t_ms)
            }

            fn spike(&mut self, t_ms: f64) {
                self.dynamics.fire(&self.core, t_ms);
            }

            fn membrane_potential_mv(&self) -> f64 {
                self.dynamics.vm_mv
            }

            fn set_injected_current_pa(&mut self, current_pa: f64) {
                self.dynamics.injected_current_pa = current_pa;
            }

            fn connectome_targets(&self) -> Vec<ConnectomeTarget> {
                self.dynamics.connectome_targets()
            }

            fn reset_dynamics(&mut self) {
                self.core.reset();
                self.dynamics.reset();
            }
        }
    };
}

impl_passive_neuron!(BSNeuron);
impl_passive_neuron!(SCNeuron);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::Neurotransmitter;
    use crate::types::{ReceptorId, Vec3D};

    const DT: f64 = 0.1;

    fn bs(id: u32, membrane: PassiveSomaParams) -> BSNeuron {
        BSNeuron::new(
            NeuronCore::new(NeuronId(id), format!("bs{id}"), Vec3D::default()),
            CompartmentId(id * 2),
            CompartmentId(id * 2 + 1),
            membrane,
        )
        .unwrap()
    }

    fn receptor(g: f64, nt: Neurotransmitter) -> Arc<Receptor> {
        Arc::new(Receptor {
            id: ReceptorId(0),
            name: "r".into(),
            source_compartment: CompartmentId(1),
            destination_compartment: CompartmentId(2),
            conductance_ns: g,
            tau_rise_ms: 0.5,
            tau_decay_ms: 3.0,
            neurotransmitter: nt,
            position_um: Vec3D::default(),
        })
    }

    #[test]
    fn test_membrane_relaxes_to_rest() {
        let mut n = bs(
            0,
            PassiveSomaParams {
                membrane_potential_mv: -45.0,
                spike_threshold_mv: -40.0,
                ..Default::default()
            },
        );
        n.update(0.0, DT);
        assert!((n.membrane_potential_mv() - (-45.0)).abs() < 1e-9);
        n.update(300.0, DT);
        assert!((n.membrane_potential_mv() - (-60.0)).abs() < 1e-3);
        assert!(n.core().spike_times().is_empty());
    }

    #[test]
    fn test_injected_current_shifts_potential_and_refractory_limits_rate() {
        let mut n = bs(0, PassiveSomaParams::default());
        // 200 pA through 100 MΩ = 20 mV above rest
        n.set_injected_current_pa(200.0);
        for k in 0..100 {
            n.update(k as f64 * DT, DT);
        }
        let spikes = n.core().spike_times();
        assert_eq!(spikes.len(), 5);
        for pair in spikes.windows(2) {
            assert!(pair[1] - pair[0] >= PASSIVE_REFRACTORY_MS - 1e-9);
        }
    }

    #[test]
    fn test_excitatory_psp_drives_postsynaptic_spike() {
        let source = SpikeHistory::new();
        source.push(0.0);
        let mut n = bs(1, PassiveSomaParams::default());
        // 3 nS × 60 mV × 100 MΩ / 1000 = 18 mV peak
        n.attach_receptor(NeuronId(0), source.clone(), &receptor(3.0, Neurotransmitter::AMPA))
            .unwrap();
        assert_eq!(n.receptor_count(), 1);
        let mut fired = false;
        for k in 0..100 {
            fired |= n.update(k as f64 * DT, DT);
        }
        assert!(fired);
        assert_eq!(n.connectome_targets()[0].source_neuron, NeuronId(0));
    }

    #[test]
    fn test_inhibitory_psp_hyperpolarizes() {
        let source = SpikeHistory::new();
        source.push(0.0);
        let mut n = bs(
            1,
            PassiveSomaParams {
                resting_potential_mv: -50.0,
                membrane_potential_mv: -50.0,
                spike_threshold_mv: -30.0,
                ..Default::default()
            },
        );
        n.attach_receptor(NeuronId(0), source, &receptor(1.0, Neurotransmitter::GABA))
            .unwrap();
        let mut min_v = f64::MAX;
        for k in 0..100 {
            n.update(k as f64 * DT, DT);
            min_v = min_v.min(n.membrane_potential_mv());
        }
        assert!(min_v < -51.0);
    }

    #[test]
    fn test_direct_stim_and_reset() {
        let mut n = bs(0, PassiveSomaParams::default());
        assert!(n.add_specific_ap_time(0.5));
        for k in 0..10 {
            n.update(k as f64 * DT, DT);
        }
        assert_eq!(n.core().spike_times(), vec![0.5]);

        n.reset_dynamics();
        assert!(n.core().spike_times().is_empty());
        assert_eq!(n.receptor_count(), 0);
    }

    #[test]
    fn test_sc_neuron_exposes_compartment_sets() {
        let n = SCNeuron::new(
            NeuronCore::new(NeuronId(3), "sc", Vec3D::new(1.0, 2.0, 3.0)),
            vec![CompartmentId(0), CompartmentId(1)],
            vec![CompartmentId(2)],
            vec![CompartmentId(3)],
            PassiveSomaParams::default(),
        )
        .unwrap();
        assert_eq!(n.somas().len(), 2);
        assert_eq!(n.cell_center(), Vec3D::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_rejects_non_positive_decay() {
        let params = PassiveSomaParams {
            decay_time_ms: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
