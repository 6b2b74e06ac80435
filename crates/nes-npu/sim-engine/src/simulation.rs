// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The simulation aggregate
//!
//! A [`Simulation`] owns every entity created for it (shapes, compartments,
//! receptors, neurons, tools) in append-only vectors whose indices are the
//! entity IDs. Only its worker advances it; request handlers mutate it
//! through the busy-checked lock of [`crate::SimulationRuntime`].
//!
//! ## Tick
//!
//! ```text
//! t = tick × dt
//! 1. wire receptors created since the last tick
//! 2. DAC currents → owning neurons
//! 3. neuron.update(t, dt) for every neuron (rayon)
//! 4. ADC samples, recording
//! 5. tick += 1, publish T_ms
//! ```
//!
//! Spikes recorded during tick `k` become visible to other neurons at tick
//! `k + 1`, so the parallel update in step 3 is order independent.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use nes_npu_neural::{
    BSCompartment, BSNeuron, CompartmentId, Compartment, ConnectomeTarget, LIFCCompartment,
    LIFCNeuron, LIFCNeuronParams, LIFCReceptor, Neuron, NeuronCore, NeuronId, NeuronType,
    PassiveSomaParams, Receptor, ReceptorId, SCNeuron, Shape, ShapeId, SpikingNeuron, Vec3D,
    TIME_EPSILON_MS,
};
use nes_state_manager::{SimulationState, SimulationTask};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{EngineError, EngineResult};
use crate::recording::{Recording, RecordingSnapshot};
use crate::renderer::{RenderScene, VoxelRenderer};
use crate::tools::{PatchClampADC, PatchClampDAC};

/// Simulation ID (index into the registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(pub u32);

impl SimulationId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Simulation({})", self.0)
    }
}

/// Seed of a neuron's private random stream, derived from the simulation seed
pub fn neuron_seed(simulation_seed: u64, neuron: NeuronId) -> u64 {
    // splitmix64 finalizer
    let mut z = simulation_seed ^ (u64::from(neuron.0) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn next_id(len: usize, kind: &'static str) -> EngineResult<u32> {
    u32::try_from(len).map_err(|_| EngineError::invalid(kind, "collection is full"))
}

pub struct Simulation {
    id: SimulationId,
    name: String,
    seed: u64,
    timestep_ms: f64,
    state: Arc<SimulationState>,
    tick: u64,

    shapes: Vec<Shape>,
    compartments: Vec<Compartment>,
    receptors: Vec<Arc<Receptor>>,
    lifc_receptors: Vec<Arc<LIFCReceptor>>,
    neurons: Vec<Neuron>,
    dacs: Vec<PatchClampDAC>,
    adcs: Vec<PatchClampADC>,

    compartment_owner: AHashMap<CompartmentId, NeuronId>,
    /// Receptors not attached to their destination neuron yet
    pending_receptors: Vec<ReceptorId>,
    pending_lifc_receptors: Vec<ReceptorId>,
    recording: Option<Recording>,
    renderer: Option<Arc<dyn VoxelRenderer>>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tick", &self.tick)
            .field("neurons", &self.neurons.len())
            .field("pending_receptors", &self.pending_receptor_count())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    pub fn new(
        id: SimulationId,
        name: impl Into<String>,
        seed: u64,
        timestep_ms: f64,
        state: Arc<SimulationState>,
    ) -> EngineResult<Self> {
        if !(timestep_ms.is_finite() && timestep_ms > 0.0) {
            return Err(EngineError::invalid(
                "timestep_ms",
                format!("must be positive, got {timestep_ms}"),
            ));
        }
        Ok(Self {
            id,
            name: name.into(),
            seed,
            timestep_ms,
            state,
            tick: 0,
            shapes: Vec::new(),
            compartments: Vec::new(),
            receptors: Vec::new(),
            lifc_receptors: Vec::new(),
            neurons: Vec::new(),
            dacs: Vec::new(),
            adcs: Vec::new(),
            compartment_owner: AHashMap::new(),
            pending_receptors: Vec::new(),
            pending_lifc_receptors: Vec::new(),
            recording: None,
            renderer: None,
        })
    }

    pub fn set_renderer(&mut self, renderer: Arc<dyn VoxelRenderer>) {
        self.renderer = Some(renderer);
    }

    pub fn id(&self) -> SimulationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn timestep_ms(&self) -> f64 {
        self.timestep_ms
    }

    pub fn state(&self) -> &Arc<SimulationState> {
        &self.state
    }

    /// Simulated time reached so far
    pub fn time_ms(&self) -> f64 {
        self.tick as f64 * self.timestep_ms
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn neuron(&self, id: NeuronId) -> EngineResult<&Neuron> {
        self.neurons
            .get(id.index())
            .ok_or_else(|| EngineError::invalid_id("neuron", id.0))
    }

    fn neuron_mut(&mut self, id: NeuronId) -> EngineResult<&mut Neuron> {
        self.neurons
            .get_mut(id.index())
            .ok_or_else(|| EngineError::invalid_id("neuron", id.0))
    }

    pub fn receptor_count(&self) -> usize {
        self.receptors.len()
    }

    pub fn lifc_receptor_count(&self) -> usize {
        self.lifc_receptors.len()
    }

    /// Receptors that will be wired at the start of the next tick
    pub fn pending_receptor_count(&self) -> usize {
        self.pending_receptors.len() + self.pending_lifc_receptors.len()
    }

    fn shape(&self, id: ShapeId) -> EngineResult<&Shape> {
        self.shapes
            .get(id.index())
            .ok_or_else(|| EngineError::invalid_id("shape", id.0))
    }

    fn compartment(&self, id: CompartmentId) -> EngineResult<&Compartment> {
        self.compartments
            .get(id.index())
            .ok_or_else(|| EngineError::invalid_id("compartment", id.0))
    }

    fn bs_compartment(&self, id: CompartmentId) -> EngineResult<&BSCompartment> {
        match self.compartment(id)? {
            Compartment::BS(c) => Ok(c),
            other => Err(EngineError::invalid(
                "CompartmentID",
                format!("{id} is a {} compartment, expected BS", other.kind()),
            )),
        }
    }

    fn compartment_center(&self, id: CompartmentId) -> EngineResult<Vec3D> {
        let shape = self.compartment(id)?.shape();
        Ok(self.shape(shape)?.center())
    }

    // ----------------------------------------------------------------------------------------
    // Geometry and compartments
    // ----------------------------------------------------------------------------------------

    pub fn add_sphere(&mut self, center_um: Vec3D, radius_um: f64) -> EngineResult<ShapeId> {
        let id = ShapeId(next_id(self.shapes.len(), "ShapeID")?);
        self.shapes.push(Shape::sphere(center_um, radius_um)?);
        Ok(id)
    }

    pub fn add_cylinder(
        &mut self,
        point1_um: Vec3D,
        point1_radius_um: f64,
        point2_um: Vec3D,
        point2_radius_um: f64,
    ) -> EngineResult<ShapeId> {
        let shape = Shape::cylinder(point1_um, point1_radius_um, point2_um, point2_radius_um)?;
        let id = ShapeId(next_id(self.shapes.len(), "ShapeID")?);
        self.shapes.push(shape);
        Ok(id)
    }

    pub fn add_bs_compartment(
        &mut self,
        name: impl Into<String>,
        shape: ShapeId,
        membrane: PassiveSomaParams,
    ) -> EngineResult<CompartmentId> {
        self.shape(shape)?;
        membrane.validate()?;
        let id = CompartmentId(next_id(self.compartments.len(), "CompartmentID")?);
        self.compartments.push(Compartment::BS(BSCompartment {
            id,
            name: name.into(),
            shape,
            membrane,
        }));
        Ok(id)
    }

    pub fn add_lifc_compartment(
        &mut self,
        name: impl Into<String>,
        shape: ShapeId,
    ) -> EngineResult<CompartmentId> {
        self.shape(shape)?;
        let id = CompartmentId(next_id(self.compartments.len(), "CompartmentID")?);
        self.compartments.push(Compartment::LIFC(LIFCCompartment {
            id,
            name: name.into(),
            shape,
        }));
        Ok(id)
    }

    // ----------------------------------------------------------------------------------------
    // Receptors
    // ----------------------------------------------------------------------------------------

    /// Add a basic receptor; its `id` is assigned here.
    pub fn add_receptor(&mut self, mut receptor: Receptor) -> EngineResult<ReceptorId> {
        self.compartment(receptor.source_compartment)?;
        self.compartment(receptor.destination_compartment)?;
        receptor.id = ReceptorId(next_id(self.receptors.len(), "ReceptorID")?);
        receptor.validate()?;
        let id = receptor.id;
        self.receptors.push(Arc::new(receptor));
        self.pending_receptors.push(id);
        Ok(id)
    }

    /// Add an LIFC receptor; its `id` is assigned here.
    ///
    /// Rejected when it would join a connection whose receptor data is
    /// already aggregated.
    pub fn add_lifc_receptor(&mut self, mut receptor: LIFCReceptor) -> EngineResult<ReceptorId> {
        self.compartment(receptor.source_compartment)?;
        self.compartment(receptor.destination_compartment)?;
        receptor.id = ReceptorId(next_id(self.lifc_receptors.len(), "LIFCReceptorID")?);
        receptor.validate()?;
        if let Some((src, dst)) =
            self.endpoints(receptor.source_compartment, receptor.destination_compartment)
        {
            if !self.neurons[dst.index()].accepts_lifc_receptor(src, &receptor) {
                return Err(EngineError::invalid(
                    "DestinationCompartmentID",
                    format!(
                        "the {:?} connection from {src} to {dst} is already aggregated; \
                         add receptors of this class before the first tick or after a Reset",
                        receptor.neurotransmitter
                    ),
                ));
            }
        }
        let id = receptor.id;
        self.lifc_receptors.push(Arc::new(receptor));
        self.pending_lifc_receptors.push(id);
        Ok(id)
    }

    // ----------------------------------------------------------------------------------------
    // Neurons
    // ----------------------------------------------------------------------------------------

    fn claim_compartments(&self, compartments: &[CompartmentId]) -> EngineResult<()> {
        for (i, c) in compartments.iter().enumerate() {
            self.compartment(*c)?;
            if let Some(owner) = self.compartment_owner.get(c) {
                return Err(EngineError::invalid(
                    "CompartmentID",
                    format!("{c} already belongs to {owner}"),
                ));
            }
            if compartments[..i].contains(c) {
                return Err(EngineError::invalid(
                    "CompartmentID",
                    format!("{c} listed twice"),
                ));
            }
        }
        Ok(())
    }

    fn push_neuron(&mut self, neuron: Neuron, compartments: &[CompartmentId]) -> NeuronId {
        let id = neuron.id();
        for c in compartments {
            self.compartment_owner.insert(*c, id);
        }
        self.neurons.push(neuron);
        id
    }

    pub fn add_bs_neuron(
        &mut self,
        name: impl Into<String>,
        soma: CompartmentId,
        axon: CompartmentId,
    ) -> EngineResult<NeuronId> {
        let membrane = self.bs_compartment(soma)?.membrane.clone();
        self.claim_compartments(&[soma, axon])?;
        let id = NeuronId(next_id(self.neurons.len(), "NeuronID")?);
        let core = NeuronCore::new(id, name, self.compartment_center(soma)?);
        let neuron = BSNeuron::new(core, soma, axon, membrane)?;
        Ok(self.push_neuron(Neuron::BS(neuron), &[soma, axon]))
    }

    pub fn add_sc_neuron(
        &mut self,
        name: impl Into<String>,
        somas: Vec<CompartmentId>,
        dendrites: Vec<CompartmentId>,
        axons: Vec<CompartmentId>,
    ) -> EngineResult<NeuronId> {
        let first_soma = *somas
            .first()
            .ok_or_else(|| EngineError::invalid("SomaIDs", "at least one soma is required"))?;
        let membrane = self.bs_compartment(first_soma)?.membrane.clone();

        let all: Vec<CompartmentId> = somas
            .iter()
            .chain(&dendrites)
            .chain(&axons)
            .copied()
            .collect();
        self.claim_compartments(&all)?;

        let centers = somas
            .iter()
            .map(|c| self.compartment_center(*c))
            .collect::<EngineResult<Vec<_>>>()?;
        let center = Vec3D::centroid(&centers).unwrap_or_default();

        let id = NeuronId(next_id(self.neurons.len(), "NeuronID")?);
        let core = NeuronCore::new(id, name, center);
        let neuron = SCNeuron::new(core, somas, dendrites, axons, membrane)?;
        Ok(self.push_neuron(Neuron::SC(neuron), &all))
    }

    pub fn add_lifc_neuron(
        &mut self,
        name: impl Into<String>,
        compartment: CompartmentId,
        params: LIFCNeuronParams,
    ) -> EngineResult<NeuronId> {
        match self.compartment(compartment)? {
            Compartment::LIFC(_) => {}
            other => {
                return Err(EngineError::invalid(
                    "CompartmentID",
                    format!("{compartment} is a {} compartment, expected LIFC", other.kind()),
                ))
            }
        }
        self.claim_compartments(&[compartment])?;
        let id = NeuronId(next_id(self.neurons.len(), "NeuronID")?);
        let core = NeuronCore::new(id, name, self.compartment_center(compartment)?);
        let neuron = LIFCNeuron::new(core, params, neuron_seed(self.seed, id))?;
        Ok(self.push_neuron(Neuron::LIFC(neuron), &[compartment]))
    }

    /// Force spikes at the given `(t_ms, neuron)` pairs. Validates every pair
    /// before applying any. Returns how many were scheduled; times earlier
    /// than the current simulation time are dropped.
    pub fn set_specific_ap_times(&mut self, pairs: &[(f64, NeuronId)]) -> EngineResult<usize> {
        for &(t_ms, neuron) in pairs {
            self.neuron(neuron)?;
            if !(t_ms.is_finite() && t_ms >= 0.0) {
                return Err(EngineError::invalid(
                    "TimeNeuronPairs",
                    format!("time must be finite and >= 0, got {t_ms}"),
                ));
            }
        }
        let now_ms = self.time_ms();
        let mut scheduled = 0;
        for &(t_ms, neuron) in pairs {
            let upcoming = t_ms + TIME_EPSILON_MS >= now_ms;
            if upcoming && self.neuron_mut(neuron)?.add_specific_ap_time(t_ms) {
                scheduled += 1;
            } else {
                debug!(
                    target: "nes-sim-engine",
                    "[SIM] {}: stimulation at {} ms for {} is in the past, dropped",
                    self.id,
                    t_ms,
                    neuron
                );
            }
        }
        Ok(scheduled)
    }

    pub fn set_opto_tags(&mut self, neurons: &[NeuronId], tagged: bool) -> EngineResult<()> {
        for id in neurons {
            self.neuron(*id)?;
        }
        for id in neurons {
            self.neuron_mut(*id)?.core_mut().set_opto_tagged(tagged);
        }
        Ok(())
    }

    /// Inbound connections of `neuron`, including receptors that will be
    /// wired at the next tick. Does not modify the simulation.
    pub fn connectome_targets(&self, neuron: NeuronId) -> EngineResult<Vec<ConnectomeTarget>> {
        let current = self.neuron(neuron)?;
        let basic: Vec<(NeuronId, Arc<Receptor>)> = self
            .pending_receptors
            .iter()
            .map(|id| &self.receptors[id.index()])
            .filter_map(|r| {
                self.pending_source(neuron, r.source_compartment, r.destination_compartment)
                    .map(|src| (src, Arc::clone(r)))
            })
            .collect();
        let lifc: Vec<(NeuronId, Arc<LIFCReceptor>)> = self
            .pending_lifc_receptors
            .iter()
            .map(|id| &self.lifc_receptors[id.index()])
            .filter_map(|r| {
                self.pending_source(neuron, r.source_compartment, r.destination_compartment)
                    .map(|src| (src, Arc::clone(r)))
            })
            .collect();
        if basic.is_empty() && lifc.is_empty() {
            return Ok(current.connectome_targets());
        }

        // Wire a copy the same way the next tick will
        let mut preview = current.clone();
        for (src, receptor) in &basic {
            let spikes = self.neurons[src.index()].spike_history().clone();
            let _ = preview.attach_basic_receptor(*src, spikes, receptor);
        }
        for (src, receptor) in &lifc {
            let spikes = self.neurons[src.index()].spike_history().clone();
            preview.attach_lifc_receptor(*src, spikes, receptor);
        }
        preview.finalize_receptors();
        Ok(preview.connectome_targets())
    }

    /// Source neuron of a pending receptor that lands on `neuron`
    fn pending_source(
        &self,
        neuron: NeuronId,
        source: CompartmentId,
        destination: CompartmentId,
    ) -> Option<NeuronId> {
        match self.endpoints(source, destination) {
            Some((src, dst)) if dst == neuron => Some(src),
            _ => None,
        }
    }

    // ----------------------------------------------------------------------------------------
    // Tools
    // ----------------------------------------------------------------------------------------

    pub fn add_patch_clamp_dac(
        &mut self,
        name: impl Into<String>,
        destination: CompartmentId,
    ) -> EngineResult<u32> {
        self.compartment(destination)?;
        let id = next_id(self.dacs.len(), "PatchClampDACID")?;
        self.dacs.push(PatchClampDAC::new(id, name, destination));
        Ok(id)
    }

    pub fn set_patch_clamp_dac_output(
        &mut self,
        dac: u32,
        control: Vec<(f64, f64)>,
    ) -> EngineResult<()> {
        self.dacs
            .get_mut(dac as usize)
            .ok_or_else(|| EngineError::invalid_id("patch clamp DAC", dac))?
            .set_output_list(control)
    }

    pub fn add_patch_clamp_adc(
        &mut self,
        name: impl Into<String>,
        source: CompartmentId,
        sample_interval_ms: f64,
    ) -> EngineResult<u32> {
        self.compartment(source)?;
        let id = next_id(self.adcs.len(), "PatchClampADCID")?;
        self.adcs
            .push(PatchClampADC::new(id, name, source, sample_interval_ms)?);
        Ok(id)
    }

    pub fn set_patch_clamp_adc_sample_rate(
        &mut self,
        adc: u32,
        sample_interval_ms: f64,
    ) -> EngineResult<()> {
        let now = self.time_ms();
        self.adcs
            .get_mut(adc as usize)
            .ok_or_else(|| EngineError::invalid_id("patch clamp ADC", adc))?
            .set_sample_interval_ms(sample_interval_ms, now)
    }

    pub fn patch_clamp_adc(&self, adc: u32) -> EngineResult<&PatchClampADC> {
        self.adcs
            .get(adc as usize)
            .ok_or_else(|| EngineError::invalid_id("patch clamp ADC", adc))
    }

    // ----------------------------------------------------------------------------------------
    // Recording
    // ----------------------------------------------------------------------------------------

    pub fn recording(&self) -> Option<RecordingSnapshot> {
        self.recording.as_ref().map(|r| r.snapshot(&self.neurons))
    }

    // ----------------------------------------------------------------------------------------
    // Worker tasks
    // ----------------------------------------------------------------------------------------

    /// Run `task` to completion. Inputs come from the simulation state
    /// (`run_time_ms` doubles as the RECORD_ALL window).
    pub fn execute(&mut self, task: SimulationTask) {
        info!(
            target: "nes-sim-engine",
            "[SIM] {} '{}': {} started at {:.3} ms",
            self.id,
            self.name,
            task.as_str(),
            self.time_ms()
        );
        match task {
            SimulationTask::None => {}
            SimulationTask::Reset => self.reset(),
            SimulationTask::RunFor => {
                let duration = self.state.run_time_ms();
                self.run_for(duration);
            }
            SimulationTask::RecordAll => {
                let max_record_time_ms = self.state.run_time_ms();
                self.record_all(max_record_time_ms);
            }
            SimulationTask::VsdaConversion => self.render(),
        }
        info!(
            target: "nes-sim-engine",
            "[SIM] {} '{}': {} finished at {:.3} ms",
            self.id,
            self.name,
            task.as_str(),
            self.time_ms()
        );
    }

    /// Advance by `duration_ms`, rounded to a whole number of ticks.
    pub fn run_for(&mut self, duration_ms: f64) {
        if !(duration_ms.is_finite() && duration_ms > 0.0) {
            return;
        }
        let ticks = (duration_ms / self.timestep_ms + TIME_EPSILON_MS).floor() as u64;
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Advance by exactly one tick.
    pub fn step(&mut self) {
        let dt = self.timestep_ms;
        let t_ms = self.time_ms();

        self.wire_pending_receptors();
        self.apply_dac_currents(t_ms);

        let spiked = self
            .neurons
            .par_iter_mut()
            .map(|n| n.update(t_ms, dt))
            .filter(|spiked| *spiked)
            .count();

        self.sample_instruments(t_ms);

        self.tick += 1;
        self.state.set_time_ms(self.time_ms());
        trace!(
            target: "nes-sim-engine",
            "[SIM] {} tick {} t={:.3} ms: {} spikes",
            self.id,
            self.tick - 1,
            t_ms,
            spiked
        );
    }

    fn apply_dac_currents(&mut self, t_ms: f64) {
        if self.dacs.is_empty() {
            return;
        }
        let mut injected: AHashMap<NeuronId, f64> = AHashMap::new();
        for dac in &self.dacs {
            if let Some(&owner) = self.compartment_owner.get(&dac.destination_compartment) {
                *injected.entry(owner).or_insert(0.0) += dac.current_at(t_ms);
            }
        }
        for (owner, current_pa) in injected {
            if let Some(neuron) = self.neurons.get_mut(owner.index()) {
                neuron.set_injected_current_pa(current_pa);
            }
        }
    }

    fn sample_instruments(&mut self, t_ms: f64) {
        for adc in &mut self.adcs {
            if let Some(owner) = self.compartment_owner.get(&adc.source_compartment) {
                if let Some(neuron) = self.neurons.get(owner.index()) {
                    adc.sample(t_ms, neuron.membrane_potential_mv());
                }
            }
        }
        if let Some(recording) = self.recording.as_mut() {
            recording.sample(t_ms, &self.neurons);
        }
    }

    /// Attach receptors created since the last tick and aggregate the
    /// connections they open. Aggregates computed earlier stay frozen.
    /// Receptors with an unowned endpoint wait for the neuron to appear.
    fn wire_pending_receptors(&mut self) {
        if self.pending_receptors.is_empty() && self.pending_lifc_receptors.is_empty() {
            return;
        }
        let mut wired = 0usize;
        let mut dropped = 0usize;
        let mut touched: Vec<NeuronId> = Vec::new();

        let mut waiting = Vec::new();
        for id in std::mem::take(&mut self.pending_receptors) {
            let receptor = Arc::clone(&self.receptors[id.index()]);
            let Some((src, dst)) =
                self.endpoints(receptor.source_compartment, receptor.destination_compartment)
            else {
                waiting.push(id);
                continue;
            };
            let spikes = self.neurons[src.index()].spike_history().clone();
            self.neurons[src.index()]
                .core_mut()
                .set_type_once(NeuronType::from_neurotransmitter(receptor.neurotransmitter));
            match self.neurons[dst.index()].attach_basic_receptor(src, spikes, &receptor) {
                Ok(true) => {
                    wired += 1;
                    touched.push(dst);
                }
                Ok(false) => {
                    dropped += 1;
                    warn!(
                        target: "nes-sim-engine",
                        "[SIM] {}: receptor {:?} targets LIFC {}, which takes LIFC receptors only",
                        self.id,
                        id,
                        dst
                    );
                }
                Err(e) => {
                    dropped += 1;
                    warn!(
                        target: "nes-sim-engine",
                        "[SIM] {}: receptor {:?} not wired: {}",
                        self.id,
                        id,
                        e
                    );
                }
            }
        }
        self.pending_receptors = waiting;

        let mut waiting = Vec::new();
        for id in std::mem::take(&mut self.pending_lifc_receptors) {
            let receptor = Arc::clone(&self.lifc_receptors[id.index()]);
            let Some((src, dst)) =
                self.endpoints(receptor.source_compartment, receptor.destination_compartment)
            else {
                waiting.push(id);
                continue;
            };
            let spikes = self.neurons[src.index()].spike_history().clone();
            self.neurons[src.index()]
                .core_mut()
                .set_type_once(NeuronType::from_neurotransmitter(receptor.neurotransmitter));
            if self.neurons[dst.index()].attach_lifc_receptor(src, spikes, &receptor) {
                wired += 1;
                touched.push(dst);
            } else {
                dropped += 1;
                warn!(
                    target: "nes-sim-engine",
                    "[SIM] {}: LIFC receptor {:?} targets non-LIFC {}",
                    self.id,
                    id,
                    dst
                );
            }
        }
        self.pending_lifc_receptors = waiting;

        if wired + dropped == 0 {
            return;
        }
        touched.sort_unstable();
        touched.dedup();
        for dst in &touched {
            self.neurons[dst.index()].finalize_receptors();
        }
        info!(
            target: "nes-sim-engine",
            "[SIM] {} at {:.3} ms: {} receptors wired into {} neurons, {} dropped, {} waiting",
            self.id,
            self.time_ms(),
            wired,
            touched.len(),
            dropped,
            self.pending_receptor_count()
        );
    }

    /// Owning neurons of a receptor's two compartments, if both are owned
    fn endpoints(
        &self,
        source: CompartmentId,
        destination: CompartmentId,
    ) -> Option<(NeuronId, NeuronId)> {
        let src = self.compartment_owner.get(&source).copied()?;
        let dst = self.compartment_owner.get(&destination).copied()?;
        Some((src, dst))
    }

    /// Back to t = 0: neuron dynamics, instruments and recording cleared,
    /// every receptor queued for wiring at the next tick.
    pub fn reset(&mut self) {
        self.tick = 0;
        self.state.set_time_ms(0.0);
        for neuron in &mut self.neurons {
            neuron.reset_dynamics();
        }
        for adc in &mut self.adcs {
            adc.clear();
        }
        self.recording = None;
        self.pending_receptors = (0..self.receptors.len() as u32).map(ReceptorId).collect();
        self.pending_lifc_receptors =
            (0..self.lifc_receptors.len() as u32).map(ReceptorId).collect();
    }

    /// Start a fresh recording covering at most `max_record_time_ms` from now.
    pub fn record_all(&mut self, max_record_time_ms: f64) {
        self.recording = Some(Recording::new(self.time_ms(), max_record_time_ms.max(0.0)));
    }

    fn render(&mut self) {
        self.state.set_rendering(true);
        match &self.renderer {
            Some(renderer) => {
                let scene = RenderScene {
                    simulation_id: self.id.0,
                    shapes: &self.shapes,
                    compartments: &self.compartments,
                };
                if let Err(e) = renderer.render(&scene) {
                    warn!(target: "nes-sim-engine", "[SIM] {}: render failed: {}", self.id, e);
                }
            }
            None => {
                warn!(
                    target: "nes-sim-engine",
                    "[SIM] {}: no voxel renderer attached, VSDA conversion skipped",
                    self.id
                );
            }
        }
        self.state.set_rendering(false);
    }
}
