// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Geometry, compartment, receptor and neuron handlers

use nes_npu_neural::{LIFCReceptor, Neurotransmitter, Receptor, ReceptorId};
use serde_json::{json, Value};

use crate::router::{Request, RequestRouter};
use crate::types::{
    BSCompartmentCreateParams, BSNeuronCreateParams, ConnectomeTargetsParams,
    CylinderCreateParams, LIFCCompartmentCreateParams, LIFCNeuronCreateParams,
    LIFCReceptorCreateParams, ReceptorCreateParams, SCNeuronCreateParams, ServiceResult,
    SetOptoTagsParams, SphereCreateParams,
};

// ============================================================================
// GEOMETRY
// ============================================================================

pub fn create_sphere(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SphereCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_sphere(params.center_um, params.radius_um)?)
    })?;
    Ok(json!({ "ShapeID": id }))
}

pub fn create_cylinder(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: CylinderCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_cylinder(
            params.point1_position_um,
            params.point1_radius_um,
            params.point2_position_um,
            params.point2_radius_um,
        )?)
    })?;
    Ok(json!({ "ShapeID": id }))
}

// ============================================================================
// COMPARTMENTS
// ============================================================================

pub fn create_bs_compartment(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: BSCompartmentCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_bs_compartment(params.name.as_str(), params.shape_id, params.membrane())?)
    })?;
    Ok(json!({ "CompartmentID": id }))
}

pub fn create_lifc_compartment(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: LIFCCompartmentCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_lifc_compartment(params.name.as_str(), params.shape_id)?)
    })?;
    Ok(json!({ "CompartmentID": id }))
}

// ============================================================================
// RECEPTORS
// ============================================================================

pub fn create_receptor(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: ReceptorCreateParams = req.parse()?;
    let receptor = Receptor {
        id: ReceptorId(0),
        name: params.name,
        source_compartment: params.source_compartment_id,
        destination_compartment: params.destination_compartment_id,
        conductance_ns: params.conductance_ns,
        tau_rise_ms: params.tau_rise_ms,
        tau_decay_ms: params.tau_decay_ms,
        neurotransmitter: params.neurotransmitter.parse()?,
        position_um: params.position_um,
    };
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| Ok(sim.add_receptor(receptor)?))?;
    Ok(json!({ "ReceptorID": id }))
}

pub fn create_lifc_receptor(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: LIFCReceptorCreateParams = req.parse()?;
    let neurotransmitter: Neurotransmitter = params.neurotransmitter.parse()?;
    let receptor = LIFCReceptor {
        id: ReceptorId(0),
        name: params.name.clone(),
        source_compartment: params.source_compartment_id,
        destination_compartment: params.destination_compartment_id,
        neurotransmitter,
        reversal_potential_mv: params
            .reversal_potential_mv
            .unwrap_or_else(|| neurotransmitter.default_reversal_potential_mv()),
        psp_rise_ms: params.psp_rise_ms,
        psp_decay_ms: params.psp_decay_ms,
        onset_delay_ms: params.onset_delay_ms,
        peak_conductance_ns: params.peak_conductance_ns,
        weight: params.weight,
        voltage_gated: params
            .voltage_gated
            .unwrap_or(neurotransmitter == Neurotransmitter::NMDA),
        stdp: params.stdp()?,
        position_um: params.position_um,
    };
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| Ok(sim.add_lifc_receptor(receptor)?))?;
    Ok(json!({ "LIFCReceptorID": id }))
}

// ============================================================================
// NEURONS
// ============================================================================

pub fn create_bs_neuron(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: BSNeuronCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_bs_neuron(params.name.as_str(), params.soma_id, params.axon_id)?)
    })?;
    Ok(json!({ "NeuronID": id }))
}

pub fn create_sc_neuron(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SCNeuronCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_sc_neuron(
            params.name,
            params.soma_ids,
            params.dendrite_ids,
            params.axon_ids,
        )?)
    })?;
    Ok(json!({ "NeuronID": id }))
}

pub fn create_lifc_neuron(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: LIFCNeuronCreateParams = req.parse()?;
    let model = params.model_params()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_lifc_neuron(params.name.as_str(), params.compartment_id, model)?)
    })?;
    Ok(json!({ "NeuronID": id }))
}

pub fn set_opto_tags(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SetOptoTagsParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    handle.mutate(req.log_entry(), |sim| {
        Ok(sim.set_opto_tags(&params.neuron_ids, params.opto_tagged)?)
    })?;
    Ok(json!({}))
}

/// Inbound connections of a neuron, counting receptors not wired yet. Read-only.
pub fn get_connectome_targets(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: ConnectomeTargetsParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let targets = handle.read(|sim| Ok(sim.connectome_targets(params.neuron_id)?))?;
    Ok(json!({ "Targets": targets }))
}
