// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Patch clamp DAC/ADC handlers

use serde_json::{json, Value};

use crate::router::{Request, RequestRouter};
use crate::types::{
    PatchClampADCCreateParams, PatchClampADCData, PatchClampADCParams,
    PatchClampADCSetSampleRateParams, PatchClampDACCreateParams,
    PatchClampDACSetOutputListParams, ServiceResult,
};

pub fn create_dac(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: PatchClampDACCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_patch_clamp_dac(params.name.as_str(), params.destination_compartment_id)?)
    })?;
    Ok(json!({ "PatchClampDACID": id }))
}

pub fn set_dac_output_list(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: PatchClampDACSetOutputListParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    handle.mutate(req.log_entry(), |sim| {
        Ok(sim.set_patch_clamp_dac_output(params.dac_id, params.control_data)?)
    })?;
    Ok(json!({}))
}

pub fn create_adc(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: PatchClampADCCreateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let id = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.add_patch_clamp_adc(
            params.name.as_str(),
            params.source_compartment_id,
            params.timestep_ms,
        )?)
    })?;
    Ok(json!({ "PatchClampADCID": id }))
}

pub fn set_adc_sample_rate(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: PatchClampADCSetSampleRateParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    handle.mutate(req.log_entry(), |sim| {
        Ok(sim.set_patch_clamp_adc_sample_rate(params.adc_id, params.timestep_ms)?)
    })?;
    Ok(json!({}))
}

pub fn get_adc_recorded_data(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: PatchClampADCParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let data = handle.read(|sim| {
        let adc = sim.patch_clamp_adc(params.adc_id)?;
        Ok(PatchClampADCData {
            recorded_data_mv: adc.recorded_mv().to_vec(),
            timestep_ms: adc.sample_interval_ms(),
        })
    })?;
    Ok(serde_json::to_value(data)?)
}
