// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! `Simulation/*` and `VSDA/Render` handlers, including save and load

use nes_npu_sim_engine::SimulationId;
use nes_state_manager::{SavedSimulation, SimulationTask};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::router::{HandlerContext, Request, RequestRouter};
use crate::types::{
    LoadParams, ManTaskStatusParams, RecordAllParams, RunForParams, ServiceError, ServiceResult,
    SetSpecificAPTimesParams, SimulationCreateParams, SimulationIdParams, SimulationStatus,
};

pub fn create(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SimulationCreateParams = req.parse()?;

    // A replayed create adopts the simulation the loading task already made
    let handle = match req.context.replace_simulation_id {
        Some(id) => {
            let handle = router.registry().get(id)?;
            if let Some(entry) = req.log_entry() {
                handle.record(entry)?;
            }
            handle
        }
        None => {
            let seed = params.seed.unwrap_or(router.settings().default_seed);
            router
                .registry()
                .create(&params.name, seed, req.log_entry())?
        }
    };
    Ok(json!({ "SimulationID": handle.id() }))
}

pub fn reset(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SimulationIdParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    handle.submit(req.log_entry(), SimulationTask::Reset, 0.0)?;
    Ok(json!({}))
}

pub fn run_for(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: RunForParams = req.parse()?;
    if !(params.runtime_ms.is_finite() && params.runtime_ms > 0.0) {
        return Err(ServiceError::invalid(format!(
            "Runtime_ms must be > 0, got {}",
            params.runtime_ms
        )));
    }
    let handle = router.registry().get(params.simulation_id)?;
    handle.submit(req.log_entry(), SimulationTask::RunFor, params.runtime_ms)?;
    Ok(json!({}))
}

pub fn record_all(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: RecordAllParams = req.parse()?;
    if !(params.max_record_time_ms.is_finite() && params.max_record_time_ms > 0.0) {
        return Err(ServiceError::invalid(format!(
            "MaxRecordTime_ms must be > 0, got {}",
            params.max_record_time_ms
        )));
    }
    let handle = router.registry().get(params.simulation_id)?;
    handle.submit(
        req.log_entry(),
        SimulationTask::RecordAll,
        params.max_record_time_ms,
    )?;
    Ok(json!({}))
}

pub fn get_recording(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SimulationIdParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let recording = handle.read(|sim| Ok(sim.recording()))?;
    Ok(json!({ "Recording": recording }))
}

pub fn get_status(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SimulationIdParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let state = handle.state();
    let status = SimulationStatus {
        is_simulating: state.is_busy(),
        is_rendering: state.is_rendering(),
        in_simulation_time_ms: state.time_ms(),
    };
    Ok(serde_json::to_value(status)?)
}

pub fn set_specific_ap_times(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SetSpecificAPTimesParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    let scheduled = handle.mutate(req.log_entry(), |sim| {
        Ok(sim.set_specific_ap_times(&params.time_neuron_pairs)?)
    })?;
    Ok(json!({ "ScheduledCount": scheduled }))
}

pub fn vsda_render(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SimulationIdParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;
    handle.submit(req.log_entry(), SimulationTask::VsdaConversion, 0.0)?;
    Ok(json!({}))
}

// ============================================================================
// SAVE / LOAD
// ============================================================================

/// `{name}_{id}_{UTC timestamp}` with the name reduced to `[A-Za-z0-9_-]`
fn saved_sim_name(name: &str, id: SimulationId) -> String {
    let clean: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{}_{}_{}",
        clean,
        id.0,
        chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f")
    )
}

pub fn save(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: SimulationIdParams = req.parse()?;
    let handle = router.registry().get(params.simulation_id)?;

    let name = saved_sim_name(handle.name(), handle.id());
    let saved = handle.snapshot(name.clone());
    let save_dir = router.settings().save_dir.clone();

    let task_id = router.tasks().spawn(
        "Save",
        json!({ "SimulationID": handle.id(), "SavedSimName": name }),
        move |task_id| {
            let path = saved.save_to_dir(&save_dir)?;
            info!(
                target: "nes-services",
                "Task {}: saved '{}' ({} requests) to {}",
                task_id,
                saved.saved_sim_name,
                saved.requests.len(),
                path.display()
            );
            Ok(json!({ "SavedSimName": saved.saved_sim_name }))
        },
    )?;
    Ok(json!({ "TaskID": task_id, "SavedSimName": name }))
}

pub fn load(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    if req.context.is_replay() {
        return Err(ServiceError::invalid(
            "Simulation/Load cannot be issued from inside a loading task",
        ));
    }
    let params: LoadParams = req.parse()?;
    let saved =
        SavedSimulation::load_from_dir(&router.settings().save_dir, &params.saved_sim_name)?;

    let replayer = router.clone();
    let task_id = router.tasks().spawn(
        "Load",
        json!({ "SavedSimName": params.saved_sim_name }),
        move |task_id| replay(&replayer, task_id, &saved),
    )?;
    Ok(json!({ "TaskID": task_id }))
}

/// Rebuild `saved` as a new simulation by re-issuing its request log.
fn replay(router: &RequestRouter, task_id: u64, saved: &SavedSimulation) -> ServiceResult<Value> {
    let handle = router.registry().create(&saved.name, saved.seed, None)?;
    let context = HandlerContext::replay(task_id, handle.id());
    let poll = router.settings().replay_poll_interval;

    info!(
        target: "nes-services",
        "Task {}: replaying '{}' ({} requests) into {}",
        task_id,
        saved.saved_sim_name,
        saved.requests.len(),
        handle.id()
    );

    for (index, request) in saved.requests.iter().enumerate() {
        handle.wait_idle(poll);
        debug!(target: "nes-services", "Task {}: replay #{} {}", task_id, index, request.route);
        router
            .dispatch(&request.route, &request.params, &context)
            .map_err(|e| ServiceError::ReplayFailed {
                index,
                route: request.route.clone(),
                reason: e.to_string(),
            })?;
    }
    handle.wait_idle(poll);

    Ok(json!({ "SimulationID": handle.id(), "SavedSimName": saved.saved_sim_name }))
}

pub fn man_task_status(router: &RequestRouter, req: &Request<'_>) -> ServiceResult<Value> {
    let params: ManTaskStatusParams = req.parse()?;
    let (status, output) = router.tasks().status(params.task_id)?;

    let mut body = serde_json::Map::new();
    body.insert("TaskStatus".to_string(), serde_json::to_value(status)?);
    if let Value::Object(fields) = output {
        body.extend(fields);
    }
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_sim_name_is_file_safe() {
        let name = saved_sim_name("my sim/1", SimulationId(4));
        assert!(name.starts_with("my_sim_1_4_"));
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }
}
