// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Route handlers, one function per route.

Handlers parse their typed parameters, resolve the simulation and go through
[`SimulationHandle`](crate::registry::SimulationHandle) for every access, so
the busy rule and the request log are applied in one place.
*/

pub mod model;
pub mod simulation;
pub mod tools;

use crate::router::Route;

/// The full route table
pub fn routes() -> Vec<Route> {
    vec![
        // Simulation lifecycle
        Route::mutating("Simulation/Create", simulation::create),
        Route::mutating("Simulation/Reset", simulation::reset),
        Route::mutating("Simulation/RunFor", simulation::run_for),
        Route::mutating("Simulation/RecordAll", simulation::record_all),
        Route::unlogged("Simulation/GetRecording", simulation::get_recording),
        Route::unlogged("Simulation/GetStatus", simulation::get_status).permit_busy(),
        Route::mutating("Simulation/SetSpecificAPTimes", simulation::set_specific_ap_times),
        Route::unlogged("Simulation/Save", simulation::save).permit_busy(),
        Route::unlogged("Simulation/Load", simulation::load),
        Route::unlogged("ManTaskStatus", simulation::man_task_status).permit_busy(),
        Route::unlogged("VSDA/Render", simulation::vsda_render),
        // Geometry and compartments
        Route::mutating("Geometry/Shape/Sphere/Create", model::create_sphere),
        Route::mutating("Geometry/Shape/Cylinder/Create", model::create_cylinder),
        Route::mutating("Compartment/BS/Create", model::create_bs_compartment),
        Route::mutating("Compartment/LIFC/Create", model::create_lifc_compartment),
        // Receptors
        Route::mutating("Receptor/Create", model::create_receptor),
        Route::mutating("Receptor/LIFC/Create", model::create_lifc_receptor),
        // Neurons
        Route::mutating("Neuron/BS/Create", model::create_bs_neuron),
        Route::mutating("Neuron/SC/Create", model::create_sc_neuron),
        Route::mutating("Neuron/LIFC/Create", model::create_lifc_neuron),
        Route::mutating("Neuron/SetOptoTags", model::set_opto_tags),
        Route::unlogged("Neuron/GetConnectomeTargets", model::get_connectome_targets),
        // Patch clamp tools
        Route::mutating("Tool/PatchClampDAC/Create", tools::create_dac),
        Route::mutating("Tool/PatchClampDAC/SetOutputList", tools::set_dac_output_list),
        Route::mutating("Tool/PatchClampADC/Create", tools::create_adc),
        Route::mutating("Tool/PatchClampADC/SetSampleRate", tools::set_adc_sample_rate),
        Route::unlogged("Tool/PatchClampADC/GetRecordedData", tools::get_adc_recorded_data),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths_are_unique() {
        let routes = routes();
        let mut paths: Vec<&str> = routes.iter().map(|r| r.path).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), routes.len());
    }

    #[test]
    fn test_only_status_queries_and_save_permit_busy() {
        let busy_ok: Vec<&str> = routes()
            .into_iter()
            .filter(|r| r.permit_busy)
            .map(|r| r.path)
            .collect();
        assert_eq!(
            busy_ok,
            vec!["Simulation/GetStatus", "Simulation/Save", "ManTaskStatus"]
        );
    }
}
