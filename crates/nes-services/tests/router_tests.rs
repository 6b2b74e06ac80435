// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request routing, validation and the busy rule

mod common;

use common::{create_simulation, lifc_cell, ok, router_in, status, POLL};
use serde_json::json;

#[test]
fn test_tovm_scenario_keeps_pre_spike_potential() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());

    let sim = create_simulation(&router, "T1", 0);
    let (_, neuron) = lifc_cell(
        &router,
        sim,
        0.0,
        json!({
            "ResetMethod": "TOVM",
            "SpikeThreshold_mV": -50.0,
            "RestingPotential_mV": -65.0,
        }),
    );

    ok(&router, "Simulation/RecordAll", json!({ "SimulationID": sim, "MaxRecordTime_ms": 10.0 }));
    ok(
        &router,
        "Simulation/SetSpecificAPTimes",
        json!({ "SimulationID": sim, "TimeNeuronPairs": [[0.0, neuron]] }),
    );
    ok(&router, "Simulation/RunFor", json!({ "SimulationID": sim, "Runtime_ms": 1.0 }));

    let recording = ok(&router, "Simulation/GetRecording", json!({ "SimulationID": sim }));
    let trace = &recording["Recording"]["Neurons"][0];
    assert_eq!(trace["SpikeTimes_ms"], json!([0.0]));

    let vm = trace["Vm_mV"].as_array().unwrap();
    assert_eq!(vm.len(), 10);
    let last = vm.last().unwrap().as_f64().unwrap();
    assert!((last - (-65.0)).abs() < 1e-9, "Vm = {}", last);
    router.shutdown();
}

#[test]
fn test_second_run_for_is_busy_but_status_is_not() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());
    let sim = create_simulation(&router, "busy", 0);

    let run = json!({ "SimulationID": sim, "Runtime_ms": 100000.0 });
    assert_eq!(status(&router, "Simulation/RunFor", run.clone()), 0);
    assert_eq!(status(&router, "Simulation/RunFor", run), 3);
    assert_eq!(
        status(
            &router,
            "Geometry/Shape/Sphere/Create",
            json!({ "SimulationID": sim, "Center_um": [0.0, 0.0, 0.0], "Radius_um": 1.0 })
        ),
        3
    );

    for _ in 0..5 {
        let response = router.handle("Simulation/GetStatus", &json!({ "SimulationID": sim }));
        assert_eq!(response["StatusCode"], 0);
    }

    router.registry().wait_all_idle(POLL);
    let response = ok(&router, "Simulation/GetStatus", json!({ "SimulationID": sim }));
    assert_eq!(response["IsSimulating"], false);
    let t = response["InSimulationTime_ms"].as_f64().unwrap();
    assert!((t - 100000.0).abs() < 1e-6, "t = {}", t);

    // Rejected requests were not logged: one create + one RunFor
    let log = router.registry().get(nes_npu_sim_engine::SimulationId(0)).unwrap().request_log();
    let routes: Vec<&str> = log.iter().map(|r| r.route.as_str()).collect();
    assert_eq!(routes, vec!["Simulation/Create", "Simulation/RunFor"]);
    router.shutdown();
}

#[test]
fn test_invalid_requests_leave_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());

    // Unknown simulation
    assert_eq!(status(&router, "Simulation/Reset", json!({ "SimulationID": 0 })), 2);
    assert_eq!(status(&router, "Simulation/GetStatus", json!({ "SimulationID": 0 })), 2);

    let sim = create_simulation(&router, "v", 0);

    // Missing and mis-typed fields
    assert_eq!(status(&router, "Simulation/RunFor", json!({ "SimulationID": sim })), 2);
    assert_eq!(
        status(&router, "Simulation/RunFor", json!({ "SimulationID": sim, "Runtime_ms": "long" })),
        2
    );
    assert_eq!(
        status(&router, "Simulation/RunFor", json!({ "SimulationID": sim, "Runtime_ms": -1.0 })),
        2
    );

    // Unknown model names are rejected before anything is created
    let shape = ok(
        &router,
        "Geometry/Shape/Sphere/Create",
        json!({ "SimulationID": sim, "Center_um": [0.0, 0.0, 0.0], "Radius_um": 2.0 }),
    )["ShapeID"]
        .as_u64()
        .unwrap();
    let compartment = ok(
        &router,
        "Compartment/LIFC/Create",
        json!({ "SimulationID": sim, "ShapeID": shape }),
    )["CompartmentID"]
        .as_u64()
        .unwrap();
    assert_eq!(
        status(
            &router,
            "Neuron/LIFC/Create",
            json!({ "SimulationID": sim, "CompartmentID": compartment, "UpdateMethod": "RK4" })
        ),
        2
    );
    let neuron = ok(
        &router,
        "Neuron/LIFC/Create",
        json!({ "SimulationID": sim, "CompartmentID": compartment, "UpdateMethod": "EXPEULER_CM" }),
    );
    assert_eq!(neuron["NeuronID"], 0);

    // A compartment belongs to one neuron
    assert_eq!(
        status(
            &router,
            "Neuron/LIFC/Create",
            json!({ "SimulationID": sim, "CompartmentID": compartment })
        ),
        2
    );
    router.shutdown();
}

#[test]
fn test_reset_rewinds_clock_and_clears_recording() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());
    let sim = create_simulation(&router, "r", 0);
    lifc_cell(&router, sim, 0.0, json!({}));

    ok(&router, "Simulation/RecordAll", json!({ "SimulationID": sim, "MaxRecordTime_ms": 5.0 }));
    ok(&router, "Simulation/RunFor", json!({ "SimulationID": sim, "Runtime_ms": 2.0 }));
    let before = ok(&router, "Simulation/GetRecording", json!({ "SimulationID": sim }));
    assert_eq!(before["Recording"]["Time_ms"].as_array().unwrap().len(), 20);

    ok(&router, "Simulation/Reset", json!({ "SimulationID": sim }));
    let status = ok(&router, "Simulation/GetStatus", json!({ "SimulationID": sim }));
    assert_eq!(status["InSimulationTime_ms"], 0.0);
    let after = ok(&router, "Simulation/GetRecording", json!({ "SimulationID": sim }));
    assert!(after["Recording"].is_null());
    router.shutdown();
}

#[test]
fn test_patch_clamp_depolarises_recorded_cell() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());
    let sim = create_simulation(&router, "clamp", 0);
    let (compartment, _) = lifc_cell(&router, sim, 0.0, json!({}));

    let dac = ok(
        &router,
        "Tool/PatchClampDAC/Create",
        json!({ "SimulationID": sim, "DestinationCompartmentID": compartment }),
    )["PatchClampDACID"]
        .as_u64()
        .unwrap();
    ok(
        &router,
        "Tool/PatchClampDAC/SetOutputList",
        json!({ "SimulationID": sim, "PatchClampDACID": dac, "ControlData": [[0.0, 50.0]] }),
    );
    let adc = ok(
        &router,
        "Tool/PatchClampADC/Create",
        json!({ "SimulationID": sim, "SourceCompartmentID": compartment, "Timestep_ms": 1.0 }),
    )["PatchClampADCID"]
        .as_u64()
        .unwrap();

    ok(&router, "Simulation/RunFor", json!({ "SimulationID": sim, "Runtime_ms": 5.0 }));

    let data = ok(
        &router,
        "Tool/PatchClampADC/GetRecordedData",
        json!({ "SimulationID": sim, "PatchClampADCID": adc }),
    );
    assert_eq!(data["Timestep_ms"], 1.0);
    let samples: Vec<f64> = data["RecordedData_mV"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert!(samples.len() >= 4);
    assert!(samples.windows(2).all(|w| w[1] > w[0]), "{:?}", samples);
    assert!(*samples.last().unwrap() > -60.0);

    // Changing the rate drops what was recorded
    ok(
        &router,
        "Tool/PatchClampADC/SetSampleRate",
        json!({ "SimulationID": sim, "PatchClampADCID": adc, "Timestep_ms": 0.5 }),
    );
    let data = ok(
        &router,
        "Tool/PatchClampADC/GetRecordedData",
        json!({ "SimulationID": sim, "PatchClampADCID": adc }),
    );
    assert_eq!(data["RecordedData_mV"], json!([]));
    assert_eq!(
        status(
            &router,
            "Tool/PatchClampADC/GetRecordedData",
            json!({ "SimulationID": sim, "PatchClampADCID": 7 })
        ),
        2
    );
    router.shutdown();
}

#[test]
fn test_connectome_targets_report_inbound_receptors() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());
    let sim = create_simulation(&router, "wired", 0);
    let (pre, _) = lifc_cell(&router, sim, 0.0, json!({}));
    let (post, post_neuron) = lifc_cell(&router, sim, 20.0, json!({}));

    let receptor = ok(
        &router,
        "Receptor/LIFC/Create",
        json!({
            "SimulationID": sim,
            "SourceCompartmentID": pre,
            "DestinationCompartmentID": post,
            "Neurotransmitter": "AMPA",
            "PSPRise_ms": 0.5,
            "PSPDecay_ms": 3.0,
            "PeakConductance_nS": 2.0,
            "Weight": 0.5,
        }),
    );
    assert_eq!(receptor["LIFCReceptorID"], 0);

    let targets = ok(
        &router,
        "Neuron/GetConnectomeTargets",
        json!({ "SimulationID": sim, "NeuronID": post_neuron }),
    );
    let targets = targets["Targets"].as_array().unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0]["SourceNeuronID"], 0);
    assert_eq!(targets[0]["ReceptorIDs"], json!([0]));
    assert_eq!(targets[0]["Weight"], 0.5);

    ok(
        &router,
        "Neuron/SetOptoTags",
        json!({ "SimulationID": sim, "NeuronIDs": [0, 1], "OptoTagged": true }),
    );
    assert_eq!(
        status(
            &router,
            "Neuron/SetOptoTags",
            json!({ "SimulationID": sim, "NeuronIDs": [5], "OptoTagged": true })
        ),
        2
    );
    router.shutdown();
}

#[test]
fn test_receptor_on_aggregated_connection_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());
    let sim = create_simulation(&router, "frozen", 0);
    let (pre, _) = lifc_cell(&router, sim, 0.0, json!({}));
    let (post, post_neuron) = lifc_cell(&router, sim, 20.0, json!({}));
    let ampa = json!({
        "SimulationID": sim,
        "SourceCompartmentID": pre,
        "DestinationCompartmentID": post,
        "Neurotransmitter": "AMPA",
        "PSPRise_ms": 0.5,
        "PSPDecay_ms": 3.0,
        "PeakConductance_nS": 2.0,
    });
    ok(&router, "Receptor/LIFC/Create", ampa.clone());
    ok(&router, "Simulation/RunFor", json!({ "SimulationID": sim, "Runtime_ms": 1.0 }));

    assert_eq!(status(&router, "Receptor/LIFC/Create", ampa), 2);
    let targets = ok(
        &router,
        "Neuron/GetConnectomeTargets",
        json!({ "SimulationID": sim, "NeuronID": post_neuron }),
    );
    assert_eq!(targets["Targets"][0]["ReceptorIDs"], json!([0]));

    // The rejected create is not part of the saved log
    let handle = router.registry().get(nes_npu_sim_engine::SimulationId(sim as u32)).unwrap();
    let log = handle.request_log();
    assert_eq!(log.iter().filter(|r| r.route == "Receptor/LIFC/Create").count(), 1);
    assert_eq!(log.last().unwrap().route, "Simulation/RunFor");
    router.shutdown();
}

#[test]
fn test_vsda_render_without_renderer_completes() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_in(dir.path());
    let sim = create_simulation(&router, "vsda", 0);
    ok(&router, "VSDA/Render", json!({ "SimulationID": sim }));
    let status = ok(&router, "Simulation/GetStatus", json!({ "SimulationID": sim }));
    assert_eq!(status["IsSimulating"], false);
    router.shutdown();
}
