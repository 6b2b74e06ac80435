// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios through the `nes` facade

use std::io::Write;
use std::time::Duration;

use nes::prelude::*;
use serde_json::{json, Value};

const POLL: Duration = Duration::from_millis(1);

fn call(router: &RequestRouter, route: &str, params: Value) -> Value {
    let response = router.handle(route, &params);
    assert_eq!(response["StatusCode"], 0, "{} -> {}", route, response);
    router.registry().wait_all_idle(POLL);
    response
}

fn id(response: &Value, key: &str) -> u64 {
    response[key].as_u64().unwrap()
}

/// Soma sphere plus axon cylinder, returned as `(soma, axon)` compartment IDs.
fn bs_compartments(router: &RequestRouter, sim: u64, x_um: f64) -> (u64, u64) {
    let soma_shape = call(
        router,
        "Geometry/Shape/Sphere/Create",
        json!({ "SimulationID": sim, "Center_um": [x_um, 0.0, 0.0], "Radius_um": 5.0 }),
    );
    let axon_shape = call(
        router,
        "Geometry/Shape/Cylinder/Create",
        json!({
            "SimulationID": sim,
            "Point1Position_um": [x_um, 0.0, 0.0],
            "Point1Radius_um": 1.0,
            "Point2Position_um": [x_um + 10.0, 0.0, 0.0],
            "Point2Radius_um": 0.5,
        }),
    );

    let membrane = |shape: u64| {
        json!({
            "SimulationID": sim,
            "ShapeID": shape,
            "MembranePotential_mV": -60.0,
            "SpikeThreshold_mV": -50.0,
            "DecayTime_ms": 30.0,
            "RestingPotential_mV": -60.0,
            "AfterHyperpolarizationAmplitude_mV": 0.0,
        })
    };
    let soma = call(router, "Compartment/BS/Create", membrane(id(&soma_shape, "ShapeID")));
    let axon = call(router, "Compartment/BS/Create", membrane(id(&axon_shape, "ShapeID")));
    (id(&soma, "CompartmentID"), id(&axon, "CompartmentID"))
}

#[test]
fn test_ball_and_stick_pair_propagates_a_spike() {
    let router = RequestRouter::new(&NesConfig::default());
    let sim = id(&call(&router, "Simulation/Create", json!({ "Name": "bs pair" })), "SimulationID");

    let (soma_a, axon_a) = bs_compartments(&router, sim, 0.0);
    let (soma_b, axon_b) = bs_compartments(&router, sim, 50.0);
    let a = call(
        &router,
        "Neuron/BS/Create",
        json!({ "SimulationID": sim, "SomaID": soma_a, "AxonID": axon_a }),
    );
    let b = call(
        &router,
        "Neuron/BS/Create",
        json!({ "SimulationID": sim, "SomaID": soma_b, "AxonID": axon_b }),
    );
    assert_eq!((id(&a, "NeuronID"), id(&b, "NeuronID")), (0, 1));

    let receptor = call(
        &router,
        "Receptor/Create",
        json!({
            "SimulationID": sim,
            "SourceCompartmentID": axon_a,
            "DestinationCompartmentID": soma_b,
            "Conductance_nS": 3.0,
            "TimeConstantRise_ms": 0.5,
            "TimeConstantDecay_ms": 3.0,
            "Neurotransmitter": "AMPA",
        }),
    );
    assert_eq!(id(&receptor, "ReceptorID"), 0);

    call(&router, "Simulation/RecordAll", json!({ "SimulationID": sim, "MaxRecordTime_ms": 20.0 }));
    call(
        &router,
        "Simulation/SetSpecificAPTimes",
        json!({ "SimulationID": sim, "TimeNeuronPairs": [[0.0, 0]] }),
    );
    call(&router, "Simulation/RunFor", json!({ "SimulationID": sim, "Runtime_ms": 10.0 }));

    let recording = call(&router, "Simulation/GetRecording", json!({ "SimulationID": sim }));
    let neurons = recording["Recording"]["Neurons"].as_array().unwrap();
    assert_eq!(neurons[0]["SpikeTimes_ms"], json!([0.0]));
    let post_spikes = neurons[1]["SpikeTimes_ms"].as_array().unwrap();
    assert!(!post_spikes.is_empty());
    assert!(post_spikes[0].as_f64().unwrap() > 0.0);

    let targets = call(
        &router,
        "Neuron/GetConnectomeTargets",
        json!({ "SimulationID": sim, "NeuronID": 1 }),
    );
    assert_eq!(targets["Targets"][0]["SourceNeuronID"], 0);
    router.shutdown();
}

#[test]
fn test_simulations_are_isolated() {
    let router = RequestRouter::new(&NesConfig::default());
    let first = id(&call(&router, "Simulation/Create", json!({ "Name": "a" })), "SimulationID");
    let second = id(&call(&router, "Simulation/Create", json!({ "Name": "b" })), "SimulationID");
    assert_eq!((first, second), (0, 1));

    call(&router, "Simulation/RunFor", json!({ "SimulationID": first, "Runtime_ms": 3.0 }));
    let a = call(&router, "Simulation/GetStatus", json!({ "SimulationID": first }));
    let b = call(&router, "Simulation/GetStatus", json!({ "SimulationID": second }));
    assert!((a["InSimulationTime_ms"].as_f64().unwrap() - 3.0).abs() < 1e-9);
    assert_eq!(b["InSimulationTime_ms"], 0.0);

    // Shape IDs are per simulation
    let shape = call(
        &router,
        "Geometry/Shape/Sphere/Create",
        json!({ "SimulationID": second, "Center_um": [0.0, 0.0, 0.0], "Radius_um": 1.0 }),
    );
    assert_eq!(shape["ShapeID"], 0);
    router.shutdown();
}

#[test]
fn test_sc_neuron_requires_bs_somas() {
    let router = RequestRouter::new(&NesConfig::default());
    let sim = id(&call(&router, "Simulation/Create", json!({ "Name": "sc" })), "SimulationID");
    let (soma, axon) = bs_compartments(&router, sim, 0.0);

    let bad = router.handle(
        "Neuron/SC/Create",
        &json!({ "SimulationID": sim, "SomaIDs": [] }),
    );
    assert_eq!(bad["StatusCode"], StatusCode::InvalidParametersPassed.as_u8());

    let sc = call(
        &router,
        "Neuron/SC/Create",
        json!({ "SimulationID": sim, "SomaIDs": [soma], "AxonIDs": [axon] }),
    );
    assert_eq!(sc["NeuronID"], 0);
    router.shutdown();
}

#[test]
fn test_router_honours_loaded_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let save_dir = dir.path().join("saves");
    let config_path = dir.path().join("nes_configuration.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    writeln!(
        file,
        "[simulation]\ndefault_seed = 11\nworker_poll_interval_ms = 1\n\n\
         [persistence]\nsave_dir = {:?}",
        save_dir.to_string_lossy()
    )
    .unwrap();

    let config = load_config(Some(config_path.as_path()), None).unwrap();
    assert_eq!(config.simulation.default_seed, 11);

    let router = RequestRouter::new(&config);
    let sim = id(&call(&router, "Simulation/Create", json!({ "Name": "cfg" })), "SimulationID");
    let handle = router.registry().get(SimulationId(sim as u32)).unwrap();
    assert_eq!(handle.seed(), 11);

    let saved = call(&router, "Simulation/Save", json!({ "SimulationID": sim }));
    let task = saved["TaskID"].as_u64().unwrap();
    assert_eq!(router.tasks().wait(task, POLL).unwrap(), TaskStatus::Success);
    let name = saved["SavedSimName"].as_str().unwrap();
    assert!(SavedSimulation::path_in(&save_dir, name).exists());
    router.shutdown();
}
