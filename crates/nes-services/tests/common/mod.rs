// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for nes-services integration tests

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use nes_config::NesConfig;
use nes_services::RequestRouter;
use serde_json::{json, Value};

pub const POLL: Duration = Duration::from_millis(1);

pub fn router_in(save_dir: &Path) -> RequestRouter {
    let mut config = NesConfig::default();
    config.persistence.save_dir = save_dir.to_path_buf();
    config.simulation.worker_poll_interval_ms = 1;
    config.manager_tasks.replay_poll_interval_ms = 1;
    RequestRouter::new(&config)
}

/// Issue a request that must succeed, then wait for every simulation to go idle.
pub fn ok(router: &RequestRouter, route: &str, params: Value) -> Value {
    let response = router.handle(route, &params);
    assert_eq!(
        response["StatusCode"], 0,
        "{} {} -> {}",
        route, params, response
    );
    router.registry().wait_all_idle(POLL);
    response
}

pub fn status(router: &RequestRouter, route: &str, params: Value) -> u64 {
    router.handle(route, &params)["StatusCode"]
        .as_u64()
        .unwrap_or(u64::MAX)
}

pub fn create_simulation(router: &RequestRouter, name: &str, seed: u64) -> u64 {
    ok(router, "Simulation/Create", json!({ "Name": name, "Seed": seed }))["SimulationID"]
        .as_u64()
        .unwrap()
}

/// Sphere + LIFC compartment + LIFC neuron; returns `(compartment, neuron)`.
pub fn lifc_cell(router: &RequestRouter, sim: u64, x_um: f64, extra: Value) -> (u64, u64) {
    let shape = ok(
        router,
        "Geometry/Shape/Sphere/Create",
        json!({ "SimulationID": sim, "Center_um": [x_um, 0.0, 0.0], "Radius_um": 5.0 }),
    )["ShapeID"]
        .as_u64()
        .unwrap();
    let compartment = ok(
        router,
        "Compartment/LIFC/Create",
        json!({ "SimulationID": sim, "ShapeID": shape }),
    )["CompartmentID"]
        .as_u64()
        .unwrap();

    let mut params = json!({ "SimulationID": sim, "CompartmentID": compartment });
    if let (Some(target), Value::Object(fields)) = (params.as_object_mut(), extra) {
        target.extend(fields);
    }
    let neuron = ok(router, "Neuron/LIFC/Create", params)["NeuronID"]
        .as_u64()
        .unwrap();
    (compartment, neuron)
}
