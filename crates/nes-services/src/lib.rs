// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# NES Service Layer

The request boundary of the Neuron Emulation Server: a transport-agnostic
router over the simulation registry and the manager-task system. The wire
layer (RPC, JSON transport) lives outside this crate and hands requests in as
`(route, serde_json::Value)` pairs.

## Architecture

```text
┌─────────────────────────────────────────────────────────────────┐
│                    TRANSPORT ADAPTERS (external)                 │
└────────────────────────────┬────────────────────────────────────┘
                             ↓  route + JSON params
┌─────────────────────────────────────────────────────────────────┐
│              SERVICE LAYER (This Crate)                          │
│  • RequestRouter      - parse, resolve, busy check, dispatch    │
│  • SimulationRegistry - append-only simulations + request logs  │
│  • ManagerTaskSystem  - background load/save tasks              │
└────────────────────────────┬────────────────────────────────────┘
                             ↓
┌─────────────────────────────────────────────────────────────────┐
│                   DOMAIN LAYER                                   │
│  nes-npu-sim-engine, nes-npu-neural, nes-state-manager           │
└─────────────────────────────────────────────────────────────────┘
```

## Usage

```rust
use nes_config::NesConfig;
use nes_services::RequestRouter;
use serde_json::json;

let router = RequestRouter::new(&NesConfig::default());
let created = router.handle("Simulation/Create", &json!({ "Name": "T1" }));
assert_eq!(created["StatusCode"], 0);
assert_eq!(created["SimulationID"], 0);

let status = router.handle("Simulation/GetStatus", &json!({ "SimulationID": 0 }));
assert_eq!(status["IsSimulating"], false);
router.shutdown();
```
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod handlers;
pub mod manager_tasks;
pub mod registry;
pub mod router;
pub mod types;

pub use manager_tasks::{ManagerTaskData, ManagerTaskSystem, TaskStatus};
pub use registry::{SimulationHandle, SimulationRegistry};
pub use router::{HandlerContext, Request, RequestRouter, Route, RouterSettings};
pub use types::{ServiceError, ServiceResult, StatusCode};
