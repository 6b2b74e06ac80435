// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Simulation registry.

Append-only collection of simulations indexed by [`SimulationId`]. A handle is
pushed only after its simulation and worker are fully constructed, under the
registry write lock, so readers never observe a half-built entry.

Each handle also keeps the simulation's request log: every successful logged
request, in the order it took effect. The log is appended while the
simulation is still held, so its order is the order of the mutations.
*/

use std::sync::Arc;
use std::time::Duration;

use nes_config::SimulationConfig;
use nes_npu_sim_engine::{Simulation, SimulationId, SimulationRuntime, VoxelRenderer};
use nes_state_manager::{SavedRequest, SavedSimulation, SimulationState, SimulationTask};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::types::{ServiceError, ServiceResult};

/// One registered simulation with its runtime and request log
pub struct SimulationHandle {
    runtime: SimulationRuntime,
    name: String,
    seed: u64,
    request_log: Mutex<Vec<SavedRequest>>,
}

impl SimulationHandle {
    pub fn id(&self) -> SimulationId {
        self.runtime.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn runtime(&self) -> &SimulationRuntime {
        &self.runtime
    }

    pub fn state(&self) -> &SimulationState {
        self.runtime.state()
    }

    pub fn is_busy(&self) -> bool {
        self.runtime.is_busy()
    }

    /// Run a synchronous mutation with exclusive access to the simulation.
    ///
    /// Fails with [`ServiceError::SimulationBusy`] while any other operation
    /// is in flight. On success `entry`, if any, is appended to the request log.
    pub fn mutate<T>(
        &self,
        entry: Option<SavedRequest>,
        f: impl FnOnce(&mut Simulation) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut log = self
            .request_log
            .try_lock()
            .ok_or(ServiceError::SimulationBusy)?;
        let mut simulation = self.runtime.lock_idle()?;
        let out = f(&mut simulation)?;
        log.extend(entry);
        Ok(out)
    }

    /// Busy-checked read access to the simulation
    pub fn read<T>(&self, f: impl FnOnce(&Simulation) -> ServiceResult<T>) -> ServiceResult<T> {
        let simulation = self.runtime.lock_idle()?;
        f(&simulation)
    }

    /// Hand `task` to the worker. Fails with [`ServiceError::SimulationBusy`]
    /// while another operation is in flight.
    pub fn submit(
        &self,
        entry: Option<SavedRequest>,
        task: SimulationTask,
        run_time_ms: f64,
    ) -> ServiceResult<()> {
        let mut log = self
            .request_log
            .try_lock()
            .ok_or(ServiceError::SimulationBusy)?;
        self.runtime.submit(task, run_time_ms)?;
        log.extend(entry);
        Ok(())
    }

    /// Append to the request log without touching the simulation
    pub fn record(&self, entry: SavedRequest) -> ServiceResult<()> {
        self.request_log
            .try_lock()
            .ok_or(ServiceError::SimulationBusy)?
            .push(entry);
        Ok(())
    }

    pub fn request_log(&self) -> Vec<SavedRequest> {
        self.request_log.lock().clone()
    }

    /// Saved form of this simulation under `saved_sim_name`
    pub fn snapshot(&self, saved_sim_name: impl Into<String>) -> SavedSimulation {
        SavedSimulation {
            saved_sim_name: saved_sim_name.into(),
            name: self.name.clone(),
            seed: self.seed,
            requests: self.request_log(),
        }
    }

    pub fn wait_idle(&self, poll_interval: Duration) {
        self.runtime.wait_idle(poll_interval);
    }
}

impl std::fmt::Debug for SimulationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationHandle")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("seed", &self.seed)
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Owner of every simulation in the process
pub struct SimulationRegistry {
    simulations: RwLock<Vec<Arc<SimulationHandle>>>,
    config: SimulationConfig,
    renderer: Option<Arc<dyn VoxelRenderer>>,
}

impl SimulationRegistry {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            simulations: RwLock::new(Vec::new()),
            config,
            renderer: None,
        }
    }

    /// Attach the renderer handed to every simulation created afterwards
    pub fn with_renderer(mut self, renderer: Arc<dyn VoxelRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Create a simulation and start its worker. The ID is the next index.
    /// `first_entry` starts the request log before the handle is published.
    pub fn create(
        &self,
        name: &str,
        seed: u64,
        first_entry: Option<SavedRequest>,
    ) -> ServiceResult<Arc<SimulationHandle>> {
        let mut simulations = self.simulations.write();
        let id = u32::try_from(simulations.len())
            .map(SimulationId)
            .map_err(|_| ServiceError::Internal("simulation ID space exhausted".to_string()))?;

        let mut simulation = Simulation::new(
            id,
            name,
            seed,
            self.config.timestep_ms,
            Arc::new(SimulationState::new()),
        )?;
        if let Some(renderer) = &self.renderer {
            simulation.set_renderer(Arc::clone(renderer));
        }
        let runtime = SimulationRuntime::spawn(simulation, self.config.worker_poll_interval())?;

        let handle = Arc::new(SimulationHandle {
            runtime,
            name: name.to_string(),
            seed,
            request_log: Mutex::new(first_entry.into_iter().collect()),
        });
        simulations.push(Arc::clone(&handle));

        info!(target: "nes-services", "Created {} '{}' (seed {})", id, name, seed);
        Ok(handle)
    }

    pub fn get(&self, id: SimulationId) -> ServiceResult<Arc<SimulationHandle>> {
        self.simulations
            .read()
            .get(id.index())
            .cloned()
            .ok_or_else(|| ServiceError::invalid(format!("Invalid SimulationID {}", id.0)))
    }

    pub fn len(&self) -> usize {
        self.simulations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn handles(&self) -> Vec<Arc<SimulationHandle>> {
        self.simulations.read().clone()
    }

    /// Block until no simulation has an operation in flight.
    pub fn wait_all_idle(&self, poll_interval: Duration) {
        for handle in self.handles() {
            handle.wait_idle(poll_interval);
        }
    }

    /// Stop and join every worker. Idempotent.
    pub fn shutdown(&self) {
        let handles = self.handles();
        debug!(target: "nes-services", "Stopping {} simulation workers", handles.len());
        for handle in handles {
            handle.runtime.shutdown();
        }
    }
}

impl Drop for SimulationRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SimulationRegistry {
        SimulationRegistry::new(SimulationConfig {
            worker_poll_interval_ms: 2,
            ..SimulationConfig::default()
        })
    }

    #[test]
    fn test_ids_are_dense_indices() {
        let registry = registry();
        let a = registry.create("a", 1, None).unwrap();
        let b = registry.create("b", 2, None).unwrap();
        assert_eq!(a.id(), SimulationId(0));
        assert_eq!(b.id(), SimulationId(1));
        assert_eq!(registry.get(SimulationId(1)).unwrap().name(), "b");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_out_of_range_id_is_invalid() {
        let registry = registry();
        assert!(matches!(
            registry.get(SimulationId(0)),
            Err(ServiceError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_failed_mutation_is_not_logged() {
        let registry = registry();
        let handle = registry.create("log", 0, None).unwrap();
        let entry = || SavedRequest {
            route: "Geometry/Shape/Sphere/Create".to_string(),
            params: serde_json::json!({}),
        };

        let bad = handle.mutate(Some(entry()), |sim| {
            Ok(sim.add_sphere(Default::default(), -1.0)?)
        });
        assert!(bad.is_err());
        assert!(handle.request_log().is_empty());

        handle
            .mutate(Some(entry()), |sim| Ok(sim.add_sphere(Default::default(), 1.0)?))
            .unwrap();
        assert_eq!(handle.request_log().len(), 1);
    }

    #[test]
    fn test_submit_while_busy_fails() {
        let registry = registry();
        let handle = registry.create("busy", 0, None).unwrap();
        handle.submit(None, SimulationTask::RunFor, 2000.0).unwrap();
        assert_eq!(
            handle.submit(None, SimulationTask::RunFor, 1.0),
            Err(ServiceError::SimulationBusy)
        );
        assert_eq!(
            handle.mutate(None, |_| Ok(())),
            Err(ServiceError::SimulationBusy)
        );
        handle.wait_idle(Duration::from_millis(1));
        assert!(handle.mutate(None, |_| Ok(())).is_ok());
    }
}
