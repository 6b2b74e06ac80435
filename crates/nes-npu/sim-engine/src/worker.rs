// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Per-simulation worker thread and the busy-checked runtime around it
//!
//! ```text
//! request handler                      worker thread
//! ───────────────                      ─────────────
//! try_claim(task)  ──┐
//! store inputs       │
//! publish_work()     │   wake ──────▶  work_requested?
//!                    │                 begin_processing()
//!                    │                 lock simulation, execute(task)
//!                    └──── busy ────   finish_processing()  (claim cleared last)
//! ```
//!
//! The worker wakes on a channel notification or after `poll_interval`,
//! whichever comes first, and exits when its shutdown flag is set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use nes_state_manager::{SimulationState, SimulationTask};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::simulation::{Simulation, SimulationId};

/// Long-lived execution context of one simulation
pub struct SimulationWorker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    wake: Sender<()>,
    name: String,
}

impl SimulationWorker {
    pub fn spawn(
        id: SimulationId,
        simulation: Arc<Mutex<Simulation>>,
        state: Arc<SimulationState>,
        poll_interval: Duration,
    ) -> EngineResult<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (wake, wake_rx) = channel::bounded(1);
        let name = format!("nes-sim-{}", id.0);

        let shutdown_clone = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                worker_loop(id, simulation, state, wake_rx, shutdown_clone, poll_interval)
            })
            .map_err(|e| EngineError::WorkerSpawn(e.to_string()))?;

        info!(target: "nes-sim-engine", "[SIM-WORKER] Started {}", name);
        Ok(Self {
            handle: Some(handle),
            shutdown,
            wake,
            name,
        })
    }

    /// Wake the worker now instead of at its next poll.
    pub fn notify(&self) {
        // A full channel already holds a pending wake-up
        let _ = self.wake.try_send(());
    }

    /// Signal the worker to stop and wait for it to finish
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(target: "nes-sim-engine", "[SIM-WORKER] {} panicked", self.name);
            } else {
                info!(target: "nes-sim-engine", "[SIM-WORKER] {} stopped", self.name);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SimulationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    id: SimulationId,
    simulation: Arc<Mutex<Simulation>>,
    state: Arc<SimulationState>,
    wake: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    while !shutdown.load(Ordering::Acquire) {
        match wake.recv_timeout(poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        if !state.work_requested() {
            continue;
        }

        let task = state.current_task();
        state.begin_processing();
        debug!(target: "nes-sim-engine", "[SIM-WORKER] {} picked up {}", id, task.as_str());
        simulation.lock().execute(task);
        state.finish_processing();
    }
    debug!(target: "nes-sim-engine", "[SIM-WORKER] {} loop exited", id);
}

/// A simulation, its lock-free state and its worker
///
/// Every mutation goes through here: long tasks via [`submit`](Self::submit),
/// synchronous edits via [`lock_idle`](Self::lock_idle). Both fail with
/// [`EngineError::Busy`] while another operation is in flight.
pub struct SimulationRuntime {
    id: SimulationId,
    state: Arc<SimulationState>,
    simulation: Arc<Mutex<Simulation>>,
    worker: Mutex<SimulationWorker>,
}

impl SimulationRuntime {
    /// Take ownership of `simulation` and start its worker.
    pub fn spawn(simulation: Simulation, poll_interval: Duration) -> EngineResult<Self> {
        let id = simulation.id();
        let state = Arc::clone(simulation.state());
        let simulation = Arc::new(Mutex::new(simulation));
        let worker = SimulationWorker::spawn(
            id,
            Arc::clone(&simulation),
            Arc::clone(&state),
            poll_interval,
        )?;
        Ok(Self {
            id,
            state,
            simulation,
            worker: Mutex::new(worker),
        })
    }

    pub fn id(&self) -> SimulationId {
        self.id
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Claim the simulation for `task` and hand it to the worker.
    /// `run_time_ms` is the RunFor duration or the RecordAll window.
    pub fn submit(&self, task: SimulationTask, run_time_ms: f64) -> EngineResult<()> {
        if !self.state.try_claim(task) {
            return Err(EngineError::Busy);
        }
        self.state.set_run_time_ms(run_time_ms);
        self.state.publish_work();
        self.worker.lock().notify();
        Ok(())
    }

    /// Exclusive access for a synchronous operation; fails while a task is
    /// claimed or running.
    pub fn lock_idle(&self) -> EngineResult<MutexGuard<'_, Simulation>> {
        let guard = self.simulation.try_lock().ok_or(EngineError::Busy)?;
        if self.state.is_busy() {
            return Err(EngineError::Busy);
        }
        Ok(guard)
    }

    /// Block until no task is claimed or running.
    pub fn wait_idle(&self, poll_interval: Duration) {
        while self.state.is_busy() {
            thread::sleep(poll_interval);
        }
    }

    /// Stop and join the worker. Idempotent.
    pub fn shutdown(&self) {
        self.worker.lock().stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(5);

    fn runtime() -> SimulationRuntime {
        let state = Arc::new(SimulationState::new());
        let sim = Simulation::new(SimulationId(0), "w", 0, 0.1, state).unwrap();
        SimulationRuntime::spawn(sim, POLL).unwrap()
    }

    fn wait(rt: &SimulationRuntime) {
        let start = Instant::now();
        while rt.is_busy() {
            assert!(start.elapsed() < Duration::from_secs(10), "worker never finished");
            thread::sleep(POLL);
        }
    }

    #[test]
    fn test_run_for_completes_and_publishes_time() {
        let rt = runtime();
        rt.submit(SimulationTask::RunFor, 2.0).unwrap();
        wait(&rt);
        assert!((rt.state().time_ms() - 2.0).abs() < 1e-9);
        assert_eq!(rt.state().current_task(), SimulationTask::None);
    }

    #[test]
    fn test_second_submit_while_busy_is_rejected() {
        let rt = runtime();
        rt.submit(SimulationTask::RunFor, 1.0).unwrap();
        assert!(matches!(
            rt.submit(SimulationTask::RunFor, 1.0),
            Err(EngineError::Busy)
        ));
        assert!(matches!(rt.lock_idle(), Err(EngineError::Busy)));
        wait(&rt);
        assert!(rt.lock_idle().is_ok());
    }

    #[test]
    fn test_shutdown_joins_worker() {
        let rt = runtime();
        assert!(rt.worker.lock().is_running());
        rt.shutdown();
        assert!(!rt.worker.lock().is_running());
        rt.shutdown();
    }
}
