// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Lock-free per-simulation state
//!
//! A request handler claims the simulation by swapping `current_task` from
//! [`SimulationTask::None`] to its task, stores the task inputs, then
//! publishes `work_requested`. The worker flips `is_processing` while it runs
//! and clears the claim last, so a reader that sees `current_task == None`
//! also sees every other field back at rest.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Long-running task a simulation's worker can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SimulationTask {
    None = 0,
    Reset = 1,
    RunFor = 2,
    RecordAll = 3,
    VsdaConversion = 4,
}

impl SimulationTask {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SimulationTask::Reset,
            2 => SimulationTask::RunFor,
            3 => SimulationTask::RecordAll,
            4 => SimulationTask::VsdaConversion,
            _ => SimulationTask::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationTask::None => "None",
            SimulationTask::Reset => "Reset",
            SimulationTask::RunFor => "RunFor",
            SimulationTask::RecordAll => "RecordAll",
            SimulationTask::VsdaConversion => "VSDAConversion",
        }
    }
}

/// Flags and clock of one simulation, readable without its lock
#[derive(Debug)]
pub struct SimulationState {
    current_task: AtomicU8,
    work_requested: AtomicBool,
    is_processing: AtomicBool,
    is_rendering: AtomicBool,
    // f64 as u64 bits
    time_ms: AtomicU64,
    run_time_ms: AtomicU64,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            current_task: AtomicU8::new(SimulationTask::None as u8),
            work_requested: AtomicBool::new(false),
            is_processing: AtomicBool::new(false),
            is_rendering: AtomicBool::new(false),
            time_ms: AtomicU64::new(0f64.to_bits()),
            run_time_ms: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn current_task(&self) -> SimulationTask {
        SimulationTask::from_u8(self.current_task.load(Ordering::Acquire))
    }

    /// A task is claimed or the worker is still running one.
    pub fn is_busy(&self) -> bool {
        self.current_task() != SimulationTask::None || self.is_processing.load(Ordering::Acquire)
    }

    /// Claim the simulation for `task`. Fails if any task is already claimed.
    pub fn try_claim(&self, task: SimulationTask) -> bool {
        if task == SimulationTask::None || self.is_processing.load(Ordering::Acquire) {
            return false;
        }
        self.current_task
            .compare_exchange(
                SimulationTask::None as u8,
                task as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Drop a claim that was never published.
    pub fn release_claim(&self) {
        self.current_task
            .store(SimulationTask::None as u8, Ordering::Release);
    }

    /// Hand the claimed task to the worker. Task inputs must be stored first.
    pub fn publish_work(&self) {
        self.work_requested.store(true, Ordering::Release);
    }

    pub fn work_requested(&self) -> bool {
        self.work_requested.load(Ordering::Acquire)
    }

    pub fn begin_processing(&self) {
        self.is_processing.store(true, Ordering::Release);
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::Acquire)
    }

    /// Mark the running task done; the claim is released last.
    pub fn finish_processing(&self) {
        self.is_processing.store(false, Ordering::Release);
        self.work_requested.store(false, Ordering::Release);
        self.current_task
            .store(SimulationTask::None as u8, Ordering::Release);
    }

    pub fn set_rendering(&self, rendering: bool) {
        self.is_rendering.store(rendering, Ordering::Release);
    }

    pub fn is_rendering(&self) -> bool {
        self.is_rendering.load(Ordering::Acquire)
    }

    pub fn time_ms(&self) -> f64 {
        f64::from_bits(self.time_ms.load(Ordering::Acquire))
    }

    pub fn set_time_ms(&self, t_ms: f64) {
        self.time_ms.store(t_ms.to_bits(), Ordering::Release);
    }

    /// Duration requested by the pending RunFor/RecordAll
    pub fn run_time_ms(&self) -> f64 {
        f64::from_bits(self.run_time_ms.load(Ordering::Acquire))
    }

    pub fn set_run_time_ms(&self, run_time_ms: f64) {
        self.run_time_ms
            .store(run_time_ms.to_bits(), Ordering::Release);
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_claim_is_single_flight() {
        let state = SimulationState::new();
        assert!(!state.is_busy());
        assert!(state.try_claim(SimulationTask::RunFor));
        assert!(!state.try_claim(SimulationTask::Reset));
        assert_eq!(state.current_task(), SimulationTask::RunFor);
        assert!(state.is_busy());
    }

    #[test]
    fn test_cannot_claim_none() {
        let state = SimulationState::new();
        assert!(!state.try_claim(SimulationTask::None));
        assert!(!state.is_busy());
    }

    #[test]
    fn test_finish_returns_to_idle() {
        let state = SimulationState::new();
        assert!(state.try_claim(SimulationTask::RecordAll));
        state.set_run_time_ms(12.5);
        state.publish_work();
        assert!(state.work_requested());
        state.begin_processing();
        state.finish_processing();
        assert!(!state.is_busy());
        assert!(!state.work_requested());
        assert_eq!(state.run_time_ms(), 12.5);
    }

    #[test]
    fn test_processing_alone_counts_as_busy() {
        let state = SimulationState::new();
        state.begin_processing();
        assert!(state.is_busy());
        assert!(!state.try_claim(SimulationTask::Reset));
    }

    #[test]
    fn test_time_round_trips_through_bits() {
        let state = SimulationState::new();
        state.set_time_ms(0.30000000000000004);
        assert_eq!(state.time_ms(), 0.30000000000000004);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let state = Arc::new(SimulationState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.try_claim(SimulationTask::RunFor))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
