// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared spike-time histories
//!
//! A neuron owns its history and is its only writer. Every receptor record
//! whose source is that neuron holds a clone of the handle and reads it while
//! computing conductances, so histories are `Arc<RwLock<..>>` rather than
//! plain vectors.

use std::sync::Arc;

use parking_lot::RwLock;

/// Ordered, append-only sequence of spike times (ms)
#[derive(Debug, Clone, Default)]
pub struct SpikeHistory {
    times: Arc<RwLock<Vec<f64>>>,
}

impl SpikeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a spike time. Times must be pushed in non-decreasing order.
    pub fn push(&self, t_ms: f64) {
        let mut times = self.times.write();
        debug_assert!(times.last().map_or(true, |&last| last <= t_ms));
        times.push(t_ms);
    }

    pub fn len(&self) -> usize {
        self.times.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.read().is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.times.read().last().copied()
    }

    /// Copy of the full history
    pub fn snapshot(&self) -> Vec<f64> {
        self.times.read().clone()
    }

    /// Run `f` over the history while holding the read lock
    pub fn with_times<R>(&self, f: impl FnOnce(&[f64]) -> R) -> R {
        let times = self.times.read();
        f(&times)
    }

    /// Forget every spike (used when a simulation is reset)
    pub fn clear(&self) {
        self.times.write().clear();
    }

    /// True when both handles point at the same underlying history
    pub fn same_history(&self, other: &SpikeHistory) -> bool {
        Arc::ptr_eq(&self.times, &other.times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let a = SpikeHistory::new();
        let b = a.clone();
        a.push(1.0);
        a.push(2.5);
        assert_eq!(b.snapshot(), vec![1.0, 2.5]);
        assert!(a.same_history(&b));
        assert_eq!(b.last(), Some(2.5));

        b.clear();
        assert!(a.is_empty());
    }

    #[test]
    fn test_with_times_reads_in_place() {
        let h = SpikeHistory::new();
        h.push(0.0);
        h.push(3.0);
        let count_before_two = h.with_times(|t| t.partition_point(|&s| s < 2.0));
        assert_eq!(count_before_two, 1);
    }
}
