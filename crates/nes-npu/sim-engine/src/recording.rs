// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Whole-simulation recording armed by RECORD_ALL

use nes_npu_neural::{Neuron, NeuronId, SpikingNeuron, TIME_EPSILON_MS};
use serde::Serialize;

/// Per-tick membrane potentials of every neuron, for at most `max_record_time_ms`
#[derive(Debug, Clone, Default)]
pub struct Recording {
    start_ms: f64,
    max_record_time_ms: f64,
    time_ms: Vec<f64>,
    vm_mv: Vec<Vec<f64>>,
    /// Index into `time_ms` of each neuron's first sample
    first_sample: Vec<usize>,
}

/// Serializable view of a recording
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordingSnapshot {
    #[serde(rename = "Time_ms")]
    pub time_ms: Vec<f64>,
    pub neurons: Vec<NeuronTrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NeuronTrace {
    #[serde(rename = "NeuronID")]
    pub neuron_id: NeuronId,
    /// `vm_mv[i]` was sampled at `time_ms[first_sample_index + i]`; non-zero
    /// for neurons created while the recording was running
    pub first_sample_index: usize,
    #[serde(rename = "Vm_mV")]
    pub vm_mv: Vec<f64>,
    #[serde(rename = "SpikeTimes_ms")]
    pub spike_times_ms: Vec<f64>,
}

impl Recording {
    pub fn new(start_ms: f64, max_record_time_ms: f64) -> Self {
        Self {
            start_ms,
            max_record_time_ms,
            ..Default::default()
        }
    }

    pub fn max_record_time_ms(&self) -> f64 {
        self.max_record_time_ms
    }

    pub fn is_full(&self, t_ms: f64) -> bool {
        t_ms > self.start_ms + self.max_record_time_ms + TIME_EPSILON_MS
    }

    pub fn sample_count(&self) -> usize {
        self.time_ms.len()
    }

    /// Append one sample of every neuron's membrane potential.
    pub fn sample(&mut self, t_ms: f64, neurons: &[Neuron]) {
        if self.is_full(t_ms) {
            return;
        }
        if self.vm_mv.len() < neurons.len() {
            self.vm_mv.resize_with(neurons.len(), Vec::new);
            self.first_sample.resize(neurons.len(), self.time_ms.len());
        }
        self.time_ms.push(t_ms);
        for (trace, neuron) in self.vm_mv.iter_mut().zip(neurons) {
            trace.push(neuron.membrane_potential_mv());
        }
    }

    pub fn snapshot(&self, neurons: &[Neuron]) -> RecordingSnapshot {
        let end_ms = self.start_ms + self.max_record_time_ms + TIME_EPSILON_MS;
        let traces = neurons
            .iter()
            .enumerate()
            .map(|(i, neuron)| NeuronTrace {
                neuron_id: neuron.id(),
                first_sample_index: self
                    .first_sample
                    .get(i)
                    .copied()
                    .unwrap_or(self.time_ms.len()),
                vm_mv: self.vm_mv.get(i).cloned().unwrap_or_default(),
                spike_times_ms: neuron.spike_history().with_times(|times| {
                    times
                        .iter()
                        .copied()
                        .filter(|&t| t + TIME_EPSILON_MS >= self.start_ms && t <= end_ms)
                        .collect()
                }),
            })
            .collect();
        RecordingSnapshot {
            time_ms: self.time_ms.clone(),
            neurons: traces,
        }
    }
}
