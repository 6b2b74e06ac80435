// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-connection synaptic runtime state
//!
//! A destination neuron owns one record per presynaptic partner (and, for
//! LIFC neurons, per receptor class). Each record keeps a strong handle to
//! the source neuron's spike history and weak handles to the receptor
//! parameter records it aggregates.
//!
//! ## LIFC aggregation
//!
//! ```text
//! g_peak  = Σ g_i                          summed peak conductance
//! w       = Σ g_i·w_i / Σ g_i              conductance-weighted weight
//! τ_rise, τ_decay, delay = median over receptors   (computed exactly once)
//!
//! g_k(t)  = g_peak × w × Σ_s kernel(t − s − delay) × [B(V) if voltage gated]
//! ```
//!
//! Spikes are only visible to destination neurons on ticks strictly after the
//! tick in which they were emitted.

use std::sync::{Arc, Weak};

use tracing::warn;

use crate::synapse::kernel::{mg_block, DoubleExponential};
use crate::synapse::receptor::{LIFCReceptor, Receptor};
use crate::synapse::stdp::StdpParams;
use crate::types::{NeuralResult, NeuronId, ReceptorId, SpikeHistory, TIME_EPSILON_MS};

/// Median of a non-empty slice (mean of the two middle values for even lengths)
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Number of spikes in `times` emitted strictly before tick `t_ms`
#[inline]
fn visible_before(times: &[f64], t_ms: f64) -> usize {
    times.partition_point(|&s| s < t_ms - TIME_EPSILON_MS)
}

#[derive(Debug, Clone)]
struct ReceptorAggregate {
    peak_conductance_sum_ns: f64,
    reversal_potential_mv: f64,
    voltage_gated: bool,
    onset_delay_ms: f64,
    kernel: DoubleExponential,
    stdp: StdpParams,
    receptor_ids: Vec<ReceptorId>,
}

/// Aggregated synaptic state for one (source, destination, receptor class) connection
#[derive(Debug, Clone)]
pub struct LIFCReceptorData {
    source_neuron: NeuronId,
    source_spikes: SpikeHistory,
    receptors: Vec<Weak<LIFCReceptor>>,
    aggregate: Option<ReceptorAggregate>,
    weight: f64,
    conductance_ns: f64,
    /// First source spike still inside the kernel's support
    window_start: usize,
    /// Source spikes already considered for STDP pairing
    observed_spikes: usize,
}

impl LIFCReceptorData {
    pub fn new(source_neuron: NeuronId, source_spikes: SpikeHistory) -> Self {
        Self {
            source_neuron,
            source_spikes,
            receptors: Vec::new(),
            aggregate: None,
            weight: 0.0,
            conductance_ns: 0.0,
            window_start: 0,
            observed_spikes: 0,
        }
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggregate.is_some()
    }

    /// Add a receptor to this connection. Ignored once the aggregate exists.
    pub fn add_receptor(&mut self, receptor: &Arc<LIFCReceptor>) {
        if self.aggregate.is_some() {
            warn!(
                target: "nes-neural",
                "Receptor {} added to an already aggregated connection from {}; ignored",
                receptor.id, self.source_neuron
            );
            return;
        }
        self.receptors.push(Arc::downgrade(receptor));
    }

    /// Compute summed conductance, weighted weight and medians if not done yet.
    ///
    /// Returns `false` when no live receptor backs this record.
    pub fn ensure_aggregated(&mut self) -> bool {
        if self.aggregate.is_some() {
            return true;
        }

        let live: Vec<Arc<LIFCReceptor>> =
            self.receptors.iter().filter_map(Weak::upgrade).collect();
        let Some(first) = live.first() else {
            warn!(
                target: "nes-neural",
                "Connection from {} has no live receptors", self.source_neuron
            );
            return false;
        };

        let g_sum: f64 = live.iter().map(|r| r.peak_conductance_ns).sum();
        let (weight, reversal) = if g_sum > 0.0 {
            (
                live.iter().map(|r| r.peak_conductance_ns * r.weight).sum::<f64>() / g_sum,
                live.iter()
                    .map(|r| r.peak_conductance_ns * r.reversal_potential_mv)
                    .sum::<f64>()
                    / g_sum,
            )
        } else {
            let n = live.len() as f64;
            (
                live.iter().map(|r| r.weight).sum::<f64>() / n,
                live.iter().map(|r| r.reversal_potential_mv).sum::<f64>() / n,
            )
        };

        let mut rises: Vec<f64> = live.iter().map(|r| r.psp_rise_ms).collect();
        let mut decays: Vec<f64> = live.iter().map(|r| r.psp_decay_ms).collect();
        let mut delays: Vec<f64> = live.iter().map(|r| r.onset_delay_ms).collect();

        let kernel = match DoubleExponential::new(median(&mut rises), median(&mut decays)) {
            Ok(kernel) => kernel,
            Err(e) => {
                warn!(
                    target: "nes-neural",
                    "Connection from {} has an unusable kernel: {}", self.source_neuron, e
                );
                return false;
            }
        };

        self.weight = weight.clamp(0.0, 1.0);
        self.aggregate = Some(ReceptorAggregate {
            peak_conductance_sum_ns: g_sum,
            reversal_potential_mv: reversal,
            voltage_gated: live.iter().any(|r| r.voltage_gated),
            onset_delay_ms: median(&mut delays),
            kernel,
            stdp: first.stdp,
            receptor_ids: live.iter().map(|r| r.id).collect(),
        });
        true
    }

    /// Recompute the live conductance `g_k` for tick `t_ms`.
    ///
    /// Presynaptic spikes seen for the first time are paired with the most
    /// recent postsynaptic spike (post-before-pre depression).
    pub fn update_conductance(
        &mut self,
        t_ms: f64,
        v_mv: f64,
        last_post_spike_ms: Option<f64>,
    ) -> f64 {
        let Some(agg) = self.aggregate.as_ref() else {
            self.conductance_ns = 0.0;
            return 0.0;
        };

        let mut weight = self.weight;
        let mut window_start = self.window_start;
        let observed = self.observed_spikes;
        let support = agg.kernel.support_ms();

        let (activation, visible) = self.source_spikes.with_times(|times| {
            let visible = visible_before(times, t_ms);

            if agg.stdp.is_enabled() {
                if let Some(t_post) = last_post_spike_ms {
                    for &t_pre in &times[observed.min(visible)..visible] {
                        weight = agg.stdp.apply(weight, t_post - t_pre);
                    }
                }
            }

            while window_start < visible
                && t_ms - times[window_start] - agg.onset_delay_ms > support
            {
                window_start += 1;
            }

            let activation: f64 = times[window_start..visible]
                .iter()
                .map(|&s| agg.kernel.value(t_ms - s - agg.onset_delay_ms))
                .sum();
            (activation, visible)
        });

        let gate = if agg.voltage_gated { mg_block(v_mv) } else { 1.0 };
        self.weight = weight;
        self.window_start = window_start;
        self.observed_spikes = visible;
        self.conductance_ns = agg.peak_conductance_sum_ns * weight * activation * gate;
        self.conductance_ns
    }

    /// Pre-before-post potentiation when the destination neuron spikes at `t_post_ms`
    pub fn on_post_spike(&mut self, t_post_ms: f64) {
        let Some(agg) = self.aggregate.as_ref() else {
            return;
        };
        if !agg.stdp.is_enabled() {
            return;
        }
        let last_pre = self.source_spikes.with_times(|times| {
            let visible = visible_before(times, t_post_ms);
            visible.checked_sub(1).map(|i| times[i])
        });
        if let Some(t_pre) = last_pre {
            self.weight = agg.stdp.apply(self.weight, t_post_ms - t_pre);
        }
    }

    pub fn source_neuron(&self) -> NeuronId {
        self.source_neuron
    }

    pub fn source_spikes(&self) -> &SpikeHistory {
        &self.source_spikes
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Live conductance from the last update (nS)
    pub fn conductance_ns(&self) -> f64 {
        self.conductance_ns
    }

    pub fn reversal_potential_mv(&self) -> f64 {
        self.aggregate
            .as_ref()
            .map_or(0.0, |a| a.reversal_potential_mv)
    }

    pub fn peak_conductance_sum_ns(&self) -> f64 {
        self.aggregate
            .as_ref()
            .map_or(0.0, |a| a.peak_conductance_sum_ns)
    }

    pub fn voltage_gated(&self) -> bool {
        self.aggregate.as_ref().is_some_and(|a| a.voltage_gated)
    }

    /// Median (rise, decay, onset delay) in ms, once aggregated
    pub fn medians_ms(&self) -> Option<(f64, f64, f64)> {
        self.aggregate.as_ref().map(|a| {
            (
                a.kernel.tau_rise_ms(),
                a.kernel.tau_decay_ms(),
                a.onset_delay_ms,
            )
        })
    }

    pub fn receptor_ids(&self) -> &[ReceptorId] {
        match &self.aggregate {
            Some(agg) => &agg.receptor_ids,
            None => &[],
        }
    }

    /// Number of receptors attached (live or not)
    pub fn receptor_count(&self) -> usize {
        self.receptors.len()
    }
}

/// Per-connection state for a basic receptor (BS and SC neurons)
///
/// BS/SC somata are passive, so a receptor contributes a postsynaptic
/// potential rather than a conductance:
///
/// ```text
/// amplitude_mV = g_nS × (E_rev − V_rest) × R_in / 1000
/// PSP(t)       = amplitude × Σ_s kernel(t − s)
/// ```
#[derive(Debug, Clone)]
pub struct BasicReceptorData {
    source_neuron: NeuronId,
    source_spikes: SpikeHistory,
    receptor: Weak<Receptor>,
    receptor_id: ReceptorId,
    kernel: DoubleExponential,
    conductance_ns: f64,
    reversal_potential_mv: f64,
    window_start: usize,
}

impl BasicReceptorData {
    pub fn new(
        source_neuron: NeuronId,
        source_spikes: SpikeHistory,
        receptor: &Arc<Receptor>,
    ) -> NeuralResult<Self> {
        Ok(Self {
            source_neuron,
            source_spikes,
            receptor: Arc::downgrade(receptor),
            receptor_id: receptor.id,
            kernel: DoubleExponential::new(receptor.tau_rise_ms, receptor.tau_decay_ms)?,
            conductance_ns: receptor.conductance_ns,
            reversal_potential_mv: receptor.reversal_potential_mv(),
            window_start: 0,
        })
    }

    /// Postsynaptic potential (mV) contributed at tick `t_ms`
    pub fn psp_mv(&mut self, t_ms: f64, v_rest_mv: f64, input_resistance_mohm: f64) -> f64 {
        let amplitude =
            self.conductance_ns * (self.reversal_potential_mv - v_rest_mv) * input_resistance_mohm
                / 1000.0;
        let support = self.kernel.support_ms();
        let kernel = self.kernel;
        let mut window_start = self.window_start;

        let activation = self.source_spikes.with_times(|times| {
            let visible = visible_before(times, t_ms);
            while window_start < visible && t_ms - times[window_start] > support {
                window_start += 1;
            }
            times[window_start..visible]
                .iter()
                .map(|&s| kernel.value(t_ms - s))
                .sum::<f64>()
        });

        self.window_start = window_start;
        amplitude * activation
    }

    pub fn source_neuron(&self) -> NeuronId {
        self.source_neuron
    }

    pub fn receptor_id(&self) -> ReceptorId {
        self.receptor_id
    }

    /// False once the receptor record is gone
    pub fn is_live(&self) -> bool {
        self.receptor.strong_count() > 0
    }

    pub fn conductance_ns(&self) -> f64 {
        self.conductance_ns
    }
}
