// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Receptor parameter records
//!
//! Receptors are immutable once created. They are shared (`Arc`) by the
//! simulation's receptor collection and weakly referenced by the receptor
//! data records of destination neurons.

use std::str::FromStr;

use crate::synapse::stdp::StdpParams;
use crate::types::error::{
    require_finite, require_non_negative, require_positive, require_unit_interval,
};
use crate::types::{CompartmentId, NeuralError, NeuralResult, ReceptorId, Vec3D};

/// Neurotransmitter carried by a receptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Neurotransmitter {
    AMPA,
    NMDA,
    GABA,
}

impl Neurotransmitter {
    /// Default reversal potential (mV) used when a receptor does not give one
    pub fn default_reversal_potential_mv(&self) -> f64 {
        match self {
            Neurotransmitter::AMPA | Neurotransmitter::NMDA => 0.0,
            Neurotransmitter::GABA => -70.0,
        }
    }

    pub fn is_inhibitory(&self) -> bool {
        matches!(self, Neurotransmitter::GABA)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Neurotransmitter::AMPA => "AMPA",
            Neurotransmitter::NMDA => "NMDA",
            Neurotransmitter::GABA => "GABA",
        }
    }
}

impl FromStr for Neurotransmitter {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AMPA" => Ok(Neurotransmitter::AMPA),
            "NMDA" => Ok(Neurotransmitter::NMDA),
            "GABA" => Ok(Neurotransmitter::GABA),
            other => Err(NeuralError::UnknownVariant {
                kind: "neurotransmitter",
                name: other.to_string(),
            }),
        }
    }
}

/// Basic receptor driving BS and SC neurons
#[derive(Debug, Clone, PartialEq)]
pub struct Receptor {
    pub id: ReceptorId,
    pub name: String,
    pub source_compartment: CompartmentId,
    pub destination_compartment: CompartmentId,
    pub conductance_ns: f64,
    pub tau_rise_ms: f64,
    pub tau_decay_ms: f64,
    pub neurotransmitter: Neurotransmitter,
    pub position_um: Vec3D,
}

impl Receptor {
    pub fn validate(&self) -> NeuralResult<()> {
        require_non_negative("Conductance_nS", self.conductance_ns)?;
        require_non_negative("TimeConstantRise_ms", self.tau_rise_ms)?;
        require_positive("TimeConstantDecay_ms", self.tau_decay_ms)
    }

    pub fn reversal_potential_mv(&self) -> f64 {
        self.neurotransmitter.default_reversal_potential_mv()
    }
}

/// LIFC receptor: full conductance-based synapse parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LIFCReceptor {
    pub id: ReceptorId,
    pub name: String,
    pub source_compartment: CompartmentId,
    pub destination_compartment: CompartmentId,
    pub neurotransmitter: Neurotransmitter,
    pub reversal_potential_mv: f64,
    pub psp_rise_ms: f64,
    pub psp_decay_ms: f64,
    pub onset_delay_ms: f64,
    pub peak_conductance_ns: f64,
    /// Initial synaptic weight in `[0, 1]`
    pub weight: f64,
    /// Subject to the Mg²⁺ block (NMDA-type)
    pub voltage_gated: bool,
    pub stdp: StdpParams,
    pub position_um: Vec3D,
}

impl LIFCReceptor {
    pub fn validate(&self) -> NeuralResult<()> {
        require_finite("ReversalPotential_mV", self.reversal_potential_mv)?;
        require_non_negative("PSPRise_ms", self.psp_rise_ms)?;
        require_positive("PSPDecay_ms", self.psp_decay_ms)?;
        require_non_negative("OnsetDelay_ms", self.onset_delay_ms)?;
        require_non_negative("PeakConductance_nS", self.peak_conductance_ns)?;
        require_unit_interval("Weight", self.weight)?;
        self.stdp.validate()
    }
}
