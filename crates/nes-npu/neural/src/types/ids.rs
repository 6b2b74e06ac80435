// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Identity types for simulation entities
//!
//! Every entity collection inside a simulation is append-only, so an ID is
//! simply the entity's index in its collection.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Neuron ID (index into a simulation's neuron collection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeuronId(pub u32);

impl NeuronId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Neuron({})", self.0)
    }
}

/// Compartment ID (index into a simulation's compartment collection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompartmentId(pub u32);

impl CompartmentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Compartment({})", self.0)
    }
}

/// Shape ID (index into a simulation's geometry collection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(pub u32);

impl ShapeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({})", self.0)
    }
}

/// Receptor ID
///
/// Basic receptors and LIFC receptors live in separate collections, so the
/// same numeric value may name one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceptorId(pub u32);

impl ReceptorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ReceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Receptor({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&NeuronId(7)).unwrap();
        assert_eq!(json, "7");
        let id: CompartmentId = serde_json::from_str("3").unwrap();
        assert_eq!(id, CompartmentId(3));
        assert_eq!(id.index(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(NeuronId(2).to_string(), "Neuron(2)");
        assert_eq!(ShapeId(0).to_string(), "Shape(0)");
    }
}
