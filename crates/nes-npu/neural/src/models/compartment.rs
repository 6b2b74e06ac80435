// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Compartments: spatial/electrical units tied to a shape

use crate::models::passive::PassiveSomaParams;
use crate::types::{CompartmentId, ShapeId};

/// Ball-and-stick compartment with its own passive membrane parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BSCompartment {
    pub id: CompartmentId,
    pub name: String,
    pub shape: ShapeId,
    pub membrane: PassiveSomaParams,
}

/// LIFC compartment; electrical parameters live on the LIFC neuron
#[derive(Debug, Clone, PartialEq)]
pub struct LIFCCompartment {
    pub id: CompartmentId,
    pub name: String,
    pub shape: ShapeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Compartment {
    BS(BSCompartment),
    LIFC(LIFCCompartment),
}

impl Compartment {
    pub fn id(&self) -> CompartmentId {
        match self {
            Compartment::BS(c) => c.id,
            Compartment::LIFC(c) => c.id,
        }
    }

    pub fn shape(&self) -> ShapeId {
        match self {
            Compartment::BS(c) => c.shape,
            Compartment::LIFC(c) => c.shape,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Compartment::BS(c) => &c.name,
            Compartment::LIFC(c) => &c.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Compartment::BS(_) => "BS",
            Compartment::LIFC(_) => "LIFC",
        }
    }
}
