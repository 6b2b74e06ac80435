// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Boundary to an external voxel renderer (VSDA)
//!
//! The engine never rasterizes anything itself. VSDA_CONVERSION hands the
//! simulation's geometry to whatever [`VoxelRenderer`] is attached.

use nes_npu_neural::{Compartment, Shape};

/// Geometry of one simulation as handed to a renderer
#[derive(Debug, Clone, Copy)]
pub struct RenderScene<'a> {
    pub simulation_id: u32,
    pub shapes: &'a [Shape],
    pub compartments: &'a [Compartment],
}

/// Renderer trait (implemented outside the engine)
pub trait VoxelRenderer: Send + Sync {
    /// Render `scene`. Errors are logged by the caller and never fail the task.
    fn render(&self, scene: &RenderScene<'_>) -> Result<(), String>;
}
