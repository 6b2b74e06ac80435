// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Synaptic algorithms
//!
//! ```text
//!  Receptor / LIFCReceptor      immutable parameter records, created once
//!          │ (weak)
//!          ▼
//!  BasicReceptorData / LIFCReceptorData   per-connection runtime state owned
//!          │ (strong)                      by the destination neuron
//!          ▼
//!  SpikeHistory of the source neuron
//! ```

pub mod kernel;
pub mod receptor;
pub mod receptor_data;
pub mod stdp;

pub use kernel::{mg_block, DoubleExponential};
pub use receptor::{LIFCReceptor, Neurotransmitter, Receptor};
pub use receptor_data::{BasicReceptorData, LIFCReceptorData};
pub use stdp::{StdpMethod, StdpParams};
