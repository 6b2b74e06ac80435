// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # nes-observability
//!
//! Logging setup shared by every NES binary.
//!
//! Console output is always available. With the `file-logging` feature each
//! process also writes into its own `run_YYYYmmdd_HHMMSS` folder, one file per
//! crate plus a combined `nes.log`, and old run folders are pruned on start-up.
//!
//! Per-crate verbosity comes from `--debug-{crate}` arguments or the
//! `NES_DEBUG` environment variable, see [`cli`].

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Tracing targets emitted by the NES crates, usable as `--debug-{name}`
pub const KNOWN_CRATES: &[&str] = &[
    "nes-config",
    "nes-neural",
    "nes-sim-engine",
    "nes-state-manager",
    "nes-services",
    "nes-replay",
];
