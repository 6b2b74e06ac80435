// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Drive a Neuron Emulation Server from a JSON request script.
//!
//! The script is a JSON array of `{"Route": ..., "Params": {...}}` objects,
//! the same shape as the `Requests` list of a saved simulation. Each request
//! is dispatched in order and its response printed as one JSON line. By
//! default the tool waits for every simulation to go idle before the next
//! request, so `Simulation/RunFor` followed by `Simulation/GetRecording`
//! behaves like a synchronous call.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use nes::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingOptions};
use nes::prelude::*;
use tracing::{info, warn};

struct Args {
    script: PathBuf,
    config: Option<PathBuf>,
    wait: bool,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: nes_replay <script.json> [--config <path>] [--no-wait] [debug flags]\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> Args {
    let mut script = None;
    let mut config = None;
    let mut wait = true;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                config = Some(PathBuf::from(v));
            }
            "--no-wait" => wait = false,
            "-h" | "--help" => usage_and_exit(),
            // Consumed by parse_debug_flags
            flag if flag.starts_with("--debug-") => {}
            other if other.starts_with("--") => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
            path => script = Some(PathBuf::from(path)),
        }
    }

    match script {
        Some(script) => Args {
            script,
            config,
            wait,
        },
        None => usage_and_exit(),
    }
}

fn main() -> Result<()> {
    let args = parse_args();

    let config = match &args.config {
        Some(path) => load_config(Some(path.as_path()), None)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => load_config(None, None).unwrap_or_else(|e| {
            eprintln!("{e}; using built-in defaults");
            NesConfig::default()
        }),
    };
    nes::config::validate_config(&config)?;

    let mut debug_flags = parse_debug_flags();
    if config.system.debug {
        debug_flags.enable_all();
    }
    let options = LoggingOptions {
        level: config.logging.level.clone(),
        file_logging: config.logging.file_logging,
        log_dir: config.logging.log_dir.clone(),
        retention_days: config.logging.retention_days,
        max_runs: config.logging.max_runs,
    };
    let _logging = init_logging(&options, &debug_flags)?;

    if config.system.max_cores > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.system.max_cores)
            .build_global()
            .context("Failed to size the neuron update thread pool")?;
    }

    let raw = fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read {}", args.script.display()))?;
    let requests: Vec<SavedRequest> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", args.script.display()))?;

    info!(
        target: "nes-replay",
        "Replaying {} requests from {}",
        requests.len(),
        args.script.display()
    );

    let poll = config.manager_tasks.replay_poll_interval();
    let router = RequestRouter::new(&config);
    let mut failures = 0usize;
    for (index, request) in requests.iter().enumerate() {
        let response = router.handle(&request.route, &request.params);
        if response["StatusCode"] != StatusCode::Success.as_u8() {
            failures += 1;
            warn!(
                target: "nes-replay",
                "Request #{} ({}) returned {}",
                index,
                request.route,
                response["StatusCode"]
            );
        }
        println!("{}", serde_json::json!({ "Route": request.route, "Response": response }));
        if args.wait {
            router.registry().wait_all_idle(poll);
        }
    }

    router.registry().wait_all_idle(poll);
    router.shutdown();
    info!(target: "nes-replay", "Done: {} requests, {} failed", requests.len(), failures);

    if failures > 0 {
        process::exit(1);
    }
    Ok(())
}
