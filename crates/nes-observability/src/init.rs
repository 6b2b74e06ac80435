// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization for NES
//!
//! With file logging enabled a run produces:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── nes-sim-engine.log
//!       ├── nes-services.log
//!       ├── ...
//!       └── nes.log (combined)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging settings, usually taken from the `[logging]` config section
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Default level for targets without a debug flag
    pub level: String,
    pub file_logging: bool,
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub max_runs: usize,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
            retention_days: 7,
            max_runs: 20,
        }
    }
}

/// Keeps file writers alive; logs are flushed when it drops
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Folder of this run's log files, if file logging is active
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }
}

/// Install the global subscriber.
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_logging(
    options: &LoggingOptions,
    debug_flags: &CrateDebugFlags,
) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string_with_default(&options.level);
    let console_filter = EnvFilter::try_new(&filter)
        .with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_filter(console_filter)
            .boxed(),
    );

    #[cfg(feature = "file-logging")]
    let (file_guards, run_dir) = if options.file_logging {
        let (guards, run_dir) = file_layers(options, &filter, &mut layers)?;
        (guards, Some(run_dir))
    } else {
        (Vec::new(), None)
    };

    #[cfg(not(feature = "file-logging"))]
    let run_dir = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    if cfg!(not(feature = "file-logging")) && options.file_logging {
        tracing::warn!(
            "File logging requested but nes-observability was built without the \
             file-logging feature"
        );
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        run_dir,
    })
}

/// Console-only logging at `info`, plus any debug flags
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(&LoggingOptions::default(), debug_flags)
}

#[cfg(feature = "file-logging")]
fn file_layers(
    options: &LoggingOptions,
    filter: &str,
    layers: &mut Vec<BoxedLayer>,
) -> Result<(Vec<tracing_appender::non_blocking::WorkerGuard>, PathBuf)> {
    use tracing_appender::rolling;

    let run_dir = options
        .log_dir
        .join(format!("{}{}", RUN_PREFIX, Utc::now().format(RUN_TIMESTAMP_FORMAT)));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create log directory: {}", run_dir.display()))?;

    cleanup_old_logs(&options.log_dir, options.retention_days, options.max_runs)?;

    let mut guards = Vec::new();

    for crate_name in crate::KNOWN_CRATES {
        let appender = rolling::daily(&run_dir, format!("{}.log", crate_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let crate_filter = EnvFilter::try_new(format!("{}=debug,off", crate_name))
            .with_context(|| format!("Invalid log filter for {}", crate_name))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(crate_filter)
                .boxed(),
        );
    }

    let combined = rolling::daily(&run_dir, "nes.log");
    let (writer, guard) = tracing_appender::non_blocking(combined);
    guards.push(guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(EnvFilter::try_new(filter)?)
            .boxed(),
    );

    Ok((guards, run_dir))
}

fn parse_run_timestamp(dir_name: &str) -> Option<DateTime<Utc>> {
    let stamp = dir_name.strip_prefix(RUN_PREFIX)?;
    let naive = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Delete `run_*` folders older than `retention_days`, then the oldest of the
/// rest until at most `max_runs` remain. Returns how many were removed.
///
/// Other entries in `base_log_dir` are left alone.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    max_runs: usize,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_timestamp);
        if let Some(stamp) = stamp {
            runs.push((path, stamp));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, stamp)| *stamp);

    let expired = runs.iter().filter(|(_, stamp)| *stamp < cutoff).count();
    let excess = (runs.len() - expired).saturating_sub(max_runs);

    let mut removed = 0;
    for (path, _) in runs.iter().take(expired + excess) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(base: &Path, stamp: DateTime<Utc>) -> PathBuf {
        let path = base.join(format!("{}{}", RUN_PREFIX, stamp.format(RUN_TIMESTAMP_FORMAT)));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_parse_run_timestamp() {
        let stamp = parse_run_timestamp("run_20250101_120000").unwrap();
        assert_eq!(stamp.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-01-01 12:00:00");
        assert!(parse_run_timestamp("run_garbage").is_none());
        assert!(parse_run_timestamp("20250101_120000").is_none());
    }

    #[test]
    fn test_cleanup_removes_expired_runs() {
        let dir = tempfile::tempdir().unwrap();
        let old = make_run(dir.path(), Utc::now() - chrono::Duration::days(30));
        let recent = make_run(dir.path(), Utc::now() - chrono::Duration::hours(1));
        let other = dir.path().join("keep_me");
        std::fs::create_dir_all(&other).unwrap();

        let removed = cleanup_old_logs(dir.path(), 7, 20).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_cleanup_caps_run_count() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let runs: Vec<PathBuf> = (1..=4)
            .map(|h| make_run(dir.path(), now - chrono::Duration::hours(h)))
            .collect();

        let removed = cleanup_old_logs(dir.path(), 7, 2).unwrap();
        assert_eq!(removed, 2);
        // runs[0] is the newest
        assert!(runs[0].exists());
        assert!(runs[1].exists());
        assert!(!runs[2].exists());
        assert!(!runs[3].exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent"), 7, 2).unwrap(), 0);
    }

    #[test]
    fn test_bad_level_is_rejected_before_install() {
        let options = LoggingOptions {
            level: "nes-services=verbose".to_string(),
            ..LoggingOptions::default()
        };
        assert!(init_logging(&options, &CrateDebugFlags::default()).is_err());
    }
}
