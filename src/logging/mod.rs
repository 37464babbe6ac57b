//! Logging infrastructure - structured tracing for region events
//!
//! Design: Uses `tracing` with per-concern targets:
//! - `arena` for lifecycle and state dumps
//! - `arena::commit` for virtual memory growth
//! - `arena::oom` for exhaustion handling
//! - `arena::scratch` for scope entry and exit
//!
//! The fast allocation path never logs.

use std::io;

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::AllocError;

static LOGGER_INITIALIZED: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path, console when unset
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // ARENA_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("ARENA_LOG_LEVEL") {
            config.level = match level_str.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            };
        }

        // ARENA_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("ARENA_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("ARENA_LOG_JSON").is_ok();
        config.show_spans = std::env::var("ARENA_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for chasing growth and OOM behavior
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging once; later calls are ignored
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("region_arena={0},arena={0}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard) = match &config.log_path {
            Some(path) => {
                let path = std::path::Path::new(path);
                let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
                let file_name = path
                    .file_name()
                    .map(|name| name.to_os_string())
                    .unwrap_or_else(|| "region_arena.log".into());
                let (writer, guard) =
                    tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
                (BoxMakeWriter::new(writer), Some(guard))
            }
            None => console_writer(),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions));

        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = if config.json_format {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer.compact()).try_init()
        };

        // Another subscriber already owns the process; keep quiet
        installed.ok().and_then(|_| guard)
    });
}

/// Console output: stderr through a background worker
#[cfg(not(test))]
fn console_writer() -> (BoxMakeWriter, Option<WorkerGuard>) {
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    (BoxMakeWriter::new(writer), Some(guard))
}

/// Console output under the test harness, captured per test
#[cfg(test)]
fn console_writer() -> (BoxMakeWriter, Option<WorkerGuard>) {
    (BoxMakeWriter::new(fmt::TestWriter::new), None)
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Log a commit step of a virtual region
#[inline]
pub fn log_commit(committed: usize, chunk: usize) {
    tracing::debug!(
        target: "arena::commit",
        committed,
        chunk,
        "committed memory"
    );
}

/// Log a failed commit step
#[inline]
pub fn log_commit_failure(chunk: usize, error: &io::Error) {
    tracing::warn!(
        target: "arena::commit",
        chunk,
        %error,
        "commit failed"
    );
}

/// Log exhaustion that is handed back to code
#[inline]
pub fn log_exhausted(error: &AllocError, outcome: &'static str) {
    tracing::debug!(
        target: "arena::oom",
        %error,
        outcome,
        "allocation failed"
    );
}

/// Log exhaustion that ends the process
#[inline]
pub fn log_fatal_exhaustion(error: &AllocError) {
    tracing::error!(
        target: "arena::oom",
        %error,
        "arena exhausted, aborting"
    );
}
