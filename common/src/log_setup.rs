use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Rotation, RollingFileAppender};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the non-blocking file writer flushing until process exit.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Directory the rolling log files are written to.
pub const LOG_DIR: &str = "logs";

/// Rolled log files kept on disk.
const MAX_LOG_FILES: usize = 5;

/// Installs the global subscriber: console output plus a daily-rolling log file
/// named `<file_prefix>.<date>.log` under [`LOG_DIR`].
///
/// `RUST_LOG` overrides `base_level` when set. Warnings and errors go to
/// stderr, everything else to stdout. Later calls are ignored.
pub fn setup_logging(base_level: &str, file_prefix: &str) {
    if LOG_GUARD.get().is_some() {
        return;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|e| panic!("Invalid log filter '{base_level}': {e}"));

    let (file_writer, guard) = tracing_appender::non_blocking(rolling_appender(file_prefix));
    if LOG_GUARD.set(guard).is_err() {
        return;
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN)));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .unwrap_or_else(|e| panic!("Logger initialization failed: {e}"));
}

fn rolling_appender(file_prefix: &str) -> RollingFileAppender {
    std::fs::create_dir_all(LOG_DIR)
        .unwrap_or_else(|e| panic!("Failed to create {LOG_DIR} directory: {e}"));

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(LOG_DIR)
        .unwrap_or_else(|e| panic!("Failed to create log file appender: {e}"))
}
