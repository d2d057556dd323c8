//! Opt-in tracing initialization for embedding binaries
//!
//! The framework itself only emits `tracing` events; hosts that want them
//! on disk call [`init`] once at startup. Writes through a non-blocking
//! file appender - keep the returned guard alive for the process lifetime.

use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("strata").join("strata.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".strata").join("strata.log");
    }
    PathBuf::from("strata.log")
}

/// Initialize file logging at the given level. `None` leaves logging off.
///
/// Call once per process; a second call panics inside
/// `tracing-subscriber`.
pub fn init(level: Option<Level>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level?;

    let path = log_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .expect("Failed to open log file");

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("strata {} logging at {:?} to {:?}", crate::VERSION, tracing_level, path);

    Some(guard)
}
