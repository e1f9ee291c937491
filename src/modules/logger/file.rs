use crate::modules::logger::LocalTimer;
use crate::modules::settings::cli::SETTINGS;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

pub static LOG_WORKER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn setup_file_logger(level: Level) -> Result<(), String> {
    let (writer, guard) = bridge_log_writer()?;
    // Dropping the guard would stop the background writer.
    let _ = LOG_WORKER_GUARD.set(guard);

    let file_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(SETTINGS.bridge_ansi_logs)
        .with_level(true)
        .with_writer(writer)
        .with_target(true);

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(|e| e.to_string())
}

fn bridge_log_writer() -> Result<(NonBlocking, WorkerGuard), String> {
    let rolling = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("bridge")
        .max_log_files(SETTINGS.bridge_max_log_files)
        .build(&SETTINGS.bridge_log_dir)
        .map_err(|e| format!("failed to initialize rolling file appender: {}", e))?;
    Ok(tracing_appender::non_blocking(rolling))
}
