use crate::modules::logger::file::setup_file_logger;
use crate::modules::settings::cli::SETTINGS;
use chrono::Local;
use std::process;
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

mod file;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

pub fn initialize_logging() {
    let level = parse_log_level(&SETTINGS.bridge_log_level);
    let result = if SETTINGS.bridge_log_to_file {
        setup_file_logger(level)
    } else {
        setup_stdout_logger(level)
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }
}

fn setup_stdout_logger(level: Level) -> Result<(), String> {
    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(true)
        .with_timer(LocalTimer);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(SETTINGS.bridge_ansi_logs)
        .with_writer(std::io::stdout)
        .event_format(format)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| e.to_string())
}

fn parse_log_level(value: &str) -> Level {
    match value.parse::<Level>() {
        Ok(level) => level,
        Err(_) => {
            eprintln!(
                "Invalid log level specified. Use one of: error, warn, info, debug, trace. 
        The log level you currently specified is 'bridge_log_level'='{}'",
                value
            );
            process::exit(1);
        }
    }
}
