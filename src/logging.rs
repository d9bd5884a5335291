use crate::config::LoggingConfig;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with console output and, when a directory is
/// configured, a daily-rolling JSON log file.
///
/// The returned guard must be held for the life of the process so buffered
/// file output is flushed on exit.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    // Respect RUST_LOG if set; otherwise info for our crate, warn for dependencies
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("graph_metrics_exporter=info,warn"));

    let (file_layer, guard) = match config.directory.as_deref() {
        Some(dir) => {
            if let Err(e) = fs::create_dir_all(dir) {
                eprintln!("[logging] cannot create log directory '{}': {}", dir, e);
                (None, None)
            } else {
                let file_appender = tracing_appender::rolling::daily(dir, "exporter.log");
                let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
                let layer = fmt::layer().json().with_writer(non_blocking_writer);
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    let console_json = config.json.then(|| fmt::layer().json().with_writer(std::io::stdout));
    let console_text = (!config.json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stdout)
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_json)
        .with(console_text)
        .try_init();
    if let Err(e) = installed {
        eprintln!("[logging] subscriber already installed: {}", e);
    }

    guard
}
