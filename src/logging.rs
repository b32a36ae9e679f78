use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::project_config::LoggingConfig;

/// Pick the filter directive: RUST_LOG when set and non-empty, else the configured level
pub fn filter_directive(config: &LoggingConfig, rust_log: Option<String>) -> String {
    rust_log
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| config.level.clone())
}

/// Install the global subscriber. Logs go to stdout and, when a directory is
/// configured, to daily rolling files. Keep the returned guard alive until
/// shutdown so buffered file output is flushed.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let directive = filter_directive(config, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}': {}; falling back to info", directive, e);
        EnvFilter::new("info")
    });

    let stdout_layer = fmt::layer().with_target(true);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Tracing was already initialized: {}", e);
    }

    guard
}
