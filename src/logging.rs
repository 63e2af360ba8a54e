use tracing_subscriber::{fmt::time::UtcTime, layer::Identity, prelude::*};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize logging: stdout plus an optional buffered rolling file
/// appender, configurable via the config file.
///
/// Filter precedence: config level, then the RUST_LOG env var, then "info".
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = match &cfg.level {
        Some(level) => tracing_subscriber::EnvFilter::new(level.as_str()),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    let file_writer = if cfg.enable_file_logging {
        build_file_writer(cfg)
    } else {
        None
    };

    match cfg.format {
        LogFormat::Json => {
            let registry = tracing_subscriber::registry().with(filter).with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(std::io::stdout),
            );
            match file_writer {
                Some(writer) => {
                    let _ = registry
                        .with(
                            tracing_subscriber::fmt::layer()
                                .json()
                                .with_ansi(false)
                                .with_timer(UtcTime::rfc_3339())
                                .with_writer(writer),
                        )
                        .try_init();
                }
                None => {
                    let _ = registry.with(Identity::new()).try_init();
                }
            }
        }
        LogFormat::Text => {
            let registry = tracing_subscriber::registry().with(filter).with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(std::io::stdout),
            );
            match file_writer {
                Some(writer) => {
                    let _ = registry
                        .with(
                            tracing_subscriber::fmt::layer()
                                .with_ansi(false)
                                .with_timer(UtcTime::rfc_3339())
                                .with_writer(writer),
                        )
                        .try_init();
                }
                None => {
                    let _ = registry.with(Identity::new()).try_init();
                }
            }
        }
    }
}

fn build_file_writer(cfg: &LoggingConfig) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };

    if let Err(e) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Failed to create log directory '{}': {e}; continuing with stdout logs",
            cfg.dir
        );
        return None;
    }

    let appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // Keep the guard alive for the process lifetime
    let _leaked: &'static _ = Box::leak(Box::new(guard));

    Some(writer)
}
