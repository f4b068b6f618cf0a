//! Structured logging with tracing
//!
//! Centralized subscriber setup: env-filtered, text or JSON, with optional
//! daily-rotated file output.

pub use crate::config::LoggingSettings;

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vecthare_domain::error::Result;

/// Initialize logging with the provided configuration
pub fn init_logging(config: &LoggingSettings) -> Result<()> {
    let filter = create_log_filter(&config.level);
    let file_appender = create_file_appender(config.file_output.as_deref());

    if config.json_format {
        init_json_logging(filter, file_appender);
    } else {
        init_text_logging(filter, file_appender);
    }

    tracing::info!("Logging initialized with level: {}", config.level);
    Ok(())
}

/// Create log filter from configuration; `VECTHARE_LOG` wins over the
/// configured level
fn create_log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env("VECTHARE_LOG").unwrap_or_else(|_| EnvFilter::new(level))
}

fn create_file_appender(
    file_output: Option<&std::path::Path>,
) -> Option<tracing_appender::rolling::RollingFileAppender> {
    file_output.map(|path| {
        tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| std::path::Path::new(".")),
            path.file_stem()
                .unwrap_or_else(|| std::ffi::OsStr::new("vecthare")),
        )
    })
}

fn init_json_logging(
    filter: EnvFilter,
    file_appender: Option<tracing_appender::rolling::RollingFileAppender>,
) {
    let stdout = fmt::layer().json().with_target(true);
    let registry = Registry::default().with(filter);
    if let Some(appender) = file_appender {
        let file = fmt::layer()
            .json()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true);
        registry.with(stdout).with(file).init();
    } else {
        registry.with(stdout).init();
    }
}

fn init_text_logging(
    filter: EnvFilter,
    file_appender: Option<tracing_appender::rolling::RollingFileAppender>,
) {
    let stdout = fmt::layer().with_target(true);
    let registry = Registry::default().with(filter);
    if let Some(appender) = file_appender {
        let file = fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true);
        registry.with(stdout).with(file).init();
    } else {
        registry.with(stdout).init();
    }
}
