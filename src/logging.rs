use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, DEFAULT_LOG_FILTER};

const LOG_FILE_PREFIX: &str = "accountdeck.log";

/// Install the global subscriber: JSON lines on stdout plus, when
/// `log_dir` is configured, a daily rolling file sink.
///
/// The returned guard flushes the file writer on drop, so the caller keeps it
/// alive for the lifetime of the process. Calling this twice is harmless; the
/// second subscriber is simply not installed.
pub fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let stdout_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339());

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer);
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::info!(
            target: "accountdeck",
            event = "logging_ready",
            filter = %config.log_filter,
            log_dir = ?config.log_dir
        );
    }

    Ok(guard)
}
