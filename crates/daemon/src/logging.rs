//! Tracing subscriber setup

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::settings::{LogFormat, LogSettings};
use crate::telemetry;

const LOG_FILE_PREFIX: &str = "netbill.log";

/// Install the global subscriber
///
/// The returned guard flushes buffered lines on drop; keep it alive for the
/// life of the process.
pub fn init(settings: &LogSettings) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .map_err(|e| anyhow!("invalid log filter {:?}: {}", settings.filter, e))?;

    let (writer, guard) = match &settings.directory {
        Some(dir) => {
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let fmt_layer = match settings.format {
        // Production: JSON structured logging
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(settings.directory.is_none())
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(telemetry::layer()?)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}
