//! Tracing subscriber for the RIS server
//!
//! One output format (JSON or plain text) is used for both stdout and the
//! optional rotating log file. `RUST_LOG`, when set, replaces the configured level.

use crate::config::LoggingConfig;
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Flushes buffered file output when dropped. `main` holds it until shutdown.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut outputs = vec![output_layer(config.json, true, std::io::stdout)];

    let file_guard = if config.file_enabled {
        let (writer, guard) = rotating_file(config)?;
        outputs.push(output_layer(config.json, false, writer));
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(outputs)
        .with(level_filter(config))
        .try_init()?;

    tracing::info!(
        level = %config.level,
        json = config.json,
        file = config.file_enabled,
        rotation = %config.file_rotation,
        "Logging initialized"
    );

    Ok(LoggingGuard { _file: file_guard })
}

fn level_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // sqlx logs every statement at info
        EnvFilter::new(format!(
            "ris_server={level},ris_models={level},ris_validator={level},tower_http=debug,sqlx=warn",
            level = config.level
        ))
    })
}

fn output_layer<W>(json: bool, ansi: bool, writer: W) -> OutputLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);

    if json {
        layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        layer.boxed()
    }
}

fn rotating_file(config: &LoggingConfig) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.file_directory)?;

    let directory = &config.file_directory;
    let prefix = &config.file_prefix;
    // Unknown values are rejected by Config::validate
    let appender = match config.file_rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(directory, prefix),
        "minutely" => tracing_appender::rolling::minutely(directory, prefix),
        "never" => tracing_appender::rolling::never(directory, format!("{prefix}.log")),
        _ => tracing_appender::rolling::daily(directory, prefix),
    };

    Ok(tracing_appender::non_blocking(appender))
}
