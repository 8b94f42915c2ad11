//! Logging setup on top of `tracing-subscriber`.
//!
//! Console output goes to stdout; file output goes through a non-blocking
//! `tracing-appender` writer with optional time-based rotation.

pub mod config;
pub mod error;


pub use config::*;
pub use error::LoggerError;

use std::io::IsTerminal;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Keeps the background file writer alive; dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggerGuard {
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber.
pub fn init_logger(config: LoggerConfig) -> Result<LoggerGuard, LoggerError> {
    config.validate()?;

    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LoggerError::config(format!("Invalid filter '{}': {}", config.level, e)))?;

    // File layer goes first so span fields formatted for it carry no ANSI codes
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    let mut file_guard = None;
    if config.file.enabled {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(&config.file)?);
        layers.push(file_layer(config.file.format, writer));
        file_guard = Some(guard);
    }
    if config.console.enabled {
        layers.push(console_layer(&config.console));
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggerError::init(e.to_string()))?;

    Ok(LoggerGuard { _file: file_guard })
}

pub(crate) fn file_appender(config: &FileConfig) -> Result<RollingFileAppender, LoggerError> {
    std::fs::create_dir_all(&config.directory)?;

    RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(config.file_name.as_str())
        .build(&config.directory)
        .map_err(|e| LoggerError::appender(e.to_string()))
}

fn file_layer<W>(format: LogFormat, writer: W) -> BoxedLayer
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_ansi(false).with_target(true).with_writer(writer);
    match format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn console_layer(config: &ConsoleConfig) -> BoxedLayer {
    let use_ansi = config.colored && std::io::stdout().is_terminal();
    fmt::layer()
        .with_ansi(use_ansi)
        .with_target(true)
        .with_level(true)
        .boxed()
}
