//!
//! src/logging.rs
//!
//! Initializes the logger every request, generator call and render is
//! reported through. Json lines by default, human readable with
//! LOG_FORMAT=pretty, to a daily file when LOG_DIR is set.
//!

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::AlterEgoError;

pub const LOG_FILE_PREFIX: &str = "alter-ego.log";

/// Keeps the non-blocking writer flushing until main returns
pub struct LoggingGuard(#[allow(dead_code)] WorkerGuard);

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn filter(cfg: &LoggingConfig) -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()))
}

fn fmt_layer(cfg: &LoggingConfig) -> (BoxedLayer, WorkerGuard) {
    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => non_blocking(rolling::daily(dir, LOG_FILE_PREFIX)),
        None => non_blocking(std::io::stdout())
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(cfg.include_target)
        .with_file(cfg.include_file_line)
        .with_line_number(cfg.include_file_line)
        .with_ansi(cfg.log_dir.is_none());

    let layer = match cfg.format {
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => base.pretty().boxed()
    };
    (layer, guard)
}

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard, AlterEgoError> {
    let (layer, guard) = fmt_layer(cfg);

    tracing_subscriber::registry()
        .with(layer)
        .with(filter(cfg))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| AlterEgoError::Config(format!("logger already set: {e}")))?;

    Ok( LoggingGuard(guard) )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logger_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            format: LogFormat::Pretty,
            log_dir: Some(dir.path().to_path_buf()),
            ..LoggingConfig::default()
        };

        let guard = init_logging(&cfg).unwrap();
        tracing::info!("logging.test");
        drop(guard);

        let written = std::fs::read_dir(dir.path()).unwrap()
            .filter_map(Result::ok)
            .any(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX));
        assert!(written);

        assert!(matches!(init_logging(&LoggingConfig::default()), Err(AlterEgoError::Config(_))));
    }
}
