//! Structured logging and tracing for duosida-direct
//!
//! Console output (plain or JSON) plus an optional daily-rolling log file,
//! initialised once per process. Components log through a
//! [`StructuredLogger`] that stamps every event with its context fields.

pub mod level;
mod structured;

use crate::config::LoggingConfig;
use crate::error::{ChargerError, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{Level, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use level::parse_log_level;
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

// Keep the non-blocking worker guard alive for the entire process lifetime
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INIT_ONCE: Once = Once::new();
static INIT_ERROR: OnceCell<String> = OnceCell::new();

/// Initialize logging system based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        let init_result = (|| -> Result<()> {
            let level = parse_log_level(&config.level)?;
            let filter = build_env_filter(level);

            if should_use_console_only(config) {
                init_console_only_logging(filter, config, level);
                return Ok(());
            }

            init_file_logging(config, filter, level)
        })();

        if let Err(e) = init_result {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(ChargerError::config(err.clone()));
    }
    Ok(())
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("duosida_direct={0},duosida={0}", level).into())
}

fn should_use_console_only(config: &LoggingConfig) -> bool {
    cfg!(test)
        || config.file.trim().is_empty()
        || std::env::var_os("DUOSIDA_DISABLE_FILE_LOG").is_some()
}

fn console_layer<S>(json_format: bool, level: Level) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    // stderr keeps stdout free for status and JSON output
    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json_format {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    }
}

fn init_console_only_logging(filter: EnvFilter, config: &LoggingConfig, level: Level) {
    let registry = tracing_subscriber::registry().with(filter);
    if config.console_output {
        registry
            .with(console_layer(config.json_format, level))
            .init();
    } else {
        registry.init();
    }

    info!("Logging initialized - level: {:?}, console-only", level);
}

/// Where the rolling appender writes.
///
/// A setting with an extension names the file (`/var/log/charger.log` rolls
/// as `charger.<date>.log` in `/var/log`); anything else is a directory that
/// receives `duosida.<date>.log`.
#[derive(Debug, PartialEq, Eq)]
struct LogFileTarget {
    directory: PathBuf,
    prefix: String,
    suffix: String,
}

impl LogFileTarget {
    fn from_setting(file: &str) -> Self {
        let path = Path::new(file.trim());
        match (path.file_stem(), path.extension()) {
            (Some(stem), Some(ext)) => Self {
                directory: path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
                prefix: stem.to_string_lossy().into_owned(),
                suffix: ext.to_string_lossy().into_owned(),
            },
            _ => Self {
                directory: path.to_path_buf(),
                prefix: "duosida".to_string(),
                suffix: "log".to_string(),
            },
        }
    }
}

fn init_file_logging(config: &LoggingConfig, filter: EnvFilter, level: Level) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter);

    let target = LogFileTarget::from_setting(&config.file);
    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(&target.prefix)
        .filename_suffix(&target.suffix)
        .max_log_files(config.backup_count.max(1) as usize)
        .build(&target.directory)
        .map_err(|e| ChargerError::io(format!("Failed to create log file appender: {}", e)))?;

    let (non_blocking_appender, guard) = non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let file_layer = {
        let base = fmt::layer()
            .with_writer(non_blocking_appender)
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false);
        if config.json_format {
            base.json()
                .with_filter(LevelFilter::from_level(level))
                .boxed()
        } else {
            base.with_filter(LevelFilter::from_level(level)).boxed()
        }
    };

    let subscriber = registry.with(file_layer);
    if config.console_output {
        subscriber
            .with(console_layer(config.json_format, level))
            .init();
    } else {
        subscriber.init();
    }

    info!(
        "Logging initialized - level: {:?}, file: {}",
        level, config.file
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());

        let logger = get_logger("test_component");
        logger.info("Test info message");
        logger.debug("Test debug message");
        assert_eq!(logger.context.component, "test_component");
    }

    #[test]
    fn test_log_file_name_is_kept() {
        let target = LogFileTarget::from_setting("/var/log/charger.log");
        assert_eq!(target.directory, PathBuf::from("/var/log"));
        assert_eq!(target.prefix, "charger");
        assert_eq!(target.suffix, "log");

        let bare = LogFileTarget::from_setting("duosida.txt");
        assert_eq!(bare.directory, PathBuf::from("."));
        assert_eq!(bare.prefix, "duosida");
        assert_eq!(bare.suffix, "txt");
    }

    #[test]
    fn test_log_directory_uses_default_name() {
        let target = LogFileTarget::from_setting("/data/logs");
        assert_eq!(target.directory, PathBuf::from("/data/logs"));
        assert_eq!(target.prefix, "duosida");
        assert_eq!(target.suffix, "log");
    }

    #[test]
    fn test_console_only_without_file() {
        let config = LoggingConfig::default();
        assert!(should_use_console_only(&config));
    }
}
