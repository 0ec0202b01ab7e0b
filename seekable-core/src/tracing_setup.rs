//! Tracing setup for Seekable
//!
//! Installs a console subscriber whose level can be changed while the
//! process runs. Diagnostic verbosity never changes what the bridge does.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();
static PENDING_LEVEL: Mutex<Option<LogLevel>> = Mutex::new(None);

/// Diagnostic verbosity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// No output at all
    Quiet,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including adapter traffic
    Trace,
}

impl LogLevel {
    /// Filter directive for this level.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Quiet => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Maps an engine-style numeric verbosity (-8 quiet, 8 fatal, 16 error,
    /// 24 warning, 32 info, 40 verbose, 48 debug, 56 trace).
    pub fn from_engine_level(level: i32) -> Self {
        match level {
            i32::MIN..=-1 => LogLevel::Quiet,
            0..=16 => LogLevel::Error,
            17..=24 => LogLevel::Warn,
            25..=40 => LogLevel::Info,
            41..=48 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quiet" | "off" => Ok(LogLevel::Quiet),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`; a level recorded earlier via
/// [`set_log_level`] takes precedence over both.
///
/// # Errors
///
/// - `tracing_subscriber::util::TryInitError` - A global subscriber is already installed
pub fn init_tracing(level: LogLevel) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = match PENDING_LEVEL.lock().take() {
        Some(pending) => EnvFilter::new(pending.as_directive()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_directive())),
    };
    let (filter_layer, handle) = reload::Layer::new(filter);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .try_init()?;

    let _ = FILTER_HANDLE.set(handle);
    tracing::debug!("Tracing initialized at {:?}", level);
    Ok(())
}

/// Changes diagnostic verbosity for the whole process.
///
/// Before [`init_tracing`] runs, the level is remembered and applied at
/// initialisation.
pub fn set_log_level(level: LogLevel) {
    match FILTER_HANDLE.get() {
        Some(handle) => {
            if let Err(e) = handle.reload(EnvFilter::new(level.as_directive())) {
                eprintln!("Failed to change log level: {e}");
            }
        }
        None => {
            *PENDING_LEVEL.lock() = Some(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_level_mapping() {
        assert_eq!(LogLevel::from_engine_level(-8), LogLevel::Quiet);
        assert_eq!(LogLevel::from_engine_level(0), LogLevel::Error);
        assert_eq!(LogLevel::from_engine_level(16), LogLevel::Error);
        assert_eq!(LogLevel::from_engine_level(24), LogLevel::Warn);
        assert_eq!(LogLevel::from_engine_level(32), LogLevel::Info);
        assert_eq!(LogLevel::from_engine_level(40), LogLevel::Info);
        assert_eq!(LogLevel::from_engine_level(48), LogLevel::Debug);
        assert_eq!(LogLevel::from_engine_level(56), LogLevel::Trace);
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("off".parse::<LogLevel>().unwrap(), LogLevel::Quiet);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Quiet.as_directive(), "off");
    }

    #[test]
    fn test_set_level_before_init_is_remembered() {
        set_log_level(LogLevel::Debug);
        if FILTER_HANDLE.get().is_none() {
            assert_eq!(*PENDING_LEVEL.lock(), Some(LogLevel::Debug));
        }
    }
}
