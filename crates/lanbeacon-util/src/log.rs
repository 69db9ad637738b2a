//! Logging setup using tracing.
//!
//! Logs always go to stderr so command output on stdout stays parseable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Level for a `-v` count: 0 is warn, 1 info, 2 debug, 3+ trace.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to print logs at all.
    pub print: bool,
    /// Log level, used when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Whether to emit ANSI colors.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            print: true,
            level: LogLevel::Warn,
            include_location: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Build the filter: `RUST_LOG` wins over the configured level.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

/// Initialize logging with the given configuration.
///
/// This should be called once at application startup. Later calls are
/// ignored.
pub fn init(config: LogConfig) {
    let subscriber = tracing_subscriber::registry().with(config.filter());

    let result = if config.print {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .with_target(true)
            .with_level(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        subscriber.with(fmt_layer).try_init()
    } else {
        subscriber.try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// Create a tracing span for a discovery role.
#[macro_export]
macro_rules! service_span {
    ($role:expr) => {
        tracing::info_span!("discovery", role = $role)
    };
    ($role:expr, $id:expr) => {
        tracing::info_span!("discovery", role = $role, id = %$id)
    };
}
