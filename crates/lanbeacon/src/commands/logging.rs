//! Logging initialization for the CLI.

use lanbeacon_util::log::{self, LogConfig, LogLevel};

/// Pick the log level: `-v` flags win over the configured `log_level`.
pub fn resolve_level(verbose: u8, configured: Option<&str>) -> LogLevel {
    if verbose > 0 {
        return LogLevel::from_verbosity(verbose);
    }
    configured
        .and_then(LogLevel::parse)
        .unwrap_or(LogLevel::Warn)
}

/// Initialize stderr logging. `RUST_LOG` still overrides the level.
pub fn init_logging(verbose: u8, configured: Option<&str>) {
    log::init(LogConfig {
        level: resolve_level(verbose, configured),
        include_location: verbose >= 3,
        ..LogConfig::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_wins() {
        assert_eq!(resolve_level(2, Some("error")), LogLevel::Debug);
    }

    #[test]
    fn test_configured_level_used() {
        assert_eq!(resolve_level(0, Some("info")), LogLevel::Info);
        assert_eq!(resolve_level(0, Some("bogus")), LogLevel::Warn);
        assert_eq!(resolve_level(0, None), LogLevel::Warn);
    }
}
