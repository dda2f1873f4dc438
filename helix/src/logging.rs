//! Structured logging set-up.
//!
//! Library crates only emit `tracing` events; installing a subscriber is
//! left to the application, through [`init_logging`].

use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Environment variable holding a filter directive that overrides the
/// configured level, e.g. `HELIX_LOG=helix_routing=trace,info`.
pub const LOG_ENV: &str = "HELIX_LOG";

/// Installs the global `fmt` subscriber.
///
/// # Errors
/// - [`Error::InvalidConfig`] for an unknown level
/// - [`Error::Logging`] if a global subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    installed.map_err(|e| Error::Logging(e.to_string()))?;

    info!(level = %level, json = config.json, "Logging initialized");
    Ok(())
}

/// Parses a level name, case-insensitively.
///
/// # Errors
/// [`Error::InvalidConfig`] for anything but trace, debug, info, warn
/// (or warning) and error.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(Error::InvalidConfig(format!(
            "invalid log level `{level}`; use trace, debug, info, warn or error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels() {
        assert_eq!(parse_log_level("TRACE").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("error").unwrap(), Level::ERROR);
    }

    #[test]
    fn rejects_unknown_level() {
        let err = parse_log_level("verbose").unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let config = LoggingConfig::default();
        // The first call may already lose to another test in this binary.
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(Error::Logging(_))));
    }

    #[test]
    fn invalid_level_is_checked_before_installing() {
        let config = LoggingConfig {
            level: "chatty".into(),
            json: true,
        };
        assert!(matches!(init_logging(&config), Err(Error::InvalidConfig(_))));
    }
}
