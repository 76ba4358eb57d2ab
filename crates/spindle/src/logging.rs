//! Installs the global `tracing` subscriber from the logging section of the
//! configuration.

use tracing::Level;

use crate::config::{LogFormat, LoggingConfig};

/// Set up the process-wide subscriber: line format (text or JSON) and the
/// minimum level to emit, both from config.
///
/// Installation is best-effort: if a subscriber is already installed the
/// call is a quiet no-op, so libraries and tests can call it freely.
pub fn configure_logging(cfg: &LoggingConfig) {
    let level = parse_level(&cfg.level);
    let installed = match cfg.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_max_level(level)
            .try_init()
            .is_ok(),
    };
    if installed && is_debug(level) {
        tracing::warn!("debug-level logging configured, not recommended for production");
    }
}

/// Whether a configured level string means debug-or-finer output.
pub fn is_debug_level(level: &str) -> bool {
    is_debug(parse_level(level))
}

fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn is_debug(level: Level) -> bool {
    matches!(level, Level::TRACE | Level::DEBUG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_leniently() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level(" debug "), Level::DEBUG);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("verbose"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn debug_detection() {
        assert!(is_debug_level("trace"));
        assert!(is_debug_level("debug"));
        assert!(!is_debug_level("info"));
        assert!(!is_debug_level("nonsense"));
    }

    #[test]
    fn configure_twice_does_not_panic() {
        let cfg = LoggingConfig::default();
        configure_logging(&cfg);
        configure_logging(&cfg);
    }
}
