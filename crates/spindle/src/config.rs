use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Default worker threads driving the dispatch loop.
const DEFAULT_WORKERS: usize = 1;

/// Upper bound on dispatch workers. More workers only contend on the wheel
/// lock, so the cap is generous rather than meaningful.
const WORKERS_MAX_LIMIT: usize = 64;

/// Default cap on how long a worker parks waiting for the next expiration
/// (milliseconds). Keeps the loop responsive to submissions even when the
/// wheel reports a distant or unknown next deadline.
const DEFAULT_MAX_PARK_MS: u64 = 100;

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable line output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level to emit: trace, debug, info, warn, or error.
    /// Unrecognized values fall back to info.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::default(),
        }
    }
}

/// Dispatch-loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Worker threads running the drain/advance/park loop.
    pub workers: usize,

    /// Maximum time a worker parks before re-checking the clock and the
    /// submission queue (milliseconds).
    pub max_park_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_park_ms: DEFAULT_MAX_PARK_MS,
        }
    }
}

/// Top-level configuration for the dispatch stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Returns a copy with zero or out-of-range values clamped to safe
    /// defaults. Call after loading from external sources.
    pub fn normalized(mut self) -> Self {
        if self.dispatch.workers == 0 {
            self.dispatch.workers = DEFAULT_WORKERS;
        }
        if self.dispatch.workers > WORKERS_MAX_LIMIT {
            self.dispatch.workers = WORKERS_MAX_LIMIT;
        }
        if self.dispatch.max_park_ms == 0 {
            self.dispatch.max_park_ms = 1;
        }
        if self.logging.level.trim().is_empty() {
            self.logging.level = "info".to_owned();
        }
        self
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config(logging.level={}, logging.format={:?}, dispatch.workers={}, dispatch.max_park_ms={})",
            self.logging.level, self.logging.format, self.dispatch.workers, self.dispatch.max_park_ms
        )
    }
}
