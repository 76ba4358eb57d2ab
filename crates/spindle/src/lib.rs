//! # spindle
//!
//! Deferred work-item dispatch built on a hierarchical hashed timing wheel.
//!
//! The core is [`wheel::TimerWheel`]: five cascaded rings of buckets that
//! schedule, reschedule, cancel, and expire timestamped entries in
//! amortized O(1), sized for large pending sets (cache expiration,
//! idle-connection reaping, retry timers). The wheel is caller-driven and
//! single-threaded; [`dispatch::Dispatcher`] wraps it with an MPSC
//! submission queue, a clock, and a worker group for multi-producer use.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use spindle::{Config, Dispatcher};
//!
//! let config = Config::default().normalized();
//! spindle::configure_logging(&config.logging);
//! let mut dispatcher = Dispatcher::start(config).expect("start dispatcher");
//! let handle = dispatcher.handle();
//! handle
//!     .defer(Duration::from_secs(30), || println!("30s later"))
//!     .expect("submit");
//! // ...
//! dispatcher.shutdown();
//! ```

pub mod config;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod wheel;
pub mod workgroup;

pub use config::{Config, DispatchConfig, LogFormat, LoggingConfig};
pub use dispatch::{DispatchHandle, Dispatcher};
pub use entry::{Entry, EntryId};
pub use error::{DispatchError, DispatchResult};
pub use logging::{configure_logging, is_debug_level};
pub use metrics::{DispatchMetrics, DispatchMetricsSnapshot};
pub use wheel::{HORIZON_NS, TimerWheel};
pub use workgroup::WorkGroup;
