//! # Oncelog
//!
//! A process-wide logger initializer for services built on `tracing`.
//!
//! ## Features
//!
//! - Console logging, optionally duplicated into a daily rotated file
//! - `<path>.<YYYYMMDD>` files with a `<path>` link to the current one and 7-day retention
//! - JSON or `key=value` text records, with optional ANSI colors
//! - Caller location (function and `file:line`) on every record
//! - A single process logger, set explicitly or lazily with defaults
//!
//! ## Example
//!
//! ```rust,no_run
//! let logger = oncelog::init_logger("log/app.log", "debug", "json", false);
//! logger.in_scope(|| tracing::info!(port = 8080, "listening"));
//!
//! // Anywhere else in the process:
//! oncelog::logger().in_scope(|| tracing::warn!("disk almost full"));
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod format;
pub mod logger;
pub mod rotation;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use builder::LogBuilder;
pub use config::{Format, Level, LoggerConfig};
pub use error::{Error, Result};
pub use format::{JsonFormat, TextFormat};
pub use logger::{
    Logger, init_default_logger, init_logger, is_initialized, logger, try_init_default_logger,
    try_init_logger,
};
pub use rotation::{Clock, ManualClock, RotationPolicy, SystemClock};
pub use writer::RotatingWriter;

/// Start configuring a logger.
pub fn builder() -> LogBuilder {
    LogBuilder::new()
}
