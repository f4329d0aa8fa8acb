//! Builder pattern for constructing loggers.
//!
//! This module provides a fluent API over [`LoggerConfig`] plus the hooks the
//! plain four-argument entry points do not expose: a replacement console
//! writer, a clock, and the rotation policy.
//!
//! # Example
//!
//! ```rust,no_run
//! let logger = oncelog::builder()
//!     .with_file("log/app.log")
//!     .with_level("debug")
//!     .with_format("text")
//!     .with_color(false)
//!     .init()
//!     .expect("Failed to initialize logging");
//!
//! logger.in_scope(|| tracing::info!("ready"));
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;

use crate::format::{JsonFormat, TextFormat};
use crate::logger::{Logger, replace_process_logger};
use crate::rotation::{Clock, SystemClock};
use crate::{Format, LoggerConfig, Result, RotatingWriter, RotationPolicy};

/// A builder for configuring and constructing a [`Logger`].
pub struct LogBuilder {
    config: LoggerConfig,
    console: Option<BoxMakeWriter>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LogBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBuilder")
            .field("config", &self.config)
            .field("custom_console", &self.console.is_some())
            .finish_non_exhaustive()
    }
}

impl LogBuilder {
    /// Create a LogBuilder with the default, console-only configuration.
    pub fn new() -> Self {
        Self::from_config(LoggerConfig::new())
    }

    /// Create a LogBuilder from an existing configuration.
    pub fn from_config(config: LoggerConfig) -> Self {
        Self {
            config,
            console: None,
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Also write to a daily rotated file at `path`. An empty path means console only.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_log_file(path);
        self
    }

    /// Set the log level (trace, debug, info, warn, error, fatal, panic).
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config = self.config.with_level(level);
        self
    }

    /// Set the log output format ("json" or anything else for text).
    pub fn with_format(mut self, format: impl Into<Format>) -> Self {
        self.config = self.config.with_format(format);
        self
    }

    /// Enable or disable ANSI colors in text output.
    pub fn with_color(mut self, enable_color: bool) -> Self {
        self.config = self.config.with_color(enable_color);
        self
    }

    /// Set the rotation policy for the file sink.
    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.config = self.config.with_rotation(rotation);
        self
    }

    /// Replace standard output as the console sink.
    pub fn with_console_writer<M>(mut self, writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.console = Some(BoxMakeWriter::new(writer));
        self
    }

    /// Use `clock` for record timestamps and rotation.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Build a logger without touching the process-wide logger.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The level string is not a known severity
    /// - The log directory cannot be created
    /// - The rotating log file cannot be opened
    pub fn build(self) -> Result<Logger> {
        let Self {
            config,
            console,
            clock,
        } = self;

        let level = config.parsed_level()?;
        let console = console.unwrap_or_else(|| BoxMakeWriter::new(std::io::stdout));

        let file_sink = match config.file_path() {
            Some(path) => Some(Arc::new(RotatingWriter::with_clock(
                path,
                config.rotation,
                Arc::clone(&clock),
            )?)),
            None => None,
        };
        let writer = match &file_sink {
            Some(file) => BoxMakeWriter::new(console.and(Arc::clone(file))),
            None => console,
        };

        let registry = tracing_subscriber::registry().with(level.as_filter());
        let dispatch = match config.format {
            Format::Json => Dispatch::new(
                registry.with(
                    tracing_subscriber::fmt::layer()
                        .event_format(JsonFormat::new(clock))
                        .with_writer(writer),
                ),
            ),
            Format::Text => Dispatch::new(
                registry.with(
                    tracing_subscriber::fmt::layer()
                        .event_format(TextFormat::new(clock, config.enable_color))
                        .with_writer(writer),
                ),
            ),
        };

        Ok(Logger::new(
            dispatch,
            level,
            config.format,
            config.enable_color,
            file_sink,
        ))
    }

    /// Build the logger and make it the process-wide logger.
    ///
    /// An existing process-wide logger is replaced.
    pub fn init(self) -> Result<Logger> {
        let logger = self.build()?;
        replace_process_logger(&logger);
        Ok(logger)
    }
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
