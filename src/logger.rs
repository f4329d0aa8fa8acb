//! The process-wide logger and its entry points.
//!
//! [`init_logger`] builds a logger and stores it as the process logger;
//! [`logger`] returns the stored one, installing the defaults
//! (`log/info.log`, `info`, `json`, color on) the first time if nothing was
//! initialized. Misconfiguration at these entry points panics: a service must
//! not start without working logs. The `try_` variants return the [`Error`]
//! instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;
use tracing::Dispatch;

use crate::config::{DEFAULT_ENABLE_COLOR, DEFAULT_FORMAT, DEFAULT_LEVEL, DEFAULT_LOG_FILE};
use crate::{Error, Format, Level, LogBuilder, LoggerConfig, Result, RotatingWriter};

static PROCESS_LOGGER: Lazy<RwLock<Option<Logger>>> = Lazy::new(|| RwLock::new(None));

struct Inner {
    dispatch: Dispatch,
    level: Level,
    format: Format,
    color: bool,
    file_sink: Option<Arc<RotatingWriter>>,
}

/// Handle to a configured logger. Clones share the same sinks.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl Logger {
    pub(crate) fn new(
        dispatch: Dispatch,
        level: Level,
        format: Format,
        color: bool,
        file_sink: Option<Arc<RotatingWriter>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatch,
                level,
                format,
                color,
                file_sink,
            }),
        }
    }

    /// The underlying `tracing` dispatcher.
    pub fn dispatch(&self) -> &Dispatch {
        &self.inner.dispatch
    }

    /// Run `f` with this logger as the current thread's default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.inner.dispatch, f)
    }

    /// Make this logger the global `tracing` dispatcher.
    ///
    /// `tracing` allows this once per process; later calls fail with [`Error::Init`].
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.inner.dispatch.clone())
            .map_err(|e| Error::Init(e.to_string()))
    }

    pub fn level(&self) -> Level {
        self.inner.level
    }

    pub fn format(&self) -> Format {
        self.inner.format
    }

    pub fn color(&self) -> bool {
        self.inner.color
    }

    /// The configured log file (the link path), if file output is enabled.
    pub fn file_path(&self) -> Option<&Path> {
        self.inner.file_sink.as_deref().map(RotatingWriter::base_path)
    }

    /// The dated file currently receiving records, if file output is enabled.
    pub fn current_log_file(&self) -> Option<PathBuf> {
        self.inner
            .file_sink
            .as_ref()
            .and_then(|sink| sink.current_path())
    }

    /// Whether both handles refer to the same logger.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.inner.level)
            .field("format", &self.inner.format)
            .field("color", &self.inner.color)
            .field("file", &self.file_path())
            .finish()
    }
}

impl From<Logger> for Dispatch {
    fn from(logger: Logger) -> Self {
        logger.inner.dispatch.clone()
    }
}

fn read_slot() -> RwLockReadGuard<'static, Option<Logger>> {
    PROCESS_LOGGER.read().unwrap_or_else(|e| e.into_inner())
}

fn write_slot() -> RwLockWriteGuard<'static, Option<Logger>> {
    PROCESS_LOGGER.write().unwrap_or_else(|e| e.into_inner())
}

/// Store `logger` as the process logger, replacing any previous one.
pub(crate) fn replace_process_logger(logger: &Logger) {
    let previous = write_slot().replace(logger.clone());
    if previous.is_some() {
        tracing::debug!(
            level = %logger.level(),
            format = %logger.format(),
            "replaced process logger"
        );
    }
}

fn fatal(err: Error) -> ! {
    panic!("fatal logger configuration: {}", err)
}

/// Build a logger and make it the process logger.
///
/// See [`init_logger`] for the parameters.
pub fn try_init_logger(
    log_file: &str,
    level: &str,
    format: &str,
    enable_color: bool,
) -> Result<Logger> {
    let config = LoggerConfig::new()
        .with_log_file(log_file)
        .with_level(level)
        .with_format(format)
        .with_color(enable_color);
    LogBuilder::from_config(config).init()
}

/// Build a logger and make it the process logger.
///
/// - `log_file`: empty for console only; otherwise records also go to a
///   daily rotated file, with missing directories created.
/// - `level`: trace, debug, info, warn, error, fatal or panic; empty means info.
/// - `format`: `"json"`, anything else means text.
/// - `enable_color`: ANSI colors in text output.
///
/// # Panics
///
/// Panics if the level is unknown or the log file cannot be set up.
pub fn init_logger(log_file: &str, level: &str, format: &str, enable_color: bool) -> Logger {
    try_init_logger(log_file, level, format, enable_color).unwrap_or_else(|e| fatal(e))
}

/// [`try_init_logger`] with the default configuration.
pub fn try_init_default_logger() -> Result<Logger> {
    try_init_logger(
        DEFAULT_LOG_FILE,
        DEFAULT_LEVEL,
        DEFAULT_FORMAT,
        DEFAULT_ENABLE_COLOR,
    )
}

/// [`init_logger`] with `log/info.log`, `info`, `json` and color enabled.
///
/// # Panics
///
/// Panics if `log/` cannot be created or the log file cannot be opened.
pub fn init_default_logger() -> Logger {
    try_init_default_logger().unwrap_or_else(|e| fatal(e))
}

/// The process logger, initialized with the defaults on first use.
///
/// The default is installed at most once, even under concurrent first calls,
/// and never replaces a logger set by [`init_logger`].
///
/// # Panics
///
/// Panics if the default logger has to be created and cannot be.
pub fn logger() -> Logger {
    if let Some(logger) = read_slot().as_ref() {
        return logger.clone();
    }

    let mut slot = write_slot();
    if let Some(logger) = slot.as_ref() {
        return logger.clone();
    }
    let logger = LogBuilder::from_config(LoggerConfig::process_default())
        .build()
        .unwrap_or_else(|e| fatal(e));
    *slot = Some(logger.clone());
    drop(slot);

    tracing::debug!("installed default process logger");
    logger
}

/// Whether a process logger has been set, explicitly or by [`logger`].
pub fn is_initialized() -> bool {
    read_slot().is_some()
}
