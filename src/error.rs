use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Errors that can occur while building or installing a logger.
///
/// Everything except [`Error::Init`] is a startup configuration failure. The
/// panicking entry points ([`crate::init_logger`], [`crate::logger`]) treat
/// those as unrecoverable and halt instead of returning them.
#[derive(ThisError, Debug)]
pub enum Error {
    /// The level string is not one of the supported severities.
    #[error("invalid log level {0:?}: expected trace, debug, info, warn, error, fatal or panic")]
    InvalidLevel(String),
    /// The directory holding the log file could not be created.
    #[error("failed to create log directory {}: {source}", .path.display())]
    LogDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The rotating file sink could not be opened.
    #[error("failed to open log file {}: {source}", .path.display())]
    FileSink {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Installing the logger as the global dispatcher failed.
    #[error("Initialization error: {0}")]
    Init(String),
}

impl Error {
    /// Whether this error is a startup misconfiguration that must halt the process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Init(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
