use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use crate::{Error, RotationPolicy};

pub(crate) const DEFAULT_LOG_FILE: &str = "log/info.log";
pub(crate) const DEFAULT_LEVEL: &str = "info";
pub(crate) const DEFAULT_FORMAT: &str = "json";
pub(crate) const DEFAULT_ENABLE_COLOR: bool = true;

/// Severity threshold, from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    /// The `tracing` filter enforcing this threshold.
    ///
    /// `tracing` has no severity above `ERROR`, so `Fatal` and `Panic` filter
    /// like `Error`.
    pub fn as_filter(self) -> LevelFilter {
        match self {
            Level::Panic | Level::Fatal | Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Info => LevelFilter::INFO,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
        }
    }

    /// Parse a level string, treating an empty string as `info`.
    pub fn parse_or_default(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Ok(Level::Info);
        }
        s.parse()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Panic => "panic",
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(Error::InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Format {
    /// One JSON object per line.
    Json,
    /// Human-readable `key=value` lines.
    Text,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Text => "text",
        }
    }
}

/// Exactly `"json"` selects JSON; anything else, `"JSON"` included, falls back to text.
impl From<&str> for Format {
    fn from(s: &str) -> Self {
        if s == "json" {
            Format::Json
        } else {
            Format::Text
        }
    }
}

impl From<String> for Format {
    fn from(s: String) -> Self {
        Format::from(s.as_str())
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a logger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Path of the rotating log file; empty means console only
    #[serde(default)]
    pub log_file: PathBuf,
    /// Log level (e.g., "info", "debug"); empty means "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("json" or "text")
    #[serde(default = "default_format")]
    pub format: Format,
    /// Colorize text output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,
    /// File rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

impl LoggerConfig {
    /// Create a console-only LoggerConfig with the remaining defaults
    pub fn new() -> Self {
        Self {
            log_file: PathBuf::new(),
            level: default_log_level(),
            format: default_format(),
            enable_color: default_enable_color(),
            rotation: RotationPolicy::default(),
        }
    }

    /// The configuration `init_default_logger` uses.
    pub fn process_default() -> Self {
        Self::new().with_log_file(DEFAULT_LOG_FILE)
    }

    /// Set the log file path
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Set log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: impl Into<Format>) -> Self {
        self.format = format.into();
        self
    }

    /// Enable or disable color
    pub fn with_color(mut self, enable_color: bool) -> Self {
        self.enable_color = enable_color;
        self
    }

    /// Set the rotation policy
    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    /// The file path, if file output is configured.
    pub fn file_path(&self) -> Option<&std::path::Path> {
        if self.log_file.as_os_str().is_empty() {
            None
        } else {
            Some(&self.log_file)
        }
    }

    /// Parse the configured level.
    pub fn parsed_level(&self) -> crate::Result<Level> {
        Level::parse_or_default(&self.level)
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_log_level() -> String {
    DEFAULT_LEVEL.to_string()
}

fn default_format() -> Format {
    Format::from(DEFAULT_FORMAT)
}

fn default_enable_color() -> bool {
    DEFAULT_ENABLE_COLOR
}
