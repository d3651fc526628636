//! Logging configuration
//!
//! The gateway logs through `tracing`. Besides the base level, the config
//! offers per-subsystem trace switches for the two chatty components, so an
//! operator can watch every probe or discovery round-trip without drowning
//! the rest of the process in debug output.

use serde::{Deserialize, Serialize};

/// Base log level for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines for machine parsing
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Log every probe outcome from the health scheduler at debug
    pub trace_health: bool,
    /// Log every discovery round-trip and profile probe at debug
    pub trace_discovery: bool,
}

impl LoggingConfig {
    /// Tracing filter string: the base level, plus a debug directive for
    /// each subsystem switch that is on.
    ///
    /// `{level: warn, trace_discovery: true}` yields
    /// `"warn,manifold::discovery=debug"`.
    pub fn filter_directives(&self) -> String {
        let mut directives = self.level.as_str().to_string();
        if self.trace_health {
            directives.push_str(",manifold::health=debug");
        }
        if self.trace_discovery {
            directives.push_str(",manifold::discovery=debug");
        }
        directives
    }
}

/// Initialise the global tracing subscriber from a LoggingConfig.
///
/// Intended for the embedding binary; tests install their own subscribers.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(config.filter_directives())
        .unwrap_or_else(|_| EnvFilter::new(LogLevel::default().as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
