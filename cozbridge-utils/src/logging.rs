//! Tracing subscriber setup for cozbridge
//!
//! The filter comes from `COZBRIDGE_LOG` when set, otherwise from the caller
//! (usually the `[logging]` section of the config file).

use std::fs::{File, OpenOptions};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{paths, BridgeError, Result};

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "COZBRIDGE_LOG";

const LOG_FILE: &str = "cozbridge.log";

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// `cozbridge.log` under the state directory
    File,
    Both,
}

impl LogOutput {
    fn stderr(self) -> bool {
        matches!(self, Self::Stderr | Self::Both)
    }

    fn file(self) -> bool {
        matches!(self, Self::File | Self::Both)
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// `EnvFilter` directives, e.g. `cozbridge_client=debug,tokio_tungstenite=warn`
    pub filter: String,
    /// Log span enter/exit
    pub span_events: bool,
    pub file_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
        }
    }
}

impl LogConfig {
    /// Stderr at `warn`, unless `COZBRIDGE_LOG` says otherwise
    pub fn client() -> Self {
        Self {
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()),
            ..Self::default()
        }
    }

    /// Replace the filter unless `COZBRIDGE_LOG` is set
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        if std::env::var(LOG_ENV).is_err() {
            self.filter = filter.into();
        }
        self
    }

    /// Also write to the log file, with source locations
    pub fn with_file(mut self) -> Self {
        self.output = LogOutput::Both;
        self.file_line = true;
        self
    }
}

/// Install the global subscriber
///
/// Fails on an unparsable filter, an unwritable log file, or when a
/// subscriber is already installed.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| BridgeError::config(format!("Invalid log filter '{}': {}", config.filter, e)))?;

    let spans = if config.span_events {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    let stderr_layer = config.output.stderr().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(spans.clone())
            .with_file(config.file_line)
            .with_line_number(config.file_line)
    });

    let file_layer = if config.output.file() {
        let file = open_log_file()?;
        Some(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_span_events(spans)
                .with_file(config.file_line)
                .with_line_number(config.file_line),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| BridgeError::internal(format!("Failed to init logging: {}", e)))
}

fn open_log_file() -> Result<File> {
    let dir = paths::log_dir();
    paths::ensure_dir(&dir).map_err(|e| BridgeError::FileWrite {
        path: dir.clone(),
        source: e,
    })?;

    let path = dir.join(LOG_FILE);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| BridgeError::FileWrite { path, source: e })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.filter, "info");
        assert!(!config.span_events);
        assert!(!config.file_line);
    }

    #[test]
    fn test_client_config() {
        let config = LogConfig::client();
        assert_eq!(config.output, LogOutput::Stderr);
        if std::env::var(LOG_ENV).is_err() {
            assert_eq!(config.filter, "warn");
        }
    }

    #[test]
    fn test_with_filter() {
        let config = LogConfig::default().with_filter("cozbridge_client=trace");
        if std::env::var(LOG_ENV).is_err() {
            assert_eq!(config.filter, "cozbridge_client=trace");
        }
    }

    #[test]
    fn test_with_file() {
        let config = LogConfig::client().with_file();
        assert_eq!(config.output, LogOutput::Both);
        assert!(config.file_line);
    }

    #[test]
    fn test_output_targets() {
        assert!(LogOutput::Stderr.stderr() && !LogOutput::Stderr.file());
        assert!(!LogOutput::File.stderr() && LogOutput::File.file());
        assert!(LogOutput::Both.stderr() && LogOutput::Both.file());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig {
            filter: "cozbridge=notalevel".into(),
            ..LogConfig::default()
        };
        let result = init_logging_with_config(config);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }
}
