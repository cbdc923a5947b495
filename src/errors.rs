//! Error types for the replay driver and telemetry tooling
//!
//! Every fallible operation in the crate returns [`Result`], built on top of
//! [`FlapError`]. Constructor helpers keep call sites short.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for flapbench
#[derive(Error, Debug)]
pub enum FlapError {
    /// Filesystem errors, annotated with the offending path when known
    #[error("I/O error{}: {source}", .path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP errors talking to the WebDriver endpoint
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error object returned by the WebDriver endpoint
    #[error("WebDriver error {status} ({error}): {message}")]
    WebDriver {
        status: u16,
        error: String,
        message: String,
    },

    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed input data
    #[error("Parse error: {message}{}", .line.map(|l| format!(" (line {})", l)).unwrap_or_default())]
    Parse { message: String, line: Option<u64> },

    /// The live session did not behave as expected
    #[error("Session error: {message}")]
    Session { message: String },

    /// A bounded wait expired
    #[error("Timed out after {duration:?}: {message}")]
    Timeout { duration: Duration, message: String },

    /// Chart rendering failed
    #[error("Plot error: {message}")]
    Plot { message: String },
}

impl FlapError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    pub fn webdriver(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WebDriver {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>, line: Option<u64>) -> Self {
        Self::Parse {
            message: message.into(),
            line,
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    pub fn timeout(duration: Duration, message: impl Into<String>) -> Self {
        Self::Timeout {
            duration,
            message: message.into(),
        }
    }

    pub fn plot(message: impl ToString) -> Self {
        Self::Plot {
            message: message.to_string(),
        }
    }

    /// True for the WebDriver "no such element" error, which lookups treat as absence
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, Self::WebDriver { error, .. } if error == "no such element")
    }
}

impl From<std::io::Error> for FlapError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }
}

/// Result type alias for flapbench operations
pub type Result<T> = std::result::Result<T, FlapError>;
