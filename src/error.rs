// src/error.rs

//! Unified error handling for the scraping pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A scraped page did not have the expected shape
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The site answered with a non-success status
    #[error("Request to {path} failed with status {status}")]
    Status { path: String, status: u16 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a status error for a request path.
    pub fn status(path: impl Into<String>, status: u16) -> Self {
        Self::Status {
            path: path.into(),
            status,
        }
    }
}

/// A required structural anchor was missing from a scraped page.
///
/// The offending page is kept in `content` so callers can log or store it;
/// it is deliberately left out of the `Display` output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error: {message}")]
pub struct ParseError {
    pub message: String,
    pub content: String,
}

impl ParseError {
    pub fn new(message: impl fmt::Display, content: &[u8]) -> Self {
        Self {
            message: message.to_string(),
            content: String::from_utf8_lossy(content).into_owned(),
        }
    }
}
