/*!
Error types for the Fragkit core engine.
*/

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the Fragkit core.
pub type Result<T> = std::result::Result<T, FragkitError>;

/// Errors that can occur while reading, packaging or synchronizing a project.
#[derive(Error, Debug)]
pub enum FragkitError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The project root manifest is missing or unreadable
    #[error("Invalid project at {}: {reason}", path.display())]
    InvalidProject { path: PathBuf, reason: String },

    /// Archive creation or extraction errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Transport-level HTTP failures
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status or an error payload
    #[error("{message}")]
    Api { message: String },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// External bundler failures
    #[error("Build error: {0}")]
    Build(String),

    /// Template rendering errors
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FragkitError {
    /// Create a new invalid project error
    pub fn invalid_project<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::InvalidProject {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new archive error
    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(msg: S) -> Self {
        Self::Api {
            message: msg.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new build error
    pub fn build<S: Into<String>>(msg: S) -> Self {
        Self::Build(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

impl From<zip::result::ZipError> for FragkitError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Archive(error.to_string())
    }
}

impl From<walkdir::Error> for FragkitError {
    fn from(error: walkdir::Error) -> Self {
        Self::Io(error.into())
    }
}

impl From<tokio::task::JoinError> for FragkitError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Io(std::io::Error::other(error))
    }
}
