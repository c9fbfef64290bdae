//! Error types for the drive_fetch crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving or downloading from Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Filesystem error at {}: {source}", path.display())]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote name cannot be used as a local path segment: {0:?}")]
    InvalidName(String),

    #[error("Folder {0} appears inside itself")]
    FolderCycle(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriveError {
    /// Wrap an I/O error raised while touching `path` on the local filesystem.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DriveError::FilesystemError {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
