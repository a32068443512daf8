//! Error types for the directory watcher and converter.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur while setting up or configuring the watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The watched path cannot change while monitoring.
    #[error("watcher already running for: {0}")]
    AlreadyWatching(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl WatcherError {
    /// Classify an IO error raised while opening `path`.
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::DirectoryNotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(path.display().to_string())
            }
            _ => Self::Io(err),
        }
    }
}

/// Errors reported by a [`Converter`](crate::converter::Converter).
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The conversion program does not exist.
    #[error("conversion program not found: {}", .0.display())]
    ProgramNotFound(PathBuf),

    /// The conversion program could not be started.
    #[error("failed to spawn conversion program: {0}")]
    Spawn(#[source] std::io::Error),

    /// The conversion program exited unsuccessfully.
    #[error("conversion failed (status: {}): {stderr}", describe_status(.status))]
    Failed {
        /// Exit code, if the process exited normally.
        status: Option<i32>,

        /// Captured standard error.
        stderr: String,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
