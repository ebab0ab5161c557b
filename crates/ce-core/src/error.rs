//! Error types for ce-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ce-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for lifecycle operations.
///
/// Expected conditions (stale pid files, busy ports, services that are
/// already running or already stopped) are not errors; they are reported
/// through the outcome types of each module.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    // Locking
    #[error("Another ce instance is running (lock held on {})", lock.display())]
    AlreadyRunning { lock: PathBuf },

    // Service errors
    #[error("Service {service} has an empty command")]
    EmptyCommand { service: String },

    // Collaborator errors
    #[error("{name} failed: {reason}")]
    Collaborator { name: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Command execution errors
    #[error("Command failed: {cmd}\n{stderr}")]
    CommandFailed { cmd: String, stderr: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a command failure
    pub fn command_failed(cmd: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            cmd: cmd.into(),
            stderr: stderr.into(),
        }
    }

    /// Create an error for a misbehaving external collaborator
    pub fn collaborator(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
