use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures from the PTY layer. Session lookups are by window id.
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to open PTY: {0}")]
    Open(String),
    #[error("failed to spawn shell `{shell}`: {reason}")]
    Spawn { shell: String, reason: String },
    #[error("failed to clone PTY reader: {0}")]
    CloneReader(String),
    #[error("failed to take PTY writer: {0}")]
    TakeWriter(String),
    #[error("failed to write to PTY: {0}")]
    Write(#[from] io::Error),
    #[error("failed to resize PTY: {0}")]
    Resize(String),
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("session {0} lock poisoned")]
    Poisoned(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error for the interactive driver. PTY and config failures are
/// reported in the UI or logged where they happen, so only startup logging
/// and host terminal i/o can end the program.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to open log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("terminal i/o failed: {0}")]
    Terminal(#[from] io::Error),
}
