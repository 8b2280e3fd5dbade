//! Errors surfaced synchronously to callers of `start`

use std::path::PathBuf;
use thiserror::Error;

/// Failure to set up a trigger
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Interval token with a unit other than MS, S, M, H or D
    #[error("invalid interval unit '{unit}' in '{token}': allowed are MS (milliseconds), S (seconds), M (minutes), H (hours), D (days)")]
    InvalidIntervalUnit { unit: String, token: String },

    /// Interval value that does not fit into milliseconds
    #[error("interval '{0}' is out of range")]
    InvalidInterval(String),

    /// No path segment, or a path segment without a file name
    #[error("no file name found in trigger definition '{0}'")]
    MissingFileName(String),

    /// None of the candidate directories exists
    #[error("no valid directory found ({0})")]
    NoValidDirectory(String),

    /// The OS refused to watch a resolved directory
    #[error("cannot watch {directory:?}: {reason}")]
    WatchSetup { directory: PathBuf, reason: String },

    /// The worker thread could not be spawned
    #[error("cannot start trigger worker: {0}")]
    Worker(String),

    /// Settings file could not be read or is invalid
    #[error("invalid settings: {reason}")]
    Settings { path: Option<PathBuf>, reason: String },

    /// The trigger was disposed and cannot be started again
    #[error("trigger has been disposed")]
    Disposed,
}
