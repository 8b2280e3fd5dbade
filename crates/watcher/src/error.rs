//! Failures raised after a trigger has started
//!
//! These never reach the caller: each one tears down and rebuilds the
//! watches, and is reported through the log sink.

use thiserror::Error;

/// Reason the watches need rebuilding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchFailure {
    /// OS event queue overflowed; changes may have been lost
    #[error("file system watcher internal buffer overflow")]
    Overflow,

    /// Watched directory vanished or the OS reported an error
    #[error("watched directory not accessible: {0}")]
    Inaccessible(String),

    /// The caller's callback panicked
    #[error("trigger callback failed: {0}")]
    Callback(String),
}
