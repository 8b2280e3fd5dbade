//! Event value delivered to trigger callbacks

use chrono::{DateTime, Local};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Kind of change that fired a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Last write time of the file changed
    Changed,
    /// File was created
    Created,
    /// File was renamed into place
    Renamed,
}

impl ChangeKind {
    /// Textual form used as `TriggerEvent::change_info`
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Changed => "Changed",
            ChangeKind::Created => "Created",
            ChangeKind::Renamed => "Renamed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One firing of a trigger
///
/// Equality and hashing only look at path and change info. Two events for
/// the same file and change compare equal no matter when they fired.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    full_path: PathBuf,
    change_info: String,
    timestamp: DateTime<Local>,
}

impl TriggerEvent {
    /// Create an event stamped with the current local time
    pub fn new(full_path: impl Into<PathBuf>, change_info: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            change_info: change_info.into(),
            timestamp: Local::now(),
        }
    }

    /// Full path of the watched file
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Kind of change as text
    pub fn change_info(&self) -> &str {
        &self.change_info
    }

    /// When the event was created
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

impl PartialEq for TriggerEvent {
    fn eq(&self, other: &Self) -> bool {
        self.full_path == other.full_path && self.change_info == other.change_info
    }
}

impl Eq for TriggerEvent {}

impl Hash for TriggerEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_path.hash(state);
        self.change_info.hash(state);
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            self.full_path.display(),
            self.change_info,
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f")
        )
    }
}
