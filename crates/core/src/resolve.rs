//! Candidate directory resolution
//!
//! Exact match wins: the first candidate that already contains the file is
//! the only directory watched. Without such a match every existing
//! candidate is watched, since the file may show up in any of them later.

use crate::error::TriggerError;
use crate::spec::WatchSpec;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One directory + file name pair to watch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedWatchTarget {
    /// Directory holding (or expected to hold) the file
    pub directory: PathBuf,
    /// File name inside `directory`
    pub filename: String,
}

impl ResolvedWatchTarget {
    /// Create a new target
    pub fn new(directory: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    /// Full path of the watched file
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    /// Whether `path` names the watched file
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == self.filename)
    }
}

/// Determine the directories to watch for a parsed definition
pub fn resolve(spec: &WatchSpec) -> Result<Vec<ResolvedWatchTarget>> {
    let filename = spec.filename();
    let mut existing: Vec<PathBuf> = Vec::new();

    for directory in spec.candidate_directories() {
        if directory.join(filename).is_file() {
            debug!("Found {} in {}", filename, directory.display());
            return Ok(vec![ResolvedWatchTarget::new(directory.clone(), filename)]);
        }
        if directory.is_dir() && !existing.contains(directory) {
            existing.push(directory.clone());
        }
    }

    if existing.is_empty() {
        let searched = spec
            .candidate_directories()
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(TriggerError::NoValidDirectory(format!(
            "{} in [{}]",
            filename, searched
        )));
    }

    debug!(
        "{} not present yet, watching {} candidate directories",
        filename,
        existing.len()
    );
    Ok(existing
        .into_iter()
        .map(|directory| ResolvedWatchTarget::new(directory, filename))
        .collect())
}
