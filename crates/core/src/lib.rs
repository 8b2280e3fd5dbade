//! Trigger Core - OS-independent building blocks of a file trigger
//!
//! This crate provides:
//! - Trigger definition parsing (`path|Initial|S:30|dir1,dir2`)
//! - Candidate directory resolution (exact match wins)
//! - The event value handed to trigger callbacks
//! - Engine settings loaded from TOML

pub mod config;
pub mod error;
pub mod event;
pub mod resolve;
pub mod spec;

// Re-export main types for convenience
pub use config::{RecoverySettings, TriggerSettings};
pub use error::TriggerError;
pub use event::{ChangeKind, TriggerEvent};
pub use resolve::{resolve, ResolvedWatchTarget};
pub use spec::WatchSpec;

/// Common result type used throughout trigger-core
pub type Result<T> = std::result::Result<T, TriggerError>;
