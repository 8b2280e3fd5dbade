//! File triggers on top of OS change notifications
//!
//! This crate provides:
//! - The trigger engine (start, stop, dispose, trigger info)
//! - Per-watch gating so a watch never fires while its callback runs
//! - A fallback timer that fires after a quiet period
//! - Bounded recovery when a watch overflows or loses its directory
//! - A notify-based backend behind the [`WatchBackend`] seam

pub mod debounce;
pub mod engine;
pub mod error;
pub mod log;
pub mod platform;
pub mod recovery;
pub mod timer;
mod watchset;

pub use engine::{TriggerCallback, TriggerEngine, TriggerEngineBuilder, TriggerState};
pub use error::WatchFailure;
pub use log::{LogSink, TracingSink};
pub use platform::{EventSink, NotifyBackend, OsWatch, WatchBackend};
pub use recovery::RecoveryPolicy;
pub use timer::FallbackTimer;

pub use trigger_core::{
    ChangeKind, RecoverySettings, ResolvedWatchTarget, TriggerError, TriggerEvent,
    TriggerSettings, WatchSpec,
};
