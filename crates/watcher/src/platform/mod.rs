//! OS watch seam
//!
//! A [`WatchBackend`] turns one [`ResolvedWatchTarget`] into a live OS watch
//! and reports what it sees through the [`EventSink`] it was handed. The
//! sink is the subscription: it filters by file name, honours the watch's
//! gate and cancellation, and hands the event off to the engine's worker.

mod native;

pub use self::native::NotifyBackend;

use crate::debounce::{CancelToken, WatchGate};
use crate::error::WatchFailure;
use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::sync::Arc;
use trigger_core::{ChangeKind, ResolvedWatchTarget, TriggerError};

/// Creates OS-level watches
pub trait WatchBackend: Send + Sync + 'static {
    /// Start watching `target` non-recursively, reporting into `sink`
    ///
    /// Dropping the returned handle must release the OS watch.
    fn watch(
        &self,
        target: &ResolvedWatchTarget,
        sink: EventSink,
    ) -> Result<Box<dyn OsWatch>, TriggerError>;
}

/// A live OS watch; released on drop
pub trait OsWatch: Send {}

/// Work handed from OS callbacks to the engine worker
#[derive(Debug)]
pub(crate) enum Signal {
    Changed {
        generation: u64,
        slot: usize,
        path: PathBuf,
        change: ChangeKind,
    },
    Failed {
        generation: u64,
        failure: WatchFailure,
    },
    InitialFire,
    Shutdown,
}

/// Delivery endpoint given to a backend for one watch
#[derive(Clone)]
pub struct EventSink {
    generation: u64,
    slot: usize,
    target: Arc<ResolvedWatchTarget>,
    gate: Arc<WatchGate>,
    cancel: CancelToken,
    tx: Sender<Signal>,
}

impl EventSink {
    pub(crate) fn new(
        generation: u64,
        slot: usize,
        target: Arc<ResolvedWatchTarget>,
        gate: Arc<WatchGate>,
        cancel: CancelToken,
        tx: Sender<Signal>,
    ) -> Self {
        Self {
            generation,
            slot,
            target,
            gate,
            cancel,
            tx,
        }
    }

    /// Target this sink belongs to
    pub fn target(&self) -> &ResolvedWatchTarget {
        &self.target
    }

    /// Whether the subscription has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report a change of `path`
    ///
    /// Returns true if the change was forwarded. Changes to other files,
    /// changes while the gate is closed and changes after cancellation
    /// are dropped.
    pub fn changed(&self, path: PathBuf, change: ChangeKind) -> bool {
        if self.cancel.is_cancelled() || !self.target.matches(&path) {
            return false;
        }
        if !self.gate.try_disarm() {
            return false;
        }

        let signal = Signal::Changed {
            generation: self.generation,
            slot: self.slot,
            path,
            change,
        };
        if self.tx.send(signal).is_err() {
            // Worker gone; leave the watch usable
            self.gate.arm();
            return false;
        }
        true
    }

    /// Report that the watch broke
    pub fn failed(&self, failure: WatchFailure) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.tx.send(Signal::Failed {
            generation: self.generation,
            failure,
        });
    }
}
