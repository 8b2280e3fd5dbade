//! Per-watch notification gate and cancellation token
//!
//! A watch forwards at most one change at a time: forwarding disarms the
//! gate, and the firing path re-arms it once the callback has returned.
//! Changes arriving in between are dropped, which absorbs the duplicate
//! notifications a single save usually produces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Enables/disables event delivery for one watch
#[derive(Debug)]
pub struct WatchGate {
    armed: AtomicBool,
}

impl WatchGate {
    /// Create an armed gate
    pub fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
        }
    }

    /// Disarm the gate; true if this call did it
    pub fn try_disarm(&self) -> bool {
        self.armed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Re-enable delivery
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

impl Default for WatchGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared flag telling a subscription to stop delivering
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel; idempotent
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
