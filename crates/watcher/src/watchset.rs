//! The set of live per-directory watches
//!
//! Each build gets a new generation number. Signals carry the generation
//! they were produced under, so anything emitted by a torn-down watch is
//! recognisably stale.

use crate::debounce::{CancelToken, WatchGate};
use crate::platform::{EventSink, OsWatch, Signal, WatchBackend};
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::debug;
use trigger_core::{ResolvedWatchTarget, TriggerError};

/// One OS watch with its subscription controls
pub struct WatchHandle {
    target: Arc<ResolvedWatchTarget>,
    gate: Arc<WatchGate>,
    cancel: CancelToken,
    os_watch: Option<Box<dyn OsWatch>>,
}

impl WatchHandle {
    pub fn target(&self) -> &ResolvedWatchTarget {
        &self.target
    }

    pub fn gate(&self) -> &Arc<WatchGate> {
        &self.gate
    }

    /// Stop delivering events; the OS watch stays allocated
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and release the OS watch
    pub fn release(&mut self) {
        self.cancel.cancel();
        self.os_watch.take();
    }
}

/// Live watches of one engine
#[derive(Default)]
pub struct WatchSet {
    generation: u64,
    handles: Vec<WatchHandle>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current watches with fresh ones for `targets`
    ///
    /// Either every target gets a watch or none does.
    pub fn build(
        &mut self,
        targets: &[ResolvedWatchTarget],
        backend: &dyn WatchBackend,
        tx: &Sender<Signal>,
    ) -> Result<(), TriggerError> {
        self.teardown();
        self.generation += 1;

        let mut handles = Vec::with_capacity(targets.len());
        for (slot, target) in targets.iter().enumerate() {
            let target = Arc::new(target.clone());
            let gate = Arc::new(WatchGate::new());
            let cancel = CancelToken::new();
            let sink = EventSink::new(
                self.generation,
                slot,
                Arc::clone(&target),
                Arc::clone(&gate),
                cancel.clone(),
                tx.clone(),
            );

            match backend.watch(&target, sink) {
                Ok(os_watch) => handles.push(WatchHandle {
                    target,
                    gate,
                    cancel,
                    os_watch: Some(os_watch),
                }),
                Err(e) => {
                    cancel.cancel();
                    for handle in &mut handles {
                        handle.release();
                    }
                    return Err(e);
                }
            }
        }

        debug!(
            "Built {} watches (generation {})",
            handles.len(),
            self.generation
        );
        self.handles = handles;
        Ok(())
    }

    /// Stop every subscription without releasing OS watches
    pub fn cancel_all(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    /// Cancel every subscription and release every OS watch
    ///
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        for handle in &mut self.handles {
            handle.release();
        }
        self.handles.clear();
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` is the one currently live
    pub fn is_current(&self, generation: u64) -> bool {
        !self.handles.is_empty() && generation == self.generation
    }

    pub fn get(&self, slot: usize) -> Option<&WatchHandle> {
        self.handles.get(slot)
    }

    pub fn first(&self) -> Option<&WatchHandle> {
        self.handles.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchHandle> {
        self.handles.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for WatchSet {
    fn drop(&mut self) {
        self.teardown();
    }
}
