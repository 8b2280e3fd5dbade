//! Common utilities for engine integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use trigger_watcher::{
    ChangeKind, EventSink, OsWatch, RecoverySettings, ResolvedWatchTarget, TriggerCallback,
    TriggerError, TriggerEvent, TriggerSettings, WatchBackend, WatchFailure,
};

/// Backend whose "OS" events are emitted by the test
#[derive(Default)]
pub struct ManualBackend {
    sinks: Mutex<Vec<EventSink>>,
    fail_builds: AtomicBool,
    watch_calls: AtomicUsize,
    live: Arc<AtomicUsize>,
}

struct ManualWatch {
    live: Arc<AtomicUsize>,
}

impl OsWatch for ManualWatch {}

impl Drop for ManualWatch {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WatchBackend for ManualBackend {
    fn watch(
        &self,
        target: &ResolvedWatchTarget,
        sink: EventSink,
    ) -> Result<Box<dyn OsWatch>, TriggerError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_builds.load(Ordering::SeqCst) {
            return Err(TriggerError::WatchSetup {
                directory: target.directory.clone(),
                reason: "simulated failure".to_string(),
            });
        }

        self.sinks.lock().push(sink);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ManualWatch {
            live: Arc::clone(&self.live),
        }))
    }
}

impl ManualBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following watch request fail (or succeed again)
    pub fn fail_builds(&self, fail: bool) {
        self.fail_builds.store(fail, Ordering::SeqCst);
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    /// Number of OS watches not yet released
    pub fn live_watches(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn current_sink(&self) -> Option<EventSink> {
        self.sinks
            .lock()
            .iter()
            .rev()
            .find(|sink| !sink.is_cancelled())
            .cloned()
    }

    /// Report a change of the watched file; true if it was forwarded
    pub fn emit_change(&self) -> bool {
        match self.current_sink() {
            Some(sink) => {
                let path = sink.target().path();
                sink.changed(path, ChangeKind::Changed)
            }
            None => false,
        }
    }

    /// Report a change of some other file in the watched directory
    pub fn emit_unrelated(&self) -> bool {
        match self.current_sink() {
            Some(sink) => {
                let path = sink.target().directory.join("unrelated.txt");
                sink.changed(path, ChangeKind::Created)
            }
            None => false,
        }
    }

    pub fn emit_failure(&self, failure: WatchFailure) {
        if let Some(sink) = self.current_sink() {
            sink.failed(failure);
        }
    }
}

/// Collects every event delivered to its callback
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<TriggerEvent>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> TriggerCallback {
        let events = Arc::clone(&self.events);
        Arc::new(move |event| events.lock().push(event))
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn events(&self) -> Vec<TriggerEvent> {
        self.events.lock().clone()
    }

    /// Wait until at least `n` events arrived
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.count() >= n)
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Settings with short pauses so tests run quickly
pub fn fast_settings() -> TriggerSettings {
    TriggerSettings {
        debounce_ms: 20,
        drain_pause_ms: 10,
        recovery: RecoverySettings {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 40,
        },
    }
}

/// Temporary directory containing one watched file
pub struct Fixture {
    pub dir: TempDir,
    pub file: PathBuf,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join(name);
        fs::write(&file, "initial").unwrap();
        Self { dir, file }
    }

    /// Trigger definition for the file followed by `extra` segments
    pub fn definition(&self, extra: &str) -> String {
        if extra.is_empty() {
            self.file.display().to_string()
        } else {
            format!("{}|{}", self.file.display(), extra)
        }
    }
}
