//! Trigger engine
//!
//! Owns the parsed definition, the resolved targets, the live watches and
//! the fallback timer of one trigger. OS callbacks only enqueue signals;
//! a single worker thread per running engine drains them and runs the
//! firing path (debounce, callback, re-arm) and the recovery path
//! (cancel, drain, release, rebuild).
//!
//! The debounce pause and the callback run on that worker thread, never
//! on a thread owned by the OS watcher or by the caller. `stop` and
//! `dispose` wait for an in-flight fire to finish unless they are called
//! from inside the callback itself.

use crate::error::WatchFailure;
use crate::log::{self, LogSink, TracingSink};
use crate::platform::{NotifyBackend, Signal, WatchBackend};
use crate::recovery::RecoveryPolicy;
use crate::timer::FallbackTimer;
use crate::watchset::WatchSet;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use trigger_core::{
    resolve, ChangeKind, ResolvedWatchTarget, TriggerError, TriggerEvent, TriggerSettings,
    WatchSpec,
};

/// Callback invoked once per fire
pub type TriggerCallback = Arc<dyn Fn(TriggerEvent) + Send + Sync>;

const WORKER_THREAD_NAME: &str = "filetrigger-worker";

/// Lifecycle state of a trigger engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Stopped,
    Starting,
    Running,
    Recovering,
}

/// Builder for [`TriggerEngine`]
#[derive(Default)]
pub struct TriggerEngineBuilder {
    backend: Option<Arc<dyn WatchBackend>>,
    log: Option<Arc<dyn LogSink>>,
    settings: TriggerSettings,
}

impl TriggerEngineBuilder {
    /// Watch backend (default: [`NotifyBackend`])
    pub fn backend(mut self, backend: Arc<dyn WatchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Log sink (default: [`TracingSink`])
    pub fn log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn settings(mut self, settings: TriggerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> TriggerEngine {
        let policy = RecoveryPolicy::new(&self.settings.recovery);
        TriggerEngine {
            inner: Arc::new(Inner {
                backend: self.backend.unwrap_or_else(|| Arc::new(NotifyBackend)),
                log: self.log.unwrap_or_else(|| Arc::new(TracingSink)),
                settings: self.settings,
                policy,
                state: Mutex::new(EngineState::default()),
            }),
            worker: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }
}

/// Calls back when a file changes, or when it has been quiet for too long
///
/// ```no_run
/// use std::sync::Arc;
/// use trigger_watcher::{TriggerCallback, TriggerEngine};
///
/// let engine = TriggerEngine::new();
/// let callback: TriggerCallback = Arc::new(|event| println!("{}", event));
/// engine.start("demo", "./data.txt|Initial|S:30|/tmp", callback.clone())?;
/// // ...
/// engine.stop("demo", &callback);
/// engine.dispose();
/// # Ok::<(), trigger_core::TriggerError>(())
/// ```
pub struct TriggerEngine {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
    disposed: AtomicBool,
}

struct Worker {
    tx: Sender<Signal>,
    handle: JoinHandle<()>,
}

struct Inner {
    backend: Arc<dyn WatchBackend>,
    log: Arc<dyn LogSink>,
    settings: TriggerSettings,
    policy: RecoveryPolicy,
    state: Mutex<EngineState>,
}

struct EngineState {
    phase: TriggerState,
    controller: String,
    targets: Vec<ResolvedWatchTarget>,
    watches: WatchSet,
    timer: Option<FallbackTimer>,
    callback: Option<TriggerCallback>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            phase: TriggerState::Stopped,
            controller: String::new(),
            targets: Vec::new(),
            watches: WatchSet::new(),
            timer: None,
            callback: None,
        }
    }
}

/// What caused a pass through the firing path
enum Fire {
    Change {
        generation: u64,
        slot: usize,
        path: PathBuf,
        change: ChangeKind,
    },
    Initial,
    Timer,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

impl TriggerEngine {
    /// Engine with the notify backend, tracing log sink and default settings
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TriggerEngineBuilder {
        TriggerEngineBuilder::default()
    }

    /// Start watching according to `definition`
    ///
    /// Returns `Ok(false)` if the engine is already running. Parse and
    /// resolution errors are returned and leave the engine stopped.
    pub fn start(
        &self,
        controller: &str,
        definition: &str,
        callback: TriggerCallback,
    ) -> Result<bool, TriggerError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(TriggerError::Disposed);
        }

        {
            let mut state = self.inner.state.lock();
            if state.phase != TriggerState::Stopped {
                debug!("Start ignored, trigger is {:?}", state.phase);
                return Ok(false);
            }
            state.phase = TriggerState::Starting;
            state.controller = controller.to_string();
        }

        // A worker may linger if the last stop came from inside the callback
        self.retire_worker();

        match self.launch(definition, callback) {
            Ok(true) => {
                self.inner.say("Watcher started");
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                let mut state = self.inner.state.lock();
                state.watches.teardown();
                state.timer = None;
                state.callback = None;
                state.phase = TriggerState::Stopped;
                drop(state);
                warn!("Failed to start trigger '{}': {}", definition, e);
                Err(e)
            }
        }
    }

    fn launch(&self, definition: &str, callback: TriggerCallback) -> Result<bool, TriggerError> {
        let spec = WatchSpec::parse(definition)?;
        let targets = resolve(&spec)?;
        let (tx, rx) = crossbeam_channel::unbounded();

        // Held until the worker is stored, so a concurrent stop or dispose
        // retires it instead of finding an empty slot. Lock order: worker, state.
        let mut slot = self.worker.lock();

        let initial_fire = {
            let mut state = self.inner.state.lock();
            if self.disposed.load(Ordering::Acquire) {
                return Err(TriggerError::Disposed);
            }
            if state.phase != TriggerState::Starting {
                // Stopped while resolving
                return Ok(false);
            }

            state
                .watches
                .build(&targets, self.inner.backend.as_ref(), &tx)?;
            let initial_fire = spec.initial_fire() && !targets.is_empty();
            state.targets = targets;
            state.timer = spec.interval().map(FallbackTimer::new);
            if let Some(timer) = state.timer.as_mut() {
                timer.start();
            }
            state.callback = Some(callback);
            state.phase = TriggerState::Running;
            initial_fire
        };

        let inner = Arc::clone(&self.inner);
        let worker_tx = tx.clone();
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || inner.run(rx, worker_tx))
            .map_err(|e| TriggerError::Worker(e.to_string()))?;

        if initial_fire {
            let _ = tx.send(Signal::InitialFire);
        }
        *slot = Some(Worker { tx, handle });
        Ok(true)
    }

    /// Stop firing and release the watches
    ///
    /// `callback` is deregistered if it is the one passed to `start`.
    pub fn stop(&self, controller: &str, callback: &TriggerCallback) {
        let was_active = {
            let mut state = self.inner.state.lock();
            if let Some(timer) = state.timer.as_mut() {
                timer.stop();
            }
            state.watches.cancel_all();

            let registered = state
                .callback
                .as_ref()
                .is_some_and(|cb| same_callback(cb, callback));
            if registered {
                state.callback = None;
            } else if state.callback.is_some() {
                warn!("Stop by '{}' with a callback that was never registered", controller);
            }

            let was_active = state.phase != TriggerState::Stopped;
            state.phase = TriggerState::Stopped;
            was_active
        };

        self.retire_worker();
        self.inner.state.lock().watches.teardown();

        if was_active {
            self.inner.say("Watcher stopped!");
        }
    }

    /// Release every resource; the engine cannot be started again
    ///
    /// Idempotent, never panics, also runs on drop.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let mut state = self.inner.state.lock();
            if let Some(timer) = state.timer.as_mut() {
                timer.stop();
            }
            state.watches.cancel_all();
            state.callback = None;
            state.phase = TriggerState::Stopped;
        }

        self.retire_worker();

        let mut state = self.inner.state.lock();
        state.watches.teardown();
        state.timer = None;
        debug!("Trigger disposed");
    }

    /// Summary of watched paths and the next timer fire
    pub fn trigger_info(&self) -> String {
        self.inner.trigger_info()
    }

    pub fn state(&self) -> TriggerState {
        self.inner.state.lock().phase
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            TriggerState::Running | TriggerState::Recovering
        )
    }

    /// Targets resolved by the last successful start
    pub fn targets(&self) -> Vec<ResolvedWatchTarget> {
        self.inner.state.lock().targets.clone()
    }

    /// Shut the worker down and wait for it, unless we are the worker
    fn retire_worker(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = worker.tx.send(Signal::Shutdown);

        if worker.handle.thread().id() == thread::current().id() {
            // Called from the callback; the worker exits once it returns
            return;
        }
        if worker.handle.join().is_err() {
            error!("Trigger worker panicked");
        }
    }
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TriggerEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Inner {
    fn run(self: Arc<Self>, rx: Receiver<Signal>, tx: Sender<Signal>) {
        debug!("Trigger worker started");

        loop {
            let deadline = self
                .state
                .lock()
                .timer
                .as_ref()
                .and_then(FallbackTimer::deadline);
            let received = match deadline {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            let outcome = match received {
                Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(Signal::InitialFire) => self.fire(Fire::Initial),
                Ok(Signal::Changed {
                    generation,
                    slot,
                    path,
                    change,
                }) => self.fire(Fire::Change {
                    generation,
                    slot,
                    path,
                    change,
                }),
                Ok(Signal::Failed {
                    generation,
                    failure,
                }) => {
                    if self.state.lock().watches.is_current(generation) {
                        Err(failure)
                    } else {
                        debug!("Ignoring failure from retired watch: {}", failure);
                        Ok(())
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let due = self
                        .state
                        .lock()
                        .timer
                        .as_ref()
                        .is_some_and(|timer| timer.is_due(Instant::now()));
                    if due {
                        self.fire(Fire::Timer)
                    } else {
                        Ok(())
                    }
                }
            };

            if let Err(failure) = outcome {
                if self.recover(failure, &rx, &tx) == Flow::Exit {
                    break;
                }
            }
        }

        debug!("Trigger worker stopped");
    }

    /// Debounce, call back, re-arm
    fn fire(&self, fire: Fire) -> Result<(), WatchFailure> {
        let (gate, path, change) = {
            let mut state = self.state.lock();
            if state.phase != TriggerState::Running {
                return Ok(());
            }

            let picked = match fire {
                Fire::Change {
                    generation,
                    slot,
                    path,
                    change,
                } => {
                    if !state.watches.is_current(generation) {
                        return Ok(());
                    }
                    state
                        .watches
                        .get(slot)
                        .map(|handle| (Arc::clone(handle.gate()), path, change))
                }
                Fire::Initial | Fire::Timer => state.watches.first().map(|handle| {
                    handle.gate().try_disarm();
                    (
                        Arc::clone(handle.gate()),
                        handle.target().path(),
                        ChangeKind::Changed,
                    )
                }),
            };
            let Some(picked) = picked else {
                return Ok(());
            };

            if let Some(timer) = state.timer.as_mut() {
                timer.stop();
            }
            picked
        };

        self.say(&format!("Trigger fired: {}", path.display()));
        thread::sleep(self.settings.debounce());

        let callback = {
            let state = self.state.lock();
            (state.phase == TriggerState::Running).then(|| state.callback.clone())
        };
        let outcome = match callback {
            Some(Some(callback)) => {
                let event = TriggerEvent::new(path, change.as_str());
                catch_unwind(AssertUnwindSafe(|| callback(event)))
                    .map_err(|payload| WatchFailure::Callback(panic_message(payload.as_ref())))
            }
            Some(None) => {
                self.say("No callback registered");
                Ok(())
            }
            // Stopped during the debounce pause
            None => Ok(()),
        };

        gate.arm();
        outcome?;

        let mut state = self.state.lock();
        if state.phase == TriggerState::Running {
            if let Some(timer) = state.timer.as_mut() {
                timer.start();
            }
        }
        Ok(())
    }

    /// Tear down every watch and rebuild from the resolved targets
    fn recover(&self, failure: WatchFailure, rx: &Receiver<Signal>, tx: &Sender<Signal>) -> Flow {
        {
            let mut state = self.state.lock();
            if state.phase != TriggerState::Running {
                return Flow::Continue;
            }
            state.phase = TriggerState::Recovering;
            if let Some(timer) = state.timer.as_mut() {
                timer.stop();
            }
            state.watches.cancel_all();
        }

        self.say(&format!("Error: {}", failure));
        self.say("Stopping triggers!");

        // Let callbacks already running on OS threads drain
        thread::sleep(self.settings.drain_pause());
        self.state.lock().watches.teardown();

        let mut failed = 0u32;
        loop {
            let built = {
                let mut state = self.state.lock();
                if state.phase != TriggerState::Recovering {
                    return Flow::Continue;
                }

                let EngineState {
                    targets,
                    watches,
                    timer,
                    phase,
                    ..
                } = &mut *state;
                let built = watches.build(targets, self.backend.as_ref(), tx);
                if built.is_ok() {
                    *phase = TriggerState::Running;
                    if let Some(timer) = timer.as_mut() {
                        timer.start();
                    }
                }
                built
            };

            let err = match built {
                Ok(()) => {
                    self.say("Restarting triggers!");
                    return Flow::Continue;
                }
                Err(e) => e,
            };

            failed += 1;
            if !self.policy.allows(failed) {
                {
                    let mut state = self.state.lock();
                    if state.phase == TriggerState::Recovering {
                        state.phase = TriggerState::Stopped;
                    }
                }
                error!("Giving up on trigger after {} rebuild attempts: {}", failed, err);
                self.say(&format!(
                    "Fatal: could not restart triggers after {} attempts: {}",
                    failed, err
                ));
                return Flow::Continue;
            }

            let delay = self.policy.backoff(failed);
            self.say(&format!(
                "Restarting triggers failed ({}), retrying in {} ms",
                err,
                delay.as_millis()
            ));
            if wait_for_shutdown(rx, delay) {
                return Flow::Exit;
            }
        }
    }

    fn trigger_info(&self) -> String {
        describe(&self.state.lock())
    }

    /// Log through the sink, prefixed with the trigger info
    ///
    /// Must not be called with the state lock held.
    fn say(&self, message: &str) {
        let line = format!("{} {}", self.trigger_info(), message);
        log::say(self.log.as_ref(), &line);
    }
}

fn describe(state: &EngineState) -> String {
    let mut info = String::new();
    if !state.controller.is_empty() {
        info.push_str(&state.controller);
        info.push(' ');
    }

    let paths: Vec<String> = state
        .watches
        .iter()
        .map(|handle| handle.target().path().display().to_string())
        .collect();
    if paths.is_empty() {
        info.push_str("watching nothing");
    } else {
        info.push_str("watching ");
        info.push_str(&paths.join(" or "));
    }

    if let Some(next) = state.timer.as_ref().and_then(FallbackTimer::next_fire) {
        info.push_str(&format!(" or at {}", next.format("%Y-%m-%d %H:%M:%S")));
    }
    info
}

/// Sleep for `delay` unless a shutdown arrives first; true on shutdown
fn wait_for_shutdown(rx: &Receiver<Signal>, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        match rx.recv_deadline(deadline) {
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => return true,
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
}

fn same_callback(a: &TriggerCallback, b: &TriggerCallback) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}
