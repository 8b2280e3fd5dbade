//! Log sink the engine reports its activity to

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

/// Receiver of engine diagnostics
///
/// Fire-and-forget: the engine never looks at the outcome, and a panicking
/// sink does not disturb triggering.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards messages to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        info!(target: "filetrigger", "{}", message);
    }
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Deliver `message`, containing any panic in the sink
pub(crate) fn say(sink: &dyn LogSink, message: &str) {
    if catch_unwind(AssertUnwindSafe(|| sink.log(message))).is_err() {
        warn!("Log sink panicked while handling: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closure_sink_receives_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = move |message: &str| captured.lock().push(message.to_string());

        say(&sink, "Watcher started");
        assert_eq!(*seen.lock(), vec!["Watcher started".to_string()]);
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink = |_: &str| panic!("sink exploded");
        say(&sink, "anything");
    }
}
