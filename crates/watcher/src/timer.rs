//! Idle watchdog timer
//!
//! The timer does not own a thread. The engine worker waits for signals
//! with the timer's deadline as receive timeout, so an elapsed deadline
//! turns into a synthetic fire. Every fire stops the timer first and
//! restarts it afterwards, which pushes the deadline out by a full interval.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Fallback timer firing after an interval without activity
#[derive(Debug, Clone)]
pub struct FallbackTimer {
    interval: Duration,
    running: bool,
    deadline: Option<Instant>,
    last_start: Option<DateTime<Local>>,
    next_fire: Option<DateTime<Local>>,
}

impl FallbackTimer {
    /// Create a stopped timer
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            deadline: None,
            last_start: None,
            next_fire: None,
        }
    }

    /// (Re)start the countdown from now
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    fn start_at(&mut self, now: Instant) {
        let wall = Local::now();
        self.running = true;
        // Intervals too large to represent never elapse
        self.deadline = now.checked_add(self.interval);
        self.last_start = Some(wall);
        self.next_fire = chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|d| wall.checked_add_signed(d));
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant the worker should wake up at, if running
    pub fn deadline(&self) -> Option<Instant> {
        if self.running {
            self.deadline
        } else {
            None
        }
    }

    /// Whether the countdown has elapsed at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Wall-clock time of the last (re)start
    pub fn last_start(&self) -> Option<DateTime<Local>> {
        self.last_start
    }

    /// Wall-clock time of the next synthetic fire, if running
    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        if self.running {
            self.next_fire
        } else {
            None
        }
    }
}
