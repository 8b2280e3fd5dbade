//! Retry policy for rebuilding watches after a failure

use std::time::Duration;
use trigger_core::RecoverySettings;

/// Doubling backoff with an optional attempt ceiling
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RecoveryPolicy {
    pub fn new(settings: &RecoverySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }

    /// Whether another attempt is allowed after `failed` failed attempts
    pub fn allows(&self, failed: u32) -> bool {
        self.max_attempts == 0 || failed < self.max_attempts
    }

    /// Delay before the attempt following `failed` failures (`failed` >= 1)
    pub fn backoff(&self, failed: u32) -> Duration {
        let shift = failed.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl From<&RecoverySettings> for RecoveryPolicy {
    fn from(settings: &RecoverySettings) -> Self {
        Self::new(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RecoveryPolicy {
        RecoveryPolicy::new(&RecoverySettings {
            max_attempts,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        })
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = policy(10);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(500), Duration::from_millis(1_000));
    }

    #[test]
    fn test_attempt_ceiling() {
        let policy = policy(3);
        assert!(policy.allows(0));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn test_zero_means_unbounded() {
        let policy = policy(0);
        assert!(policy.allows(u32::MAX - 1));
    }
}
