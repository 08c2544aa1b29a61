//! Bounded retry policy shared by the probe worker and the reputation
//! orchestrator.
//!
//! An attempt reports an [`AttemptOutcome`]. Fatal outcomes stop at once;
//! for retryable ones the [`RetryPolicy`] turns the attempt number into a
//! [`RetryDecision`].

use crate::error::Cancelled;
use mailprobe_core::{AvailabilityConfig, ReputationConfig};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T, E> {
    /// The attempt produced a value
    Success(T),
    /// Failed in a way a fresh attempt may fix
    Retryable(E),
    /// Failed in a way no retry can fix
    Fatal(E),
}

/// When to throw away the browser session between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRecycle {
    /// After every failed attempt
    EveryFailure,
    /// Only after the listed (1-based) attempt numbers
    AtAttempts(Vec<u32>),
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Retry {
        backoff: Duration,
        recreate_session: bool,
    },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Vec<Duration>,
    jitter_secs: (f64, f64),
    recycle: SessionRecycle,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(
        max_attempts: u32,
        backoff: Vec<Duration>,
        jitter_secs: (f64, f64),
        recycle: SessionRecycle,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            jitter_secs,
            recycle,
        }
    }

    /// Signup-form probing: immediate retry on a fresh session.
    #[must_use]
    pub fn availability(config: &AvailabilityConfig) -> Self {
        Self::new(
            config.attempts,
            Vec::new(),
            (0.0, 0.0),
            SessionRecycle::EveryFailure,
        )
    }

    /// Reputation scoring: scheduled backoff with jitter, session recreated
    /// at the configured attempt numbers.
    #[must_use]
    pub fn reputation(config: &ReputationConfig) -> Self {
        Self::new(
            config.max_attempts,
            config
                .backoff_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            (0.5, 3.0),
            SessionRecycle::AtAttempts(config.recreate_session_at.clone()),
        )
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide what follows retryable failure number `attempt` (1-based).
    #[must_use]
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let backoff = match self.backoff.len() {
            0 => Duration::ZERO,
            len => {
                let idx = usize::try_from(attempt.saturating_sub(1)).unwrap_or(usize::MAX);
                self.backoff[idx.min(len - 1)]
            }
        };
        let recreate_session = match &self.recycle {
            SessionRecycle::EveryFailure => true,
            SessionRecycle::AtAttempts(at) => at.contains(&attempt),
        };

        RetryDecision::Retry {
            backoff,
            recreate_session,
        }
    }

    /// Random extra delay added on top of the scheduled backoff.
    #[must_use]
    pub fn jitter(&self) -> Duration {
        jitter(self.jitter_secs)
    }
}

/// Uniform random duration in `[lo, hi]` seconds.
#[must_use]
pub fn jitter((lo, hi): (f64, f64)) -> Duration {
    let lo = lo.max(0.0);
    if hi <= lo {
        return Duration::from_secs_f64(lo);
    }
    Duration::from_secs_f64(rand::thread_rng().gen_range(lo..=hi))
}

/// Sleep for `duration` unless the token fires first.
pub async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        () = cancel.cancelled() => Err(Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_backoff_schedule_clamps_to_last_entry() {
        let policy = RetryPolicy::new(
            6,
            secs(&[10, 20, 40]),
            (0.0, 0.0),
            SessionRecycle::AtAttempts(vec![3, 5]),
        );

        let backoff = |attempt| match policy.decide(attempt) {
            RetryDecision::Retry { backoff, .. } => backoff,
            RetryDecision::GiveUp => panic!("attempt {attempt} should retry"),
        };
        assert_eq!(backoff(1), Duration::from_secs(10));
        assert_eq!(backoff(2), Duration::from_secs(20));
        assert_eq!(backoff(3), Duration::from_secs(40));
        assert_eq!(backoff(5), Duration::from_secs(40));
        assert_eq!(policy.decide(6), RetryDecision::GiveUp);
    }

    #[test]
    fn test_session_recycle_points() {
        let policy = RetryPolicy::reputation(&ReputationConfig {
            max_attempts: 6,
            ..ReputationConfig::default()
        });
        let recreate = |attempt| match policy.decide(attempt) {
            RetryDecision::Retry {
                recreate_session, ..
            } => recreate_session,
            RetryDecision::GiveUp => panic!("attempt {attempt} should retry"),
        };
        assert!(!recreate(1));
        assert!(!recreate(2));
        assert!(recreate(3));
        assert!(!recreate(4));
        assert!(recreate(5));
    }

    #[test]
    fn test_availability_policy() {
        let policy = RetryPolicy::availability(&AvailabilityConfig::default());
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(
            policy.decide(1),
            RetryDecision::Retry {
                backoff: Duration::ZERO,
                recreate_session: true
            }
        );
        assert_eq!(policy.decide(2), RetryDecision::GiveUp);
        assert_eq!(policy.jitter(), Duration::ZERO);
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let d = jitter((0.5, 3.0));
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_secs(3));
        }
        assert_eq!(jitter((2.0, 1.0)), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_or_cancel() {
        let token = CancellationToken::new();
        assert_eq!(sleep_or_cancel(Duration::from_secs(5), &token).await, Ok(()));

        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });
        let started = tokio::time::Instant::now();
        assert_eq!(
            sleep_or_cancel(Duration::from_secs(60), &token).await,
            Err(Cancelled)
        );
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(
            sleep_or_cancel(Duration::from_secs(1), &token).await,
            Err(Cancelled)
        );
    }
}
