//! Reputation scoring with bounded retries.
//!
//! The scoring page is slow and flaky: it can show a placeholder zero while
//! it computes, refuse an address outright, or stall. Each attempt submits
//! the address and waits for the meter to hold one value for `stable_for`.

use crate::error::{Cancelled, Result, ScanError};
use crate::gauge::{GaugeReading, ReputationGauge};
use crate::retry::{jitter, sleep_or_cancel, RetryDecision, RetryPolicy};
use mailprobe_core::{ProbeTarget, ReputationConfig, Score};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Final result of scoring one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationOutcome {
    /// A computed score (> 0)
    Scored(Score),
    /// The page refused the address `unable_cap` times
    Unscoreable,
    /// Every attempt failed
    Exhausted,
    /// The run was cancelled
    Cancelled,
}

impl ReputationOutcome {
    /// The score, only for `Scored`.
    #[must_use]
    pub fn score(self) -> Option<Score> {
        match self {
            Self::Scored(score) => Some(score),
            _ => None,
        }
    }
}

/// How one attempt's polling settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Value(Score),
    Unable,
}

/// Drives a [`ReputationGauge`] through the retry rules.
#[derive(Debug, Clone)]
pub struct ReputationOrchestrator {
    policy: RetryPolicy,
    wait_timeout: Duration,
    after_click_delay: Duration,
    unable_cap: u32,
    stable_for: Duration,
    poll_interval: Duration,
    cooldown_secs: (f64, f64),
    cancel: CancellationToken,
}

impl ReputationOrchestrator {
    #[must_use]
    pub fn new(config: &ReputationConfig, cancel: CancellationToken) -> Self {
        Self {
            policy: RetryPolicy::reputation(config),
            wait_timeout: Duration::from_secs(config.wait_secs),
            after_click_delay: Duration::from_millis(config.after_click_delay_ms),
            unable_cap: config.unable_cap.max(1),
            stable_for: Duration::from_millis(config.stable_for_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            cooldown_secs: config.cooldown_secs,
            cancel,
        }
    }

    /// Score `target`, retrying per the configured policy.
    ///
    /// Only fatal errors (the browser cannot launch) are returned as `Err`.
    pub async fn score<G>(&self, gauge: &mut G, target: &ProbeTarget) -> Result<ReputationOutcome>
    where
        G: ReputationGauge + ?Sized,
    {
        let mut attempt: u32 = 1;
        let mut unable_hits: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(ReputationOutcome::Cancelled);
            }
            debug!("scoring {} (attempt {}/{})", target, attempt, self.policy.max_attempts());

            match self.attempt(gauge, target).await {
                Ok(Settled::Value(score)) if score.is_computed() => {
                    info!("{} scored {}", target, score);
                    return Ok(ReputationOutcome::Scored(score));
                }
                Ok(Settled::Value(_)) => {
                    if attempt >= self.policy.max_attempts() {
                        warn!("{} never got past a zero score", target);
                        return Ok(ReputationOutcome::Exhausted);
                    }
                    debug!("{} reads zero, score not computed yet", target);
                    if self.cool_down(gauge).await.is_err() {
                        return Ok(ReputationOutcome::Cancelled);
                    }
                    attempt += 1;
                }
                Ok(Settled::Unable) => {
                    unable_hits += 1;
                    if unable_hits >= self.unable_cap {
                        warn!("{} is unscoreable ({} refusals)", target, unable_hits);
                        return Ok(ReputationOutcome::Unscoreable);
                    }
                    debug!("{} refused ({}/{})", target, unable_hits, self.unable_cap);
                    if self.cool_down(gauge).await.is_err() {
                        return Ok(ReputationOutcome::Cancelled);
                    }
                }
                Err(ScanError::Cancelled(_)) => return Ok(ReputationOutcome::Cancelled),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => match self.policy.decide(attempt) {
                    RetryDecision::Retry {
                        backoff,
                        recreate_session,
                    } => {
                        let delay = backoff + self.policy.jitter();
                        warn!(
                            "scoring {} failed on attempt {}: {}; retrying in {:?}",
                            target, attempt, e, delay
                        );
                        if recreate_session {
                            if let Err(e) = gauge.recreate().await {
                                warn!("failed to recreate scoring session: {}", e);
                            }
                        }
                        if sleep_or_cancel(delay, &self.cancel).await.is_err() {
                            return Ok(ReputationOutcome::Cancelled);
                        }
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => {
                        warn!("scoring {} failed after {} attempts: {}", target, attempt, e);
                        return Ok(ReputationOutcome::Exhausted);
                    }
                },
            }
        }
    }

    async fn attempt<G>(&self, gauge: &mut G, target: &ProbeTarget) -> Result<Settled>
    where
        G: ReputationGauge + ?Sized,
    {
        gauge.submit(target).await?;
        sleep_or_cancel(self.after_click_delay, &self.cancel).await?;
        self.wait_for_stable(gauge).await
    }

    /// Poll until the meter holds one value for `stable_for`, the page
    /// refuses, or `wait_timeout` passes. Read errors count as "nothing yet".
    async fn wait_for_stable<G>(&self, gauge: &mut G) -> Result<Settled>
    where
        G: ReputationGauge + ?Sized,
    {
        let deadline = Instant::now() + self.wait_timeout;
        let mut held: Option<(Score, Instant)> = None;

        loop {
            let reading = gauge.read().await.unwrap_or_else(|e| {
                debug!("meter read failed: {}", e);
                GaugeReading::Pending
            });
            let now = Instant::now();

            match reading {
                GaugeReading::Unable => return Ok(Settled::Unable),
                GaugeReading::Value(score) => match held {
                    Some((value, since)) if value == score => {
                        if now.duration_since(since) >= self.stable_for {
                            return Ok(Settled::Value(score));
                        }
                    }
                    _ => held = Some((score, now)),
                },
                GaugeReading::Pending => held = None,
            }

            if now >= deadline {
                return Err(ScanError::Timeout(format!(
                    "score did not settle within {:?}",
                    self.wait_timeout
                )));
            }
            sleep_or_cancel(self.poll_interval, &self.cancel).await?;
        }
    }

    async fn cool_down<G>(&self, gauge: &mut G) -> std::result::Result<(), Cancelled>
    where
        G: ReputationGauge + ?Sized,
    {
        sleep_or_cancel(jitter(self.cooldown_secs), &self.cancel).await?;
        if let Err(e) = gauge.refresh().await {
            debug!("refresh before resubmit failed: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_score() {
        let score = Score::new(55).expect("score");
        assert_eq!(ReputationOutcome::Scored(score).score(), Some(score));
        assert_eq!(ReputationOutcome::Unscoreable.score(), None);
        assert_eq!(ReputationOutcome::Exhausted.score(), None);
        assert_eq!(ReputationOutcome::Cancelled.score(), None);
    }
}
