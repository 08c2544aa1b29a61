//! Debounced availability classifier.
//!
//! Signup forms validate the username asynchronously and the "taken" banner
//! flickers while they do. The classifier samples the banner on a fixed
//! interval and only trusts a state once it has held for a contiguous
//! stable window. Any sighting of the banner makes the run sticky-busy: once
//! seen, the run can no longer end `Free`.

use crate::error::Cancelled;
use crate::retry::sleep_or_cancel;
use mailprobe_core::{AvailabilityConfig, Verdict};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Source of the "identifier is taken" signal.
///
/// Returns `Some(text)` while the page shows the signal, `None` otherwise.
#[async_trait::async_trait]
pub trait SignalSampler: Send {
    async fn sample(&mut self) -> Option<String>;
}

#[async_trait::async_trait]
impl<F> SignalSampler for F
where
    F: FnMut() -> Option<String> + Send,
{
    async fn sample(&mut self) -> Option<String> {
        self()
    }
}

/// Timing parameters for one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierTiming {
    pub timeout: Duration,
    pub stable_window: Duration,
    pub poll_interval: Duration,
}

impl From<&AvailabilityConfig> for ClassifierTiming {
    fn from(config: &AvailabilityConfig) -> Self {
        Self {
            timeout: config.timeout(),
            stable_window: config.stable_window(),
            poll_interval: config.poll_interval(),
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    ok_since: Option<Instant>,
    busy_since: Option<Instant>,
    ever_busy: bool,
    last_signal: Option<String>,
}

impl RunState {
    fn observe(&mut self, signal: Option<String>, now: Instant, window: Duration) -> Option<Verdict> {
        match signal {
            Some(text) => {
                self.ever_busy = true;
                self.last_signal = Some(text);
                self.ok_since = None;
                let since = *self.busy_since.get_or_insert(now);
                if now.duration_since(since) >= window {
                    return Some(Verdict::Busy);
                }
            }
            None => {
                self.busy_since = None;
                let since = *self.ok_since.get_or_insert(now);
                if now.duration_since(since) >= window {
                    return Some(if self.ever_busy {
                        Verdict::Busy
                    } else {
                        Verdict::Free
                    });
                }
            }
        }
        None
    }

    fn on_timeout(&self) -> Verdict {
        if self.ever_busy {
            Verdict::Busy
        } else {
            Verdict::Unknown
        }
    }
}

/// Sample until a state holds for `stable_window`, or `timeout` elapses.
pub async fn classify<S>(
    sampler: &mut S,
    timing: &ClassifierTiming,
    cancel: &CancellationToken,
) -> Result<Verdict, Cancelled>
where
    S: SignalSampler + ?Sized,
{
    let started = Instant::now();
    let mut run = RunState::default();

    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let signal = sampler.sample().await;
        let now = Instant::now();
        trace!("classifier tick: {:?}", signal);

        if let Some(verdict) = run.observe(signal, now, timing.stable_window) {
            debug!(
                "classified {} after {:?} (last signal: {:?})",
                verdict,
                now.duration_since(started),
                run.last_signal
            );
            return Ok(verdict);
        }

        if now.duration_since(started) >= timing.timeout {
            let verdict = run.on_timeout();
            debug!(
                "classifier timed out, {} (last signal: {:?})",
                verdict, run.last_signal
            );
            return Ok(verdict);
        }

        sleep_or_cancel(timing.poll_interval, cancel).await?;
    }
}
