//! Per-domain availability probing.
//!
//! A worker owns at most one browser session at a time, parked on the
//! provider's signup page. For every candidate it types the local-part into
//! the username field, blurs it, and lets the classifier watch the error
//! elements. Broken page state is shed by quitting the session and starting
//! over on a fresh one.

use crate::classifier::{classify, ClassifierTiming};
use crate::credentials::generate_password;
use crate::error::{Cancelled, Result, ScanError};
use crate::retry::{sleep_or_cancel, AttemptOutcome, RetryDecision, RetryPolicy};
use crate::sampler::{BusyMatcher, PageSignalSampler};
use mailprobe_browser::{
    first_displayed, BrowserActions, BrowserError, ElementHandle, SessionFactory,
};
use mailprobe_core::{AppConfig, AvailabilityConfig, ProbeTarget, ProviderConfig, Verdict};
use mailprobe_store::{AvailabilitySinks, CacheStore, CompletionTracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const BLUR_JS: &str = "document.activeElement && document.activeElement.blur();";

/// Counts for one worker run over one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub domain: String,
    pub free: usize,
    pub busy: usize,
    /// Already in the availability cache
    pub skipped_cached: usize,
    /// Recorded busy because every attempt failed
    pub forced_busy: usize,
    pub cancelled: bool,
}

impl WorkerReport {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ..Self::default()
        }
    }
}

enum TargetResult {
    Verdict(Verdict),
    GaveUp,
    Cancelled,
}

type Attempt = AttemptOutcome<Verdict, ScanError>;

fn failed(e: impl Into<ScanError>) -> Attempt {
    let e = e.into();
    if e.is_fatal() {
        AttemptOutcome::Fatal(e)
    } else {
        AttemptOutcome::Retryable(e)
    }
}

/// Probes one provider's signup form.
pub struct DomainProbeWorker<F: SessionFactory> {
    factory: Arc<F>,
    cache: Arc<CacheStore>,
    tracker: Arc<CompletionTracker>,
    sinks: Arc<AvailabilitySinks>,
    settings: AvailabilityConfig,
    password_length: usize,
    matcher: BusyMatcher,
    policy: RetryPolicy,
    timing: ClassifierTiming,
    cancel: CancellationToken,
}

impl<F: SessionFactory> DomainProbeWorker<F> {
    pub fn new(
        factory: Arc<F>,
        cache: Arc<CacheStore>,
        tracker: Arc<CompletionTracker>,
        sinks: Arc<AvailabilitySinks>,
        config: &AppConfig,
        cancel: CancellationToken,
    ) -> Self {
        let settings = config.availability.clone();
        Self {
            factory,
            cache,
            tracker,
            sinks,
            matcher: BusyMatcher::from(&settings),
            policy: RetryPolicy::availability(&settings),
            timing: ClassifierTiming::from(&settings),
            password_length: config.general.password_length,
            settings,
            cancel,
        }
    }

    /// Probe `targets` on `provider`.
    ///
    /// Returns `Err` only for fatal failures (the browser cannot launch or a
    /// result cannot be persisted). Targets not yet recorded stay pending.
    pub async fn run(
        &self,
        provider: &ProviderConfig,
        targets: &[ProbeTarget],
    ) -> Result<WorkerReport> {
        let mut report = WorkerReport::new(&provider.domain);

        let mut remaining = Vec::with_capacity(targets.len());
        for target in targets {
            if self.cache.seen(target).await {
                self.tracker.mark_done(target);
                report.skipped_cached += 1;
            } else {
                remaining.push(target);
            }
        }

        if remaining.is_empty() {
            info!("{}: nothing to check", provider.domain);
            return Ok(report);
        }
        info!(
            "{}: checking {} candidates ({} cached)",
            provider.domain,
            remaining.len(),
            report.skipped_cached
        );

        let mut session = None;
        let result = self
            .probe_all(provider, &remaining, &mut session, &mut report)
            .await;
        discard(&mut session).await;

        result.map(|()| report)
    }

    async fn probe_all(
        &self,
        provider: &ProviderConfig,
        targets: &[&ProbeTarget],
        session: &mut Option<F::Session>,
        report: &mut WorkerReport,
    ) -> Result<()> {
        let pause = Duration::from_millis(self.settings.pause_between_ms);

        for target in targets {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            // Another worker may have recorded it since the run started.
            if self.cache.seen(target).await {
                self.tracker.mark_done(target);
                report.skipped_cached += 1;
                continue;
            }

            let verdict = match self.probe_with_retry(provider, target, session).await? {
                TargetResult::Verdict(verdict) => verdict,
                TargetResult::GaveUp => {
                    report.forced_busy += 1;
                    Verdict::Busy
                }
                TargetResult::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            };
            self.record(target, verdict, report).await?;

            if sleep_or_cancel(pause, &self.cancel).await.is_err() {
                report.cancelled = true;
                break;
            }
        }
        Ok(())
    }

    async fn probe_with_retry(
        &self,
        provider: &ProviderConfig,
        target: &ProbeTarget,
        session: &mut Option<F::Session>,
    ) -> Result<TargetResult> {
        let mut attempt: u32 = 1;
        loop {
            let outcome = match self.probe_once(provider, target, session).await {
                Ok(outcome) => outcome,
                Err(Cancelled) => return Ok(TargetResult::Cancelled),
            };
            let e = match outcome {
                AttemptOutcome::Success(verdict) => return Ok(TargetResult::Verdict(verdict)),
                AttemptOutcome::Fatal(e) => {
                    warn!("{}: aborting on {}: {}", provider.domain, target, e);
                    return Err(e);
                }
                AttemptOutcome::Retryable(e) => e,
            };

            match self.policy.decide(attempt) {
                RetryDecision::Retry {
                    backoff,
                    recreate_session,
                } => {
                    warn!(
                        "{}: attempt {} for {} failed: {}; retrying",
                        provider.domain, attempt, target, e
                    );
                    if recreate_session {
                        discard(session).await;
                    }
                    if sleep_or_cancel(backoff, &self.cancel).await.is_err() {
                        return Ok(TargetResult::Cancelled);
                    }
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    warn!(
                        "{}: giving up on {} after {} attempts: {}",
                        provider.domain, target, attempt, e
                    );
                    discard(session).await;
                    return Ok(TargetResult::GaveUp);
                }
            }
        }
    }

    /// One attempt: make sure a session sits on the signup page, enter the
    /// candidate, and classify what the page says about it.
    async fn probe_once(
        &self,
        provider: &ProviderConfig,
        target: &ProbeTarget,
        session: &mut Option<F::Session>,
    ) -> std::result::Result<Attempt, Cancelled> {
        if session.is_none() {
            debug!("{}: starting browser session", provider.domain);
            let fresh = match self.factory.create().await {
                Ok(fresh) => fresh,
                Err(e) => return Ok(failed(e)),
            };
            if let Err(e) = fresh.navigate(&provider.signup_url).await {
                if let Err(quit) = fresh.quit().await {
                    debug!("failed to quit session after navigation error: {}", quit);
                }
                return Ok(failed(e));
            }
            *session = Some(fresh);
        }
        let Some(page) = session.as_ref() else {
            return Ok(failed(BrowserError::SessionClosed));
        };

        let Some(input) = self.wait_for_input(page, provider).await? else {
            return Ok(failed(ScanError::InputNotFound {
                domain: provider.domain.clone(),
            }));
        };
        if let Err(e) = enter_candidate(page, &input, target).await {
            return Ok(failed(e));
        }

        sleep_or_cancel(Duration::from_millis(self.settings.settle_delay_ms), &self.cancel)
            .await?;

        let mut sampler = PageSignalSampler::new(page, &provider.error_selectors, &self.matcher);
        let verdict = classify(&mut sampler, &self.timing, &self.cancel).await?;
        Ok(AttemptOutcome::Success(verdict))
    }

    async fn wait_for_input(
        &self,
        page: &F::Session,
        provider: &ProviderConfig,
    ) -> std::result::Result<Option<<F::Session as BrowserActions>::Element>, Cancelled> {
        let deadline = Instant::now() + Duration::from_millis(self.settings.input_wait_ms);
        let poll = Duration::from_millis(self.settings.input_poll_ms);
        loop {
            if let Some(input) = first_displayed(page, &provider.input_selectors).await {
                return Ok(Some(input));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep_or_cancel(poll, &self.cancel).await?;
        }
    }

    async fn record(
        &self,
        target: &ProbeTarget,
        verdict: Verdict,
        report: &mut WorkerReport,
    ) -> Result<()> {
        if verdict.is_free() {
            let password = generate_password(self.password_length);
            self.sinks.record_free(target, &password).await?;
            report.free += 1;
            info!("{} is FREE", target);
        } else {
            if verdict == Verdict::Unknown {
                warn!("{} undecided before timeout, recording busy", target);
            }
            self.sinks.record_busy(target).await?;
            report.busy += 1;
            debug!("{} is {}", target, verdict);
        }
        self.cache.record_checked(target).await?;
        self.tracker.mark_done(target);
        Ok(())
    }
}

/// Type the local-part so the form validates it: replace the field's
/// value, nudge it with a space and Backspace, then blur it.
async fn enter_candidate<S: BrowserActions>(
    page: &S,
    input: &S::Element,
    target: &ProbeTarget,
) -> std::result::Result<(), BrowserError> {
    if let Err(e) = input.click().await {
        debug!("click on username input failed: {}", e);
    }
    input.clear().await?;
    input.send_keys(target.local_part()).await?;
    input.send_keys(" ").await?;
    input.press_key("Backspace").await?;
    page.execute_script(BLUR_JS).await
}

async fn discard<S: BrowserActions>(session: &mut Option<S>) {
    if let Some(session) = session.take() {
        if let Err(e) = session.quit().await {
            warn!("failed to quit browser session: {}", e);
        }
    }
}
