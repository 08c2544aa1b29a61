//! Batch coordination for both run phases.
//!
//! Availability: the pending list is expanded into targets, ordered by
//! provider priority, cut into batches, and each batch is handed to one
//! worker per domain. The pending file is rewritten after every batch so an
//! interrupted run resumes where it stopped.
//!
//! Reputation: the addresses found free in this run are scored one at a
//! time, reusing cached scores where they exist.

use crate::error::{Result, ScanError};
use crate::gauge::ReputationGauge;
use crate::reputation::{ReputationOrchestrator, ReputationOutcome};
use crate::retry::{jitter, sleep_or_cancel};
use crate::worker::{DomainProbeWorker, WorkerReport};
use mailprobe_browser::SessionFactory;
use mailprobe_core::{AppConfig, ProbeTarget, ScoreBand};
use mailprobe_store::{CacheStore, CompletionTracker, PendingList, ReputationSinks, RunDirectory};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Availability phase counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Targets taken from the pending list after the limit
    pub queued: usize,
    /// Pending lines dropped at startup because the cache already covered them
    pub pruned_lines: usize,
    pub free: usize,
    pub busy: usize,
    /// Busy because every attempt failed
    pub forced_busy: usize,
    pub skipped_cached: usize,
    /// Domain runs aborted by a fatal browser error
    pub failed_domains: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn absorb(&mut self, report: &WorkerReport) {
        self.free += report.free;
        self.busy += report.busy;
        self.forced_busy += report.forced_busy;
        self.skipped_cached += report.skipped_cached;
        self.cancelled |= report.cancelled;
    }
}

/// Reputation phase counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReputationSummary {
    pub good: usize,
    pub medium: usize,
    pub bad: usize,
    /// Scores reused from the cache
    pub cached: usize,
    /// Unscoreable or exhausted
    pub failed: usize,
    /// Unexpected errors
    pub errors: usize,
    pub cancelled: bool,
}

impl ReputationSummary {
    fn count(&mut self, band: Option<ScoreBand>) {
        match band {
            Some(ScoreBand::Good) => self.good += 1,
            Some(ScoreBand::Medium) => self.medium += 1,
            Some(ScoreBand::Bad) => self.bad += 1,
            None => self.failed += 1,
        }
    }
}

/// Runs the availability and reputation phases.
pub struct BatchCoordinator<F: SessionFactory> {
    config: Arc<AppConfig>,
    factory: Arc<F>,
    cache: Arc<CacheStore>,
    cancel: CancellationToken,
}

impl<F: SessionFactory> BatchCoordinator<F> {
    pub fn new(
        config: Arc<AppConfig>,
        factory: Arc<F>,
        cache: Arc<CacheStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            factory,
            cache,
            cancel,
        }
    }

    /// Probe every pending target, batch by batch.
    pub async fn run_availability(
        &self,
        pending: &mut PendingList,
        run_dir: &RunDirectory,
    ) -> Result<RunSummary> {
        let domains = self.config.domain_priority();
        let tracker = Arc::new(CompletionTracker::new());
        let mut summary = RunSummary::default();

        for entry in pending.entries(&domains) {
            for target in &entry.targets {
                if self.cache.seen(target).await {
                    tracker.mark_done(target);
                }
            }
        }
        summary.pruned_lines = pending.remove_resolved(&tracker, &domains).await?;

        let queue: Vec<ProbeTarget> = pending
            .queue(&domains, self.config.general.limit)
            .into_iter()
            .filter(|t| !tracker.is_done(t))
            .collect();
        summary.queued = queue.len();

        if queue.is_empty() {
            info!("no pending targets to check");
            return Ok(summary);
        }

        let sinks = Arc::new(run_dir.availability_sinks().await?);
        let worker = DomainProbeWorker::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.cache),
            Arc::clone(&tracker),
            Arc::clone(&sinks),
            &self.config,
            self.cancel.clone(),
        );

        let batch_size = self.config.general.batch_size.max(1);
        let batch_count = queue.len().div_ceil(batch_size);
        info!(
            "checking {} targets in {} batches of up to {}",
            queue.len(),
            batch_count,
            batch_size
        );

        for (index, batch) in queue.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            info!("batch {}/{}: {} targets", index + 1, batch_count, batch.len());

            for domain in &domains {
                let targets: Vec<ProbeTarget> = batch
                    .iter()
                    .filter(|t| t.domain() == domain && !tracker.is_done(t))
                    .cloned()
                    .collect();
                if targets.is_empty() {
                    continue;
                }
                let Some(provider) = self.config.provider(domain) else {
                    continue;
                };

                match worker.run(provider, &targets).await {
                    Ok(report) => {
                        info!(
                            "{}: {} free, {} busy, {} cached",
                            domain, report.free, report.busy, report.skipped_cached
                        );
                        summary.absorb(&report);
                        if report.cancelled {
                            break;
                        }
                    }
                    Err(e @ ScanError::Store(_)) => return Err(e),
                    Err(e) => {
                        error!("{}: domain aborted for this batch: {}", domain, e);
                        summary.failed_domains += 1;
                    }
                }
            }

            pending.remove_resolved(&tracker, &domains).await?;
            if summary.cancelled {
                break;
            }
        }

        sinks.close().await?;
        if summary.cancelled {
            warn!("availability phase cancelled");
        }
        Ok(summary)
    }

    /// Score `targets`, routing each into its band file.
    ///
    /// The gauge is closed on every exit path.
    pub async fn run_reputation<G>(
        &self,
        gauge: &mut G,
        targets: &[ProbeTarget],
        run_dir: &RunDirectory,
    ) -> Result<ReputationSummary>
    where
        G: ReputationGauge + ?Sized,
    {
        let sinks = run_dir.reputation_sinks().await?;
        let mut summary = ReputationSummary::default();

        let result = self
            .score_all(gauge, targets, &sinks, &mut summary)
            .await;

        if let Err(e) = gauge.close().await {
            warn!("failed to close scoring session: {}", e);
        }
        sinks.close().await?;
        result.map(|()| summary)
    }

    async fn score_all<G>(
        &self,
        gauge: &mut G,
        targets: &[ProbeTarget],
        sinks: &ReputationSinks,
        summary: &mut ReputationSummary,
    ) -> Result<()>
    where
        G: ReputationGauge + ?Sized,
    {
        let settings = &self.config.reputation;
        let orchestrator = ReputationOrchestrator::new(settings, self.cancel.clone());
        info!("scoring {} addresses", targets.len());

        for target in targets {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            if let Some(score) = self.cache.reputation(target).await {
                info!("{} cached score {}", target, score);
                summary.cached += 1;
                summary.count(sinks.record_score(target, score).await?);
                continue;
            }

            match orchestrator.score(gauge, target).await {
                Ok(ReputationOutcome::Scored(score)) => {
                    self.cache.record_reputation(target, score).await?;
                    summary.count(sinks.record_score(target, score).await?);
                    if sleep_or_cancel(jitter(settings.pacing_secs), &self.cancel)
                        .await
                        .is_err()
                    {
                        summary.cancelled = true;
                        break;
                    }
                }
                Ok(ReputationOutcome::Unscoreable | ReputationOutcome::Exhausted) => {
                    sinks.record_failed(target).await?;
                    summary.failed += 1;
                }
                Ok(ReputationOutcome::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e @ ScanError::Store(_)) => return Err(e),
                Err(e) => {
                    error!("scoring {} failed: {}", target, e);
                    sinks.record_error(target, &e.to_string()).await?;
                    sinks.record_failed(target).await?;
                    summary.errors += 1;
                }
            }
        }
        Ok(())
    }
}
