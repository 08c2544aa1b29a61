//! Append-only availability and reputation caches.
//!
//! Both caches are loaded wholesale at startup and mirrored in memory. Every
//! mutation is appended and fsynced before the mirror changes, so a crash
//! loses at most the record being written.

use crate::error::Result;
use crate::lines::{append_line, load_lines};
use mailprobe_core::{ProbeTarget, Score};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CacheState {
    checked: HashSet<ProbeTarget>,
    reputation: HashMap<ProbeTarget, Score>,
}

/// Durable record of resolved targets.
#[derive(Debug)]
pub struct CacheStore {
    availability_path: PathBuf,
    reputation_path: PathBuf,
    state: Mutex<CacheState>,
}

impl CacheStore {
    /// Load both cache files. Missing files start empty; malformed lines
    /// are skipped with a warning.
    pub async fn open(
        availability_path: impl Into<PathBuf>,
        reputation_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let availability_path = availability_path.into();
        let reputation_path = reputation_path.into();

        let mut state = CacheState::default();

        for line in load_lines(&availability_path).await? {
            match ProbeTarget::parse(&line) {
                Ok(target) => {
                    state.checked.insert(target);
                }
                Err(e) => warn!(
                    "skipping availability cache line {:?} in {}: {}",
                    line,
                    availability_path.display(),
                    e
                ),
            }
        }

        for line in load_lines(&reputation_path).await? {
            match parse_reputation_line(&line) {
                Some((target, score)) => {
                    // First record wins; there is no update path.
                    state.reputation.entry(target).or_insert(score);
                }
                None => debug!(
                    "skipping reputation cache line {:?} in {}",
                    line,
                    reputation_path.display()
                ),
            }
        }

        debug!(
            "cache loaded: {} checked, {} scored",
            state.checked.len(),
            state.reputation.len()
        );

        Ok(Self {
            availability_path,
            reputation_path,
            state: Mutex::new(state),
        })
    }

    /// Whether an availability verdict was already recorded for `target`.
    pub async fn seen(&self, target: &ProbeTarget) -> bool {
        self.state.lock().await.checked.contains(target)
    }

    /// Record that `target` has a final availability verdict.
    ///
    /// Returns `false` without writing if it was already recorded.
    pub async fn record_checked(&self, target: &ProbeTarget) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.checked.contains(target) {
            return Ok(false);
        }
        append_line(&self.availability_path, target.as_str()).await?;
        state.checked.insert(target.clone());
        Ok(true)
    }

    /// Cached reputation score for `target`, always > 0.
    pub async fn reputation(&self, target: &ProbeTarget) -> Option<Score> {
        self.state.lock().await.reputation.get(target).copied()
    }

    /// Record a reputation score.
    ///
    /// A zero score means "not yet computed" and is never persisted; the call
    /// returns `false` and leaves the target eligible for rescoring. An
    /// existing record is never overwritten.
    pub async fn record_reputation(&self, target: &ProbeTarget, score: Score) -> Result<bool> {
        if !score.is_computed() {
            warn!("refusing to cache zero reputation score for {}", target);
            return Ok(false);
        }
        let mut state = self.state.lock().await;
        if state.reputation.contains_key(target) {
            return Ok(false);
        }
        append_line(&self.reputation_path, &format!("{target}:{score}")).await?;
        state.reputation.insert(target.clone(), score);
        Ok(true)
    }

    /// Number of targets with a recorded availability verdict.
    pub async fn checked_count(&self) -> usize {
        self.state.lock().await.checked.len()
    }

    /// Number of cached reputation scores.
    pub async fn reputation_count(&self) -> usize {
        self.state.lock().await.reputation.len()
    }

    /// Availability cache file.
    #[must_use]
    pub fn availability_path(&self) -> &Path {
        &self.availability_path
    }

    /// Reputation cache file.
    #[must_use]
    pub fn reputation_path(&self) -> &Path {
        &self.reputation_path
    }
}

fn parse_reputation_line(line: &str) -> Option<(ProbeTarget, Score)> {
    let (address, value) = line.rsplit_once(':')?;
    let value: u8 = value.trim().parse().ok()?;
    let score = Score::new(value).ok().filter(|s| s.is_computed())?;
    let target = ProbeTarget::parse(address).ok()?;
    Some((target, score))
}
