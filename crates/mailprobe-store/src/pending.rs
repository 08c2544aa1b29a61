//! The operator's pending-work list and per-run completion tracking.
//!
//! Each raw line implies one or more [`ProbeTarget`]s: a full address implies
//! itself (when its domain is supported), a bare local-part implies one
//! target per supported domain. A line leaves the file only once every
//! target it implies is complete.

use crate::error::Result;
use crate::lines::{load_lines, rewrite_lines};
use mailprobe_core::ProbeTarget;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// One raw pending line and the targets it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Line exactly as stored in the pending file (trimmed)
    pub raw: String,
    /// Targets implied under the supported domains
    pub targets: Vec<ProbeTarget>,
}

impl PendingEntry {
    /// Expand a raw line against the supported domains.
    ///
    /// Returns `None` for lines that imply nothing to probe (unsupported
    /// domain, malformed address). Those lines are kept in the file as-is.
    #[must_use]
    pub fn expand(raw: &str, domains: &[String]) -> Option<Self> {
        let raw = raw.trim();
        let targets: Vec<ProbeTarget> = if raw.contains('@') {
            let target = ProbeTarget::parse(raw).ok()?;
            if !domains.iter().any(|d| d == target.domain()) {
                return None;
            }
            vec![target]
        } else {
            domains
                .iter()
                .filter_map(|d| ProbeTarget::new(raw, d).ok())
                .collect()
        };

        if targets.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            targets,
        })
    }
}

/// Pending-work list backed by a newline-delimited file.
#[derive(Debug)]
pub struct PendingList {
    path: PathBuf,
    lines: Vec<String>,
}

impl PendingList {
    /// Load the list. A missing file is an empty list.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lines = load_lines(&path).await?;
        debug!("loaded {} pending lines from {}", lines.len(), path.display());
        Ok(Self { path, lines })
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw lines still pending, in file order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Entries that imply at least one supported target, in file order.
    #[must_use]
    pub fn entries(&self, domains: &[String]) -> Vec<PendingEntry> {
        self.lines
            .iter()
            .filter_map(|l| PendingEntry::expand(l, domains))
            .collect()
    }

    /// Targets in processing order: grouped by `domains` priority, file
    /// order within a domain, truncated to `limit` when it is non-zero.
    #[must_use]
    pub fn queue(&self, domains: &[String], limit: usize) -> Vec<ProbeTarget> {
        let entries = self.entries(domains);
        let mut queue: Vec<ProbeTarget> = domains
            .iter()
            .flat_map(|domain| {
                entries
                    .iter()
                    .flat_map(|e| e.targets.iter())
                    .filter(move |t| t.domain() == domain)
                    .cloned()
            })
            .collect();
        if limit > 0 {
            queue.truncate(limit);
        }
        queue
    }

    /// Drop every line whose implied targets are all complete and rewrite
    /// the file if anything changed. Returns the number of lines removed.
    pub async fn remove_resolved(
        &mut self,
        tracker: &CompletionTracker,
        domains: &[String],
    ) -> Result<usize> {
        let before = self.lines.len();
        self.lines.retain(|line| match PendingEntry::expand(line, domains) {
            Some(entry) => !entry.targets.iter().all(|t| tracker.is_done(t)),
            None => true,
        });

        let removed = before - self.lines.len();
        if removed > 0 {
            rewrite_lines(&self.path, &self.lines).await?;
            info!(
                "updated {}: removed {}, {} remaining",
                self.path.display(),
                removed,
                self.lines.len()
            );
        }
        Ok(removed)
    }
}

/// Targets that reached a terminal outcome during this run (or were found
/// in the cache).
#[derive(Debug, Default)]
pub struct CompletionTracker {
    done: Mutex<HashSet<ProbeTarget>>,
}

impl CompletionTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `target` complete for its domain.
    pub fn mark_done(&self, target: &ProbeTarget) {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target.clone());
    }

    /// Whether `target` is complete.
    #[must_use]
    pub fn is_done(&self, target: &ProbeTarget) -> bool {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(target)
    }

    /// Number of completed targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.done.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has completed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn domains() -> Vec<String> {
        vec!["yahoo.com".to_string(), "aol.com".to_string()]
    }

    fn target(address: &str) -> ProbeTarget {
        ProbeTarget::parse(address).expect("valid address")
    }

    #[test]
    fn test_expand_full_address() {
        let entry = PendingEntry::expand(" Bob@AOL.com ", &domains()).expect("supported");
        assert_eq!(entry.raw, "Bob@AOL.com");
        assert_eq!(entry.targets, vec![target("bob@aol.com")]);
    }

    #[test]
    fn test_expand_bare_local_part_covers_every_domain() {
        let entry = PendingEntry::expand("carol", &domains()).expect("bare login");
        assert_eq!(
            entry.targets,
            vec![target("carol@yahoo.com"), target("carol@aol.com")]
        );
    }

    #[test]
    fn test_expand_ignores_unsupported() {
        assert!(PendingEntry::expand("x@gmail.com", &domains()).is_none());
        assert!(PendingEntry::expand("@yahoo.com", &domains()).is_none());
    }

    #[tokio::test]
    async fn test_queue_orders_by_domain_priority() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("mail.txt");
        tokio::fs::write(&path, "a@aol.com\nb@yahoo.com\nc@gmail.com\nd@aol.com\ne@yahoo.com\n")
            .await
            .expect("seed pending");

        let list = PendingList::load(&path).await.expect("load");
        let queue: Vec<String> = list
            .queue(&domains(), 0)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            queue,
            vec!["b@yahoo.com", "e@yahoo.com", "a@aol.com", "d@aol.com"]
        );

        let limited = list.queue(&domains(), 3);
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[2].as_str(), "a@aol.com");
    }

    #[tokio::test]
    async fn test_remove_resolved_keeps_partial_and_unsupported() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("mail.txt");
        tokio::fs::write(&path, "a@yahoo.com\nbare\nx@gmail.com\nb@aol.com\n")
            .await
            .expect("seed pending");

        let mut list = PendingList::load(&path).await.expect("load");
        let tracker = CompletionTracker::new();
        tracker.mark_done(&target("a@yahoo.com"));
        tracker.mark_done(&target("bare@yahoo.com"));

        let removed = list
            .remove_resolved(&tracker, &domains())
            .await
            .expect("remove");
        assert_eq!(removed, 1);
        assert_eq!(list.lines(), ["bare", "x@gmail.com", "b@aol.com"]);

        tracker.mark_done(&target("bare@aol.com"));
        list.remove_resolved(&tracker, &domains())
            .await
            .expect("remove");

        let reloaded = PendingList::load(&path).await.expect("reload");
        assert_eq!(reloaded.lines(), ["x@gmail.com", "b@aol.com"]);
    }

    #[tokio::test]
    async fn test_remove_resolved_without_changes_does_not_write() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("mail.txt");

        let mut list = PendingList::load(&path).await.expect("load missing");
        let removed = list
            .remove_resolved(&CompletionTracker::new(), &domains())
            .await
            .expect("remove");
        assert_eq!(removed, 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_completion_tracker() {
        let tracker = CompletionTracker::new();
        assert!(tracker.is_empty());
        tracker.mark_done(&target("a@yahoo.com"));
        tracker.mark_done(&target("a@yahoo.com"));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.is_done(&target("A@yahoo.com")));
        assert!(!tracker.is_done(&target("a@aol.com")));
    }
}
