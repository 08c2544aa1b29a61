use mailprobe_core::{ProbeTarget, Score};
use mailprobe_store::{CacheStore, CompletionTracker, PendingList};
use tempfile::TempDir;

fn target(address: &str) -> ProbeTarget {
    ProbeTarget::parse(address).expect("valid address")
}

fn domains() -> Vec<String> {
    vec!["yahoo.com".to_string(), "aol.com".to_string()]
}

/// Simulates a run interrupted halfway, then a restart that must pick up
/// exactly the unfinished work.
#[tokio::test]
async fn test_interrupted_run_resumes_remaining_targets() {
    let tmp = TempDir::new().expect("create temp dir");
    let pending_path = tmp.path().join("mail.txt");
    let checked_path = tmp.path().join("checked_cache.txt");
    let reputation_path = tmp.path().join("reputation_cache.txt");
    tokio::fs::write(&pending_path, "a@yahoo.com\nb@yahoo.com\nc@aol.com\n")
        .await
        .expect("seed pending");

    // First run: only a@yahoo.com finishes before the interruption.
    {
        let cache = CacheStore::open(&checked_path, &reputation_path)
            .await
            .expect("open cache");
        let mut pending = PendingList::load(&pending_path).await.expect("load");
        let tracker = CompletionTracker::new();

        let queue = pending.queue(&domains(), 0);
        assert_eq!(queue.len(), 3);

        assert!(cache.record_checked(&queue[0]).await.expect("record"));
        tracker.mark_done(&queue[0]);
        pending
            .remove_resolved(&tracker, &domains())
            .await
            .expect("rewrite pending");
    }

    // Restart: state comes back from disk.
    let cache = CacheStore::open(&checked_path, &reputation_path)
        .await
        .expect("reopen cache");
    let pending = PendingList::load(&pending_path).await.expect("reload");

    assert!(cache.seen(&target("a@yahoo.com")).await);
    assert_eq!(pending.lines(), ["b@yahoo.com", "c@aol.com"]);

    let mut remaining = Vec::new();
    for t in pending.queue(&domains(), 0) {
        if !cache.seen(&t).await {
            remaining.push(String::from(t));
        }
    }
    assert_eq!(remaining, vec!["b@yahoo.com", "c@aol.com"]);

    // Recording the same target again is a no-op.
    assert!(!cache
        .record_checked(&target("a@yahoo.com"))
        .await
        .expect("record again"));
    assert_eq!(cache.checked_count().await, 1);
}

#[tokio::test]
async fn test_reputation_cache_survives_restart_without_zeros() {
    let tmp = TempDir::new().expect("create temp dir");
    let checked_path = tmp.path().join("checked_cache.txt");
    let reputation_path = tmp.path().join("reputation_cache.txt");
    let score = |v| Score::new(v).expect("score");

    {
        let cache = CacheStore::open(&checked_path, &reputation_path)
            .await
            .expect("open cache");
        assert!(cache
            .record_reputation(&target("a@yahoo.com"), score(77))
            .await
            .expect("record"));
        assert!(!cache
            .record_reputation(&target("z@yahoo.com"), score(0))
            .await
            .expect("record zero"));
        assert!(!cache
            .record_reputation(&target("a@yahoo.com"), score(12))
            .await
            .expect("record duplicate"));
    }

    let cache = CacheStore::open(&checked_path, &reputation_path)
        .await
        .expect("reopen cache");
    assert_eq!(cache.reputation(&target("a@yahoo.com")).await, Some(score(77)));
    assert_eq!(cache.reputation(&target("z@yahoo.com")).await, None);
    assert_eq!(cache.reputation_count().await, 1);
}
