//! Incremental review (C9, §4.7).
//!
//! A PR reviewed more than once (new commits pushed after an earlier review)
//! doesn't need every file re-sent to every provider: files whose content
//! hasn't changed since the last reviewed `head_sha` keep their previous
//! findings, and only the changed/new files go through the executor again.
//! Snapshots are persisted through the same [`CacheStore`] key-derivation
//! strategy as suppression/feedback state.

use std::collections::BTreeSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::errors::RevResult;
use crate::models::{FileChange, Finding, PrContext};

const NAMESPACE: &str = "incremental";

/// Persisted state from the most recent review of one PR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalSnapshot {
    pub head_sha: String,
    pub findings: Vec<Finding>,
    pub reviewed_paths: BTreeSet<String>,
}

pub struct IncrementalReviewer {
    cache: CacheStore,
    ttl_days: i64,
}

impl IncrementalReviewer {
    pub fn new(cache: CacheStore, ttl_days: i64) -> Self {
        Self { cache, ttl_days }
    }

    fn key(repo_key: &str, pr_number: u64) -> String {
        format!("{repo_key}:{pr_number}")
    }

    /// Loads the prior snapshot, if any and not past the configured TTL. A
    /// cache read failure (corrupt entry, I/O error) is treated the same as
    /// "no snapshot" — the caller falls back to a full review rather than
    /// failing the run.
    pub async fn load_snapshot(&self, repo_key: &str, pr_number: u64) -> Option<IncrementalSnapshot> {
        self.cache
            .get(NAMESPACE, &Self::key(repo_key, pr_number), Duration::days(self.ttl_days))
            .await
            .unwrap_or(None)
    }

    pub async fn save_snapshot(
        &self,
        repo_key: &str,
        pr_number: u64,
        snapshot: &IncrementalSnapshot,
    ) -> RevResult<()> {
        self.cache.put(NAMESPACE, &Self::key(repo_key, pr_number), snapshot).await
    }

    /// Whether this run should take the incremental path: enabled by config,
    /// a usable prior snapshot exists, and the head actually moved (a rerun
    /// on the same commit has nothing new to incrementalize).
    pub fn should_use_incremental(
        incremental_enabled: bool,
        snapshot: Option<&IncrementalSnapshot>,
        pr: &PrContext,
    ) -> bool {
        match snapshot {
            Some(s) => incremental_enabled && s.head_sha != pr.head_sha,
            None => false,
        }
    }

    /// Restricts the file set sent to providers to files not already
    /// reviewed in the prior snapshot (new files, renamed files, or files
    /// touched again since). Files whose path is unchanged from the prior
    /// snapshot are skipped; their prior findings carry forward in
    /// [`merge_findings`].
    pub fn files_to_review<'a>(snapshot: &IncrementalSnapshot, pr: &'a PrContext) -> Vec<&'a FileChange> {
        pr.files
            .iter()
            .filter(|f| !snapshot.reviewed_paths.contains(&f.path))
            .collect()
    }

    /// Combines findings retained from the prior snapshot (for files not
    /// re-reviewed this run) with `fresh` findings from the files that were.
    pub fn merge_findings(
        snapshot: &IncrementalSnapshot,
        reviewed_this_run: &BTreeSet<String>,
        fresh: Vec<Finding>,
    ) -> Vec<Finding> {
        let mut merged: Vec<Finding> = snapshot
            .findings
            .iter()
            .filter(|f| !reviewed_this_run.contains(&f.path))
            .cloned()
            .collect();
        merged.extend(fresh);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn temp_cache(label: &str) -> CacheStore {
        let dir = std::env::temp_dir().join(format!("revman-incremental-test-{label}-{}", std::process::id()));
        CacheStore::new(dir)
    }

    fn pr(head_sha: &str, files: Vec<&str>) -> PrContext {
        PrContext {
            number: 1,
            title: "t".to_string(),
            body: None,
            author: "a".to_string(),
            draft: false,
            labels: BTreeSet::new(),
            files: files
                .into_iter()
                .map(|p| FileChange {
                    path: p.to_string(),
                    status: crate::models::FileStatus::Modified,
                    additions: 1,
                    deletions: 0,
                    changes: 1,
                    patch: None,
                    previous_path: None,
                })
                .collect(),
            unified_diff: String::new(),
            additions: 1,
            deletions: 0,
            base_sha: "base".to_string(),
            head_sha: head_sha.to_string(),
        }
    }

    fn finding(path: &str) -> Finding {
        Finding {
            path: path.to_string(),
            line: 1,
            severity: crate::models::Severity::Minor,
            title: "t".to_string(),
            message: "m".to_string(),
            suggestion: None,
            provider: None,
            providers: BTreeSet::new(),
            confidence: Some(1.0),
            category: None,
        }
    }

    #[tokio::test]
    async fn no_snapshot_means_full_review() {
        let reviewer = IncrementalReviewer::new(temp_cache("none"), 14);
        let snapshot = reviewer.load_snapshot("owner/repo", 1).await;
        assert!(snapshot.is_none());
        assert!(!IncrementalReviewer::should_use_incremental(true, snapshot.as_ref(), &pr("h2", vec!["a.rs"])));
    }

    #[test]
    fn same_head_sha_skips_incremental_path_too() {
        let snapshot = IncrementalSnapshot {
            head_sha: "h1".to_string(),
            findings: vec![],
            reviewed_paths: BTreeSet::new(),
        };
        assert!(!IncrementalReviewer::should_use_incremental(true, Some(&snapshot), &pr("h1", vec!["a.rs"])));
    }

    #[test]
    fn only_unreviewed_files_are_sent_to_providers() {
        let mut reviewed_paths = BTreeSet::new();
        reviewed_paths.insert("a.rs".to_string());
        let snapshot = IncrementalSnapshot {
            head_sha: "h1".to_string(),
            findings: vec![finding("a.rs")],
            reviewed_paths,
        };
        let the_pr = pr("h2", vec!["a.rs", "b.rs"]);
        let to_review = IncrementalReviewer::files_to_review(&snapshot, &the_pr);
        assert_eq!(to_review.len(), 1);
        assert_eq!(to_review[0].path, "b.rs");
    }

    #[test]
    fn retained_findings_carry_forward_for_unreviewed_files() {
        let mut reviewed_paths = BTreeSet::new();
        reviewed_paths.insert("a.rs".to_string());
        let snapshot = IncrementalSnapshot {
            head_sha: "h1".to_string(),
            findings: vec![finding("a.rs")],
            reviewed_paths,
        };
        let mut reviewed_this_run = BTreeSet::new();
        reviewed_this_run.insert("b.rs".to_string());

        let merged = IncrementalReviewer::merge_findings(&snapshot, &reviewed_this_run, vec![finding("b.rs")]);
        let paths: BTreeSet<String> = merged.into_iter().map(|f| f.path).collect();
        assert!(paths.contains("a.rs"));
        assert!(paths.contains("b.rs"));
    }
}
