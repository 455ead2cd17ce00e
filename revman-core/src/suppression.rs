//! Suppression and feedback learning (C8, §4.6).
//!
//! Three independently persisted pieces of state, all stored through
//! [`CacheStore`] under their own namespace:
//! - Suppression patterns: "don't show me this again" rules created from a
//!   dismissed finding, scoped to one PR or the whole repo.
//! - Per-category feedback counts: how often a human accepted vs dismissed
//!   findings in a category, which raises or lowers that category's quiet-mode
//!   confidence threshold.
//! - Per-provider feedback counts: same idea, feeding a reliability weight
//!   `ProviderSelectionStrategy::Reliability` can read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::errors::RevResult;
use crate::models::{Finding, SuppressionPattern, SuppressionScope};

const SUPPRESSION_NAMESPACE: &str = "suppressions";
const CATEGORY_FEEDBACK_NAMESPACE: &str = "feedback_category";
const PROVIDER_FEEDBACK_NAMESPACE: &str = "feedback_provider";

/// Minimum record count before a category/provider's learned rate overrides
/// the neutral default.
const MIN_RECORDS_FOR_LEARNING: u32 = 5;

/// Neutral quiet-mode threshold used below [`MIN_RECORDS_FOR_LEARNING`].
const NEUTRAL_THRESHOLD: f32 = 0.5;
const THRESHOLD_STEP: f32 = 0.1;
const THRESHOLD_FLOOR: f32 = 0.3;
const THRESHOLD_CEILING: f32 = 0.9;

/// Accumulated accept/dismiss counts for one category or provider, plus the
/// stepwise-adjusted quiet-mode threshold (only meaningful for category
/// feedback; carried on provider stats too but unread by [`weight_from_stats`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub positive: u32,
    pub total: u32,
    pub threshold: f32,
}

impl Default for FeedbackStats {
    fn default() -> Self {
        Self {
            positive: 0,
            total: 0,
            threshold: NEUTRAL_THRESHOLD,
        }
    }
}

impl FeedbackStats {
    fn positive_rate(self) -> f32 {
        if self.total == 0 {
            0.5
        } else {
            self.positive as f32 / self.total as f32
        }
    }
}

/// One ±0.1 step of the persisted threshold (§4.6): a high accept rate
/// (`> 0.8`) nudges the bar down toward `0.3`, a high dismiss rate
/// (accept rate `< 0.5`) nudges it up toward `0.9`, otherwise it is left
/// unchanged.
fn step_threshold(current: f32, positive_rate: f32) -> f32 {
    if positive_rate > 0.8 {
        (current - THRESHOLD_STEP).max(THRESHOLD_FLOOR)
    } else if positive_rate < 0.5 {
        (current + THRESHOLD_STEP).min(THRESHOLD_CEILING)
    } else {
        current
    }
}

/// Persists and queries suppression patterns for one repository.
pub struct SuppressionTracker {
    cache: CacheStore,
}

impl SuppressionTracker {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    fn ttl_for(scope: SuppressionScope) -> Duration {
        match scope {
            SuppressionScope::Pr => Duration::days(SuppressionPattern::PR_TTL_DAYS),
            SuppressionScope::Repo => Duration::days(SuppressionPattern::REPO_TTL_DAYS),
        }
    }

    /// Adds a new suppression pattern for `repo_key`, stamping its
    /// created/expires timestamps from `now`.
    pub async fn add(
        &self,
        repo_key: &str,
        mut pattern: SuppressionPattern,
        now: DateTime<Utc>,
    ) -> RevResult<()> {
        pattern.created_at = now;
        pattern.expires_at = now + Self::ttl_for(pattern.scope);

        let mut patterns = self.load_all(repo_key).await?;
        patterns.push(pattern);
        self.cache.put(SUPPRESSION_NAMESPACE, repo_key, &patterns).await?;
        Ok(())
    }

    /// All patterns stored for `repo_key`, expired or not.
    async fn load_all(&self, repo_key: &str) -> RevResult<Vec<SuppressionPattern>> {
        Ok(self
            .cache
            .get(SUPPRESSION_NAMESPACE, repo_key, Duration::days(3650))
            .await?
            .unwrap_or_default())
    }

    /// Patterns still active as of `now` (unexpired). Also opportunistically
    /// persists the pruned list back so expired entries don't accumulate.
    pub async fn load_active(&self, repo_key: &str, now: DateTime<Utc>) -> RevResult<Vec<SuppressionPattern>> {
        let all = self.load_all(repo_key).await?;
        let (active, expired): (Vec<_>, Vec<_>) = all.into_iter().partition(|p| now < p.expires_at);
        if !expired.is_empty() {
            self.cache.put(SUPPRESSION_NAMESPACE, repo_key, &active).await?;
        }
        Ok(active)
    }

    /// Whether `finding` should be suppressed for `pr_number`, given the
    /// active patterns already loaded for this repo.
    pub fn is_suppressed(
        patterns: &[SuppressionPattern],
        now: DateTime<Utc>,
        finding: &Finding,
        pr_number: u64,
    ) -> bool {
        let category = finding.category.as_deref().unwrap_or("");
        patterns
            .iter()
            .any(|p| p.matches(now, category, &finding.path, finding.line, pr_number))
    }
}

/// Persists category/provider accept-dismiss feedback and derives the
/// quiet-mode confidence threshold and provider reliability weight from it.
pub struct FeedbackTracker {
    cache: CacheStore,
}

impl FeedbackTracker {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    async fn load(&self, namespace: &'static str, key: &str) -> RevResult<FeedbackStats> {
        Ok(self
            .cache
            .get(namespace, key, Duration::days(3650))
            .await?
            .unwrap_or_default())
    }

    async fn record(&self, namespace: &'static str, key: &str, positive: bool) -> RevResult<FeedbackStats> {
        let mut stats = self.load(namespace, key).await?;
        stats.total += 1;
        if positive {
            stats.positive += 1;
        }
        if stats.total >= MIN_RECORDS_FOR_LEARNING {
            stats.threshold = step_threshold(stats.threshold, stats.positive_rate());
        }
        self.cache.put(namespace, key, &stats).await?;
        Ok(stats)
    }

    pub async fn record_category_feedback(&self, category: &str, accepted: bool) -> RevResult<FeedbackStats> {
        self.record(CATEGORY_FEEDBACK_NAMESPACE, category, accepted).await
    }

    pub async fn record_provider_feedback(&self, provider: &str, accepted: bool) -> RevResult<FeedbackStats> {
        self.record(PROVIDER_FEEDBACK_NAMESPACE, provider, accepted).await
    }

    /// Quiet-mode confidence threshold for `category`. Below
    /// [`MIN_RECORDS_FOR_LEARNING`] records this is the neutral midpoint;
    /// above it, this returns the persisted threshold that `record` has
    /// been stepping ±0.1 toward 0.9 (high dismiss rate) or 0.3 (high
    /// accept rate) on each new feedback event.
    pub async fn category_threshold(&self, category: &str) -> RevResult<f32> {
        let stats = self.load(CATEGORY_FEEDBACK_NAMESPACE, category).await?;
        Ok(if stats.total < MIN_RECORDS_FOR_LEARNING {
            NEUTRAL_THRESHOLD
        } else {
            stats.threshold
        })
    }

    /// Reliability weight for `provider`, used by
    /// `ProviderSelectionStrategy::Reliability`. New/low-volume providers
    /// default to `1.0`.
    pub async fn provider_weight(&self, provider: &str) -> RevResult<f32> {
        let stats = self.load(PROVIDER_FEEDBACK_NAMESPACE, provider).await?;
        Ok(weight_from_stats(stats))
    }
}

fn weight_from_stats(stats: FeedbackStats) -> f32 {
    if stats.total < MIN_RECORDS_FOR_LEARNING {
        return 1.0;
    }
    0.3 + 0.7 * stats.positive_rate()
}

/// Quiet-mode filter (§4.6): drops findings whose confidence falls below
/// `max(category_threshold, configured_min_confidence)`.
pub fn passes_quiet_mode(finding: &Finding, category_threshold: f32, min_confidence: f32) -> bool {
    let floor = category_threshold.max(min_confidence);
    finding.confidence.unwrap_or(1.0) >= floor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn temp_cache(label: &str) -> CacheStore {
        let dir = std::env::temp_dir().join(format!("revman-suppression-test-{label}-{}", std::process::id()));
        CacheStore::new(dir)
    }

    fn pattern(category: &str, path: &str, line: u32, scope: SuppressionScope, pr_number: Option<u64>) -> SuppressionPattern {
        SuppressionPattern {
            category: category.to_string(),
            path: path.to_string(),
            line,
            scope,
            pr_number,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        }
    }

    fn finding(path: &str, line: u32, category: &str) -> Finding {
        Finding {
            path: path.to_string(),
            line,
            severity: crate::models::Severity::Minor,
            title: "x".to_string(),
            message: "y".to_string(),
            suggestion: None,
            provider: None,
            providers: BTreeSet::new(),
            confidence: Some(0.8),
            category: Some(category.to_string()),
        }
    }

    #[tokio::test]
    async fn repo_scoped_pattern_suppresses_across_prs() {
        let tracker = SuppressionTracker::new(temp_cache("repo-scope"));
        let now = Utc::now();
        tracker
            .add("owner/repo", pattern("style", "a.rs", 10, SuppressionScope::Repo, None), now)
            .await
            .unwrap();

        let active = tracker.load_active("owner/repo", now).await.unwrap();
        let f = finding("a.rs", 12, "style");
        assert!(SuppressionTracker::is_suppressed(&active, now, &f, 999));
    }

    #[tokio::test]
    async fn pr_scoped_pattern_does_not_suppress_other_prs() {
        let tracker = SuppressionTracker::new(temp_cache("pr-scope"));
        let now = Utc::now();
        tracker
            .add("owner/repo", pattern("style", "a.rs", 10, SuppressionScope::Pr, Some(1)), now)
            .await
            .unwrap();

        let active = tracker.load_active("owner/repo", now).await.unwrap();
        let f = finding("a.rs", 10, "style");
        assert!(SuppressionTracker::is_suppressed(&active, now, &f, 1));
        assert!(!SuppressionTracker::is_suppressed(&active, now, &f, 2));
    }

    #[tokio::test]
    async fn expired_pattern_is_pruned_and_no_longer_suppresses() {
        let tracker = SuppressionTracker::new(temp_cache("expiry"));
        let now = Utc::now();
        let past = now - Duration::days(100);
        tracker
            .add("owner/repo", pattern("style", "a.rs", 10, SuppressionScope::Repo, None), past)
            .await
            .unwrap();

        let active = tracker.load_active("owner/repo", now).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn high_dismiss_rate_raises_category_threshold() {
        let tracker = FeedbackTracker::new(temp_cache("threshold"));
        for _ in 0..6 {
            tracker.record_category_feedback("nitpick", false).await.unwrap();
        }
        let threshold = tracker.category_threshold("nitpick").await.unwrap();
        assert!(threshold > 0.5);
    }

    #[tokio::test]
    async fn low_volume_category_uses_neutral_threshold() {
        let tracker = FeedbackTracker::new(temp_cache("neutral"));
        tracker.record_category_feedback("security", true).await.unwrap();
        let threshold = tracker.category_threshold("security").await.unwrap();
        assert_eq!(threshold, 0.5);
    }

    #[test]
    fn quiet_mode_drops_low_confidence_finding() {
        let mut f = finding("a.rs", 1, "style");
        f.confidence = Some(0.4);
        assert!(!passes_quiet_mode(&f, 0.6, 0.3));
    }

    #[test]
    fn quiet_mode_keeps_finding_meeting_floor() {
        let mut f = finding("a.rs", 1, "style");
        f.confidence = Some(0.9);
        assert!(passes_quiet_mode(&f, 0.6, 0.3));
    }
}
