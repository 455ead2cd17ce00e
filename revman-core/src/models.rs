//! Provider-agnostic data model (§3).
//!
//! These types are the normalized shape every downstream stage (executor,
//! consensus, suppression, poster) operates on, independent of which
//! hosting platform or LLM provider produced them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File change status as reported by the hosting platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

/// One changed file in a PR/MR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    pub additions: u32,
    pub deletions: u32,
    pub changes: u32,
    pub patch: Option<String>,
    pub previous_path: Option<String>,
}

/// Identifies a review target on a hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrContext {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub author: String,
    pub draft: bool,
    pub labels: BTreeSet<String>,
    pub files: Vec<FileChange>,
    pub unified_diff: String,
    pub additions: u32,
    pub deletions: u32,
    pub base_sha: String,
    pub head_sha: String,
}

impl PrContext {
    /// Total number of changed files.
    pub fn changed_file_count(&self) -> usize {
        self.files.len()
    }

    /// Total changed lines (additions + deletions) across all files.
    pub fn changed_line_count(&self) -> u32 {
        self.additions + self.deletions
    }
}

/// Severity of a single finding. Rank order: critical > major > minor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// Numeric rank used by consensus ordering and severity-floor comparisons.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::Major => 2,
            Severity::Minor => 1,
        }
    }
}

/// Sentinel provider name used for non-LLM (static-analysis) sources.
pub const STATIC_PROVIDER: &str = "static";

/// One reviewer observation at a file-line location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub path: String,
    /// 1-based line number in the *new* file.
    pub line: u32,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub suggestion: Option<String>,
    /// Single originating provider, if attributed to exactly one (pre-merge).
    pub provider: Option<String>,
    /// All providers that independently surfaced this finding (post-merge).
    pub providers: BTreeSet<String>,
    pub confidence: Option<f32>,
    pub category: Option<String>,
}

impl Finding {
    /// Key used by Stage A dedup: `(file, line, title)`.
    pub fn dedup_key(&self) -> (String, u32, String) {
        (self.path.clone(), self.line, self.title.to_ascii_lowercase())
    }
}

/// Outcome of one provider invocation (§4.1/§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: String,
    pub status: ProviderStatus,
    pub review: Option<ReviewResult>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Success,
    Error,
    Timeout,
    RateLimited,
    /// Never dispatched: skipped before the request was sent (budget
    /// exhausted). Kept distinct from `Error` so `Metrics::provider_calls`
    /// can count only calls that actually reached a provider.
    Skipped,
}

/// Token usage reported by a provider, when available.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The parsed content of one successful provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub content: String,
    pub findings: Vec<Finding>,
    pub usage: Option<TokenUsage>,
    pub duration_ms: u64,
    pub ai_likelihood: Option<f32>,
}

/// Review depth selector (§4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Light,
    Standard,
    Thorough,
}

impl Intensity {
    pub fn rank(self) -> u8 {
        match self {
            Intensity::Thorough => 3,
            Intensity::Standard => 2,
            Intensity::Light => 1,
        }
    }

    /// Default provider count for this intensity.
    pub fn default_provider_count(self) -> usize {
        match self {
            Intensity::Thorough => 8,
            Intensity::Standard => 5,
            Intensity::Light => 3,
        }
    }

    /// Default per-provider timeout in milliseconds.
    pub fn default_timeout_ms(self) -> u64 {
        match self {
            Intensity::Thorough => 180_000,
            Intensity::Standard => 120_000,
            Intensity::Light => 60_000,
        }
    }

    /// Severity floor for consensus at this intensity.
    pub fn severity_floor(self) -> Severity {
        match self {
            Intensity::Thorough | Intensity::Standard => Severity::Minor,
            Intensity::Light => Severity::Major,
        }
    }

    /// Prompt-depth keyword injected into the prompt body.
    pub fn prompt_depth_keyword(self) -> &'static str {
        match self {
            Intensity::Thorough => "COMPREHENSIVE review — cover every edge case",
            Intensity::Standard => "",
            Intensity::Light => "QUICK scan — report only CRITICAL issues",
        }
    }
}

/// Side of a diff an inline comment anchors to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffSide {
    Left,
    Right,
}

/// A single inline file-line comment ready to post (§3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineComment {
    pub path: String,
    pub line: u32,
    pub side: DiffSide,
    pub body: String,
}

/// Per-run cost/usage summary (C2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub provider_calls: u32,
    pub providers_timed_out: u32,
    pub providers_rate_limited: u32,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub estimated_cost_usd: f64,
    pub cache_hit: bool,
}

/// Final synthesized output of a run (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub summary: String,
    pub findings: Vec<Finding>,
    pub inline_comments: Vec<InlineComment>,
    pub action_items: Vec<String>,
    pub metrics: Metrics,
    pub provider_results: Vec<ProviderResult>,
}

/// Scope of a suppression pattern (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionScope {
    Pr,
    Repo,
}

/// A user-created rule silencing findings similar to a dismissed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionPattern {
    pub category: String,
    pub path: String,
    pub line: u32,
    pub scope: SuppressionScope,
    /// Required when `scope == Pr`.
    pub pr_number: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SuppressionPattern {
    /// TTL for PR-scoped patterns: 7 days.
    pub const PR_TTL_DAYS: i64 = 7;
    /// TTL for repo-scoped patterns: 30 days.
    pub const REPO_TTL_DAYS: i64 = 30;

    /// Whether this pattern matches a candidate finding (§4.6, Testable Property 7/8).
    pub fn matches(&self, now: DateTime<Utc>, category: &str, path: &str, line: u32, pr_number: u64) -> bool {
        if now >= self.expires_at {
            return false;
        }
        if self.category != category || self.path != path {
            return false;
        }
        if line.abs_diff(self.line) > 5 {
            return false;
        }
        match self.scope {
            SuppressionScope::Repo => true,
            SuppressionScope::Pr => self.pr_number == Some(pr_number),
        }
    }
}
