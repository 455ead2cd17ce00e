//! Orchestrator (C11, §4.9): the end-to-end 12-stage pipeline for one
//! (platform, repo, PR number) run.
//!
//! Grounded on the teacher's `lib.rs::run_review` idiom: one public async
//! entry point, `Instant`-timed stages, `debug!`/`info!` logging at every
//! step, no hidden global state beyond the injected rate limiter and cost
//! tracker.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::{ProviderSelectionStrategy, ReviewConfig};
use crate::consensus::{consensus, dedup, select_provider_subset};
use crate::cost_tracker::CostTracker;
use crate::diff::{parse_hunks, DiffHunk};
use crate::errors::RevResult;
use crate::executor::{run_providers, ProviderTask};
use crate::incremental::{IncrementalReviewer, IncrementalSnapshot};
use crate::models::{
    Finding, InlineComment, Intensity, Metrics, PrContext, ProviderStatus, Review, Severity,
};
use crate::path_matcher::PathMatcher;
use crate::platform::PlatformClient;
use crate::poster::Poster;
use crate::provider_client::{ProviderClient, ProviderConfig, ProviderKind};
use crate::rate_limiter::RateLimiter;
use crate::static_analysis::{run_static_analysis, NoopAnalyzer, StaticAnalyzer};
use crate::suppression::{FeedbackTracker, SuppressionTracker};

const REVIEW_CACHE_NAMESPACE: &str = "review";

/// Everything the orchestrator needs beyond `ReviewConfig` to run one PR.
pub struct OrchestratorContext {
    pub platform: PlatformClient,
    pub rate_limiter: Arc<RateLimiter>,
    pub cost_tracker: Arc<CostTracker>,
    pub cache: CacheStore,
    pub static_analyzer: Box<dyn StaticAnalyzer + Send + Sync>,
}

impl OrchestratorContext {
    pub fn new(platform: PlatformClient, config: &ReviewConfig) -> Self {
        Self {
            platform,
            rate_limiter: Arc::new(RateLimiter::new()),
            cost_tracker: Arc::new(CostTracker::new(config.budget_max_usd)),
            cache: CacheStore::new(config.cache_dir.clone()),
            static_analyzer: Box::new(NoopAnalyzer),
        }
    }
}

/// A configured-provider description the orchestrator turns into
/// [`ProviderClient`]s for this run.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Glob patterns matching changes that never warrant a review (lockfiles,
/// generated docs, build artifacts). Stage 2's trivial-change filter.
const TRIVIAL_PATTERNS: &[&str] = &[
    "Cargo.lock", "package-lock.json", "yarn.lock", "pnpm-lock.yaml", "go.sum",
    "*.md", "*.lock", "dist/*", "build/*", "target/*",
];

/// Runs the full pipeline for one PR. Returns `Ok(None)` when a stage
/// short-circuits the run (trivial-change filter, size gates, skip rules)
/// rather than producing a [`Review`].
pub async fn run(
    ctx: &OrchestratorContext,
    config: &ReviewConfig,
    endpoints: &[ProviderEndpoint],
    repo: &str,
    pr_number: u64,
) -> RevResult<Option<Review>> {
    let run_deadline = Duration::from_secs(config.run_timeout_seconds);
    match tokio::time::timeout(run_deadline, run_inner(ctx, config, endpoints, repo, pr_number)).await {
        Ok(result) => result,
        Err(_elapsed) => {
            warn!(repo, pr_number, "orchestrator run exceeded runTimeoutSeconds; surfacing partial result");
            Ok(None)
        }
    }
}

async fn run_inner(
    ctx: &OrchestratorContext,
    config: &ReviewConfig,
    endpoints: &[ProviderEndpoint],
    repo: &str,
    pr_number: u64,
) -> RevResult<Option<Review>> {
    let t0 = Instant::now();

    // Stage 1: load PR context.
    debug!(repo, pr_number, "stage1: loading PR context");
    let pr = ctx.platform.load_pr(repo, pr_number).await?;
    debug!(repo, pr_number, files = pr.changed_file_count(), "stage1: loaded ({} ms)", t0.elapsed().as_millis());

    if skip_for_gates(config, &pr) {
        info!(repo, pr_number, "skipping: pre-run gate (draft/bot/label/size)");
        return Ok(None);
    }

    // Stage 2: trivial-change filter.
    if is_trivial_change(&pr) {
        info!(repo, pr_number, "stage2: trivial-change filter matched, skipping review");
        return Ok(Some(trivial_review()));
    }

    // Stage 3: path matcher → intensity.
    let matcher = PathMatcher::new(&config.path_intensity_patterns, config.path_default_intensity);
    let intensity = if config.path_based_intensity {
        matcher.intensity_for_paths(pr.files.iter().map(|f| f.path.as_str()))
    } else {
        config.path_default_intensity
    };
    debug!(repo, pr_number, ?intensity, "stage3: intensity selected");

    // Stage 4: incremental decision.
    let incremental = IncrementalReviewer::new(ctx.cache.clone(), config.incremental_cache_ttl_days);
    let snapshot = incremental.load_snapshot(repo, pr_number).await;
    let use_incremental = IncrementalReviewer::should_use_incremental(config.incremental_enabled, snapshot.as_ref(), &pr);
    let files_to_review: Vec<String> = if use_incremental {
        let snap = snapshot.as_ref().expect("snapshot present when use_incremental is true");
        let restricted = IncrementalReviewer::files_to_review(snap, &pr);
        debug!(repo, pr_number, restricted = restricted.len(), "stage4: incremental review restricting file set");
        restricted.into_iter().map(|f| f.path.clone()).collect()
    } else {
        pr.files.iter().map(|f| f.path.clone()).collect()
    };

    // Stage 5: cache lookup.
    let feedback = FeedbackTracker::new(ctx.cache.clone());
    let providers_for_run = resolve_provider_set(config, endpoints, pr_number, intensity, &feedback).await;
    let cache_key = format!(
        "{repo}:{}:{}:{:?}:{}",
        pr.number,
        pr.head_sha,
        intensity,
        providers_for_run.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(",")
    );
    if config.enable_caching {
        if let Ok(Some(mut cached)) = ctx.cache.get::<Review>(REVIEW_CACHE_NAMESPACE, &cache_key, chrono::Duration::days(1)).await {
            cached.metrics.cache_hit = true;
            info!(repo, pr_number, "stage5: cache hit, short-circuiting to poster");
            publish(ctx, config, repo, pr_number, &pr, &cached).await?;
            return Ok(Some(cached));
        }
    }

    // Stage 6: static-analysis findings.
    let static_findings = if config.enable_ast_analysis || config.enable_security || config.enable_test_hints {
        run_static_analysis(ctx.static_analyzer.as_ref(), &pr)
    } else {
        Vec::new()
    };
    debug!(repo, pr_number, count = static_findings.len(), "stage6: static findings collected");

    // Stage 7/8: build prompts and fan out to providers.
    let prompt_files: BTreeSet<&str> = files_to_review.iter().map(|s| s.as_str()).collect();
    let system_prompt = build_system_prompt(intensity);
    let user_prompt = build_user_prompt(&pr, &prompt_files);

    let tasks: Vec<ProviderTask> = providers_for_run
        .iter()
        .filter_map(|ep| {
            let client = ProviderClient::from_config(ProviderConfig {
                name: ep.name.clone(),
                kind: ep.kind,
                model: ep.model.clone(),
                endpoint: ep.endpoint.clone(),
                api_key: ep.api_key.clone(),
                timeout: Duration::from_millis(intensity.default_timeout_ms()),
            })
            .ok()?;
            Some(ProviderTask {
                client: Arc::new(client),
                system_prompt: system_prompt.clone(),
                user_prompt: user_prompt.clone(),
                timeout: Duration::from_millis(intensity.default_timeout_ms()),
            })
        })
        .collect();

    debug!(repo, pr_number, count = tasks.len(), "stage8: fanning out to providers");
    let results = run_providers(tasks, config.provider_max_parallel, config.provider_retries, ctx.rate_limiter.clone(), ctx.cost_tracker.clone()).await;

    let mut metrics = Metrics::default();
    let mut llm_findings = Vec::new();
    for r in &results {
        if r.status != ProviderStatus::Skipped {
            metrics.provider_calls += 1;
        }
        match r.status {
            ProviderStatus::Timeout => metrics.providers_timed_out += 1,
            ProviderStatus::RateLimited => metrics.providers_rate_limited += 1,
            _ => {}
        }
        if let Some(review) = &r.review {
            if let Some(usage) = review.usage {
                metrics.total_prompt_tokens += usage.prompt_tokens as u64;
                metrics.total_completion_tokens += usage.completion_tokens as u64;
            }
            llm_findings.extend(parse_findings(&r.provider, &review.content));
        }
    }
    metrics.estimated_cost_usd = ctx.cost_tracker.spent_usd();

    // Stage 9: merge, dedup, consensus, suppression, quiet-mode.
    let mut all_findings = static_findings;
    all_findings.extend(llm_findings);
    if use_incremental {
        let snap = snapshot.as_ref().expect("snapshot present when use_incremental is true");
        let reviewed_this_run: BTreeSet<String> = files_to_review.iter().cloned().collect();
        all_findings = IncrementalReviewer::merge_findings(snap, &reviewed_this_run, all_findings);
    }
    let deduped = dedup(all_findings);

    let floor_rank = config.inline_min_severity.rank().max(intensity.severity_floor().rank());
    let mut merged = consensus(deduped, floor_rank, config.inline_min_agreement);

    let suppression = SuppressionTracker::new(ctx.cache.clone());
    let active_patterns = suppression.load_active(repo, Utc::now()).await.unwrap_or_default();
    merged.retain(|f| !SuppressionTracker::is_suppressed(&active_patterns, Utc::now(), f, pr_number));

    if config.quiet_mode_enabled {
        let mut kept = Vec::with_capacity(merged.len());
        for f in merged {
            let category = f.category.clone().unwrap_or_default();
            let threshold = feedback.category_threshold(&category).await.unwrap_or(0.5);
            if crate::suppression::passes_quiet_mode(&f, threshold, config.quiet_min_confidence) {
                kept.push(f);
            }
        }
        merged = kept;
    }

    if merged.len() > config.inline_max_comments {
        merged.truncate(config.inline_max_comments);
    }

    // Stage 10: synthesize.
    let hunks_by_path = build_hunks_by_path(&pr);
    let inline_comments = build_inline_comments(&merged, &hunks_by_path);
    let review = crate::synthesis::synthesize(merged, inline_comments, results, metrics);

    // Stage 11: post.
    publish(ctx, config, repo, pr_number, &pr, &review).await?;

    // Stage 12: persist incremental + cache.
    if config.enable_caching {
        let _ = ctx.cache.put(REVIEW_CACHE_NAMESPACE, &cache_key, &review).await;
    }
    if config.incremental_enabled {
        let reviewed_paths: BTreeSet<String> = if use_incremental {
            let snap = snapshot.as_ref().expect("snapshot present when use_incremental is true");
            snap.reviewed_paths.iter().cloned().chain(files_to_review.iter().cloned()).collect()
        } else {
            pr.files.iter().map(|f| f.path.clone()).collect()
        };
        let new_snapshot = IncrementalSnapshot {
            head_sha: pr.head_sha.clone(),
            findings: review.findings.clone(),
            reviewed_paths,
        };
        let _ = incremental.save_snapshot(repo, pr_number, &new_snapshot).await;
    }

    info!(repo, pr_number, elapsed_ms = t0.elapsed().as_millis(), "orchestrator: run complete");
    Ok(Some(review))
}

async fn publish(
    ctx: &OrchestratorContext,
    config: &ReviewConfig,
    repo: &str,
    pr_number: u64,
    pr: &PrContext,
    review: &Review,
) -> RevResult<()> {
    let poster = Poster::new(ctx.platform.clone(), config.dry_run);
    poster.post_summary(repo, pr_number, &review.summary).await?;
    let hunks_by_path = build_hunks_by_path(pr);
    poster
        .post_inline_comments(repo, pr_number, &pr.head_sha, &review.findings, &hunks_by_path)
        .await?;
    Ok(())
}

fn skip_for_gates(config: &ReviewConfig, pr: &PrContext) -> bool {
    if config.skip_drafts && pr.draft {
        return true;
    }
    if config.skip_bots && pr.author.ends_with("[bot]") {
        return true;
    }
    if config.skip_labels.iter().any(|l| pr.labels.contains(l)) {
        return true;
    }
    if pr.changed_line_count() < config.min_changed_lines {
        return true;
    }
    if pr.changed_file_count() > config.max_changed_files {
        return true;
    }
    false
}

fn is_trivial_change(pr: &PrContext) -> bool {
    if pr.files.is_empty() {
        return false;
    }
    pr.files.iter().all(|f| {
        TRIVIAL_PATTERNS.iter().any(|pat| {
            globset::Glob::new(pat)
                .map(|g| g.compile_matcher().is_match(&f.path))
                .unwrap_or(false)
        })
    })
}

fn trivial_review() -> Review {
    Review {
        summary: "All changed files match a trivial pattern (lockfiles/docs/build artifacts); skipped review.".to_string(),
        findings: Vec::new(),
        inline_comments: Vec::new(),
        action_items: Vec::new(),
        metrics: Metrics::default(),
        provider_results: Vec::new(),
    }
}

/// Applies allowlist/blocklist, then narrows to `min(config.provider_limit
/// OR intensity.default_provider_count(), filtered.len())` providers.
/// `ProviderSelectionStrategy::Reliability` picks the subset by learned
/// reliability weight; every other strategy uses the deterministic rotation
/// from `consensus::select_provider_subset`.
async fn resolve_provider_set(
    config: &ReviewConfig,
    endpoints: &[ProviderEndpoint],
    pr_number: u64,
    intensity: Intensity,
    feedback: &FeedbackTracker,
) -> Vec<ProviderEndpoint> {
    let filtered: Vec<ProviderEndpoint> = endpoints
        .iter()
        .filter(|e| config.provider_allowlist.is_empty() || config.provider_allowlist.contains(&e.name))
        .filter(|e| !config.provider_blocklist.contains(&e.name))
        .cloned()
        .collect();

    let limit = if config.provider_limit > 0 {
        config.provider_limit
    } else {
        intensity.default_provider_count()
    }
    .min(filtered.len());

    if limit >= filtered.len() {
        return filtered;
    }

    if config.provider_selection_strategy == ProviderSelectionStrategy::Reliability {
        let mut weighted = Vec::with_capacity(filtered.len());
        for ep in filtered {
            let weight = feedback.provider_weight(&ep.name).await.unwrap_or(1.0);
            weighted.push((ep, weight));
        }
        weighted.sort_by(|(a, aw), (b, bw)| bw.partial_cmp(aw).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.name.cmp(&b.name)));
        return weighted.into_iter().take(limit).map(|(e, _)| e).collect();
    }

    let names: Vec<String> = filtered.iter().map(|e| e.name.clone()).collect();
    let subset = select_provider_subset(&names, pr_number, limit);
    let subset_set: BTreeSet<&str> = subset.iter().map(|s| s.as_str()).collect();
    filtered.into_iter().filter(|e| subset_set.contains(e.name.as_str())).collect()
}

const JSON_RESPONSE_INSTRUCTION: &str = "Respond with JSON only: either {\"findings\": [...]} or a bare array of findings. Each finding has path, line, severity (critical|major|minor), title, message, and optionally suggestion and category.";

fn build_system_prompt(intensity: Intensity) -> String {
    let depth = intensity.prompt_depth_keyword();
    if depth.is_empty() {
        format!("You are an automated code reviewer. {JSON_RESPONSE_INSTRUCTION}")
    } else {
        format!("You are an automated code reviewer. {depth}. {JSON_RESPONSE_INSTRUCTION}")
    }
}

fn build_user_prompt(pr: &PrContext, files_to_review: &BTreeSet<&str>) -> String {
    let mut prompt = format!("Review PR #{}: {}\n\n", pr.number, pr.title);
    for file in &pr.files {
        if !files_to_review.contains(file.path.as_str()) {
            continue;
        }
        if let Some(patch) = &file.patch {
            prompt.push_str(&format!("--- {}\n{}\n\n", file.path, patch));
        }
    }
    prompt
}

fn build_hunks_by_path(pr: &PrContext) -> HashMap<String, Vec<DiffHunk>> {
    pr.files
        .iter()
        .filter_map(|f| f.patch.as_ref().map(|patch| (f.path.clone(), parse_hunks(patch))))
        .collect()
}

fn build_inline_comments(findings: &[Finding], hunks_by_path: &HashMap<String, Vec<DiffHunk>>) -> Vec<InlineComment> {
    findings
        .iter()
        .filter_map(|f| {
            let hunks = hunks_by_path.get(&f.path)?;
            let pos = crate::diff::resolve_position(hunks, f.line).ok()?;
            Some(InlineComment {
                path: f.path.clone(),
                line: pos.line,
                side: pos.side,
                body: format!("**{:?}**: {}\n\n{}", f.severity, f.title, f.message),
            })
        })
        .collect()
}

/// One finding as a provider reports it in its completion body (§4.1): a
/// bare JSON array, or an object with a `findings` array, optionally fenced
/// in a ```` ```json ```` / ```` ``` ```` code block.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
struct FindingJson {
    path: String,
    line: u32,
    severity: Severity,
    title: String,
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct FindingsObject {
    findings: Vec<FindingJson>,
}

/// Parses a provider's raw completion text into [`Finding`]s per §4.1's JSON
/// response contract: either a bare `[...]` array or a `{"findings": [...]}`
/// object, optionally wrapped in a markdown code fence. A completion that
/// doesn't parse as either shape yields an empty list rather than an error
/// (tolerant response parsing).
fn parse_findings(provider: &str, content: &str) -> Vec<Finding> {
    let json_text = unfence(content);

    let entries: Vec<FindingJson> = serde_json::from_str::<FindingsObject>(json_text)
        .map(|obj| obj.findings)
        .or_else(|_| serde_json::from_str::<Vec<FindingJson>>(json_text))
        .unwrap_or_default();

    entries
        .into_iter()
        .map(|e| {
            let mut providers = BTreeSet::new();
            providers.insert(provider.to_string());
            Finding {
                path: e.path,
                line: e.line,
                severity: e.severity,
                title: e.title,
                message: e.message,
                suggestion: e.suggestion,
                provider: Some(provider.to_string()),
                providers,
                confidence: None,
                category: e.category,
            }
        })
        .collect()
}

/// Extracts the contents of the first ```` ```json ```` / ```` ``` ````
/// fenced block anywhere in `content`, if one is present; otherwise returns
/// `content` trimmed, for providers that answer with bare JSON.
fn unfence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_open = &trimmed[start + 3..];
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);
    match after_open.find("```") {
        Some(end) => after_open[..end].trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_change_detects_all_lockfiles() {
        let pr = PrContext {
            number: 1,
            title: "bump deps".to_string(),
            body: None,
            author: "a".to_string(),
            draft: false,
            labels: BTreeSet::new(),
            files: vec![crate::models::FileChange {
                path: "Cargo.lock".to_string(),
                status: crate::models::FileStatus::Modified,
                additions: 2,
                deletions: 1,
                changes: 3,
                patch: None,
                previous_path: None,
            }],
            unified_diff: String::new(),
            additions: 2,
            deletions: 1,
            base_sha: "b".to_string(),
            head_sha: "h".to_string(),
        };
        assert!(is_trivial_change(&pr));
    }

    #[test]
    fn trivial_change_requires_every_file_to_match() {
        let pr = PrContext {
            number: 1,
            title: "mixed".to_string(),
            body: None,
            author: "a".to_string(),
            draft: false,
            labels: BTreeSet::new(),
            files: vec![
                crate::models::FileChange {
                    path: "Cargo.lock".to_string(),
                    status: crate::models::FileStatus::Modified,
                    additions: 2,
                    deletions: 1,
                    changes: 3,
                    patch: None,
                    previous_path: None,
                },
                crate::models::FileChange {
                    path: "src/main.rs".to_string(),
                    status: crate::models::FileStatus::Modified,
                    additions: 5,
                    deletions: 0,
                    changes: 5,
                    patch: None,
                    previous_path: None,
                },
            ],
            unified_diff: String::new(),
            additions: 7,
            deletions: 1,
            base_sha: "b".to_string(),
            head_sha: "h".to_string(),
        };
        assert!(!is_trivial_change(&pr));
    }

    #[test]
    fn parses_a_findings_object_with_a_single_entry() {
        let content = r#"{"findings": [{"path": "src/lib.rs", "line": 10, "severity": "critical", "category": "security", "title": "SQL injection", "message": "user input concatenated into query", "suggestion": "use a parameterized query"}]}"#;
        let findings = parse_findings("openai", content);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].title, "SQL injection");
        assert_eq!(findings[0].suggestion.as_deref(), Some("use a parameterized query"));
    }

    #[test]
    fn parses_a_bare_array_with_multiple_entries() {
        let content = r#"[{"path": "a.rs", "line": 1, "severity": "minor", "title": "t1", "message": "m1"}, {"path": "b.rs", "line": 2, "severity": "major", "title": "t2", "message": "m2"}]"#;
        let findings = parse_findings("claude", content);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].path, "a.rs");
        assert_eq!(findings[1].path, "b.rs");
    }

    #[test]
    fn parses_a_fenced_json_code_block() {
        let content = "Here you go:\n```json\n[{\"path\": \"a.rs\", \"line\": 1, \"severity\": \"minor\", \"title\": \"t1\", \"message\": \"m1\"}]\n```\n";
        let findings = parse_findings("openai", content);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].path, "a.rs");
    }

    #[test]
    fn unparseable_content_yields_no_findings_not_an_error() {
        let findings = parse_findings("openai", "not a structured response at all");
        assert!(findings.is_empty());
    }

    fn temp_cache(label: &str) -> crate::cache::CacheStore {
        let dir = std::env::temp_dir().join(format!("revman-orchestrator-test-{label}-{}", std::process::id()));
        crate::cache::CacheStore::new(dir)
    }

    #[tokio::test]
    async fn provider_subset_respects_allowlist_and_limit() {
        let config = ReviewConfig {
            provider_allowlist: vec!["a".to_string(), "b".to_string()],
            provider_limit: 1,
            ..ReviewConfig::default()
        };
        let endpoints = vec![
            ProviderEndpoint { name: "a".to_string(), kind: ProviderKind::Ollama, model: "m".to_string(), endpoint: "http://x".to_string(), api_key: None },
            ProviderEndpoint { name: "b".to_string(), kind: ProviderKind::Ollama, model: "m".to_string(), endpoint: "http://x".to_string(), api_key: None },
            ProviderEndpoint { name: "c".to_string(), kind: ProviderKind::Ollama, model: "m".to_string(), endpoint: "http://x".to_string(), api_key: None },
        ];
        let feedback = FeedbackTracker::new(temp_cache("allowlist"));
        let resolved = resolve_provider_set(&config, &endpoints, 4, Intensity::Standard, &feedback).await;
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].name == "a" || resolved[0].name == "b");
    }

    #[tokio::test]
    async fn provider_subset_falls_back_to_intensity_default_count() {
        let config = ReviewConfig::default();
        let endpoints: Vec<ProviderEndpoint> = (0..5)
            .map(|i| ProviderEndpoint { name: format!("p{i}"), kind: ProviderKind::Ollama, model: "m".to_string(), endpoint: "http://x".to_string(), api_key: None })
            .collect();
        let feedback = FeedbackTracker::new(temp_cache("intensity-default"));
        let resolved = resolve_provider_set(&config, &endpoints, 1, Intensity::Light, &feedback).await;
        assert_eq!(resolved.len(), Intensity::Light.default_provider_count());
    }

    #[tokio::test]
    async fn reliability_strategy_prefers_higher_weighted_providers() {
        let mut config = ReviewConfig {
            provider_limit: 1,
            ..ReviewConfig::default()
        };
        config.provider_selection_strategy = ProviderSelectionStrategy::Reliability;
        let endpoints = vec![
            ProviderEndpoint { name: "flaky".to_string(), kind: ProviderKind::Ollama, model: "m".to_string(), endpoint: "http://x".to_string(), api_key: None },
            ProviderEndpoint { name: "reliable".to_string(), kind: ProviderKind::Ollama, model: "m".to_string(), endpoint: "http://x".to_string(), api_key: None },
        ];
        let feedback = FeedbackTracker::new(temp_cache("reliability"));
        for _ in 0..6 {
            feedback.record_provider_feedback("reliable", true).await.unwrap();
            feedback.record_provider_feedback("flaky", false).await.unwrap();
        }
        let resolved = resolve_provider_set(&config, &endpoints, 1, Intensity::Standard, &feedback).await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "reliable");
    }
}
