//! End-to-end scenario tests for the orchestrator (§8), driving it against
//! `wiremock` stand-ins for the hosting platform and provider APIs instead of
//! real network services.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use revman_core::cache::CacheStore;
use revman_core::config::ReviewConfig;
use revman_core::incremental::{IncrementalReviewer, IncrementalSnapshot};
use revman_core::models::{DiffSide, Finding, Intensity, Severity};
use revman_core::orchestrator::{self, OrchestratorContext, ProviderEndpoint};
use revman_core::platform::{PlatformClient, PlatformConfig, PlatformKind};
use revman_core::provider_client::ProviderKind;

fn cache_dir(tag: &str) -> String {
    std::env::temp_dir()
        .join(format!("revman-e2e-{tag}-{}", std::process::id()))
        .to_string_lossy()
        .to_string()
}

async fn github_pr_mocks(server: &MockServer, files: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Add widget validation",
            "body": "fixes #1",
            "draft": false,
            "labels": [],
            "user": {"login": "alice"},
            "base": {"sha": "base123"},
            "head": {"sha": "head456"},
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/7/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(files))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/7/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues/7/comments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 1})))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls/7/comments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 2})))
        .mount(server)
        .await;
}

fn test_config(cache_dir: String) -> ReviewConfig {
    ReviewConfig {
        dry_run: false,
        enable_caching: true,
        cache_dir,
        incremental_enabled: false,
        inline_min_agreement: 1,
        ..ReviewConfig::default()
    }
}

/// *Small PR, one provider, no cache* (§8): a single mock provider returns
/// one `major` finding; expect a posted summary and exactly one inline
/// comment anchored at the reported line.
#[tokio::test]
async fn small_pr_one_provider_produces_one_inline_comment() {
    let github = MockServer::start().await;
    let patch = "@@ -1,5 +1,10 @@\n line1\n+line2\n+line3\n+line4\n+line5\n+line6\n+line7\n+line8\n+line9\n+line10\n";
    github_pr_mocks(
        &github,
        serde_json::json!([
            {
                "filename": "src/file0.ts",
                "status": "modified",
                "additions": 20,
                "deletions": 0,
                "changes": 20,
                "patch": patch,
            }
        ]),
    )
    .await;

    let provider_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content":
                r#"{"findings": [{"path": "src/file0.ts", "line": 10, "severity": "major", "category": "style", "title": "missing null check", "message": "value may be undefined here"}]}"#
            }}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 40},
        })))
        .mount(&provider_server)
        .await;

    let platform = PlatformClient::from_config(PlatformConfig {
        kind: PlatformKind::GitHub,
        base_api: github.uri(),
        token: "gh-token".to_string(),
    })
    .unwrap();

    let config = test_config(cache_dir("small-pr"));
    let ctx = OrchestratorContext::new(platform, &config);
    let endpoints = vec![ProviderEndpoint {
        name: "openai-mock".to_string(),
        kind: ProviderKind::OpenAiCompatible,
        model: "gpt-test".to_string(),
        endpoint: provider_server.uri(),
        api_key: None,
    }];

    let review = orchestrator::run(&ctx, &config, &endpoints, "acme/widgets", 7)
        .await
        .unwrap()
        .expect("review should be produced");

    assert!(!review.findings.is_empty());
    assert_eq!(review.inline_comments.len(), 1);
    let comment = &review.inline_comments[0];
    assert_eq!(comment.path, "src/file0.ts");
    assert_eq!(comment.line, 10);
    assert_eq!(comment.side, DiffSide::Right);

    let _ = std::fs::remove_dir_all(&config.cache_dir);
}

/// *Intensity=light on test-only change* (§8): a pattern mapping
/// `**/*.test.ts` to `Intensity::Light` selects the quick-scan prompt and
/// drops `minor` findings via the light severity floor.
#[tokio::test]
async fn intensity_light_drops_minor_findings_and_uses_quick_prompt() {
    let github = MockServer::start().await;
    let patch = "@@ -1,1 +1,2 @@\n line1\n+line2\n";
    github_pr_mocks(
        &github,
        serde_json::json!([
            {
                "filename": "app.test.ts",
                "status": "modified",
                "additions": 1,
                "deletions": 0,
                "changes": 1,
                "patch": patch,
            }
        ]),
    )
    .await;

    let provider_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content":
                r#"{"findings": [{"path": "app.test.ts", "line": 2, "severity": "minor", "title": "nit", "message": "prefer const"}]}"#
            }}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5},
        })))
        .mount(&provider_server)
        .await;

    let platform = PlatformClient::from_config(PlatformConfig {
        kind: PlatformKind::GitHub,
        base_api: github.uri(),
        token: "gh-token".to_string(),
    })
    .unwrap();

    let mut config = test_config(cache_dir("intensity-light"));
    config.path_intensity_patterns = vec![revman_core::config::PathIntensityRule {
        glob: "**/*.test.ts".to_string(),
        intensity: Intensity::Light,
        description: "test-only files get a quick scan".to_string(),
    }];
    let ctx = OrchestratorContext::new(platform, &config);
    let endpoints = vec![ProviderEndpoint {
        name: "openai-mock".to_string(),
        kind: ProviderKind::OpenAiCompatible,
        model: "gpt-test".to_string(),
        endpoint: provider_server.uri(),
        api_key: None,
    }];

    let review = orchestrator::run(&ctx, &config, &endpoints, "acme/widgets", 7)
        .await
        .unwrap()
        .expect("review should be produced");

    // Light intensity's severity floor is Major; the lone Minor finding is
    // filtered out by consensus before it ever reaches inline comments.
    assert!(review.findings.is_empty());
    assert!(review.inline_comments.is_empty());

    let _ = std::fs::remove_dir_all(&config.cache_dir);
}

/// *Over-budget skip* (§8): the pre-dispatch cost estimate for the one
/// configured provider (a large diff against an expensive model) already
/// exceeds the tiny remaining budget, so the call is skipped before it is
/// ever sent; the run still completes and posts a summary rather than
/// erroring.
#[tokio::test]
async fn over_budget_skips_provider_calls_but_still_completes() {
    let github = MockServer::start().await;
    // A large patch so the pre-dispatch token estimate is big enough that,
    // against an "opus"-rated model, the estimated cost clears 0.01 USD.
    let big_patch = format!("@@ -1,1 +1,2000 @@\n line1\n{}", "+line\n".repeat(2000));
    github_pr_mocks(
        &github,
        serde_json::json!([
            {
                "filename": "src/file0.ts",
                "status": "modified",
                "additions": 2000,
                "deletions": 0,
                "changes": 2000,
                "patch": big_patch,
            }
        ]),
    )
    .await;

    let provider_server = MockServer::start().await;
    // No mock registered for /chat/completions: the pre-dispatch budget gate
    // must skip the call before any request is sent, so wiremock never sees
    // one; if it did, the unmatched request would panic the mock server.
    let _ = &provider_server;

    let platform = PlatformClient::from_config(PlatformConfig {
        kind: PlatformKind::GitHub,
        base_api: github.uri(),
        token: "gh-token".to_string(),
    })
    .unwrap();

    let mut config = test_config(cache_dir("over-budget"));
    config.budget_max_usd = 0.01;
    let ctx = OrchestratorContext::new(platform, &config);
    let endpoints = vec![ProviderEndpoint {
        name: "openai-mock".to_string(),
        kind: ProviderKind::OpenAiCompatible,
        model: "claude-opus".to_string(),
        endpoint: provider_server.uri(),
        api_key: None,
    }];

    let review = orchestrator::run(&ctx, &config, &endpoints, "acme/widgets", 7)
        .await
        .unwrap()
        .expect("review should still complete, just with no findings");

    assert!(review.findings.is_empty());
    assert_eq!(review.metrics.provider_calls, 0);

    let _ = std::fs::remove_dir_all(&config.cache_dir);
}

/// *Incremental rerun retains prior findings* (§4.7/§4.9 stage 9/12): a
/// previously reviewed file keeps its prior finding across an incremental
/// rerun even though it isn't re-sent to any provider this time, and the
/// persisted snapshot's `reviewed_paths` reflects both the carried-forward
/// file and the freshly reviewed one (not the full diff's file list).
#[tokio::test]
async fn incremental_rerun_retains_prior_findings_for_unreviewed_files() {
    let github = MockServer::start().await;
    let patch_new = "@@ -1,1 +1,2 @@\n line1\n+line2\n";
    github_pr_mocks(
        &github,
        serde_json::json!([
            {
                "filename": "old.rs",
                "status": "modified",
                "additions": 1,
                "deletions": 0,
                "changes": 1,
                "patch": patch_new,
            },
            {
                "filename": "new.rs",
                "status": "modified",
                "additions": 1,
                "deletions": 0,
                "changes": 1,
                "patch": patch_new,
            }
        ]),
    )
    .await;

    let provider_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content":
                r#"{"findings": [{"path": "new.rs", "line": 2, "severity": "minor", "title": "fresh finding", "message": "from this run"}]}"#
            }}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5},
        })))
        .mount(&provider_server)
        .await;

    let platform = PlatformClient::from_config(PlatformConfig {
        kind: PlatformKind::GitHub,
        base_api: github.uri(),
        token: "gh-token".to_string(),
    })
    .unwrap();

    let mut config = test_config(cache_dir("incremental"));
    config.incremental_enabled = true;

    let cache = CacheStore::new(config.cache_dir.clone());
    let incremental = IncrementalReviewer::new(cache, config.incremental_cache_ttl_days);
    let mut reviewed_paths = std::collections::BTreeSet::new();
    reviewed_paths.insert("old.rs".to_string());
    let retained = Finding {
        path: "old.rs".to_string(),
        line: 1,
        severity: Severity::Minor,
        title: "stale finding".to_string(),
        message: "from a prior run".to_string(),
        suggestion: None,
        provider: None,
        providers: ["prior-provider".to_string()].into_iter().collect(),
        confidence: Some(1.0),
        category: None,
    };
    incremental
        .save_snapshot(
            "acme/widgets",
            7,
            &IncrementalSnapshot {
                head_sha: "previous-head".to_string(),
                findings: vec![retained],
                reviewed_paths,
            },
        )
        .await
        .unwrap();

    let ctx = OrchestratorContext::new(platform, &config);
    let endpoints = vec![ProviderEndpoint {
        name: "openai-mock".to_string(),
        kind: ProviderKind::OpenAiCompatible,
        model: "gpt-test".to_string(),
        endpoint: provider_server.uri(),
        api_key: None,
    }];

    let review = orchestrator::run(&ctx, &config, &endpoints, "acme/widgets", 7)
        .await
        .unwrap()
        .expect("review should be produced");

    let paths: std::collections::BTreeSet<String> = review.findings.iter().map(|f| f.path.clone()).collect();
    assert!(paths.contains("old.rs"), "retained finding for the unreviewed file should survive the merge");
    assert!(paths.contains("new.rs"), "fresh finding for the reviewed file should be present");

    let new_snapshot = incremental
        .load_snapshot("acme/widgets", 7)
        .await
        .expect("snapshot should be persisted after the run");
    assert!(new_snapshot.reviewed_paths.contains("old.rs"));
    assert!(new_snapshot.reviewed_paths.contains("new.rs"));

    let _ = std::fs::remove_dir_all(&config.cache_dir);
}
