//! Bounded concurrent provider fan-out (C6, §4.3).
//!
//! Spawns one task per provider under an `Arc<Semaphore>` concurrency gate,
//! retries transient failures up to `provider_retries` times, and enforces a
//! per-provider timeout via `tokio::time::timeout` rather than a custom
//! cancellation token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cost_tracker::{estimate_cost_usd, estimate_request_cost_usd, CostTracker};
use crate::models::{ProviderResult, ProviderStatus, ReviewResult};
use crate::provider_client::ProviderClient;
use crate::rate_limiter::RateLimiter;

/// One unit of work: a provider client plus the prompt to send it.
pub struct ProviderTask {
    pub client: Arc<ProviderClient>,
    pub system_prompt: String,
    pub user_prompt: String,
    pub timeout: Duration,
}

/// Runs `tasks` concurrently, bounded by `max_parallel`, honoring the shared
/// [`RateLimiter`] and [`CostTracker`], retrying transient errors up to
/// `retries` times per provider.
pub async fn run_providers(
    tasks: Vec<ProviderTask>,
    max_parallel: usize,
    retries: u32,
    rate_limiter: Arc<RateLimiter>,
    cost_tracker: Arc<CostTracker>,
) -> Vec<ProviderResult> {
    let sem = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut handles = Vec::with_capacity(tasks.len());

    for task in tasks {
        let sem = sem.clone();
        let rate_limiter = rate_limiter.clone();
        let cost_tracker = cost_tracker.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore closed");
            run_one_provider(task, retries, rate_limiter, cost_tracker).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(join_err) => {
                warn!(error = %join_err, "provider task panicked");
            }
        }
    }
    results
}

async fn run_one_provider(
    task: ProviderTask,
    retries: u32,
    rate_limiter: Arc<RateLimiter>,
    cost_tracker: Arc<CostTracker>,
) -> ProviderResult {
    let provider = task.client.name().to_string();
    let t0 = Instant::now();

    if !rate_limiter.is_allowed(&provider) {
        debug!(provider = %provider, "skipping: still rate limited");
        return ProviderResult {
            provider,
            status: ProviderStatus::RateLimited,
            review: None,
            error: Some("provider is in backoff".to_string()),
            duration_ms: t0.elapsed().as_millis() as u64,
        };
    }

    let estimated_cost = estimate_request_cost_usd(task.client.model(), &task.system_prompt, &task.user_prompt);
    if !cost_tracker.can_afford(estimated_cost) {
        debug!(provider = %provider, estimated_cost, "skipping: estimated cost would exceed remaining run budget");
        return ProviderResult {
            provider,
            status: ProviderStatus::Skipped,
            review: None,
            error: Some("run budget exhausted".to_string()),
            duration_ms: t0.elapsed().as_millis() as u64,
        };
    }

    let mut last_error: Option<crate::errors::ProviderError> = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            debug!(provider = %provider, attempt, "retrying provider call");
        }

        let call = task.client.complete(&task.system_prompt, &task.user_prompt);
        let outcome = tokio::time::timeout(task.timeout, call).await;

        match outcome {
            Ok(Ok(completion)) => {
                rate_limiter.clear(&provider);
                let usage = completion.usage.unwrap_or_default();
                let cost = estimate_cost_usd(task.client.name(), usage);
                cost_tracker.record(cost);

                let duration_ms = t0.elapsed().as_millis() as u64;
                info!(provider = %provider, duration_ms, "provider call succeeded");

                return ProviderResult {
                    provider,
                    status: ProviderStatus::Success,
                    review: Some(ReviewResult {
                        content: completion.content,
                        findings: Vec::new(),
                        usage: Some(usage),
                        duration_ms,
                        ai_likelihood: None,
                    }),
                    error: None,
                    duration_ms,
                };
            }
            Ok(Err(crate::errors::ProviderError::RateLimit { retry_after_secs })) => {
                rate_limiter.mark_limited(&provider, Duration::from_secs(retry_after_secs));
                return ProviderResult {
                    provider,
                    status: ProviderStatus::RateLimited,
                    review: None,
                    error: Some(format!("rate limited, retry after {retry_after_secs}s")),
                    duration_ms: t0.elapsed().as_millis() as u64,
                };
            }
            Ok(Err(crate::errors::ProviderError::Permanent(msg))) => {
                warn!(provider = %provider, %msg, "provider call failed permanently");
                return ProviderResult {
                    provider,
                    status: ProviderStatus::Error,
                    review: None,
                    error: Some(msg),
                    duration_ms: t0.elapsed().as_millis() as u64,
                };
            }
            Ok(Err(e)) => {
                last_error = Some(e);
            }
            Err(_elapsed) => {
                last_error = Some(crate::errors::ProviderError::Timeout);
            }
        }
    }

    let duration_ms = t0.elapsed().as_millis() as u64;
    let (status, error) = match last_error {
        Some(crate::errors::ProviderError::Timeout) => {
            (ProviderStatus::Timeout, "timed out after all retries".to_string())
        }
        Some(e) => (ProviderStatus::Error, e.to_string()),
        None => (ProviderStatus::Error, "unknown provider failure".to_string()),
    };

    warn!(provider = %provider, duration_ms, %error, "provider call exhausted retries");
    ProviderResult {
        provider,
        status,
        review: None,
        error: Some(error),
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_client::{ProviderConfig, ProviderKind};

    fn make_client(name: &str) -> Arc<ProviderClient> {
        Arc::new(
            ProviderClient::from_config(ProviderConfig {
                name: name.to_string(),
                kind: ProviderKind::Ollama,
                model: "test-model".to_string(),
                endpoint: "http://127.0.0.1:1".to_string(),
                api_key: None,
                timeout: Duration::from_millis(50),
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn skips_rate_limited_provider_without_calling() {
        let rate_limiter = Arc::new(RateLimiter::new());
        rate_limiter.mark_limited("p1", Duration::from_secs(60));
        let cost_tracker = Arc::new(CostTracker::new(100.0));

        let task = ProviderTask {
            client: make_client("p1"),
            system_prompt: "sys".to_string(),
            user_prompt: "usr".to_string(),
            timeout: Duration::from_millis(50),
        };

        let results = run_providers(vec![task], 2, 0, rate_limiter, cost_tracker).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ProviderStatus::RateLimited);
    }

    #[tokio::test]
    async fn skips_when_budget_exhausted() {
        let rate_limiter = Arc::new(RateLimiter::new());
        let cost_tracker = Arc::new(CostTracker::new(0.0));

        let task = ProviderTask {
            client: make_client("p1"),
            system_prompt: "sys".to_string(),
            user_prompt: "usr".to_string(),
            timeout: Duration::from_millis(50),
        };

        let results = run_providers(vec![task], 2, 0, rate_limiter, cost_tracker).await;
        assert_eq!(results[0].status, ProviderStatus::Skipped);
        assert!(results[0].error.as_deref().unwrap().contains("budget"));
    }
}
