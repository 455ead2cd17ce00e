//! Run budget tracking (C2).
//!
//! Accumulates estimated USD cost across provider calls within one run and
//! tells the executor when the configured budget has been exhausted, so a
//! next provider call can be skipped rather than started and wasted.

use std::sync::Mutex;

use crate::models::TokenUsage;

/// Per-model USD cost per 1000 prompt/completion tokens. Unknown models
/// fall back to a conservative default rate.
#[derive(Debug, Clone, Copy)]
pub struct ModelRate {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

const DEFAULT_RATE: ModelRate = ModelRate {
    prompt_per_1k: 0.01,
    completion_per_1k: 0.03,
};

/// Looks up a rough per-1k-token rate for `model`. Grounded in widely quoted
/// public list prices; callers needing exact billing should reconcile with
/// provider invoices separately.
pub fn rate_for_model(model: &str) -> ModelRate {
    let m = model.to_ascii_lowercase();
    if m.contains("gpt-4o-mini") || m.contains("haiku") {
        ModelRate {
            prompt_per_1k: 0.00015,
            completion_per_1k: 0.0006,
        }
    } else if m.contains("gpt-4o") || m.contains("sonnet") {
        ModelRate {
            prompt_per_1k: 0.003,
            completion_per_1k: 0.015,
        }
    } else if m.contains("opus") || m.contains("gpt-4") {
        ModelRate {
            prompt_per_1k: 0.01,
            completion_per_1k: 0.03,
        }
    } else {
        DEFAULT_RATE
    }
}

/// Estimates USD cost of one call given token usage and model.
pub fn estimate_cost_usd(model: &str, usage: TokenUsage) -> f64 {
    let rate = rate_for_model(model);
    let prompt_cost = (usage.prompt_tokens as f64 / 1000.0) * rate.prompt_per_1k;
    let completion_cost = (usage.completion_tokens as f64 / 1000.0) * rate.completion_per_1k;
    prompt_cost + completion_cost
}

/// Rough chars-per-token ratio used to estimate prompt size before a call is
/// dispatched, when no tokenizer is available.
const CHARS_PER_TOKEN: usize = 4;

/// Completion tokens assumed for a pre-dispatch estimate; mirrors the
/// provider client's literal `max_tokens` default (§4.1) since that is the
/// worst case the provider is allowed to return.
const ASSUMED_COMPLETION_TOKENS: u32 = 2000;

/// Estimates the USD cost of a call *before* it is sent, from prompt length
/// alone. Used to gate dispatch against the remaining run budget (§4.2).
pub fn estimate_request_cost_usd(model: &str, system_prompt: &str, user_prompt: &str) -> f64 {
    let prompt_tokens = ((system_prompt.len() + user_prompt.len()) / CHARS_PER_TOKEN) as u32;
    estimate_cost_usd(
        model,
        TokenUsage {
            prompt_tokens,
            completion_tokens: ASSUMED_COMPLETION_TOKENS,
        },
    )
}

/// Shared, thread-safe running total for one orchestration run.
#[derive(Debug)]
pub struct CostTracker {
    budget_max_usd: f64,
    spent_usd: Mutex<f64>,
}

impl CostTracker {
    pub fn new(budget_max_usd: f64) -> Self {
        Self {
            budget_max_usd,
            spent_usd: Mutex::new(0.0),
        }
    }

    /// Whether at least one more provider call can be afforded, ignoring its
    /// estimated cost. Superseded by [`Self::can_afford`] for dispatch
    /// decisions; kept for call sites that only care about spend already
    /// recorded.
    pub fn has_budget(&self) -> bool {
        *self.spent_usd.lock().expect("cost tracker mutex poisoned") < self.budget_max_usd
    }

    /// Whether `estimated_cost_usd` more of spend would still fit under the
    /// budget. Used to gate dispatch *before* a call is made, not just after.
    pub fn can_afford(&self, estimated_cost_usd: f64) -> bool {
        *self.spent_usd.lock().expect("cost tracker mutex poisoned") + estimated_cost_usd <= self.budget_max_usd
    }

    /// Records spend from a completed call, returning the new running total.
    pub fn record(&self, cost_usd: f64) -> f64 {
        let mut guard = self.spent_usd.lock().expect("cost tracker mutex poisoned");
        *guard += cost_usd;
        *guard
    }

    pub fn spent_usd(&self) -> f64 {
        *self.spent_usd.lock().expect("cost tracker mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_affording_once_budget_exhausted() {
        let tracker = CostTracker::new(1.0);
        assert!(tracker.has_budget());
        tracker.record(0.6);
        assert!(tracker.has_budget());
        tracker.record(0.5);
        assert!(!tracker.has_budget());
    }

    #[test]
    fn estimates_nonzero_cost_for_known_model() {
        let usage = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
        };
        let cost = estimate_cost_usd("gpt-4o", usage);
        assert!(cost > 0.0);
    }

    #[test]
    fn can_afford_rejects_estimate_exceeding_remaining_budget() {
        let tracker = CostTracker::new(0.01);
        let estimate = estimate_request_cost_usd("gpt-4o", &"x".repeat(400), &"y".repeat(400));
        assert!(estimate > 0.01);
        assert!(!tracker.can_afford(estimate));
    }

    #[test]
    fn can_afford_allows_estimate_within_remaining_budget() {
        let tracker = CostTracker::new(100.0);
        let estimate = estimate_request_cost_usd("gpt-4o-mini", "short system", "short user");
        assert!(tracker.can_afford(estimate));
    }
}
