//! Run configuration (§6).
//!
//! `ReviewConfig` is an immutable record of every knob listed in spec §6.
//! Loading follows the same env-var + validation idiom as
//! `ai-llm-service::error_handler` (`must_env`, `env_opt_u32`,
//! `validate_range_f32`), generalized to the full option table.

use crate::errors::ConfigError;
use crate::models::{Intensity, Severity};

/// How provider selection should weight reliability history (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSelectionStrategy {
    /// Ignore learned weights; use configured order/rotation only.
    RoundRobin,
    /// Prefer providers with higher learned reliability weight.
    Reliability,
    /// Mostly exploit the best-weighted providers, occasionally explore others.
    ExplorationExploitation,
}

/// One `(glob, intensity, description)` rule for path-based intensity (§4.5).
#[derive(Debug, Clone)]
pub struct PathIntensityRule {
    pub glob: String,
    pub intensity: Intensity,
    pub description: String,
}

/// Immutable run configuration. Construct via [`ReviewConfig::from_env`] or
/// [`ReviewConfig::default`] for tests.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub providers: Vec<String>,
    pub synthesis_model: Option<String>,
    pub provider_allowlist: Vec<String>,
    pub provider_blocklist: Vec<String>,
    pub provider_limit: usize,
    pub provider_retries: u32,
    pub provider_max_parallel: usize,

    pub inline_max_comments: usize,
    pub inline_min_severity: Severity,
    pub inline_min_agreement: usize,

    pub skip_labels: Vec<String>,
    pub skip_drafts: bool,
    pub skip_bots: bool,
    pub min_changed_lines: u32,
    pub max_changed_files: usize,
    pub diff_max_bytes: usize,

    pub run_timeout_seconds: u64,
    pub budget_max_usd: f64,

    pub enable_ast_analysis: bool,
    pub enable_security: bool,
    pub enable_caching: bool,
    pub enable_test_hints: bool,
    pub enable_ai_detection: bool,

    pub incremental_enabled: bool,
    pub incremental_cache_ttl_days: i64,

    pub path_based_intensity: bool,
    pub path_intensity_patterns: Vec<PathIntensityRule>,
    pub path_default_intensity: Intensity,

    pub quiet_mode_enabled: bool,
    pub quiet_min_confidence: f32,
    pub quiet_use_learning: bool,

    pub provider_selection_strategy: ProviderSelectionStrategy,
    pub exploration_rate: f32,

    pub dry_run: bool,

    pub cache_dir: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            synthesis_model: None,
            provider_allowlist: Vec::new(),
            provider_blocklist: Vec::new(),
            provider_limit: 0,
            provider_retries: 1,
            provider_max_parallel: 3,

            inline_max_comments: 25,
            inline_min_severity: Severity::Minor,
            inline_min_agreement: 2,

            skip_labels: Vec::new(),
            skip_drafts: true,
            skip_bots: true,
            min_changed_lines: 0,
            max_changed_files: usize::MAX,
            diff_max_bytes: 5 * 1024 * 1024,

            run_timeout_seconds: 300,
            budget_max_usd: f64::MAX,

            enable_ast_analysis: false,
            enable_security: false,
            enable_caching: true,
            enable_test_hints: false,
            enable_ai_detection: false,

            incremental_enabled: true,
            incremental_cache_ttl_days: 14,

            path_based_intensity: true,
            path_intensity_patterns: Vec::new(),
            path_default_intensity: Intensity::Standard,

            quiet_mode_enabled: false,
            quiet_min_confidence: 0.5,
            quiet_use_learning: false,

            provider_selection_strategy: ProviderSelectionStrategy::RoundRobin,
            exploration_rate: 0.3,

            dry_run: true,

            cache_dir: "code_data/review_cache".to_string(),
        }
    }
}

impl ReviewConfig {
    /// Loads configuration from environment variables, falling back to
    /// [`ReviewConfig::default`] for anything unset. Only loosely-typed
    /// numeric/range fields are validated; missing optional fields are not
    /// errors (mirrors `ai-llm-service`'s tolerant env loading).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = ReviewConfig::default();

        if let Some(v) = env_csv("REVMAN_PROVIDERS") {
            cfg.providers = v;
        }
        cfg.synthesis_model = std::env::var("REVMAN_SYNTHESIS_MODEL").ok();
        if let Some(v) = env_csv("REVMAN_PROVIDER_ALLOWLIST") {
            cfg.provider_allowlist = v;
        }
        if let Some(v) = env_csv("REVMAN_PROVIDER_BLOCKLIST") {
            cfg.provider_blocklist = v;
        }
        cfg.provider_limit = env_usize("REVMAN_PROVIDER_LIMIT", cfg.provider_limit)?;
        cfg.provider_retries = env_u32("REVMAN_PROVIDER_RETRIES", cfg.provider_retries)?;
        cfg.provider_max_parallel =
            env_usize("REVMAN_PROVIDER_MAX_PARALLEL", cfg.provider_max_parallel)?;

        cfg.inline_max_comments = env_usize("REVMAN_INLINE_MAX_COMMENTS", cfg.inline_max_comments)?;
        cfg.inline_min_agreement =
            env_usize("REVMAN_INLINE_MIN_AGREEMENT", cfg.inline_min_agreement)?;

        cfg.skip_drafts = env_bool("REVMAN_SKIP_DRAFTS", cfg.skip_drafts);
        cfg.skip_bots = env_bool("REVMAN_SKIP_BOTS", cfg.skip_bots);
        cfg.min_changed_lines = env_u32("REVMAN_MIN_CHANGED_LINES", cfg.min_changed_lines)?;
        cfg.max_changed_files = env_usize("REVMAN_MAX_CHANGED_FILES", cfg.max_changed_files)?;
        cfg.diff_max_bytes = env_usize("REVMAN_DIFF_MAX_BYTES", cfg.diff_max_bytes)?;

        cfg.run_timeout_seconds =
            env_u64("REVMAN_RUN_TIMEOUT_SECONDS", cfg.run_timeout_seconds)?;
        if let Ok(v) = std::env::var("REVMAN_BUDGET_MAX_USD") {
            cfg.budget_max_usd = v.parse().map_err(|_| ConfigError::InvalidNumber {
                var: "REVMAN_BUDGET_MAX_USD",
                reason: "expected f64",
            })?;
        }

        cfg.enable_ast_analysis = env_bool("REVMAN_ENABLE_AST_ANALYSIS", cfg.enable_ast_analysis);
        cfg.enable_security = env_bool("REVMAN_ENABLE_SECURITY", cfg.enable_security);
        cfg.enable_caching = env_bool("REVMAN_ENABLE_CACHING", cfg.enable_caching);
        cfg.enable_test_hints = env_bool("REVMAN_ENABLE_TEST_HINTS", cfg.enable_test_hints);
        cfg.enable_ai_detection = env_bool("REVMAN_ENABLE_AI_DETECTION", cfg.enable_ai_detection);

        cfg.incremental_enabled = env_bool("REVMAN_INCREMENTAL_ENABLED", cfg.incremental_enabled);
        cfg.incremental_cache_ttl_days = env_i64(
            "REVMAN_INCREMENTAL_CACHE_TTL_DAYS",
            cfg.incremental_cache_ttl_days,
        )?;

        cfg.path_based_intensity =
            env_bool("REVMAN_PATH_BASED_INTENSITY", cfg.path_based_intensity);

        cfg.quiet_mode_enabled = env_bool("REVMAN_QUIET_MODE_ENABLED", cfg.quiet_mode_enabled);
        if let Ok(v) = std::env::var("REVMAN_QUIET_MIN_CONFIDENCE") {
            let f: f32 = v.parse().map_err(|_| ConfigError::InvalidNumber {
                var: "REVMAN_QUIET_MIN_CONFIDENCE",
                reason: "expected f32",
            })?;
            validate_range_f32("quiet_min_confidence", f, 0.0, 1.0)?;
            cfg.quiet_min_confidence = f;
        }
        cfg.quiet_use_learning = env_bool("REVMAN_QUIET_USE_LEARNING", cfg.quiet_use_learning);

        cfg.dry_run = env_bool("REVMAN_DRY_RUN", cfg.dry_run);
        if let Ok(v) = std::env::var("REVMAN_CACHE_DIR") {
            if !v.trim().is_empty() {
                cfg.cache_dir = v;
            }
        }

        Ok(cfg)
    }
}

fn env_csv(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_usize(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.parse().map_err(|_| ConfigError::InvalidNumber {
            var: key,
            reason: "expected usize",
        }),
        _ => Ok(default),
    }
}

fn env_u32(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.parse().map_err(|_| ConfigError::InvalidNumber {
            var: key,
            reason: "expected u32",
        }),
        _ => Ok(default),
    }
}

fn env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.parse().map_err(|_| ConfigError::InvalidNumber {
            var: key,
            reason: "expected u64",
        }),
        _ => Ok(default),
    }
}

fn env_i64(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.parse().map_err(|_| ConfigError::InvalidNumber {
            var: key,
            reason: "expected i64",
        }),
        _ => Ok(default),
    }
}

fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ReviewConfig::default();
        assert_eq!(cfg.provider_max_parallel, 3);
        assert_eq!(cfg.inline_min_agreement, 2);
        assert!(cfg.dry_run);
    }
}
