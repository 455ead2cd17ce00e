//! Crate-wide error hierarchy for revman-core.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - Provider-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - No dynamic dispatch, no async-trait, ergonomic `?` via `From` impls.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type RevResult<T> = Result<T, Error>;

/// Root error type for the orchestration pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Hosting-platform (GitHub/GitLab/Bitbucket) related failure.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// LLM provider call failure (separate from platform calls).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Cache (file I/O / JSON) failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Unified diff parsing failure.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// Configuration problems (bad/missing options, invalid ranges).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Comment-posting failure.
    #[error(transparent)]
    Poster(#[from] PosterError),

    /// Input validation errors (bad IDs, unsupported flavors, etc.).
    #[error("validation error: {0}")]
    Validation(String),

    /// Generic catch-all error when nothing else fits.
    #[error("other error: {0}")]
    Other(String),
}

/// Detailed hosting-platform error (GitHub/GitLab/Bitbucket REST calls).
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("server error: status {0}")]
    Server(u16),

    #[error("http status error: {0}")]
    HttpStatus(u16),

    #[error("timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("unsupported platform operation")]
    Unsupported,
}

/// §4.1 Provider Client contract failures: RateLimit / Timeout / Transient / Permanent.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    #[error("timed out")]
    Timeout,

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),
}

/// File cache related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Unified diff parser errors.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("invalid hunk header: {0}")]
    InvalidHunkHeader(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("target line not found in any hunk")]
    TargetNotInHunk,
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingVar(&'static str),

    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    #[error("invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    #[error("{field} is out of range: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: &'static str,
    },
}

/// Comment-posting failures.
#[derive(Debug, Error)]
pub enum PosterError {
    #[error("platform rejected comment: status={status} body={body}")]
    Rejected { status: u16, body: String },

    #[error("target line is not on an added or context line in the diff")]
    TargetNotOnDiff,

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Platform(PlatformError::from(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Cache(CacheError::Io(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Cache(CacheError::Serde(e))
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return PlatformError::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => PlatformError::Unauthorized,
                403 => PlatformError::Forbidden,
                404 => PlatformError::NotFound,
                429 => PlatformError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => PlatformError::Server(code),
                _ => PlatformError::HttpStatus(code),
            };
        }
        PlatformError::Network(e.to_string())
    }
}

/// Maps a raw HTTP status + optional `Retry-After` header value onto the
/// §4.1 Provider Client failure taxonomy. Non-2xx statuses other than 429
/// surface as `Transient`; 401/403 surface as `Permanent`.
pub fn provider_error_from_status(status: u16, retry_after_secs: Option<u64>) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Permanent(format!("http status {status}")),
        429 => ProviderError::RateLimit {
            retry_after_secs: retry_after_secs.unwrap_or(3600),
        },
        _ => ProviderError::Transient(format!("http status {status}")),
    }
}
