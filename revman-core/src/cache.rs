//! Content-addressed file cache (C3).
//!
//! Why cache?
//! - Large PRs consume provider budget and take time to review.
//! - Re-running on the same `head_sha` should be close to O(1).
//!
//! Key: SHA256("{namespace}:{key}") truncated to 12 hex chars.
//! Layout: `<cache_dir>/<namespace>/<key_sanitized>-<hash12>.json`
//! Default cache dir: "code_data/review_cache", overridable via
//! [`ReviewConfig::cache_dir`](crate::config::ReviewConfig::cache_dir).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::errors::{CacheError, RevResult};

/// Filesystem-backed cache store scoped to one root directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

/// Envelope wrapping a cached value with the timestamp it was written at, so
/// callers can enforce their own TTL semantics on read.
#[derive(Debug, Serialize, serde::Deserialize)]
struct Envelope<T> {
    cached_at: DateTime<Utc>,
    value: T,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sanitize(s: &str) -> String {
        s.replace(['/', ':'], "_")
    }

    fn key_path(&self, namespace: &str, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(format!("{namespace}:{key}"));
        let digest = format!("{:x}", hasher.finalize());
        self.root
            .join(namespace)
            .join(format!("{}-{}.json", Self::sanitize(key), &digest[..12]))
    }

    /// Loads a cached value if present and not older than `ttl`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
        ttl: Duration,
    ) -> RevResult<Option<T>> {
        let path = self.key_path(namespace, key);
        if !Path::new(&path).exists() {
            return Ok(None);
        }
        let data = fs::read(&path)
            .await
            .map_err(CacheError::Io)?;
        let envelope: Envelope<T> = serde_json::from_slice(&data).map_err(CacheError::Serde)?;
        if Utc::now() - envelope.cached_at > ttl {
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    /// Stores a value, overwriting any existing entry for `(namespace, key)`.
    pub async fn put<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> RevResult<()> {
        let path = self.key_path(namespace, key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(CacheError::Io)?;
        }
        let envelope = Envelope {
            cached_at: Utc::now(),
            value,
        };
        let json = serde_json::to_vec(&envelope).map_err(CacheError::Serde)?;
        fs::write(&path, json).await.map_err(CacheError::Io)?;
        Ok(())
    }

    /// Removes a cached entry, if present. Used by suppression-pattern
    /// expiry cleanup and by tests.
    pub async fn remove(&self, namespace: &str, key: &str) -> RevResult<()> {
        let path = self.key_path(namespace, key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e).into()),
        }
    }
}
