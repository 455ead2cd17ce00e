//! Hosting-platform facade, enum-dispatched over GitHub/GitLab/Bitbucket.
//!
//! No async-trait, no boxed trait objects: each provider is a concrete
//! struct and `PlatformClient` is a thin enum wrapping them.

pub mod bitbucket;
pub mod github;
pub mod gitlab;
pub mod types;

pub use types::*;

use crate::errors::RevResult;
use crate::models::{InlineComment, PrContext};

/// Which hosting platform a [`PlatformClient`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    GitHub,
    GitLab,
    Bitbucket,
}

/// Runtime configuration needed to build any concrete platform client.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub kind: PlatformKind,
    /// API base, e.g. "https://api.github.com", "https://gitlab.com/api/v4",
    /// or "https://api.bitbucket.org/2.0".
    pub base_api: String,
    pub token: String,
}

/// Concrete hosting-platform client (enum-dispatch, per-variant struct).
#[derive(Debug, Clone)]
pub enum PlatformClient {
    GitHub(github::GitHubClient),
    GitLab(gitlab::GitLabClient),
    Bitbucket(bitbucket::BitbucketClient),
}

impl PlatformClient {
    /// Builds a concrete client for `cfg.kind` sharing one `reqwest::Client`.
    pub fn from_config(cfg: PlatformConfig) -> RevResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("revman/0.1")
            .build()?;
        Ok(match cfg.kind {
            PlatformKind::GitHub => {
                Self::GitHub(github::GitHubClient::new(http, cfg.base_api, cfg.token))
            }
            PlatformKind::GitLab => {
                Self::GitLab(gitlab::GitLabClient::new(http, cfg.base_api, cfg.token))
            }
            PlatformKind::Bitbucket => {
                Self::Bitbucket(bitbucket::BitbucketClient::new(http, cfg.base_api, cfg.token))
            }
        })
    }

    /// Loads everything an orchestration run needs: metadata, files, and the
    /// unified diff, normalized into a single [`PrContext`].
    pub async fn load_pr(&self, repo: &str, number: u64) -> RevResult<PrContext> {
        match self {
            Self::GitHub(c) => c.load_pr(repo, number).await,
            Self::GitLab(c) => c.load_pr(repo, number).await,
            Self::Bitbucket(c) => c.load_pr(repo, number).await,
        }
    }

    /// Posts (or updates, for idempotent re-runs) the summary comment.
    pub async fn post_summary(&self, repo: &str, number: u64, body: &str) -> RevResult<()> {
        match self {
            Self::GitHub(c) => c.post_summary(repo, number, body).await,
            Self::GitLab(c) => c.post_summary(repo, number, body).await,
            Self::Bitbucket(c) => c.post_summary(repo, number, body).await,
        }
    }

    /// Posts inline file-line comments, best-effort per comment.
    pub async fn post_inline_comments(
        &self,
        repo: &str,
        number: u64,
        head_sha: &str,
        comments: &[InlineComment],
    ) -> RevResult<usize> {
        match self {
            Self::GitHub(c) => c.post_inline_comments(repo, number, head_sha, comments).await,
            Self::GitLab(c) => c.post_inline_comments(repo, number, head_sha, comments).await,
            Self::Bitbucket(c) => {
                c.post_inline_comments(repo, number, head_sha, comments).await
            }
        }
    }
}
