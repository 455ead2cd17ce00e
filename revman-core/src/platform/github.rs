//! GitHub provider (REST v3): PR metadata/diffs loading and comment posting.
//!
//! Endpoints used:
//! - GET  /repos/:owner/:repo/pulls/:number
//! - GET  /repos/:owner/:repo/pulls/:number/files
//! - POST /repos/:owner/:repo/issues/:number/comments       (summary)
//! - POST /repos/:owner/:repo/pulls/:number/comments        (inline review comment)
//! - GET  /repos/:owner/:repo/issues/:number/comments       (idempotency)

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::{Error, PlatformError, RevResult};
use crate::models::{FileChange, FileStatus, InlineComment, PrContext};

const MARKER_PREFIX: &str = "revman:key=";

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String,
    token: String,
}

impl GitHubClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub async fn load_pr(&self, repo: &str, number: u64) -> RevResult<PrContext> {
        let base = self.base_api.trim_end_matches('/');
        let meta_url = format!("{base}/repos/{repo}/pulls/{number}");
        let meta: GitHubPr = self
            .http
            .get(&meta_url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let files_url = format!("{base}/repos/{repo}/pulls/{number}/files?per_page=100");
        let raw_files: Vec<GitHubFile> = self
            .http
            .get(&files_url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut files = Vec::with_capacity(raw_files.len());
        let mut unified_diff = String::new();
        let mut additions = 0u32;
        let mut deletions = 0u32;

        for f in raw_files {
            let status = match f.status.as_str() {
                "added" => FileStatus::Added,
                "removed" => FileStatus::Removed,
                "renamed" => FileStatus::Renamed,
                _ => FileStatus::Modified,
            };
            additions += f.additions;
            deletions += f.deletions;
            if let Some(patch) = &f.patch {
                unified_diff.push_str(patch);
                unified_diff.push('\n');
            }

            files.push(FileChange {
                path: f.filename,
                status,
                additions: f.additions,
                deletions: f.deletions,
                changes: f.changes,
                patch: f.patch,
                previous_path: f.previous_filename,
            });
        }

        Ok(PrContext {
            number,
            title: meta.title,
            body: meta.body,
            author: meta.user.login,
            draft: meta.draft,
            labels: meta.labels.into_iter().map(|l| l.name).collect::<BTreeSet<_>>(),
            files,
            unified_diff,
            additions,
            deletions,
            base_sha: meta.base.sha,
            head_sha: meta.head.sha,
        })
    }

    pub async fn post_summary(&self, repo: &str, number: u64, body: &str) -> RevResult<()> {
        let base = self.base_api.trim_end_matches('/');
        let url = format!("{base}/repos/{repo}/issues/{number}/comments");

        #[derive(serde::Serialize)]
        struct Req<'a> {
            body: &'a str,
        }

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/vnd.github+json")
            .json(&Req { body })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Platform(PlatformError::HttpStatus(
                resp.status().as_u16(),
            )));
        }
        Ok(())
    }

    pub async fn post_inline_comments(
        &self,
        repo: &str,
        number: u64,
        head_sha: &str,
        comments: &[InlineComment],
    ) -> RevResult<usize> {
        let existing = self.load_existing_markers(repo, number).await?;
        let base = self.base_api.trim_end_matches('/');
        let url = format!("{base}/repos/{repo}/pulls/{number}/comments");

        let mut posted = 0usize;
        for c in comments {
            let key = format!("{}:{}", c.path, c.line);
            if existing.contains(&key) {
                continue;
            }

            let marker = format!("<!-- {MARKER_PREFIX}{key} -->");
            let body = format!("{}\n\n{}", c.body, marker);

            #[derive(serde::Serialize)]
            struct Req<'a> {
                body: &'a str,
                commit_id: &'a str,
                path: &'a str,
                line: u32,
                side: &'a str,
            }

            let side = match c.side {
                crate::models::DiffSide::Right => "RIGHT",
                crate::models::DiffSide::Left => "LEFT",
            };

            let resp = self
                .http
                .post(&url)
                .header("Authorization", self.auth_header())
                .header("Accept", "application/vnd.github+json")
                .json(&Req {
                    body: &body,
                    commit_id: head_sha,
                    path: &c.path,
                    line: c.line,
                    side,
                })
                .send()
                .await?;

            if resp.status().is_success() {
                posted += 1;
            }
        }

        Ok(posted)
    }

    async fn load_existing_markers(&self, repo: &str, number: u64) -> RevResult<HashSet<String>> {
        let base = self.base_api.trim_end_matches('/');
        let url = format!("{base}/repos/{repo}/issues/{number}/comments?per_page=100");

        #[derive(Deserialize)]
        struct Comment {
            body: Option<String>,
        }

        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?;

        let comments: Vec<Comment> = resp.json().await.unwrap_or_default();
        let re = Regex::new(&format!(r"{}([^\s>]+)", regex::escape(MARKER_PREFIX))).unwrap();

        let mut set = HashSet::new();
        for c in comments {
            if let Some(body) = c.body {
                if let Some(caps) = re.captures(&body) {
                    if let Some(m) = caps.get(1) {
                        set.insert(m.as_str().to_string());
                    }
                }
            }
        }
        Ok(set)
    }
}

#[derive(Debug, Deserialize)]
struct GitHubPr {
    title: String,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    user: GitHubUser,
    base: GitHubRef,
    head: GitHubRef,
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubFile {
    filename: String,
    status: String,
    additions: u32,
    deletions: u32,
    changes: u32,
    #[serde(default)]
    patch: Option<String>,
    #[serde(default)]
    previous_filename: Option<String>,
}
