//! Bitbucket Cloud provider (REST 2.0): PR metadata/diffs loading and
//! comment posting.
//!
//! Endpoints used:
//! - GET  /2.0/repositories/:repo/pullrequests/:id
//! - GET  /2.0/repositories/:repo/pullrequests/:id/diffstat
//! - GET  /2.0/repositories/:repo/pullrequests/:id/diff          (raw unified text)
//! - POST /2.0/repositories/:repo/pullrequests/:id/comments      (summary + inline)
//! - GET  /2.0/repositories/:repo/pullrequests/:id/comments      (idempotency)

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::{Error, PlatformError, RevResult};
use crate::models::{FileChange, FileStatus, InlineComment, PrContext};

const MARKER_PREFIX: &str = "revman:key=";

#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: Client,
    base_api: String,
    token: String,
}

impl BitbucketClient {
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
        let meta_url = format!("{base}/repositories/{repo}/pullrequests/{number}");
        let meta: BitbucketPr = self
            .http
            .get(&meta_url)
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let diffstat_url =
            format!("{base}/repositories/{repo}/pullrequests/{number}/diffstat?pagelen=100");
        let diffstat: BitbucketDiffstatPage = self
            .http
            .get(&diffstat_url)
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let diff_url = format!("{base}/repositories/{repo}/pullrequests/{number}/diff");
        let unified_diff = self
            .http
            .get(&diff_url)
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let per_file_patches = split_per_file(&unified_diff);

        let mut files = Vec::with_capacity(diffstat.values.len());
        let mut additions = 0u32;
        let mut deletions = 0u32;

        for v in diffstat.values {
            let path = v
                .new
                .as_ref()
                .map(|f| f.path.clone())
                .or_else(|| v.old.as_ref().map(|f| f.path.clone()))
                .unwrap_or_default();

            let status = match v.status.as_str() {
                "added" => FileStatus::Added,
                "removed" => FileStatus::Removed,
                "renamed" => FileStatus::Renamed,
                _ => FileStatus::Modified,
            };

            additions += v.lines_added;
            deletions += v.lines_removed;

            files.push(FileChange {
                patch: per_file_patches.get(&path).cloned(),
                path: path.clone(),
                status,
                additions: v.lines_added,
                deletions: v.lines_removed,
                changes: v.lines_added + v.lines_removed,
                previous_path: v.old.map(|f| f.path),
            });
        }

        Ok(PrContext {
            number,
            title: meta.title,
            body: meta.description,
            author: meta.author.nickname.unwrap_or_else(|| meta.author.uuid.clone()),
            draft: meta.draft.unwrap_or(false),
            labels: BTreeSet::new(),
            files,
            unified_diff,
            additions,
            deletions,
            base_sha: meta.destination.commit.hash,
            head_sha: meta.source.commit.hash,
        })
    }

    pub async fn post_summary(&self, repo: &str, number: u64, body: &str) -> RevResult<()> {
        let base = self.base_api.trim_end_matches('/');
        let url = format!("{base}/repositories/{repo}/pullrequests/{number}/comments");

        #[derive(serde::Serialize)]
        struct Content<'a> {
            raw: &'a str,
        }
        #[derive(serde::Serialize)]
        struct Req<'a> {
            content: Content<'a>,
        }

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&Req {
                content: Content { raw: body },
            })
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
        _head_sha: &str,
        comments: &[InlineComment],
    ) -> RevResult<usize> {
        let existing = self.load_existing_markers(repo, number).await?;
        let base = self.base_api.trim_end_matches('/');
        let url = format!("{base}/repositories/{repo}/pullrequests/{number}/comments");

        let mut posted = 0usize;
        for c in comments {
            let key = format!("{}:{}", c.path, c.line);
            if existing.contains(&key) {
                continue;
            }

            let marker = format!("<!-- {MARKER_PREFIX}{key} -->");
            let body = format!("{}\n\n{}", c.body, marker);

            #[derive(serde::Serialize)]
            struct Content<'a> {
                raw: &'a str,
            }
            #[derive(serde::Serialize)]
            struct InlineRef<'a> {
                path: &'a str,
                to: u32,
            }
            #[derive(serde::Serialize)]
            struct Req<'a> {
                content: Content<'a>,
                inline: InlineRef<'a>,
            }

            let resp = self
                .http
                .post(&url)
                .header("Authorization", self.auth_header())
                .json(&Req {
                    content: Content { raw: &body },
                    inline: InlineRef {
                        path: &c.path,
                        to: c.line,
                    },
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
        let url =
            format!("{base}/repositories/{repo}/pullrequests/{number}/comments?pagelen=100");

        #[derive(Deserialize)]
        struct Content {
            raw: Option<String>,
        }
        #[derive(Deserialize)]
        struct Comment {
            content: Content,
        }
        #[derive(Deserialize)]
        struct Page {
            values: Vec<Comment>,
        }

        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .error_for_status()?;

        let page: Page = resp.json().await.unwrap_or(Page { values: Vec::new() });
        let re = Regex::new(&format!(r"{}([^\s>]+)", regex::escape(MARKER_PREFIX))).unwrap();

        let mut set = HashSet::new();
        for c in page.values {
            if let Some(raw) = c.content.raw {
                if let Some(caps) = re.captures(&raw) {
                    if let Some(m) = caps.get(1) {
                        set.insert(m.as_str().to_string());
                    }
                }
            }
        }
        Ok(set)
    }
}

/// Splits a single Bitbucket PR diff blob into `new_path -> patch text`.
fn split_per_file(raw: &str) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    for part in raw.split("\ndiff --git ").collect::<Vec<_>>() {
        let new_path = part.lines().find_map(|l| l.strip_prefix("+++ b/"));
        if let Some(path) = new_path {
            map.insert(path.to_string(), part.to_string());
        }
    }
    map
}

#[derive(Debug, Deserialize)]
struct BitbucketPr {
    title: String,
    description: Option<String>,
    #[serde(default)]
    draft: Option<bool>,
    author: BitbucketUser,
    source: BitbucketBranch,
    destination: BitbucketBranch,
}

#[derive(Debug, Deserialize)]
struct BitbucketUser {
    #[serde(default)]
    nickname: Option<String>,
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketBranch {
    commit: BitbucketCommit,
}

#[derive(Debug, Deserialize)]
struct BitbucketCommit {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketDiffstatPage {
    values: Vec<BitbucketDiffstatEntry>,
}

#[derive(Debug, Deserialize)]
struct BitbucketDiffstatEntry {
    status: String,
    lines_added: u32,
    lines_removed: u32,
    #[serde(default)]
    old: Option<BitbucketFileRef>,
    #[serde(default)]
    new: Option<BitbucketFileRef>,
}

#[derive(Debug, Deserialize)]
struct BitbucketFileRef {
    path: String,
}
