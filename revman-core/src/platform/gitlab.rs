//! GitLab provider (REST v4): MR metadata/diffs loading and comment posting.
//!
//! Endpoints used:
//! - GET  /projects/:id/merge_requests/:iid
//! - GET  /projects/:id/merge_requests/:iid/diffs
//! - POST /projects/:id/merge_requests/:iid/discussions  (inline)
//! - POST /projects/:id/merge_requests/:iid/notes        (summary)
//! - GET  /projects/:id/merge_requests/:iid/discussions  (idempotency)

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::diff::{looks_like_binary_patch, parse_hunks};
use crate::errors::{Error, PlatformError, RevResult};
use crate::models::{DiffSide, FileChange, FileStatus, InlineComment, PrContext};
use crate::platform::types::encode_project_path;

/// Hidden marker prefix embedded in posted comment bodies for dedup (§4.8).
const MARKER_PREFIX: &str = "revman:key=";

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String,
    token: String,
}

impl GitLabClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    fn project_url(&self, repo: &str, suffix: &str) -> String {
        format!(
            "{}/projects/{}{}",
            self.base_api.trim_end_matches('/'),
            encode_project_path(repo),
            suffix
        )
    }

    pub async fn load_pr(&self, repo: &str, number: u64) -> RevResult<PrContext> {
        let meta_url = self.project_url(repo, &format!("/merge_requests/{number}"));
        let meta: GitLabMr = self
            .http
            .get(&meta_url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let diffs_url = self.project_url(repo, &format!("/merge_requests/{number}/diffs"));
        let raw_files: Vec<GitLabDiffFile> = self
            .http
            .get(&diffs_url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut files = Vec::with_capacity(raw_files.len());
        let mut additions = 0u32;
        let mut deletions = 0u32;
        let mut unified_diff = String::new();

        for f in &raw_files {
            let status = if f.new_file {
                FileStatus::Added
            } else if f.deleted_file {
                FileStatus::Removed
            } else if f.renamed_file {
                FileStatus::Renamed
            } else {
                FileStatus::Modified
            };

            let is_binary = f.diff.as_deref().map(looks_like_binary_patch).unwrap_or(true);
            let (file_additions, file_deletions) = if is_binary {
                (0, 0)
            } else {
                count_changes(f.diff.as_deref().unwrap_or(""))
            };
            additions += file_additions;
            deletions += file_deletions;

            if let Some(d) = &f.diff {
                unified_diff.push_str(d);
                unified_diff.push('\n');
            }

            files.push(FileChange {
                path: f.new_path.clone(),
                status,
                additions: file_additions,
                deletions: file_deletions,
                changes: file_additions + file_deletions,
                patch: f.diff.clone(),
                previous_path: if f.renamed_file {
                    Some(f.old_path.clone())
                } else {
                    None
                },
            });
        }

        Ok(PrContext {
            number,
            title: meta.title,
            body: meta.description,
            author: meta.author.username,
            draft: meta.draft,
            labels: meta.labels.into_iter().collect::<BTreeSet<_>>(),
            files,
            unified_diff,
            additions,
            deletions,
            base_sha: meta.diff_refs.base_sha,
            head_sha: meta.diff_refs.head_sha,
        })
    }

    pub async fn post_summary(&self, repo: &str, number: u64, body: &str) -> RevResult<()> {
        let url = self.project_url(repo, &format!("/merge_requests/{number}/notes"));

        #[derive(serde::Serialize)]
        struct Req<'a> {
            body: &'a str,
        }

        let resp = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
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
        let meta_url = self.project_url(repo, &format!("/merge_requests/{number}"));
        let meta: GitLabMr = self
            .http
            .get(&meta_url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let existing = self.load_existing_markers(repo, number).await?;

        let mut posted = 0usize;
        for c in comments {
            let key = format!("{}:{}", c.path, c.line);
            if existing.contains(&key) {
                continue;
            }

            let marker = format!("<!-- {MARKER_PREFIX}{key} -->");
            let body = format!("{}\n\n{}", c.body, marker);

            let url = self.project_url(repo, &format!("/merge_requests/{number}/discussions"));

            #[derive(serde::Serialize)]
            struct Position<'a> {
                position_type: &'a str,
                new_path: &'a str,
                new_line: Option<u32>,
                old_line: Option<u32>,
                head_sha: &'a str,
                base_sha: &'a str,
                start_sha: &'a str,
            }
            #[derive(serde::Serialize)]
            struct Req<'a> {
                body: &'a str,
                position: Position<'a>,
            }

            let (new_line, old_line) = match c.side {
                DiffSide::Right => (Some(c.line), None),
                DiffSide::Left => (None, Some(c.line)),
            };

            let resp = self
                .http
                .post(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .json(&Req {
                    body: &body,
                    position: Position {
                        position_type: "text",
                        new_path: &c.path,
                        new_line,
                        old_line,
                        head_sha,
                        base_sha: &meta.diff_refs.base_sha,
                        start_sha: meta.diff_refs.start_sha.as_deref().unwrap_or(&meta.diff_refs.base_sha),
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
        let url = self.project_url(
            repo,
            &format!("/merge_requests/{number}/discussions?per_page=100"),
        );

        #[derive(Deserialize)]
        struct Note {
            body: Option<String>,
        }
        #[derive(Deserialize)]
        struct Discussion {
            notes: Vec<Note>,
        }

        let resp = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?;

        let discussions: Vec<Discussion> = resp.json().await.unwrap_or_default();
        let re = Regex::new(&format!(r"{}([^\s>]+)", regex::escape(MARKER_PREFIX))).unwrap();

        let mut set = HashSet::new();
        for d in discussions {
            for n in d.notes {
                if let Some(body) = n.body {
                    if let Some(caps) = re.captures(&body) {
                        if let Some(m) = caps.get(1) {
                            set.insert(m.as_str().to_string());
                        }
                    }
                }
            }
        }
        Ok(set)
    }
}

fn count_changes(diff: &str) -> (u32, u32) {
    let mut additions = 0u32;
    let mut deletions = 0u32;
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            additions += 1;
        } else if line.starts_with('-') {
            deletions += 1;
        }
    }
    (additions, deletions)
}

#[derive(Debug, Deserialize)]
struct GitLabMr {
    title: String,
    description: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    labels: Vec<String>,
    diff_refs: GitLabDiffRefs,
    author: GitLabUser,
    #[serde(default)]
    #[allow(dead_code)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitLabDiffRefs {
    base_sha: String,
    head_sha: String,
    #[serde(default)]
    start_sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct GitLabDiffFile {
    old_path: String,
    new_path: String,
    new_file: bool,
    renamed_file: bool,
    deleted_file: bool,
    #[serde(default)]
    diff: Option<String>,
}
