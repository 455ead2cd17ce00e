//! Comment posting (C10, §4.8).
//!
//! Sits above [`PlatformClient`], responsible for the parts of posting that
//! are the same on every platform: the hidden summary marker, paragraph-safe
//! chunking for platforms with a comment-body size limit, mapping a
//! `(path, line)` finding onto a concrete diff position, and dropping (with
//! a warning, never an error) findings that don't land on the diff.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::diff::{resolve_position, DiffHunk};
use crate::errors::RevResult;
use crate::models::{Finding, InlineComment};
use crate::platform::PlatformClient;

/// Marks a summary comment as ours, independent of hosting platform.
const SUMMARY_MARKER: &str = "<!-- multi-provider-code-review-bot -->";

/// Conservative body-size ceiling shared by the hosting platforms this
/// crate targets; bodies longer than this are split on paragraph
/// boundaries so no single request is rejected for size.
const MAX_CHUNK_BYTES: usize = 60_000;

pub struct Poster {
    platform: PlatformClient,
    dry_run: bool,
}

impl Poster {
    pub fn new(platform: PlatformClient, dry_run: bool) -> Self {
        Self { platform, dry_run }
    }

    /// Posts the run summary, splitting it into marker-tagged chunks if it
    /// exceeds [`MAX_CHUNK_BYTES`]. In dry-run mode nothing is sent; the
    /// chunk count and sizes are logged instead.
    pub async fn post_summary(&self, repo: &str, number: u64, body: &str) -> RevResult<()> {
        let chunks = split_into_chunks(body, MAX_CHUNK_BYTES);

        for (i, chunk) in chunks.iter().enumerate() {
            let tagged = if i == 0 {
                format!("{SUMMARY_MARKER}\n{chunk}")
            } else {
                chunk.clone()
            };

            if self.dry_run {
                info!(
                    repo,
                    number,
                    chunk_index = i,
                    bytes = tagged.len(),
                    "dry-run: would post summary chunk"
                );
                continue;
            }

            self.platform.post_summary(repo, number, &tagged).await?;
        }
        Ok(())
    }

    /// Maps each finding onto a diff position (using that file's parsed
    /// hunks) and posts the resulting inline comments. Findings whose line
    /// isn't on an added or context line are dropped with a warning rather
    /// than failing the run.
    pub async fn post_inline_comments(
        &self,
        repo: &str,
        number: u64,
        head_sha: &str,
        findings: &[Finding],
        hunks_by_path: &HashMap<String, Vec<DiffHunk>>,
    ) -> RevResult<usize> {
        let mut comments = Vec::with_capacity(findings.len());
        let mut dropped = 0usize;

        for f in findings {
            let Some(hunks) = hunks_by_path.get(&f.path) else {
                dropped += 1;
                warn!(path = %f.path, line = f.line, "dropping finding: file has no parsed diff hunks");
                continue;
            };
            match resolve_position(hunks, f.line) {
                Ok(pos) => comments.push(InlineComment {
                    path: f.path.clone(),
                    line: pos.line,
                    side: pos.side,
                    body: format_finding_body(f),
                }),
                Err(_) => {
                    dropped += 1;
                    warn!(path = %f.path, line = f.line, "dropping finding: line is not on an added or context line in the diff");
                }
            }
        }

        if dropped > 0 {
            warn!(dropped, total = findings.len(), "dropped findings that could not be mapped to a diff position");
        }

        if self.dry_run {
            info!(repo, number, count = comments.len(), "dry-run: would post inline comments");
            return Ok(comments.len());
        }

        self.platform
            .post_inline_comments(repo, number, head_sha, &comments)
            .await
    }
}

/// `**<severity>**: <title>` + message + optional suggestion fence + a
/// hidden provider-attribution line.
fn format_finding_body(f: &Finding) -> String {
    let mut body = format!("**{:?}**: {}\n\n{}", f.severity, f.title, f.message);

    if let Some(suggestion) = &f.suggestion {
        body.push_str(&format!("\n\n```suggestion\n{suggestion}\n```"));
    }

    let provider_label = if f.providers.is_empty() {
        f.provider.clone().unwrap_or_default()
    } else {
        f.providers.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    body.push_str(&format!("\n\n<!-- **Provider:** `{provider_label}` -->"));
    body
}

/// Splits `text` into chunks no larger than `max_bytes`, preferring to break
/// on a blank-line paragraph boundary. A single paragraph longer than
/// `max_bytes` is emitted as its own oversized chunk rather than split
/// mid-sentence.
fn split_into_chunks(text: &str, max_bytes: usize) -> Vec<String> {
    if text.len() <= max_bytes {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let would_be = if current.is_empty() {
            paragraph.len()
        } else {
            current.len() + 2 + paragraph.len()
        };

        if would_be > max_bytes && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
