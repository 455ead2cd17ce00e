//! Unified diff parsing and diff-position mapping (§4.8/§9).
//!
//! The hunk parser is robust to missing `---`/`+++` file headers, as
//! hosting platforms sometimes hand back hunks-only text; only `@@` headers
//! are required to anchor line numbers.

use crate::errors::DiffError;
use crate::models::DiffSide;

/// One line inside a [`DiffHunk`].
#[derive(Debug, Clone)]
pub enum DiffLine {
    Added { new_line: u32, content: String },
    Removed { old_line: u32, content: String },
    Context { old_line: u32, new_line: u32, content: String },
}

/// A contiguous block of changes within a file's diff.
#[derive(Debug, Clone)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
}

/// Parses a unified diff for a single file into hunks.
///
/// Ignores `\ No newline at end of file` marker lines and any prelude before
/// the first `@@` header.
pub fn parse_hunks(s: &str) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut cur_old_start = 0u32;
    let mut cur_old_lines = 0u32;
    let mut cur_new_start = 0u32;
    let mut cur_new_lines = 0u32;
    let mut lines_buf: Vec<DiffLine> = Vec::new();
    let mut old_line = 0u32;
    let mut new_line = 0u32;
    let mut in_hunk = false;

    for line in s.lines() {
        if line.starts_with("@@") {
            if in_hunk && !lines_buf.is_empty() {
                hunks.push(DiffHunk {
                    old_start: cur_old_start,
                    old_lines: cur_old_lines,
                    new_start: cur_new_start,
                    new_lines: cur_new_lines,
                    lines: std::mem::take(&mut lines_buf),
                });
            }
            if let Some((left, right)) = line
                .trim_start_matches('@')
                .trim_end_matches('@')
                .trim()
                .split_once('+')
            {
                let left_nums = left.trim().trim_start_matches('-');
                let (o_start, o_len) = split_nums(left_nums);
                let (n_start, n_len) = split_nums(right.trim());
                cur_old_start = o_start;
                cur_old_lines = o_len;
                cur_new_start = n_start;
                cur_new_lines = n_len;
                old_line = o_start;
                new_line = n_start;
                in_hunk = true;
            }
            continue;
        }

        if line.starts_with("\\ ") || !in_hunk {
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            lines_buf.push(DiffLine::Added {
                new_line,
                content: rest.to_string(),
            });
            new_line += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            lines_buf.push(DiffLine::Removed {
                old_line,
                content: rest.to_string(),
            });
            old_line += 1;
        } else {
            let rest = line.strip_prefix(' ').unwrap_or(line);
            lines_buf.push(DiffLine::Context {
                old_line,
                new_line,
                content: rest.to_string(),
            });
            old_line += 1;
            new_line += 1;
        }
    }

    if in_hunk && !lines_buf.is_empty() {
        hunks.push(DiffHunk {
            old_start: cur_old_start,
            old_lines: cur_old_lines,
            new_start: cur_new_start,
            new_lines: cur_new_lines,
            lines: lines_buf,
        });
    }
    hunks
}

fn split_nums(s: &str) -> (u32, u32) {
    let s = s.trim();
    if let Some((a, b)) = s.split_once(',') {
        (a.parse().unwrap_or(0), b.parse().unwrap_or(0))
    } else {
        (s.parse().unwrap_or(0), 0)
    }
}

/// Heuristic for binary-patch markers so callers can skip hunk parsing.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

/// Result of resolving a `(path, new_line)` onto a concrete diff position.
#[derive(Debug, Clone, Copy)]
pub struct DiffPosition {
    pub side: DiffSide,
    /// Line number on `side` (new-file line for [`DiffSide::Right`], old-file
    /// line for [`DiffSide::Left`]).
    pub line: u32,
}

/// Finds the hunk-relative position for `target_new_line` within `hunks`.
///
/// Only added or context lines are valid inline-comment anchors — a removed
/// line has no corresponding position in the new file.
pub fn resolve_position(hunks: &[DiffHunk], target_new_line: u32) -> Result<DiffPosition, DiffError> {
    for hunk in hunks {
        for line in &hunk.lines {
            match line {
                DiffLine::Added { new_line, .. } if *new_line == target_new_line => {
                    return Ok(DiffPosition {
                        side: DiffSide::Right,
                        line: target_new_line,
                    });
                }
                DiffLine::Context { new_line, .. } if *new_line == target_new_line => {
                    return Ok(DiffPosition {
                        side: DiffSide::Right,
                        line: target_new_line,
                    });
                }
                _ => {}
            }
        }
    }
    Err(DiffError::TargetNotInHunk)
}
