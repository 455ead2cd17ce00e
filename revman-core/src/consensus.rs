//! Dedup and cross-provider consensus (C7, §4.4).
//!
//! Stage A pools every finding (from every provider and the static
//! collaborator) keyed by `(path, line, title)` and unions their `providers`
//! sets on collision, keeping all other fields from the first occurrence —
//! mirrors the teacher's `review::mod::dedup_in_place` shape but merges
//! attribution instead of picking a single winner wholesale.
//!
//! Stage B applies the severity floor and agreement gate, combines
//! confidence, and sorts by severity rank descending with dedup-order ties.

use crate::models::{Finding, Severity};

/// Stage A: pools findings across all sources, unioning `providers` on key
/// collision. Input order determines which occurrence's non-attribution
/// fields win (first occurrence wins), and is preserved for output order.
pub fn dedup(findings: Vec<Finding>) -> Vec<Finding> {
    let mut out: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut index_of_key: std::collections::HashMap<(String, u32, String), usize> =
        std::collections::HashMap::new();

    for finding in findings {
        let key = finding.dedup_key();
        if let Some(&idx) = index_of_key.get(&key) {
            let existing = &mut out[idx];
            existing.providers.extend(finding.providers.iter().cloned());
            if let Some(p) = finding.provider {
                existing.providers.insert(p);
            }
        } else {
            index_of_key.insert(key, out.len());
            let mut f = finding;
            if let Some(p) = f.provider.clone() {
                f.providers.insert(p);
            }
            out.push(f);
        }
    }
    out
}

/// Stage B: severity floor + agreement gate + confidence combination, then
/// canonical sort (severity rank descending, dedup-order ties preserved).
///
/// `min_severity_rank` is the effective floor — callers pass
/// `max(config.inline_min_severity, intensity.severity_floor())` per §4.5.
pub fn consensus(mut findings: Vec<Finding>, min_severity_rank: u8, min_agreement: usize) -> Vec<Finding> {
    findings.retain(|f| f.severity.rank() >= min_severity_rank);

    findings.retain(|f| {
        f.providers.contains(crate::models::STATIC_PROVIDER)
            || f.providers.len() >= min_agreement
            || f.providers.len() == 1
    });

    for f in &mut findings {
        f.confidence = Some(combine_confidence(f.providers.len(), f.confidence));
    }

    // Severity rank descending, then canonically by (path, line, title) so the
    // output is independent of input order, not just of dedup-stage insertion
    // order (Testable Property 1).
    findings.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.title.cmp(&b.title))
    });
    findings
}

/// §4.4: combined confidence is `min(1.0, sum of per-source confidences)`,
/// each source defaulting to 0.5 if unset (1.0 on first insert, which here
/// is approximated by treating a single-source finding's own confidence
/// verbatim when present).
fn combine_confidence(provider_count: usize, existing: Option<f32>) -> f32 {
    if provider_count <= 1 {
        return existing.unwrap_or(1.0).min(1.0);
    }
    let per_source = existing.unwrap_or(0.5);
    (per_source * provider_count as f32).min(1.0)
}

/// Deterministic provider rotation (§4.3/Testable Property 3):
/// `rotate(providers, prNumber mod len)[0:limit]`.
pub fn select_provider_subset(providers: &[String], pr_number: u64, limit: usize) -> Vec<String> {
    if providers.is_empty() {
        return Vec::new();
    }
    let start = (pr_number as usize) % providers.len();
    let rotated: Vec<String> = providers[start..]
        .iter()
        .chain(providers[..start].iter())
        .cloned()
        .collect();
    let take = if limit == 0 { rotated.len() } else { limit.min(rotated.len()) };
    rotated.into_iter().take(take).collect()
}
