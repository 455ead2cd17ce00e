//! Review synthesis (§3/§4.9 stage 10): assembles the consensus findings and
//! per-provider call results into the final [`Review`] the poster publishes.

use crate::models::{Finding, Metrics, ProviderResult, ProviderStatus, Review, Severity};

/// Builds the final [`Review`] from consensus-merged findings and the raw
/// per-provider results (for metrics and the summary's per-provider table).
pub fn synthesize(
    findings: Vec<Finding>,
    inline_comments: Vec<crate::models::InlineComment>,
    provider_results: Vec<ProviderResult>,
    metrics: Metrics,
) -> Review {
    let summary = build_summary(&findings, &provider_results);
    let action_items = build_action_items(&findings);

    Review {
        summary,
        findings,
        inline_comments,
        action_items,
        metrics,
        provider_results,
    }
}

/// Markdown run summary: counts by severity, per-provider status table.
fn build_summary(findings: &[Finding], provider_results: &[ProviderResult]) -> String {
    let critical = findings.iter().filter(|f| f.severity == Severity::Critical).count();
    let major = findings.iter().filter(|f| f.severity == Severity::Major).count();
    let minor = findings.iter().filter(|f| f.severity == Severity::Minor).count();

    let mut out = String::new();
    out.push_str("## Automated review summary\n\n");
    out.push_str(&format!(
        "Found **{}** issue(s): {} critical, {} major, {} minor.\n\n",
        findings.len(),
        critical,
        major,
        minor
    ));

    out.push_str("| Provider | Status | Duration |\n|---|---|---|\n");
    for r in provider_results {
        out.push_str(&format!(
            "| {} | {} | {}ms |\n",
            r.provider,
            status_label(r.status),
            r.duration_ms
        ));
    }

    out
}

fn status_label(status: ProviderStatus) -> &'static str {
    match status {
        ProviderStatus::Success => "ok",
        ProviderStatus::Error => "error",
        ProviderStatus::Timeout => "timeout",
        ProviderStatus::RateLimited => "rate limited",
        ProviderStatus::Skipped => "skipped",
    }
}

/// One action item per critical finding, sorted by path then line — these
/// are the items worth calling out even if the full findings list is long.
fn build_action_items(findings: &[Finding]) -> Vec<String> {
    let mut critical: Vec<&Finding> = findings.iter().filter(|f| f.severity == Severity::Critical).collect();
    critical.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
    critical
        .into_iter()
        .map(|f| format!("{}:{} — {}", f.path, f.line, f.title))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn finding(severity: Severity, path: &str, line: u32, title: &str) -> Finding {
        Finding {
            path: path.to_string(),
            line,
            severity,
            title: title.to_string(),
            message: "msg".to_string(),
            suggestion: None,
            provider: None,
            providers: BTreeSet::new(),
            confidence: Some(1.0),
            category: None,
        }
    }

    #[test]
    fn summary_counts_findings_by_severity() {
        let findings = vec![
            finding(Severity::Critical, "a.rs", 1, "x"),
            finding(Severity::Minor, "b.rs", 2, "y"),
        ];
        let review = synthesize(findings, vec![], vec![], Metrics::default());
        assert!(review.summary.contains("Found **2** issue(s): 1 critical, 0 major, 1 minor"));
    }

    #[test]
    fn action_items_are_only_critical_and_sorted() {
        let findings = vec![
            finding(Severity::Critical, "b.rs", 5, "later"),
            finding(Severity::Critical, "a.rs", 1, "earlier"),
            finding(Severity::Minor, "c.rs", 1, "ignored"),
        ];
        let review = synthesize(findings, vec![], vec![], Metrics::default());
        assert_eq!(review.action_items, vec!["a.rs:1 — earlier".to_string(), "b.rs:5 — later".to_string()]);
    }
}
