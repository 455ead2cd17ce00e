//! Static-analysis collaborator contract (Non-goal: AST/security engines
//! themselves are out of scope; this module is the narrow seam the
//! orchestrator calls into for whatever non-LLM findings a deployment wires
//! up — linters, AST checks, secret scanners).
//!
//! Findings from this seam are tagged with [`STATIC_PROVIDER`] so consensus
//! treats them as always-agreeing (§4.4: a static finding never needs a
//! second provider to surface).

use crate::models::{Finding, PrContext, STATIC_PROVIDER};

/// A pluggable non-LLM finding source. Deployments that enable
/// `enable_ast_analysis` / `enable_security` / `enable_test_hints` wire a
/// concrete implementation in; the default is the no-op below.
pub trait StaticAnalyzer {
    fn analyze(&self, pr: &PrContext) -> Vec<Finding>;
}

/// Default analyzer used when no static-analysis engine is configured.
pub struct NoopAnalyzer;

impl StaticAnalyzer for NoopAnalyzer {
    fn analyze(&self, _pr: &PrContext) -> Vec<Finding> {
        Vec::new()
    }
}

/// Stamps every finding from `analyzer` with the static-provider sentinel so
/// downstream consensus treats it as a single always-trusted source.
pub fn run_static_analysis(analyzer: &dyn StaticAnalyzer, pr: &PrContext) -> Vec<Finding> {
    let mut findings = analyzer.analyze(pr);
    for f in &mut findings {
        f.provider = Some(STATIC_PROVIDER.to_string());
        f.providers.insert(STATIC_PROVIDER.to_string());
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn noop_analyzer_yields_nothing() {
        let pr = PrContext {
            number: 1,
            title: "t".to_string(),
            body: None,
            author: "a".to_string(),
            draft: false,
            labels: BTreeSet::new(),
            files: vec![],
            unified_diff: String::new(),
            additions: 0,
            deletions: 0,
            base_sha: "b".to_string(),
            head_sha: "h".to_string(),
        };
        assert!(run_static_analysis(&NoopAnalyzer, &pr).is_empty());
    }
}
