//! Path-based intensity matching (§4.5).
//!
//! Compiles the configured `(glob, intensity)` rules into a [`GlobSet`] once
//! per run and memoizes per-path lookups, since the same path can be queried
//! repeatedly across consensus/suppression/poster stages.

use std::collections::HashMap;
use std::sync::Mutex;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::PathIntensityRule;
use crate::models::Intensity;

/// Compiled path-intensity rule set with a memoized lookup cache.
pub struct PathMatcher {
    set: Option<GlobSet>,
    /// Parallel to `set`'s match indices: rule at globset index `i`.
    rules: Vec<PathIntensityRule>,
    default_intensity: Intensity,
    cache: Mutex<HashMap<String, Intensity>>,
}

impl PathMatcher {
    /// Builds a matcher from configured rules. Invalid globs are skipped
    /// rather than failing the whole run.
    pub fn new(rules: &[PathIntensityRule], default_intensity: Intensity) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(rules.len());
        for rule in rules {
            if let Ok(g) = Glob::new(&rule.glob) {
                builder.add(g);
                kept.push(rule.clone());
            }
        }
        let set = builder.build().ok();
        Self {
            set,
            rules: kept,
            default_intensity,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the intensity for `path`, taking the highest-ranked match
    /// among all rules that match (spec §4.5: highest intensity wins on
    /// overlap), or the configured default when nothing matches.
    pub fn intensity_for(&self, path: &str) -> Intensity {
        if let Some(hit) = self.cache.lock().expect("path matcher mutex poisoned").get(path) {
            return *hit;
        }

        let intensity = match &self.set {
            Some(set) => {
                let matches = set.matches(path);
                matches
                    .into_iter()
                    .map(|idx| self.rules[idx].intensity)
                    .max_by_key(|i| i.rank())
                    .unwrap_or(self.default_intensity)
            }
            None => self.default_intensity,
        };

        self.cache
            .lock()
            .expect("path matcher mutex poisoned")
            .insert(path.to_string(), intensity);
        intensity
    }

    /// Highest intensity across all `paths`, used to pick one intensity for
    /// an entire PR run from its changed files.
    pub fn intensity_for_paths<'a>(&self, paths: impl Iterator<Item = &'a str>) -> Intensity {
        paths
            .map(|p| self.intensity_for(p))
            .max_by_key(|i| i.rank())
            .unwrap_or(self.default_intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(glob: &str, intensity: Intensity) -> PathIntensityRule {
        PathIntensityRule {
            glob: glob.to_string(),
            intensity,
            description: String::new(),
        }
    }

    #[test]
    fn matches_highest_ranked_rule_on_overlap() {
        let rules = vec![
            rule("**/*.rs", Intensity::Standard),
            rule("**/security/**", Intensity::Thorough),
        ];
        let matcher = PathMatcher::new(&rules, Intensity::Light);
        assert_eq!(matcher.intensity_for("src/security/auth.rs"), Intensity::Thorough);
    }

    #[test]
    fn falls_back_to_default_when_nothing_matches() {
        let matcher = PathMatcher::new(&[], Intensity::Standard);
        assert_eq!(matcher.intensity_for("README.md"), Intensity::Standard);
    }

    #[test]
    fn pr_wide_intensity_is_the_max_over_files() {
        let rules = vec![rule("**/tests/**", Intensity::Light)];
        let matcher = PathMatcher::new(&rules, Intensity::Standard);
        let picked = matcher.intensity_for_paths(vec!["tests/a.rs", "src/main.rs"].into_iter());
        assert_eq!(picked, Intensity::Standard);
    }
}
