//! Branch classifier: spec.md §4.2.
//!
//! Precomputes two lookup sets from the `branchify` patterns so every
//! `is_declared_branch` query is a handful of `HashSet` probes rather than
//! a scan over the pattern list: `literals` for patterns with no wildcard,
//! and `namespaces` for patterns of the form `prefix/*` (or the lone `*`,
//! represented here as the empty-string namespace, i.e. "any top-level
//! single component").

use std::collections::HashSet;

/// Classifies paths into SVN branches per a set of `branchify` patterns.
#[derive(Debug, Clone)]
pub struct BranchClassifier {
    literals: HashSet<String>,
    namespaces: HashSet<String>,
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

impl BranchClassifier {
    pub fn new(patterns: &[String]) -> Self {
        let mut literals = HashSet::new();
        let mut namespaces = HashSet::new();
        for raw in patterns {
            let trimmed = raw.trim_end_matches('/');
            if trimmed == "*" {
                namespaces.insert(String::new());
            } else if let Some(ns) = trimmed.strip_suffix("/*") {
                namespaces.insert(ns.trim_end_matches('/').to_string());
            } else {
                literals.insert(trimmed.trim_start_matches('/').to_string());
            }
        }
        Self {
            literals,
            namespaces,
        }
    }

    /// True iff `path` exactly matches a literal pattern, or is an
    /// immediate child of a `/*` (or lone `*`) namespace. The namespace
    /// path itself never qualifies.
    pub fn is_declared_branch(&self, path: &str) -> bool {
        let p = normalize(path);
        if p.is_empty() {
            return false;
        }
        if self.literals.contains(&p) {
            return true;
        }
        let parent = match p.rfind('/') {
            Some(idx) => &p[..idx],
            None => "",
        };
        self.namespaces.contains(parent)
    }

    /// The longest prefix of `path` that is a declared branch, and the
    /// remainder. `("", path)` if no prefix qualifies.
    pub fn split(&self, path: &str) -> (String, String) {
        let p = normalize(path);
        let segs: Vec<&str> = p.split('/').filter(|s| !s.is_empty()).collect();
        for len in (1..=segs.len()).rev() {
            let candidate = segs[..len].join("/");
            if self.is_declared_branch(&candidate) {
                let sub = segs[len..].join("/");
                return (candidate, sub);
            }
        }
        (String::new(), p)
    }
}
