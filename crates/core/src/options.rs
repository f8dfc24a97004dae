//! Pipeline configuration surface.
//!
//! Mirrors the teacher's `AppConfig`: a `serde`-deserializable struct with
//! per-field defaults, loadable from a TOML file, with every field also
//! settable by a CLI flag that takes precedence over the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::OptionsError;

/// The configuration surface described in spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Options {
    /// Skip phases 6-9 and A; emit everything on one branch.
    #[serde(default)]
    pub nobranch: bool,

    /// Keep commits on `refs/deleted/*` instead of pruning them in phase C.
    #[serde(default)]
    pub preserve: bool,

    /// Suppress warnings about discarded properties in phase 2.
    #[serde(default)]
    pub ignore_properties: bool,

    /// Skip phase B (ignore-property conversion) entirely.
    #[serde(default)]
    pub no_automatic_ignores: bool,

    /// Pass through user-created `.gitignore` files in phase 5.
    #[serde(default)]
    pub user_ignores: bool,

    /// Pass through `.cvsignore` files in phase 5.
    #[serde(default)]
    pub cvsignores: bool,

    /// Synthesize committer emails of the form `name@<repo-uuid>`.
    #[serde(default)]
    pub use_uuid: bool,

    /// Disable all parallel execution; every phase runs in revision order
    /// on the calling thread.
    #[serde(default)]
    pub serial: bool,

    /// Replace committer identity and timestamp with fixed test values.
    #[serde(default)]
    pub testmode: bool,

    /// Ordered set of branch patterns for the classifier.
    #[serde(default = "default_branchify")]
    pub branchify: Vec<String>,

    /// Ordered list of `(regex, replacement)` applied to branch names in
    /// phase 7, before canonicalization.
    #[serde(default)]
    pub branch_mappings: Vec<(String, String)>,
}

fn default_branchify() -> Vec<String> {
    vec![
        "trunk".to_string(),
        "branches/*".to_string(),
        "tags/*".to_string(),
    ]
}

impl Default for Options {
    fn default() -> Self {
        Self {
            nobranch: false,
            preserve: false,
            ignore_properties: false,
            no_automatic_ignores: false,
            user_ignores: false,
            cvsignores: false,
            use_uuid: false,
            serial: false,
            testmode: false,
            branchify: default_branchify(),
            branch_mappings: Vec::new(),
        }
    }
}

impl Options {
    /// Load options from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        if !path.exists() {
            return Err(OptionsError::FileNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let opts: Options = toml::from_str(&text)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Validate that every branch-mapping regex compiles.
    pub fn validate(&self) -> Result<(), OptionsError> {
        for (pattern, _) in &self.branch_mappings {
            regex_lite::Regex::new(pattern).map_err(|e| OptionsError::InvalidBranchMapping {
                pattern: pattern.clone(),
                detail: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_branchify() {
        let opts = Options::default();
        assert_eq!(opts.branchify, vec!["trunk", "branches/*", "tags/*"]);
        assert!(!opts.serial);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Options::load(Path::new("/nonexistent/svnfi.toml")).unwrap_err();
        assert!(matches!(err, OptionsError::FileNotFound(_)));
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svnfi.toml");
        std::fs::write(&path, "serial = true\nbranchify = [\"trunk\"]\n").unwrap();
        let opts = Options::load(&path).unwrap();
        assert!(opts.serial);
        assert_eq!(opts.branchify, vec!["trunk"]);
        assert!(!opts.nobranch);
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let mut opts = Options::default();
        opts.branch_mappings.push(("[".to_string(), "x".to_string()));
        assert!(opts.validate().is_err());
    }
}
