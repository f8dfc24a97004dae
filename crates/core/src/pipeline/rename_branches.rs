//! Phase 7 — rename branches: spec.md §4.4 phase 7.
//!
//! Parallelizable: each commit's new branch name depends only on its own
//! current (SVN) branch name, never on another commit.

use regex_lite::Regex;

use crate::model::Commit;
use crate::options::Options;

use super::context::PipelineContext;

/// Apply user branch-mapping regexes, then canonicalize to a git ref name.
pub fn canonical_ref(svn_branch: &str, options: &Options) -> String {
    let mut name = svn_branch.to_string();
    for (pattern, replacement) in &options.branch_mappings {
        if let Ok(re) = Regex::new(pattern) {
            name = re.replace_all(&name, replacement.as_str()).into_owned();
        }
    }
    if name == "trunk" {
        return "refs/heads/master".to_string();
    }
    if let Some(rest) = name.strip_prefix("tags/") {
        return format!("refs/tags/{rest}");
    }
    if let Some(rest) = name.strip_prefix("branches/") {
        return format!("refs/heads/{rest}");
    }
    if name.is_empty() {
        return "refs/heads/root".to_string();
    }
    format!("refs/heads/{name}")
}

pub fn run(ctx: &PipelineContext, commits: &mut [Commit]) {
    ctx.progress.start_phase("rename-branches", commits.len() as u64);
    let refs: Vec<String> = ctx
        .scheduler
        .map(commits, |c| canonical_ref(&c.branch, &ctx.options));
    for (commit, git_ref) in commits.iter_mut().zip(refs) {
        commit.branch = git_ref;
        ctx.progress.advance(1);
    }
    ctx.progress.finish_phase();
}
