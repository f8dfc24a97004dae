//! Phase 8 — disambiguate deleted refs: spec.md §4.4 phase 8.
//!
//! Parallelizable across branches for the scan; the actual renames are
//! applied serially afterward so collision suffixing sees a consistent
//! view.

use std::collections::{HashMap, HashSet};

use crate::model::Commit;

use super::context::PipelineContext;

fn legacy_revision(legacy_id: &str) -> &str {
    legacy_id.split('.').next().unwrap_or(legacy_id)
}

pub fn run(ctx: &PipelineContext, commits: &mut [Commit]) {
    ctx.progress.start_phase("disambiguate-deleted-refs", commits.len() as u64);

    let mut by_branch: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, c) in commits.iter().enumerate() {
        by_branch.entry(c.branch.clone()).or_default().push(idx);
    }

    let mut used_names: HashSet<String> = HashSet::new();
    let mut rename_plan: Vec<(usize, String)> = Vec::new();

    for (branch, indices) in &by_branch {
        let mut renamed_upto = 0usize;
        for (pos, &idx) in indices.iter().enumerate() {
            if commits[idx].ends_in_delete_all() {
                let id = legacy_revision(&commits[idx].legacy_id).to_string();
                let suffix = branch.strip_prefix("refs/").unwrap_or(branch);
                let mut new_name = format!("refs/deleted/r{id}/{suffix}");
                let mut n = 2;
                while used_names.contains(&new_name) {
                    new_name = format!("refs/deleted/r{id}/{suffix}-{n}");
                    n += 1;
                }
                used_names.insert(new_name.clone());
                for &j in &indices[renamed_upto..=pos] {
                    rename_plan.push((j, new_name.clone()));
                }
                renamed_upto = pos + 1;
            }
        }
    }

    for (idx, new_name) in rename_plan {
        commits[idx].branch = new_name;
    }

    let master_has_commits = commits.iter().any(|c| c.branch == "refs/heads/master");
    if !master_has_commits {
        for c in commits.iter_mut() {
            if c.branch == "refs/heads/root" {
                c.branch = "refs/heads/master".to_string();
            }
        }
    }

    ctx.progress.finish_phase();
}
