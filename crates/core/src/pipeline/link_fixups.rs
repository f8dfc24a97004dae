//! Phase 9 — link fixups: spec.md §4.4 phase 9.
//!
//! Sequential: conceptually writes into a shared branch-roots map, so runs
//! as a single pass over commits in order rather than split across workers.

use std::collections::HashMap;

use crate::model::{Commit, NodeAction, NodeKind, RevisionRecord};

use super::context::PipelineContext;
use super::split_commits::{last_relevant, BranchHistory};

fn legacy_revision(legacy_id: &str) -> i64 {
    legacy_id
        .split('.')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

fn trim(path: &str) -> &str {
    path.trim_matches('/')
}

fn directory_self_copy<'a>(nodes: &'a [NodeAction], branch: &str) -> Option<&'a NodeAction> {
    nodes.iter().find(|n| {
        n.kind == NodeKind::Dir
            && trim(&n.path) == branch
            && n.from_rev.is_some_and(|r| r != 0)
            && n.from_path.is_some()
    })
}

struct CopySource {
    branch: String,
    from_rev: i64,
}

fn file_copy_sources(ctx: &PipelineContext, nodes: &[NodeAction], dest_branch: &str) -> Vec<CopySource> {
    nodes
        .iter()
        .filter(|n| n.kind == NodeKind::File && n.is_copy())
        .filter(|n| ctx.classifier.split(&n.path).0 == dest_branch)
        .filter_map(|n| {
            let from_path = n.from_path.as_deref()?;
            let from_rev = n.from_rev?;
            let branch = ctx.classifier.split(from_path).0;
            if branch.is_empty() {
                None
            } else {
                Some(CopySource { branch, from_rev })
            }
        })
        .collect()
}

pub fn run(
    ctx: &PipelineContext,
    revisions: &[RevisionRecord],
    commits: &mut [Commit],
    history: &BranchHistory,
) {
    ctx.progress.start_phase("link-fixups", commits.len() as u64);

    let by_revision: HashMap<i64, &RevisionRecord> =
        revisions.iter().map(|r| (r.revision, r)).collect();

    for idx in 0..commits.len() {
        if ctx.cancellation.is_cancelled() {
            break;
        }
        ctx.progress.advance(1);
        if !commits[idx].is_branch_root() {
            continue;
        }
        let mark = commits[idx].mark;
        let Some(branch) = history.svn_branch_of.get(&mark).cloned() else {
            continue;
        };
        let rev_num = legacy_revision(&commits[idx].legacy_id);
        let Some(rev) = by_revision.get(&rev_num) else {
            continue;
        };

        if let Some(node) = directory_self_copy(&rev.nodes, &branch) {
            let from_path = node.from_path.clone().unwrap_or_default();
            let from_rev = node.from_rev.unwrap_or(0);
            let source_branch = ctx.classifier.split(&from_path).0;
            if let Some(parent_mark) = last_relevant(&history.timeline, &source_branch, from_rev) {
                if branch.starts_with("refs/tags/") {
                    // A tag ref never carries its own tree; a pure directory
                    // copy onto one needs no deleteall/recreate, only the
                    // parent link, so phase C's tagify sees it as empty.
                    commits[idx].fileops.clear();
                } else {
                    commits[idx].fileops.insert(0, crate::model::FileOp::delete_all(branch.clone()));
                }
                commits[idx].parents = vec![parent_mark];
                continue;
            }
        }

        let sources = file_copy_sources(ctx, &rev.nodes, &branch);
        if sources.is_empty() {
            continue;
        }
        let first_branch = &sources[0].branch;
        if !sources.iter().all(|s| &s.branch == first_branch) {
            continue;
        }
        let min_rev = sources.iter().map(|s| s.from_rev).min().unwrap();
        let max_rev = sources.iter().map(|s| s.from_rev).max().unwrap();
        if min_rev != max_rev {
            tracing::warn!(
                branch = %branch,
                source_branch = %first_branch,
                min_rev,
                max_rev,
                "copy sources disagree on revision; possible staggered cvs2svn-style copy"
            );
        }
        if let Some(parent_mark) = last_relevant(&history.timeline, first_branch, max_rev) {
            commits[idx].parents = vec![parent_mark];
        }
    }

    ctx.progress.finish_phase();
}
