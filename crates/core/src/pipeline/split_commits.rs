//! Phase 6 — split mixed commits: spec.md §4.4 phase 6.
//!
//! Detection (classifying every fileop's branch) is parallelizable across
//! commits; splitting itself mutates the commit list in place and must run
//! serially in reverse index order so earlier splits don't shift the
//! indices later splits still need.

use std::collections::HashMap;

use crate::model::{Commit, FileOpKind};

use super::context::PipelineContext;

/// For each SVN branch, the ordered `(revision, mark)` history of commits
/// assigned to it. Carried forward past phase 6 so later phases can answer
/// "last relevant commit on branch B at revision <= R" without re-deriving
/// it from the live, renamed `Commit.branch` field.
pub type BranchTimeline = HashMap<String, Vec<(i64, u64)>>;

/// Phase 6's output: the branch timeline plus each commit's pre-rename SVN
/// branch, needed by phases 9 and A after phase 7 overwrites `Commit.branch`
/// with the canonical git ref.
pub struct BranchHistory {
    pub timeline: BranchTimeline,
    pub svn_branch_of: HashMap<u64, String>,
}

pub fn last_relevant(timeline: &BranchTimeline, branch: &str, max_rev: i64) -> Option<u64> {
    let entries = timeline.get(branch)?;
    entries
        .iter()
        .rev()
        .find(|(rev, _)| *rev <= max_rev)
        .map(|(_, mark)| *mark)
}

fn classify_fileop_branch(ctx: &PipelineContext, path: &str) -> String {
    ctx.classifier.split(path).0
}

fn legacy_revision(legacy_id: &str) -> i64 {
    legacy_id
        .split('.')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

struct Clique {
    branch: String,
    start: usize,
    end: usize,
}

fn detect_cliques(ctx: &PipelineContext, commit: &mut Commit) -> Vec<Clique> {
    for op in commit.fileops.iter_mut() {
        op.svn_branch = Some(if op.op == FileOpKind::DeleteAll {
            op.path.clone()
        } else {
            classify_fileop_branch(ctx, &op.path)
        });
    }
    let mut cliques: Vec<Clique> = Vec::new();
    for (i, op) in commit.fileops.iter().enumerate() {
        let branch = op.svn_branch.clone().unwrap_or_default();
        match cliques.last_mut() {
            Some(c) if c.branch == branch => c.end = i,
            _ => cliques.push(Clique {
                branch,
                start: i,
                end: i,
            }),
        }
    }
    cliques
}

const SPLIT_MARKER: &str = "[[Split portion of a mixed commit.]]";

pub fn run(ctx: &PipelineContext, commits: &mut Vec<Commit>) -> BranchHistory {
    ctx.progress.start_phase("split-commits", commits.len() as u64);

    let mut next_mark = commits.iter().map(|c| c.mark).max().unwrap_or(0) + 1;

    let mut i = 0;
    while i < commits.len() {
        if ctx.cancellation.is_cancelled() {
            break;
        }
        let cliques = detect_cliques(ctx, &mut commits[i]);
        if cliques.len() <= 1 {
            match cliques.first() {
                Some(c) => commits[i].branch = c.branch.clone(),
                // No fileops to classify (a bare directory add/change with
                // no file content) — phase 5 already stamped `branch` with
                // the one SVN branch its nodes touched; nothing to compute.
                None => {}
            }
            i += 1;
            continue;
        }

        let original = commits.remove(i);
        let mut fragments = Vec::with_capacity(cliques.len());
        for (n, clique) in cliques.iter().enumerate() {
            let mark = if n == 0 { original.mark } else { next_mark };
            if n != 0 {
                next_mark += 1;
            }
            let mut comment = original.comment.clone();
            if !comment.ends_with('\n') {
                comment.push('\n');
            }
            comment.push_str(SPLIT_MARKER);
            comment.push('\n');
            fragments.push(Commit {
                mark,
                legacy_id: format!("{}.{}", original.legacy_id, n + 1),
                branch: clique.branch.clone(),
                committer: original.committer.clone(),
                author: original.author.clone(),
                comment,
                fileops: original.fileops[clique.start..=clique.end].to_vec(),
                parents: original.parents.clone(),
                properties: original.properties.clone(),
            });
        }
        for (offset, fragment) in fragments.into_iter().enumerate() {
            commits.insert(i + offset, fragment);
        }
        i += cliques.len();
    }

    let mut timeline: BranchTimeline = HashMap::new();
    let mut svn_branch_of: HashMap<u64, String> = HashMap::new();
    let mut last_on_branch: HashMap<String, u64> = HashMap::new();
    let mut mark_to_index: HashMap<u64, usize> = HashMap::new();

    for idx in 0..commits.len() {
        let branch = commits[idx].branch.clone();
        let revision = legacy_revision(&commits[idx].legacy_id);
        let parent_mark = last_on_branch.get(&branch).copied();

        let parent_ended_in_delete_all = parent_mark
            .and_then(|m| mark_to_index.get(&m))
            .map(|&pidx| commits[pidx].ends_in_delete_all())
            .unwrap_or(false);

        commits[idx].parents = match parent_mark {
            Some(m) if !parent_ended_in_delete_all => vec![m],
            _ => Vec::new(),
        };

        timeline.entry(branch.clone()).or_default().push((revision, commits[idx].mark));
        svn_branch_of.insert(commits[idx].mark, branch.clone());
        last_on_branch.insert(branch, commits[idx].mark);
        mark_to_index.insert(commits[idx].mark, idx);
    }

    ctx.progress.finish_phase();
    BranchHistory { timeline, svn_branch_of }
}
