//! Phase C — de-junking: spec.md §4.4 phase C.
//!
//! Canonicalization (C2) is parallelizable per-commit; deciding which
//! commits vanish and reparenting around them (C1) touches the whole list
//! and runs as a single serial pass.

use std::collections::{HashMap, HashSet};

use crate::model::{Commit, FileOpKind, Tag};

use super::context::PipelineContext;

fn legacy_revision(legacy_id: &str) -> &str {
    legacy_id.split('.').next().unwrap_or(legacy_id)
}

fn is_cvs2svn_stamp(comment: &str) -> bool {
    comment.contains("This commit was manufactured by cvs2svn")
}

/// Drop a `Delete` immediately followed by a `Modify` on the same path
/// (the delete is subsumed), then sort the remainder by path so identical
/// commits canonicalize identically. A trailing `deleteall` (tip-delete) is
/// left untouched at the end.
fn canonicalize_fileops(commit: &mut Commit) {
    let tip_delete = commit.ends_in_delete_all();
    let tail = if tip_delete { commit.fileops.pop() } else { None };

    let mut by_path: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<_> = Vec::new();
    for op in commit.fileops.drain(..) {
        if let Some(&existing) = by_path.get(&op.path) {
            if op.op == FileOpKind::Modify {
                kept[existing] = op;
                continue;
            }
        }
        by_path.insert(op.path.clone(), kept.len());
        kept.push(op);
    }
    kept.sort_by(|a, b| a.path.cmp(&b.path));
    commit.fileops = kept;
    if let Some(t) = tail {
        commit.fileops.push(t);
    }
}

enum TagKind {
    Root,
    TipDelete,
    Empty,
}

fn default_ignore_only(commit: &Commit) -> bool {
    commit.fileops.len() == 1 && commit.fileops[0].path.ends_with("/.gitignore")
}

fn tagify_kind(commit: &Commit) -> Option<TagKind> {
    if commit.fileops.is_empty() {
        return Some(TagKind::Empty);
    }
    if commit.fileops.len() == 1 && commit.fileops[0].op == FileOpKind::DeleteAll {
        return Some(TagKind::TipDelete);
    }
    if commit.is_branch_root() && default_ignore_only(commit) {
        return Some(TagKind::Root);
    }
    None
}

fn tag_name(branch: &str, kind: &TagKind, legacy_id: &str) -> String {
    if let Some(name) = branch.strip_prefix("refs/tags/") {
        return name.to_string();
    }
    let basename = branch.rsplit('/').next().unwrap_or(branch);
    match kind {
        TagKind::Root => format!("{basename}-root"),
        TagKind::TipDelete => format!("{basename}-tipdelete"),
        TagKind::Empty => format!("emptycommit-{}", legacy_revision(legacy_id)),
    }
}

pub fn run(ctx: &PipelineContext, commits: Vec<Commit>) -> (Vec<Commit>, Vec<Tag>) {
    ctx.progress.start_phase("de-junk", commits.len() as u64);

    let mut commits = commits;
    for commit in commits.iter_mut() {
        canonicalize_fileops(commit);
    }

    let mut tags: Vec<Tag> = Vec::new();
    let mut substitute: HashMap<u64, Option<u64>> = HashMap::new();
    let mut survivors: Vec<Commit> = Vec::new();

    for commit in commits {
        if ctx.cancellation.is_cancelled() {
            survivors.push(commit);
            continue;
        }
        if is_cvs2svn_stamp(&commit.comment) {
            substitute.insert(commit.mark, commit.parents.first().copied());
            continue;
        }
        let on_deleted_ref = commit.branch.starts_with("refs/deleted/");
        match tagify_kind(&commit) {
            Some(kind) => {
                let name = tag_name(&commit.branch, &kind, &commit.legacy_id);
                if let Some(&target) = commit.parents.first() {
                    tags.push(Tag {
                        name,
                        target_mark: target,
                        tagger: commit.committer.clone(),
                        comment: commit.comment.clone(),
                    });
                }
                substitute.insert(commit.mark, commit.parents.first().copied());
            }
            None if on_deleted_ref && !ctx.options.preserve => {
                substitute.insert(commit.mark, commit.parents.first().copied());
            }
            None => {
                survivors.push(commit);
            }
        }
    }

    fn resolve(mark: u64, substitute: &HashMap<u64, Option<u64>>) -> Option<u64> {
        let mut cur = mark;
        let mut seen = HashSet::new();
        loop {
            match substitute.get(&cur) {
                None => return Some(cur),
                Some(None) => return None,
                Some(Some(next)) => {
                    if !seen.insert(cur) {
                        return None;
                    }
                    cur = *next;
                }
            }
        }
    }

    for commit in survivors.iter_mut() {
        let mut remapped: Vec<u64> = Vec::new();
        for parent in &commit.parents {
            if let Some(resolved) = resolve(*parent, &substitute) {
                if !remapped.contains(&resolved) {
                    remapped.push(resolved);
                }
            }
        }
        commit.parents = remapped;
    }
    for tag in tags.iter_mut() {
        if let Some(resolved) = resolve(tag.target_mark, &substitute) {
            tag.target_mark = resolved;
        }
    }

    ctx.progress.finish_phase();
    (survivors, tags)
}
