//! Phase B — ignores: spec.md §4.4 phase B.
//!
//! Sequential: each commit's ignore state is inherited from its first
//! parent, so commits must be processed in an order where parents precede
//! children (the event list already satisfies this after phase 9).

use std::collections::{HashMap, HashSet};

use crate::model::{Blob, Commit, FileOp, NodeAction, NodeActionKind, NodeKind, RevisionRecord};

use super::context::PipelineContext;
use super::split_commits::BranchHistory;

const SVN_DEFAULT_IGNORES: &[&str] = &["*.o", "*.lo", "*.la", "*.rej", ".deps", ".libs"];

fn legacy_revision(legacy_id: &str) -> i64 {
    legacy_id
        .split('.')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

fn lines_of(text: &str) -> Vec<String> {
    text.lines().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn gitignore_body(local: &[String], global: &[String]) -> String {
    let mut out = String::new();
    for line in local {
        out.push('/');
        out.push_str(line);
        out.push('\n');
    }
    for line in global {
        out.push_str(line);
        out.push('\n');
    }
    out
}

struct MarkAllocator {
    next: u64,
}

impl MarkAllocator {
    fn alloc(&mut self) -> u64 {
        let m = self.next;
        self.next += 1;
        m
    }
}

/// Per-branch ignore state: directory path -> its own ignore lines.
#[derive(Default, Clone)]
struct BranchIgnores {
    local: HashMap<String, Vec<String>>,
    global: HashMap<String, Vec<String>>,
    gitignore_present: HashSet<String>,
}

pub fn run(
    ctx: &PipelineContext,
    revisions: &[RevisionRecord],
    commits: &mut [Commit],
    blobs: &mut Vec<Blob>,
    history: &BranchHistory,
) {
    if ctx.options.no_automatic_ignores {
        return;
    }
    ctx.progress.start_phase("ignores", commits.len() as u64);

    let by_revision: HashMap<i64, &RevisionRecord> =
        revisions.iter().map(|r| (r.revision, r)).collect();

    let next_mark = commits
        .iter()
        .map(|c| c.mark)
        .chain(blobs.iter().map(|b| b.mark))
        .max()
        .unwrap_or(0)
        + 1;
    let mut marks = MarkAllocator { next: next_mark };

    let mut state_by_mark: HashMap<u64, BranchIgnores> = HashMap::new();

    for idx in 0..commits.len() {
        if ctx.cancellation.is_cancelled() {
            break;
        }
        ctx.progress.advance(1);

        let mark = commits[idx].mark;
        let mut state = commits[idx]
            .parents
            .first()
            .and_then(|p| state_by_mark.get(p))
            .cloned()
            .unwrap_or_default();

        let Some(branch) = history.svn_branch_of.get(&mark).cloned() else {
            state_by_mark.insert(mark, state);
            continue;
        };
        let rev_num = legacy_revision(&commits[idx].legacy_id);
        let rev = by_revision.get(&rev_num).copied();

        let mut new_fileops: Vec<FileOp> = Vec::new();

        if let Some(rev) = rev {
            for node in &rev.nodes {
                if node.kind != NodeKind::Dir {
                    continue;
                }
                if ctx.classifier.split(&node.path).0 != branch {
                    continue;
                }
                let dir = node.path.trim_end_matches('/').to_string();

                if node.action == NodeActionKind::Delete || node.action == NodeActionKind::Nuke {
                    let removed: Vec<String> = state
                        .gitignore_present
                        .iter()
                        .filter(|p| p.starts_with(&dir))
                        .cloned()
                        .collect();
                    for path in removed {
                        state.gitignore_present.remove(&path);
                        state.local.remove(&path);
                        state.global.remove(&path);
                        new_fileops.push(FileOp::delete(format!("{path}/.gitignore")));
                    }
                    continue;
                }

                let Some(props) = &node.properties else {
                    continue;
                };
                let mut touched = false;
                if let Some(raw) = props.get("svn:ignore") {
                    state.local.insert(dir.clone(), lines_of(raw));
                    touched = true;
                }
                if let Some(raw) = props.get("svn:global-ignores") {
                    state.global.insert(dir.clone(), lines_of(raw));
                    touched = true;
                }
                if touched {
                    let local = state.local.get(&dir).cloned().unwrap_or_default();
                    let global = state.global.get(&dir).cloned().unwrap_or_default();
                    let body = gitignore_body(&local, &global);
                    let blob_mark = marks.alloc();
                    blobs.push(Blob {
                        mark: blob_mark,
                        data: body.into_bytes(),
                        content_hash: None,
                    });
                    new_fileops.push(FileOp::modify("100644", blob_mark, format!("{dir}/.gitignore")));
                    state.gitignore_present.insert(dir.clone());
                }
            }
        }

        if commits[idx].is_branch_root() && !state.gitignore_present.contains(&branch) {
            let body = gitignore_body(&SVN_DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect::<Vec<_>>(), &[]);
            let blob_mark = marks.alloc();
            blobs.push(Blob {
                mark: blob_mark,
                data: body.into_bytes(),
                content_hash: None,
            });
            new_fileops.push(FileOp::modify("100644", blob_mark, format!("{branch}/.gitignore")));
            state.gitignore_present.insert(branch.clone());
        }

        commits[idx].fileops.extend(new_fileops);
        state_by_mark.insert(mark, state);
    }

    ctx.progress.finish_phase();
}
