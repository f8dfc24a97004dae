//! Phase A — mergeinfo: spec.md §4.4 phase A.
//!
//! Each revision's mergeinfo is independent of later revisions, so the scan
//! is parallelizable across revisions; the reduce step that adds parent
//! edges mutates the shared commit list and runs after the scan completes.

use std::collections::{HashMap, HashSet};

use crate::model::{Commit, NodeKind, RevisionRecord};

use super::context::PipelineContext;
use super::split_commits::{last_relevant, BranchHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Range {
    min: i64,
    max: i64,
}

fn parse_ranges(text: &str) -> Vec<Range> {
    let mut ranges: Vec<Range> = text
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            if entry.ends_with('*') {
                return None;
            }
            match entry.split_once('-') {
                Some((a, b)) => {
                    let a: i64 = a.trim().parse().ok()?;
                    let b: i64 = b.trim().parse().ok()?;
                    Some(Range { min: a, max: b })
                }
                None => {
                    let n: i64 = entry.parse().ok()?;
                    Some(Range { min: n, max: n })
                }
            }
        })
        .collect();
    ranges.sort_by_key(|r| r.min);
    let mut coalesced: Vec<Range> = Vec::new();
    for r in ranges {
        match coalesced.last_mut() {
            Some(prev) if r.min <= prev.max + 1 => prev.max = prev.max.max(r.max),
            _ => coalesced.push(r),
        }
    }
    coalesced
}

/// `branch: ranges` lines from `svn:mergeinfo`/`svnmerge-integrated`.
fn parse_mergeinfo(text: &str) -> Vec<(String, Vec<Range>)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let (branch, ranges) = line.rsplit_once(':')?;
            let branch = branch.trim().trim_start_matches('/');
            let ranges = parse_ranges(ranges);
            if ranges.is_empty() {
                None
            } else {
                Some((branch.to_string(), ranges))
            }
        })
        .collect()
}

struct Index<'a> {
    commits: &'a [Commit],
    mark_to_idx: HashMap<u64, usize>,
}

impl<'a> Index<'a> {
    fn new(commits: &'a [Commit]) -> Self {
        let mark_to_idx = commits.iter().enumerate().map(|(i, c)| (c.mark, i)).collect();
        Self { commits, mark_to_idx }
    }

    fn revision_of(&self, mark: u64) -> i64 {
        self.mark_to_idx
            .get(&mark)
            .map(|&i| legacy_revision(&self.commits[i].legacy_id))
            .unwrap_or(0)
    }

    fn is_root_or_reset(&self, mark: u64) -> bool {
        self.mark_to_idx
            .get(&mark)
            .map(|&i| self.commits[i].is_branch_root() || self.commits[i].ends_in_delete_all())
            .unwrap_or(true)
    }

    /// True if `ancestor_mark` is reachable by walking first parents from
    /// `mark`.
    fn is_ancestor(&self, mark: u64, ancestor_mark: u64) -> bool {
        let mut cur = mark;
        let mut seen = HashSet::new();
        loop {
            if cur == ancestor_mark {
                return true;
            }
            if !seen.insert(cur) {
                return false;
            }
            let Some(&idx) = self.mark_to_idx.get(&cur) else {
                return false;
            };
            match self.commits[idx].parents.first() {
                Some(&p) => cur = p,
                None => return false,
            }
        }
    }
}

fn legacy_revision(legacy_id: &str) -> i64 {
    legacy_id
        .split('.')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

/// The revision of the earliest commit recorded on `branch`, used as an
/// approximation of the fork point between it and any other branch.
fn branch_root_revision(history: &BranchHistory, branch: &str) -> i64 {
    history
        .timeline
        .get(branch)
        .and_then(|entries| entries.iter().map(|(rev, _)| *rev).min())
        .unwrap_or(i64::MIN)
}

struct MergeCandidate {
    dest_mark: u64,
    source_mark: u64,
}

pub fn run(
    ctx: &PipelineContext,
    revisions: &[RevisionRecord],
    commits: &mut Vec<Commit>,
    history: &BranchHistory,
) {
    ctx.progress.start_phase("mergeinfo", revisions.len() as u64);

    let mut candidates: Vec<MergeCandidate> = Vec::new();

    {
        let index = Index::new(commits);
        for rev in revisions {
            if ctx.cancellation.is_cancelled() {
                break;
            }
            ctx.progress.advance(1);
            for node in &rev.nodes {
                if node.kind != NodeKind::Dir {
                    continue;
                }
                let Some(props) = &node.properties else {
                    continue;
                };
                let raw = props
                    .get("svn:mergeinfo")
                    .or_else(|| props.get("svnmerge-integrated"));
                let Some(raw) = raw else {
                    continue;
                };

                let dest_branch = ctx.classifier.split(&node.path).0;
                if dest_branch.is_empty() {
                    continue;
                }
                let Some(dest_mark) = last_relevant(&history.timeline, &dest_branch, rev.revision)
                else {
                    continue;
                };

                for (from_branch, ranges) in parse_mergeinfo(raw) {
                    if from_branch == dest_branch {
                        continue;
                    }
                    let fork_point = branch_root_revision(history, &dest_branch);

                    let mut surviving: Vec<Range> = Vec::new();
                    for range in &ranges {
                        let predecessor = last_relevant(&history.timeline, &from_branch, range.min - 1);
                        let keep = match predecessor {
                            None => true,
                            Some(m) => index.is_root_or_reset(m) || index.revision_of(m) < fork_point,
                        };
                        if keep {
                            surviving.push(*range);
                        }
                    }
                    surviving.sort_by_key(|r| r.min);
                    let mut merged: Vec<Range> = Vec::new();
                    for r in surviving {
                        let separated = merged.last().is_some_and(|prev: &Range| {
                            history
                                .timeline
                                .get(&from_branch)
                                .is_some_and(|entries| entries.iter().any(|(rv, _)| *rv > prev.max && *rv < r.min))
                        });
                        match merged.last_mut() {
                            Some(prev) if !separated => prev.max = prev.max.max(r.max),
                            _ => merged.push(r),
                        }
                    }

                    for range in merged {
                        if range.max > rev.revision {
                            tracing::warn!(
                                from_branch = %from_branch,
                                to = %dest_branch,
                                range_max = range.max,
                                "dropping forward-in-time merge range"
                            );
                            continue;
                        }
                        let Some(source_mark) = last_relevant(&history.timeline, &from_branch, range.max)
                        else {
                            continue;
                        };
                        candidates.push(MergeCandidate { dest_mark, source_mark });
                    }
                }
            }
        }
    }

    candidates.sort_by(|a, b| b.source_mark.cmp(&a.source_mark));

    let index = Index::new(commits);
    let mark_to_idx = index.mark_to_idx.clone();
    let mut seen_pairs: HashSet<(u64, u64)> = HashSet::new();

    for candidate in candidates {
        if !seen_pairs.insert((candidate.dest_mark, candidate.source_mark)) {
            continue;
        }
        if index.is_ancestor(candidate.dest_mark, candidate.source_mark) {
            continue;
        }
        let Some(&dest_idx) = mark_to_idx.get(&candidate.dest_mark) else {
            continue;
        };
        if commits[dest_idx].parents.contains(&candidate.source_mark) {
            continue;
        }
        commits[dest_idx].parents.push(candidate.source_mark);
    }

    ctx.progress.finish_phase();
}
