//! The twelve-phase translation pipeline: spec.md §4.4, data flow per §2.

pub mod build_history;
pub mod context;
pub mod dejunk;
pub mod disambiguate;
pub mod expand_copies;
pub mod filter_properties;
pub mod generate_commits;
pub mod ignores;
pub mod link_fixups;
pub mod mergeinfo;
pub mod renumber;
pub mod rename_branches;
pub mod split_commits;

use std::collections::HashMap;

use crate::dump::DumpParseResult;
use crate::model::{Commit, Event, RevisionRecord};

pub use context::PipelineContext;
pub use split_commits::BranchHistory;

/// What a full pipeline run produced.
pub enum RunOutcome {
    Completed(Vec<Event>),
    Cancelled,
}

fn single_branch_history(commits: &[Commit]) -> BranchHistory {
    let mut history = BranchHistory {
        timeline: HashMap::new(),
        svn_branch_of: HashMap::new(),
    };
    for commit in commits {
        history.svn_branch_of.insert(commit.mark, String::new());
    }
    history
}

/// Run every phase in sequence on an already-parsed dump.
pub fn run(ctx: &PipelineContext, parsed: DumpParseResult) -> RunOutcome {
    let mut revisions: Vec<RevisionRecord> = parsed.revisions;

    filter_properties::run(ctx, &mut revisions);
    if ctx.cancellation.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    let history = build_history::run(ctx, &mut revisions);
    if ctx.cancellation.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    expand_copies::run(ctx, &mut revisions, &history);
    if ctx.cancellation.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    let generate_commits::GenResult { mut blobs, mut commits } = generate_commits::run(ctx, &revisions);
    if ctx.cancellation.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    if commits.is_empty() {
        return RunOutcome::Completed(vec![Event::Passthrough(
            "# empty SVN history: revision 0 only".to_string(),
        )]);
    }

    let branch_history = if ctx.options.nobranch {
        for commit in commits.iter_mut() {
            commit.branch = "refs/heads/master".to_string();
        }
        single_branch_history(&commits)
    } else {
        let history = split_commits::run(ctx, &mut commits);
        if ctx.cancellation.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        rename_branches::run(ctx, &mut commits);
        if ctx.cancellation.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        disambiguate::run(ctx, &mut commits);
        if ctx.cancellation.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        link_fixups::run(ctx, &revisions, &mut commits, &history);
        if ctx.cancellation.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        mergeinfo::run(ctx, &revisions, &mut commits, &history);
        if ctx.cancellation.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        history
    };

    ignores::run(ctx, &revisions, &mut commits, &mut blobs, &branch_history);
    if ctx.cancellation.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    let (commits, tags) = dejunk::run(ctx, commits);
    if ctx.cancellation.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    let events = renumber::run(ctx, blobs, commits, tags, Vec::new());
    RunOutcome::Completed(events)
}
