//! Phase D — renumber: spec.md §4.4 phase D.
//!
//! The renumbering map itself is built serially (mark order matters), but
//! rewriting each event's own references is independent per event once the
//! map exists.

use std::collections::HashMap;

use crate::model::{Blob, Commit, Event, Reset, Tag};

use super::context::PipelineContext;

pub fn run(ctx: &PipelineContext, blobs: Vec<Blob>, commits: Vec<Commit>, tags: Vec<Tag>, resets: Vec<Reset>) -> Vec<Event> {
    let total = blobs.len() + commits.len() + tags.len() + resets.len();
    ctx.progress.start_phase("renumber", total as u64);

    let mut renumber: HashMap<u64, u64> = HashMap::new();
    let mut next = 1u64;
    for blob in &blobs {
        renumber.insert(blob.mark, next);
        next += 1;
    }
    for commit in &commits {
        renumber.insert(commit.mark, next);
        next += 1;
    }

    let remap = |mark: u64| -> u64 { renumber.get(&mark).copied().unwrap_or(mark) };

    let mut events: Vec<Event> = Vec::with_capacity(total);
    for mut blob in blobs {
        blob.mark = remap(blob.mark);
        ctx.progress.advance(1);
        events.push(Event::Blob(blob));
    }
    for mut commit in commits {
        commit.mark = remap(commit.mark);
        commit.parents = commit.parents.into_iter().map(remap).collect();
        for op in commit.fileops.iter_mut() {
            if let Some(m) = op.blob_mark {
                op.blob_mark = Some(remap(m));
            }
        }
        ctx.progress.advance(1);
        events.push(Event::Commit(commit));
    }
    for mut tag in tags {
        tag.target_mark = remap(tag.target_mark);
        ctx.progress.advance(1);
        events.push(Event::Tag(tag));
    }
    for mut reset in resets {
        reset.target_mark = reset.target_mark.map(remap);
        ctx.progress.advance(1);
        events.push(Event::Reset(reset));
    }

    ctx.progress.finish_phase();
    events
}
