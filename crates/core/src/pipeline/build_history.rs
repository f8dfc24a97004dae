//! Phase 3 — build filemaps: spec.md §4.4 phase 3.
//!
//! Sequential: each revision's visibility depends on the previous one.
//! Copies always source from an already-snapshotted, earlier revision
//! (`from_rev < revision`, spec.md §8), so recording a copy node's
//! `file_set` needs no second pass over the same revision: the source
//! subtree is already frozen in `history.visible_at(from_rev)`.

use crate::history::History;
use crate::model::{NodeActionKind, RevisionRecord};

use super::context::PipelineContext;

pub fn run(ctx: &PipelineContext, revisions: &mut [RevisionRecord]) -> History {
    let mut history = History::new();
    ctx.progress.start_phase("build-history", revisions.len() as u64);

    for rev in revisions.iter_mut() {
        if ctx.cancellation.is_cancelled() {
            return history;
        }
        for node in rev.nodes.iter_mut() {
            let node_ref = node.node_ref();
            match node.action {
                NodeActionKind::Add | NodeActionKind::Replace => {
                    if node.action == NodeActionKind::Replace {
                        let deleted = history.here().collect_prefixed(&node.path);
                        node.deleted_file_set = Some(
                            deleted
                                .into_iter()
                                .map(|(p, r)| (join(&node.path, &p), r))
                                .collect(),
                        );
                        history.here_mut().remove(&node.path);
                    }
                    if node.is_copy() {
                        let from_rev = node.from_rev.unwrap_or(0);
                        let from_path = node.from_path.clone().unwrap_or_default();
                        if let Some(src) = history.visible_at(from_rev).cloned() {
                            let copied = src.collect_prefixed(&from_path);
                            history.here_mut().copy_from(&node.path, &src, &from_path);
                            let mut file_set: Vec<_> = copied
                                .into_iter()
                                .map(|(p, r)| (join(&node.path, &p), r))
                                .collect();
                            file_set.sort_by(|a, b| a.0.cmp(&b.0));
                            node.file_set = Some(file_set);
                        }
                    } else {
                        history.here_mut().set(&node.path, node_ref);
                    }
                }
                NodeActionKind::Change => {
                    history.here_mut().set(&node.path, node_ref);
                }
                NodeActionKind::Delete => {
                    let deleted = history.here().collect_prefixed(&node.path);
                    node.file_set = Some(
                        deleted
                            .into_iter()
                            .map(|(p, r)| (join(&node.path, &p), r))
                            .collect(),
                    );
                    history.here_mut().remove(&node.path);
                }
                NodeActionKind::None | NodeActionKind::Nuke => {}
            }
        }
        history.snapshot_revision(rev.revision);
        ctx.progress.advance(1);
    }
    ctx.progress.finish_phase();
    history
}

fn join(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{suffix}")
    }
}
