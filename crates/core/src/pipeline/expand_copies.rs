//! Phase 4 — expand copies: spec.md §4.4 phase 4.
//!
//! Parallelizable across revisions (phase 3 already removed the
//! revision-order dependency by freezing one `PathMap` snapshot per
//! revision), but the ancestor sweep needs each revision's *own* expanded
//! node list in order, so expansion and ancestry run revision-by-revision
//! here rather than through `Scheduler::map`, matching the teacher's
//! preference for a straightforward sequential loop when the payoff of
//! parallelizing is marginal against the complexity it would add.

use std::collections::HashMap;

use crate::history::History;
use crate::model::{NodeAction, NodeActionKind, NodeKind, NodeRef, RevisionRecord};

use super::context::PipelineContext;

fn trim_trailing_slash(path: &str) -> &str {
    path.trim_end_matches('/')
}

fn ensure_trailing_slash(path: &mut String) {
    if !path.ends_with('/') {
        path.push('/');
    }
}

fn lookup<'a>(
    earlier: &'a [RevisionRecord],
    rev_index: &HashMap<i64, usize>,
    r: NodeRef,
) -> Option<&'a NodeAction> {
    let idx = *rev_index.get(&r.revision)?;
    earlier.get(idx)?.nodes.get(r.index)
}

fn synth_delete(path: String, revision: i64, index: usize) -> NodeAction {
    NodeAction {
        path,
        from_path: None,
        from_rev: None,
        content_hash: None,
        blob: None,
        properties: None,
        file_set: None,
        deleted_file_set: None,
        blob_mark: None,
        revision,
        index,
        from_index: None,
        kind: NodeKind::File,
        action: NodeActionKind::Delete,
        prop_change: false,
        ancestor: None,
    }
}

fn synth_add(
    dest_path: String,
    source: &NodeAction,
    source_ref: NodeRef,
    revision: i64,
    index: usize,
) -> NodeAction {
    NodeAction {
        path: dest_path,
        from_path: Some(source.path.clone()),
        from_rev: Some(source_ref.revision),
        content_hash: source.content_hash.clone(),
        blob: None,
        properties: source.properties.clone(),
        file_set: None,
        deleted_file_set: None,
        blob_mark: None,
        revision,
        index,
        from_index: Some(source_ref.index),
        kind: NodeKind::File,
        action: NodeActionKind::Add,
        prop_change: false,
        ancestor: None,
    }
}

pub fn run(ctx: &PipelineContext, revisions: &mut [RevisionRecord], history: &History) {
    ctx.progress.start_phase("expand-copies", revisions.len() as u64);

    let mut rev_index = HashMap::new();
    let rev_numbers: Vec<i64> = revisions.iter().map(|r| r.revision).collect();
    for (i, r) in rev_numbers.iter().enumerate() {
        rev_index.insert(*r, i);
    }

    for idx in 0..revisions.len() {
        if ctx.cancellation.is_cancelled() {
            return;
        }
        let prev_rev = if idx > 0 { Some(rev_numbers[idx - 1]) } else { None };
        let (earlier, rest) = revisions.split_at_mut(idx);
        let current = &mut rest[0];
        let rev = current.revision;

        let original_len = current.nodes.len();
        let mut synthetic: Vec<NodeAction> = Vec::new();

        for i in 0..original_len {
            {
                let node = &mut current.nodes[i];
                if node.kind == NodeKind::Dir {
                    ensure_trailing_slash(&mut node.path);
                    if let Some(fp) = node.from_path.as_mut() {
                        ensure_trailing_slash(fp);
                    }
                }
            }
            let node = &current.nodes[i];
            if node.kind == NodeKind::Dir
                && matches!(node.action, NodeActionKind::Delete | NodeActionKind::Replace)
            {
                let is_branch = ctx.classifier.is_declared_branch(trim_trailing_slash(&node.path));
                if is_branch {
                    current.nodes[i].action = NodeActionKind::Nuke;
                } else {
                    // A plain delete's removed subtree lives in `file_set`; a
                    // replace's lives in `deleted_file_set` since `file_set`
                    // holds the new copied-in subtree for a replace-by-copy.
                    let removed = match node.action {
                        NodeActionKind::Replace => node.deleted_file_set.clone(),
                        _ => node.file_set.clone(),
                    };
                    if let Some(file_set) = removed {
                        for (path, _) in file_set {
                            let next_index = original_len + synthetic.len();
                            synthetic.push(synth_delete(path, rev, next_index));
                        }
                    }
                }
            }
            let node = &current.nodes[i];
            if node.kind == NodeKind::Dir
                && node.is_copy()
                && matches!(node.action, NodeActionKind::Add | NodeActionKind::Replace)
            {
                if let Some(file_set) = node.file_set.clone() {
                    for (path, source_ref) in file_set {
                        let Some(source) = lookup(earlier, &rev_index, source_ref) else {
                            tracing::warn!(path = %path, "unresolved copy source during expansion");
                            continue;
                        };
                        let next_index = original_len + synthetic.len();
                        synthetic.push(synth_add(path, source, source_ref, rev, next_index));
                    }
                }
            }
        }

        current.nodes.extend(synthetic);

        let mut seen: HashMap<String, NodeRef> = HashMap::new();
        for node in current.nodes.iter_mut() {
            if node.kind != NodeKind::File {
                continue;
            }
            let ancestor = if node.is_copy() {
                history.get_action_node(node.from_rev.unwrap_or(0), node.from_path.as_deref().unwrap_or(""))
            } else if node.action != NodeActionKind::Add {
                seen.get(&node.path).copied().or_else(|| {
                    prev_rev.and_then(|pr| history.get_action_node(pr, &node.path))
                })
            } else {
                None
            };

            if ancestor.is_none() && node.action != NodeActionKind::Add && !node.path.ends_with(".gitignore") {
                tracing::warn!(path = %node.path, revision = rev, "no resolvable ancestor for node");
            }

            node.from_index = ancestor.map(|r| r.index);
            node.ancestor = ancestor;
            seen.insert(node.path.clone(), node.node_ref());
        }

        ctx.progress.advance(1);
    }
    ctx.progress.finish_phase();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::progress::NullProgress;
    use std::sync::Arc;

    fn ctx() -> PipelineContext {
        PipelineContext::new(Options::default(), Arc::new(NullProgress), "uuid".into())
    }

    fn base_node(revision: i64, index: usize, path: &str, kind: NodeKind, action: NodeActionKind) -> NodeAction {
        NodeAction {
            path: path.into(),
            from_path: None,
            from_rev: None,
            content_hash: None,
            blob: None,
            properties: None,
            file_set: None,
            deleted_file_set: None,
            blob_mark: None,
            revision,
            index,
            from_index: None,
            kind,
            action,
            prop_change: false,
            ancestor: None,
        }
    }

    #[test]
    fn test_directory_copy_expands_into_synthetic_file_adds() {
        use crate::pipeline::build_history;

        let mut revisions = vec![
            RevisionRecord {
                revision: 1,
                nodes: vec![base_node(1, 0, "trunk/README", NodeKind::File, NodeActionKind::Add)],
                log: String::new(),
                author: String::new(),
                date: String::new(),
                properties: Default::default(),
            },
            RevisionRecord {
                revision: 2,
                nodes: vec![{
                    let mut n = base_node(2, 0, "branches/f", NodeKind::Dir, NodeActionKind::Add);
                    n.from_path = Some("trunk".into());
                    n.from_rev = Some(1);
                    n
                }],
                log: String::new(),
                author: String::new(),
                date: String::new(),
                properties: Default::default(),
            },
        ];

        let history = build_history::run(&ctx(), &mut revisions);
        run(&ctx(), &mut revisions, &history);

        let r2 = &revisions[1];
        assert_eq!(r2.nodes.len(), 2);
        let synth = &r2.nodes[1];
        assert_eq!(synth.path, "branches/f/README");
        assert_eq!(synth.from_path.as_deref(), Some("trunk/README"));
        assert_eq!(synth.ancestor, Some(NodeRef { revision: 1, index: 0 }));
    }

    #[test]
    fn test_directory_delete_of_nonbranch_emits_synthetic_deletes() {
        use crate::pipeline::build_history;

        let mut revisions = vec![
            RevisionRecord {
                revision: 1,
                nodes: vec![base_node(1, 0, "trunk/vendor/a", NodeKind::File, NodeActionKind::Add)],
                log: String::new(),
                author: String::new(),
                date: String::new(),
                properties: Default::default(),
            },
            RevisionRecord {
                revision: 2,
                nodes: vec![base_node(2, 0, "trunk/vendor", NodeKind::Dir, NodeActionKind::Delete)],
                log: String::new(),
                author: String::new(),
                date: String::new(),
                properties: Default::default(),
            },
        ];
        let history = build_history::run(&ctx(), &mut revisions);
        run(&ctx(), &mut revisions, &history);

        let r2 = &revisions[1];
        assert_eq!(r2.nodes[0].action, NodeActionKind::Delete);
        assert_eq!(r2.nodes.len(), 2);
        assert_eq!(r2.nodes[1].path, "trunk/vendor/a");
        assert_eq!(r2.nodes[1].action, NodeActionKind::Delete);
    }

    #[test]
    fn test_replace_by_copy_deletes_stale_subtree_and_adds_copied_one() {
        use crate::pipeline::build_history;

        let mut revisions = vec![
            RevisionRecord {
                revision: 1,
                nodes: vec![
                    base_node(1, 0, "trunk/vendor/old.txt", NodeKind::File, NodeActionKind::Add),
                    base_node(1, 1, "other/vendor/new.txt", NodeKind::File, NodeActionKind::Add),
                ],
                log: String::new(),
                author: String::new(),
                date: String::new(),
                properties: Default::default(),
            },
            RevisionRecord {
                revision: 2,
                nodes: vec![{
                    let mut n = base_node(2, 0, "trunk/vendor", NodeKind::Dir, NodeActionKind::Replace);
                    n.from_path = Some("other/vendor".into());
                    n.from_rev = Some(1);
                    n
                }],
                log: String::new(),
                author: String::new(),
                date: String::new(),
                properties: Default::default(),
            },
        ];
        let history = build_history::run(&ctx(), &mut revisions);
        run(&ctx(), &mut revisions, &history);

        let r2 = &revisions[1];
        let synthetic_paths: Vec<(&str, NodeActionKind)> =
            r2.nodes[1..].iter().map(|n| (n.path.as_str(), n.action)).collect();
        assert_eq!(
            synthetic_paths,
            vec![
                ("trunk/vendor/old.txt", NodeActionKind::Delete),
                ("trunk/vendor/new.txt", NodeActionKind::Add),
            ]
        );
    }

    #[test]
    fn test_directory_delete_of_declared_branch_becomes_nuke() {
        use crate::pipeline::build_history;

        let mut revisions = vec![RevisionRecord {
            revision: 1,
            nodes: vec![base_node(1, 0, "branches/f", NodeKind::Dir, NodeActionKind::Delete)],
            log: String::new(),
            author: String::new(),
            date: String::new(),
            properties: Default::default(),
        }];
        let history = build_history::run(&ctx(), &mut revisions);
        run(&ctx(), &mut revisions, &history);
        assert_eq!(revisions[0].nodes[0].action, NodeActionKind::Nuke);
    }
}
