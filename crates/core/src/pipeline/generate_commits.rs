//! Phase 5 — generate commits: spec.md §4.4 phase 5.
//!
//! Sequential: mark allocation order must be stable. Every commit is
//! chained to the previous one regardless of branch; untangling that
//! into per-branch history is phase 6's job, using each fileop's own path
//! to classify it. A commit with no fileops (e.g. a bare directory `add`)
//! carries no path for phase 6 to classify, so its branch is set here
//! from the single SVN branch its nodes touched.

use std::collections::{HashMap, HashSet};

use regex_lite::Regex;

use crate::model::{Blob, Commit, FileOp, Identity, NodeActionKind, NodeKind, NodeRef, RevisionRecord};

use super::context::PipelineContext;

pub struct GenResult {
    pub blobs: Vec<Blob>,
    pub commits: Vec<Commit>,
}

struct MarkAllocator {
    next: u64,
}

impl MarkAllocator {
    fn new() -> Self {
        Self { next: 1 }
    }
    fn alloc(&mut self) -> u64 {
        let m = self.next;
        self.next += 1;
        m
    }
}

fn parse_identity(author: &str, use_uuid: bool, uuid: &str) -> (String, String) {
    let dvcs = Regex::new(r"^(.*)<([^<>]+)>\s*$").unwrap();
    if author.matches('@').count() == 1 {
        if let Some(caps) = dvcs.captures(author) {
            let name = caps.get(1).unwrap().as_str().trim().to_string();
            let email = caps.get(2).unwrap().as_str().to_string();
            return (name, email);
        }
        let name = author.split('@').next().unwrap_or(author).to_string();
        return (name, author.to_string());
    }
    if use_uuid {
        (author.to_string(), format!("{author}@{uuid}"))
    } else {
        (author.to_string(), author.to_string())
    }
}

fn parse_timestamp(date: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(date)
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

fn committer_identity(rev: &RevisionRecord, ctx: &PipelineContext) -> Identity {
    if ctx.options.testmode {
        return Identity {
            name: "testuser".into(),
            email: "testuser@example.com".into(),
            timestamp: rev.revision.max(0) * 86_400,
            tz_offset_minutes: 0,
        };
    }
    let (name, email) = parse_identity(&rev.author, ctx.options.use_uuid, &ctx.repo_uuid);
    Identity {
        name,
        email,
        timestamp: parse_timestamp(&rev.date),
        tz_offset_minutes: 0,
    }
}

fn skip_path(path: &str, ctx: &PipelineContext) -> bool {
    if path.ends_with(".cvsignore") {
        return true;
    }
    if path.ends_with(".gitignore") && !ctx.options.user_ignores {
        return true;
    }
    false
}

fn file_mode(properties: Option<&crate::model::PropMap>) -> &'static str {
    let Some(props) = properties else {
        return "100644";
    };
    if props.contains_key("svn:special") {
        "120000"
    } else if props.contains_key("svn:executable") {
        "100755"
    } else {
        "100644"
    }
}

pub fn run(ctx: &PipelineContext, revisions: &[RevisionRecord]) -> GenResult {
    ctx.progress.start_phase("generate-commits", revisions.len() as u64);

    let mut blobs = Vec::new();
    let mut commits = Vec::new();
    let mut marks = MarkAllocator::new();
    let mut content_hash_marks: HashMap<String, (u64, NodeRef)> = HashMap::new();
    let mut node_marks: HashMap<NodeRef, u64> = HashMap::new();
    let mut prev_commit_mark: Option<u64> = None;

    for rev in revisions {
        if ctx.cancellation.is_cancelled() {
            break;
        }
        if rev.nodes.is_empty() {
            ctx.progress.advance(1);
            continue;
        }

        let mut fileops = Vec::new();
        let mut branches_touched: HashSet<String> = HashSet::new();

        for node in &rev.nodes {
            if node.action == NodeActionKind::None {
                continue;
            }
            branches_touched.insert(ctx.classifier.split(&node.path).0);

            if node.action == NodeActionKind::Nuke {
                fileops.push(FileOp::delete_all(node.path.trim_end_matches('/').to_string()));
                continue;
            }
            if node.kind != NodeKind::File {
                continue;
            }
            if skip_path(&node.path, ctx) {
                continue;
            }
            match node.action {
                NodeActionKind::Delete => {
                    fileops.push(FileOp::delete(node.path.clone()));
                }
                NodeActionKind::Add | NodeActionKind::Change | NodeActionKind::Replace => {
                    let mode = file_mode(node.properties.as_ref());
                    let mark = if let Some(blob) = &node.blob {
                        let hash = node.content_hash.clone().unwrap_or_default();
                        if !hash.is_empty() {
                            if let Some((existing_mark, _)) = content_hash_marks.get(&hash) {
                                *existing_mark
                            } else {
                                let m = marks.alloc();
                                blobs.push(Blob {
                                    mark: m,
                                    data: blob.clone(),
                                    content_hash: node.content_hash.clone(),
                                });
                                content_hash_marks.insert(hash, (m, node.node_ref()));
                                m
                            }
                        } else {
                            let m = marks.alloc();
                            blobs.push(Blob {
                                mark: m,
                                data: blob.clone(),
                                content_hash: None,
                            });
                            m
                        }
                    } else if let Some(ancestor) = node.ancestor {
                        match node_marks.get(&ancestor) {
                            Some(m) => *m,
                            None => continue,
                        }
                    } else {
                        continue;
                    };
                    node_marks.insert(node.node_ref(), mark);
                    fileops.push(FileOp::modify(mode, mark, node.path.clone()));
                }
                NodeActionKind::None | NodeActionKind::Nuke => unreachable!(),
            }
        }

        if fileops.is_empty() && branches_touched.len() > 1 {
            ctx.progress.advance(1);
            continue;
        }

        let committer = committer_identity(rev, ctx);
        let mark = marks.alloc();
        // Phase 6 reclassifies the branch from fileop paths whenever any
        // exist; this placeholder only matters for an empty commit, where
        // `branches_touched` is its only record of which branch it's on.
        let branch = branches_touched
            .iter()
            .next()
            .cloned()
            .unwrap_or_else(|| "refs/heads/master".to_string());
        commits.push(Commit {
            mark,
            legacy_id: rev.revision.to_string(),
            branch,
            committer,
            author: None,
            comment: format!("{}\n", rev.log.trim_end_matches('\n')),
            fileops,
            parents: prev_commit_mark.into_iter().collect(),
            properties: if rev.properties.is_empty() {
                None
            } else {
                Some(rev.properties.clone())
            },
        });
        prev_commit_mark = Some(mark);
        ctx.progress.advance(1);
    }

    ctx.progress.finish_phase();
    GenResult { blobs, commits }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeAction, PropMap};
    use crate::options::Options;
    use crate::progress::NullProgress;
    use std::sync::Arc;

    fn ctx() -> PipelineContext {
        PipelineContext::new(Options::default(), Arc::new(NullProgress), "uuid".into())
    }

    fn file_add(rev: i64, index: usize, path: &str, blob: &[u8], hash: &str) -> NodeAction {
        NodeAction {
            path: path.into(),
            from_path: None,
            from_rev: None,
            content_hash: Some(hash.into()),
            blob: Some(blob.to_vec()),
            properties: None,
            file_set: None,
            deleted_file_set: None,
            blob_mark: None,
            revision: rev,
            index,
            from_index: None,
            kind: NodeKind::File,
            action: NodeActionKind::Add,
            prop_change: false,
            ancestor: None,
        }
    }

    #[test]
    fn test_simple_add_produces_blob_and_commit() {
        let revisions = vec![
            RevisionRecord {
                revision: 0,
                nodes: vec![],
                log: String::new(),
                author: String::new(),
                date: String::new(),
                properties: Default::default(),
            },
            RevisionRecord {
                revision: 1,
                nodes: vec![file_add(1, 0, "trunk/README", b"hello\n", "abc")],
                log: "first".into(),
                author: "alice".into(),
                date: "2024-01-01T00:00:00.000000Z".into(),
                properties: Default::default(),
            },
        ];
        let result = run(&ctx(), &revisions);
        assert_eq!(result.blobs.len(), 1);
        assert_eq!(result.blobs[0].mark, 1);
        assert_eq!(result.commits.len(), 1);
        assert_eq!(result.commits[0].mark, 2);
        assert_eq!(result.commits[0].fileops.len(), 1);
        assert_eq!(result.commits[0].comment, "first\n");
        assert!(result.commits[0].parents.is_empty());
    }

    #[test]
    fn test_executable_property_sets_mode() {
        let mut node = file_add(1, 0, "trunk/run.sh", b"run\n", "h1");
        let mut props = PropMap::new();
        props.set("svn:executable", "*");
        node.properties = Some(props);
        let revisions = vec![RevisionRecord {
            revision: 1,
            nodes: vec![node],
            log: String::new(),
            author: "bob".into(),
            date: "2024-01-01T00:00:00Z".into(),
            properties: Default::default(),
        }];
        let result = run(&ctx(), &revisions);
        assert_eq!(result.commits[0].fileops[0].mode.as_deref(), Some("100755"));
    }

    #[test]
    fn test_identity_with_dvcs_style_author() {
        let (name, email) = parse_identity("Jane Dev <jane@example.com>", false, "uuid");
        assert_eq!(name, "Jane Dev");
        assert_eq!(email, "jane@example.com");
    }

    #[test]
    fn test_identity_synthesized_without_at_sign() {
        let (name, email) = parse_identity("alice", false, "uuid");
        assert_eq!(name, "alice");
        assert_eq!(email, "alice");
        let (_, email_uuid) = parse_identity("alice", true, "repo-uuid");
        assert_eq!(email_uuid, "alice@repo-uuid");
    }

    #[test]
    fn test_duplicate_content_hash_reuses_blob_mark() {
        let revisions = vec![
            RevisionRecord {
                revision: 1,
                nodes: vec![file_add(1, 0, "trunk/a", b"same\n", "dup")],
                log: String::new(),
                author: "a".into(),
                date: "2024-01-01T00:00:00Z".into(),
                properties: Default::default(),
            },
            RevisionRecord {
                revision: 2,
                nodes: vec![file_add(2, 0, "trunk/b", b"same\n", "dup")],
                log: String::new(),
                author: "a".into(),
                date: "2024-01-02T00:00:00Z".into(),
                properties: Default::default(),
            },
        ];
        let result = run(&ctx(), &revisions);
        assert_eq!(result.blobs.len(), 1);
        assert_eq!(result.commits.len(), 2);
        assert_eq!(result.commits[1].fileops[0].blob_mark, Some(1));
    }

    fn dir_add(rev: i64, index: usize, path: &str) -> NodeAction {
        let mut n = file_add(rev, index, path, b"", "");
        n.kind = NodeKind::Dir;
        n.content_hash = None;
        n.blob = None;
        n
    }

    #[test]
    fn test_bare_directory_add_keeps_its_own_branch_not_master() {
        let revisions = vec![RevisionRecord {
            revision: 1,
            nodes: vec![dir_add(1, 0, "branches/f/newdir")],
            log: String::new(),
            author: "a".into(),
            date: "2024-01-01T00:00:00Z".into(),
            properties: Default::default(),
        }];
        let result = run(&ctx(), &revisions);
        assert_eq!(result.commits.len(), 1);
        assert!(result.commits[0].fileops.is_empty());
        assert_eq!(result.commits[0].branch, "branches/f");
    }
}
