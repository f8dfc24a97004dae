//! End-to-end checks: a handful of the scenarios from spec.md §8, run
//! through the real byte parser and the full pipeline rather than against
//! hand-built in-memory revisions. Assertions are structural (content and
//! relationships), not exact mark numbers, since those depend on how many
//! intermediate commits phase C tagifies away.

use std::io::Cursor;
use std::sync::Arc;

use svnfi_core::dump::{parse, ByteLexer};
use svnfi_core::model::{Event, FileOpKind};
use svnfi_core::options::Options;
use svnfi_core::pipeline::{self, PipelineContext, RunOutcome};
use svnfi_core::progress::NullProgress;

fn push_revision(out: &mut Vec<u8>, rev: i64, log: &str, author: &str, date: &str) {
    let props = format!(
        "K 7\nsvn:log\nV {}\n{}\nK 10\nsvn:author\nV {}\n{}\nK 8\nsvn:date\nV {}\n{}\nPROPS-END\n",
        log.len(),
        log,
        author.len(),
        author,
        date.len(),
        date
    );
    out.extend_from_slice(format!("Revision-number: {rev}\n").as_bytes());
    out.extend_from_slice(format!("Prop-content-length: {}\n", props.len()).as_bytes());
    out.extend_from_slice(format!("Content-length: {}\n\n", props.len()).as_bytes());
    out.extend_from_slice(props.as_bytes());
    out.push(b'\n');
}

fn push_dir_node(out: &mut Vec<u8>, path: &str, action: &str, copy_from: Option<(&str, i64)>) {
    out.extend_from_slice(format!("Node-path: {path}\n").as_bytes());
    out.extend_from_slice(b"Node-kind: dir\n");
    out.extend_from_slice(format!("Node-action: {action}\n").as_bytes());
    if let Some((from_path, from_rev)) = copy_from {
        out.extend_from_slice(format!("Node-copyfrom-path: {from_path}\n").as_bytes());
        out.extend_from_slice(format!("Node-copyfrom-rev: {from_rev}\n").as_bytes());
    }
    out.push(b'\n');
}

fn push_file_node(out: &mut Vec<u8>, path: &str, action: &str, content: &[u8], executable: bool) {
    out.extend_from_slice(format!("Node-path: {path}\n").as_bytes());
    out.extend_from_slice(b"Node-kind: file\n");
    out.extend_from_slice(format!("Node-action: {action}\n").as_bytes());
    if executable {
        let props = "K 14\nsvn:executable\nV 1\n*\nPROPS-END\n".to_string();
        out.extend_from_slice(format!("Prop-content-length: {}\n", props.len()).as_bytes());
        out.extend_from_slice(format!("Text-content-length: {}\n", content.len()).as_bytes());
        out.extend_from_slice(format!("Content-length: {}\n\n", props.len() + content.len()).as_bytes());
        out.extend_from_slice(props.as_bytes());
    } else {
        out.extend_from_slice(format!("Text-content-length: {}\n", content.len()).as_bytes());
        out.extend_from_slice(format!("Content-length: {}\n\n", content.len()).as_bytes());
    }
    out.extend_from_slice(content);
    out.push(b'\n');
}

fn dump_header(out: &mut Vec<u8>) {
    out.extend_from_slice(b"SVN-fs-dump-format-version: 2\n\n");
    out.extend_from_slice(b"UUID: 11111111-1111-1111-1111-111111111111\n\n");
}

fn run_pipeline(bytes: Vec<u8>, options: Options) -> Vec<Event> {
    let parsed = parse(ByteLexer::new(Cursor::new(bytes))).expect("dump parses");
    let ctx = PipelineContext::new(options, Arc::new(NullProgress), parsed.uuid.clone());
    match pipeline::run(&ctx, parsed) {
        RunOutcome::Completed(events) => events,
        RunOutcome::Cancelled => panic!("pipeline cancelled"),
    }
}

fn blob_data(events: &[Event], mark: u64) -> &[u8] {
    events
        .iter()
        .find_map(|e| match e {
            Event::Blob(b) if b.mark == mark => Some(b.data.as_slice()),
            _ => None,
        })
        .expect("referenced blob exists")
}

/// S1: revision 0 boilerplate, `add dir trunk`, `add file trunk/README`.
/// The bare directory-add commit has no parent and no fileops, so phase C
/// tagifies it away with no tag (empty root commit, no parent to tag).
/// What survives is a single commit adding README.
#[test]
fn trunk_readme_add_produces_one_commit_no_tags() {
    let mut dump = Vec::new();
    dump_header(&mut dump);
    push_revision(&mut dump, 0, "", "", "2020-01-01T00:00:00Z");
    push_revision(&mut dump, 1, "create trunk\n", "alice", "2020-01-01T00:00:01Z");
    push_dir_node(&mut dump, "trunk", "add", None);
    push_revision(&mut dump, 2, "first\n", "alice", "2020-01-01T00:00:02Z");
    push_file_node(&mut dump, "trunk/README", "add", b"hello\n", false);

    let events = run_pipeline(dump, Options { no_automatic_ignores: true, ..Options::default() });

    let commits: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Commit(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(commits.len(), 1, "bare trunk-dir-add commit should vanish");
    let commit = commits[0];
    assert_eq!(commit.legacy_id, "2");
    assert_eq!(commit.branch, "refs/heads/master");
    assert!(commit.parents.is_empty());
    assert_eq!(commit.fileops.len(), 1);
    assert_eq!(commit.fileops[0].path, "trunk/README");
    assert_eq!(commit.fileops[0].op, FileOpKind::Modify);
    assert_eq!(blob_data(&events, commit.fileops[0].blob_mark.unwrap()), b"hello\n");
    assert!(events.iter().all(|e| !matches!(e, Event::Tag(_))));
}

/// S2: `add dir tags/v1 from trunk@2`, a pure directory copy onto a tag
/// ref. Phase 9 clears its fileops (the link_fixups tag-ref special case),
/// phase C tagifies the now-empty commit into a `v1` tag pointed at the
/// README commit rather than emitting a second commit.
#[test]
fn directory_copy_onto_tags_ref_becomes_tag_not_commit() {
    let mut dump = Vec::new();
    dump_header(&mut dump);
    push_revision(&mut dump, 0, "", "", "2020-01-01T00:00:00Z");
    push_revision(&mut dump, 1, "create trunk\n", "alice", "2020-01-01T00:00:01Z");
    push_dir_node(&mut dump, "trunk", "add", None);
    push_revision(&mut dump, 2, "first\n", "alice", "2020-01-01T00:00:02Z");
    push_file_node(&mut dump, "trunk/README", "add", b"hello\n", false);
    push_revision(&mut dump, 3, "tag it\n", "alice", "2020-01-01T00:00:03Z");
    push_dir_node(&mut dump, "tags/v1", "add", Some(("trunk", 2)));

    let events = run_pipeline(dump, Options { no_automatic_ignores: true, ..Options::default() });

    let commits: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Commit(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(commits.len(), 1, "the tag-ref copy must not surface as its own commit");
    let readme_commit = commits[0];
    assert_eq!(readme_commit.legacy_id, "2");

    let tags: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Tag(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "v1");
    assert_eq!(tags[0].target_mark, readme_commit.mark);

    // Every mark referenced by a fileop or a tag must appear earlier in the
    // event stream than its first use (spec.md §8 invariant).
    let mut defined = std::collections::HashSet::new();
    for event in &events {
        match event {
            Event::Blob(b) => {
                defined.insert(b.mark);
            }
            Event::Commit(c) => {
                for op in &c.fileops {
                    if let Some(m) = op.blob_mark {
                        assert!(defined.contains(&m), "blob {m} used before it was defined");
                    }
                }
                defined.insert(c.mark);
            }
            _ => {}
        }
    }
}

/// S6: a file carrying `svn:executable` gets fast-import mode `100755`.
#[test]
fn executable_property_maps_to_mode_100755() {
    let mut dump = Vec::new();
    dump_header(&mut dump);
    push_revision(&mut dump, 0, "", "", "2020-01-01T00:00:00Z");
    push_revision(&mut dump, 1, "create trunk\n", "alice", "2020-01-01T00:00:01Z");
    push_dir_node(&mut dump, "trunk", "add", None);
    push_revision(&mut dump, 2, "exec\n", "alice", "2020-01-01T00:00:02Z");
    push_file_node(&mut dump, "trunk/run.sh", "add", b"#!/bin/sh\n", true);

    let events = run_pipeline(dump, Options { no_automatic_ignores: true, ..Options::default() });

    let commit = events
        .iter()
        .find_map(|e| match e {
            Event::Commit(c) => Some(c),
            _ => None,
        })
        .expect("one surviving commit");
    assert_eq!(commit.fileops.len(), 1);
    assert_eq!(commit.fileops[0].mode.as_deref(), Some("100755"));
}

/// A dump with only revision 0 produces the passthrough placeholder, never
/// an empty event list (spec.md §8 boundary case).
#[test]
fn revision_zero_only_dump_produces_passthrough() {
    let mut dump = Vec::new();
    dump_header(&mut dump);
    push_revision(&mut dump, 0, "", "", "2020-01-01T00:00:00Z");

    let events = run_pipeline(dump, Options::default());
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::Passthrough(_)));
}
