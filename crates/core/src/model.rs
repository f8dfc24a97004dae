//! The data model shared by every pipeline phase: spec.md §3, verbatim.
//!
//! Node actions and revisions are stored in flat, arena-style vectors
//! (`Vec<RevisionRecord>`, each holding `Vec<NodeAction>`); other structures
//! refer to a node by `NodeRef { revision, index }` rather than by
//! reference, matching the "Cyclic references" guidance in spec.md §9 —
//! resolve parents and ancestors by index into a shared arena, not by
//! holding a borrow across phases.

use std::fmt;

/// A lightweight handle to one `NodeAction`, resolvable against the
/// revision arena (`Vec<RevisionRecord>`) by `revision`/`index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub revision: i64,
    pub index: usize,
}

/// Ordered key-value property map. SVN property blocks are order-sensitive
/// on the wire even though later phases mostly do set-membership tests;
/// keeping order makes property round-tripping in tests straightforward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropMap {
    entries: Vec<(String, String)>,
}

impl PropMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or overwrite `key`, preserving its original position if it
    /// already existed, else appending.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PropMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Node kind: spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    None,
    File,
    Dir,
}

/// Node action kind. `Nuke` is synthesized by phase 4, never present in the
/// raw dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeActionKind {
    None,
    Add,
    Delete,
    Change,
    Replace,
    Nuke,
}

/// One file- or directory-level operation within a revision: spec.md §3.
#[derive(Debug, Clone)]
pub struct NodeAction {
    pub path: String,
    pub from_path: Option<String>,
    pub from_rev: Option<i64>,
    pub content_hash: Option<String>,
    pub blob: Option<Vec<u8>>,
    pub properties: Option<PropMap>,
    /// Populated by phase 3 for directory delete/replace/copy nodes: the
    /// subtree of paths affected, each mapped to the node that defined it.
    /// For a copy, this is the subtree *being copied in*. For a plain
    /// delete, it's the subtree being removed.
    pub file_set: Option<Vec<(String, NodeRef)>>,
    /// Populated by phase 3 for `Replace` nodes only: the subtree that
    /// existed at `path` immediately before the replace, distinct from
    /// `file_set` so a `Replace`-by-copy node keeps both the old subtree
    /// being deleted and the new subtree being copied in.
    pub deleted_file_set: Option<Vec<(String, NodeRef)>>,
    pub blob_mark: Option<u64>,
    pub revision: i64,
    pub index: usize,
    pub from_index: Option<usize>,
    pub kind: NodeKind,
    pub action: NodeActionKind,
    pub prop_change: bool,
    /// Resolved by phase 4's ancestry sweep.
    pub ancestor: Option<NodeRef>,
}

impl NodeAction {
    pub fn is_copy(&self) -> bool {
        self.from_path.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            revision: self.revision,
            index: self.index,
        }
    }
}

/// A parsed `Revision-number` block plus its node actions: spec.md §3.
#[derive(Debug, Clone)]
pub struct RevisionRecord {
    pub revision: i64,
    pub nodes: Vec<NodeAction>,
    pub log: String,
    pub author: String,
    pub date: String,
    /// Revision properties other than svn:log/svn:author/svn:date.
    pub properties: PropMap,
}

impl RevisionRecord {
    pub fn is_empty_revision(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Committer/author identity plus a Unix timestamp and timezone offset, the
/// shape the fast-import `committer`/`author`/`tagger` lines need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// Signed offset in minutes from UTC, e.g. `+0000` is `0`.
    pub tz_offset_minutes: i32,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tz_offset_minutes < 0 { '-' } else { '+' };
        let abs = self.tz_offset_minutes.unsigned_abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.timestamp,
            sign,
            abs / 60,
            abs % 60
        )
    }
}

/// A single fileop within a commit: spec.md §3.
#[derive(Debug, Clone)]
pub struct FileOp {
    pub op: FileOpKind,
    pub mode: Option<String>,
    pub blob_mark: Option<u64>,
    pub path: String,
    pub source: Option<String>,
    pub target: Option<String>,
    /// Scratch field: the SVN branch this fileop's path classifies to.
    /// Populated by phase 6, consumed by phases 6-9; meaningless afterward.
    pub svn_branch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpKind {
    Modify,
    Delete,
    Rename,
    Copy,
    Note,
    DeleteAll,
}

impl FileOp {
    pub fn modify(mode: impl Into<String>, blob_mark: u64, path: impl Into<String>) -> Self {
        Self {
            op: FileOpKind::Modify,
            mode: Some(mode.into()),
            blob_mark: Some(blob_mark),
            path: path.into(),
            source: None,
            target: None,
            svn_branch: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            op: FileOpKind::Delete,
            mode: None,
            blob_mark: None,
            path: path.into(),
            source: None,
            target: None,
            svn_branch: None,
        }
    }

    pub fn delete_all(branch_scratch: impl Into<String>) -> Self {
        let path = branch_scratch.into();
        Self {
            op: FileOpKind::DeleteAll,
            mode: None,
            blob_mark: None,
            path,
            source: None,
            target: None,
            svn_branch: None,
        }
    }
}

/// A Blob event: spec.md §3. Mark is unique across the repository.
#[derive(Debug, Clone)]
pub struct Blob {
    pub mark: u64,
    pub data: Vec<u8>,
    pub content_hash: Option<String>,
}

/// A Commit event: spec.md §3.
#[derive(Debug, Clone)]
pub struct Commit {
    pub mark: u64,
    /// Original SVN revision, possibly with a `.n` split suffix.
    pub legacy_id: String,
    /// SVN branch path pre-phase-7, git ref post-phase-7.
    pub branch: String,
    pub committer: Identity,
    pub author: Option<Identity>,
    pub comment: String,
    pub fileops: Vec<FileOp>,
    /// Parent marks, first-parent first.
    pub parents: Vec<u64>,
    pub properties: Option<PropMap>,
}

impl Commit {
    pub fn is_branch_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn ends_in_delete_all(&self) -> bool {
        matches!(
            self.fileops.last(),
            Some(FileOp {
                op: FileOpKind::DeleteAll,
                ..
            })
        )
    }
}

/// A Tag event: spec.md §3.
#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub target_mark: u64,
    pub tagger: Identity,
    pub comment: String,
}

/// A Reset event: spec.md §3.
#[derive(Debug, Clone)]
pub struct Reset {
    pub branch: String,
    pub target_mark: Option<u64>,
}

/// The tagged event-variant sum making up the Repository event model:
/// spec.md §3, §9 ("represent Event as a tagged sum; exhaustive handling is
/// enforced").
#[derive(Debug, Clone)]
pub enum Event {
    Blob(Blob),
    Commit(Commit),
    Tag(Tag),
    Reset(Reset),
    Passthrough(String),
}

impl Event {
    /// The mark this event introduces, if any.
    pub fn mark(&self) -> Option<u64> {
        match self {
            Event::Blob(b) => Some(b.mark),
            Event::Commit(c) => Some(c.mark),
            Event::Tag(_) | Event::Reset(_) | Event::Passthrough(_) => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Event::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_commit_mut(&mut self) -> Option<&mut Commit> {
        match self {
            Event::Commit(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prop_map_preserves_insertion_order() {
        let mut props = PropMap::new();
        props.set("svn:executable", "*");
        props.set("svn:mergeinfo", "/trunk:1-5");
        let keys: Vec<&str> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["svn:executable", "svn:mergeinfo"]);
    }

    #[test]
    fn test_prop_map_set_overwrites_in_place() {
        let mut props = PropMap::new();
        props.set("a", "1");
        props.set("b", "2");
        props.set("a", "3");
        let entries: Vec<_> = props.iter().collect();
        assert_eq!(entries, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_is_copy() {
        let mut node = sample_node();
        assert!(!node.is_copy());
        node.from_path = Some("trunk".into());
        assert!(node.is_copy());
        node.from_path = Some(String::new());
        assert!(!node.is_copy());
    }

    #[test]
    fn test_identity_display_formats_fast_import_line() {
        let id = Identity {
            name: "Jane Dev".into(),
            email: "jane@example.com".into(),
            timestamp: 1_700_000_000,
            tz_offset_minutes: -300,
        };
        assert_eq!(
            id.to_string(),
            "Jane Dev <jane@example.com> 1700000000 -0500"
        );
    }

    fn sample_node() -> NodeAction {
        NodeAction {
            path: "trunk/README".into(),
            from_path: None,
            from_rev: None,
            content_hash: None,
            blob: None,
            properties: None,
            file_set: None,
            deleted_file_set: None,
            blob_mark: None,
            revision: 1,
            index: 0,
            from_index: None,
            kind: NodeKind::File,
            action: NodeActionKind::Add,
            prop_change: false,
            ancestor: None,
        }
    }
}
