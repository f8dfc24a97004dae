//! Visibility history: spec.md §4.4 component 2.
//!
//! One immutable [`PathMap`] snapshot per SVN revision, answering "what
//! node last defined path P as of revision R". Phase 3 is the sole writer
//! (mutating the mutable "here" map and snapshotting it after every
//! revision); every later phase only reads through [`History::get_action_node`].

use std::collections::HashMap;

use crate::model::NodeRef;
use crate::pathmap::PathMap;

/// Map from revision number to an immutable PathMap snapshot, plus the
/// mutable "here" PathMap phase 3 builds up: spec.md §3.
#[derive(Debug, Default)]
pub struct History {
    here: PathMap<NodeRef>,
    visible: HashMap<i64, PathMap<NodeRef>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn here(&self) -> &PathMap<NodeRef> {
        &self.here
    }

    pub fn here_mut(&mut self) -> &mut PathMap<NodeRef> {
        &mut self.here
    }

    /// Snapshot the current "here" state as the visible state at `rev`.
    /// Called once, at the end of applying each revision's nodes.
    pub fn snapshot_revision(&mut self, rev: i64) {
        self.visible.insert(rev, self.here.snapshot());
    }

    /// What node defined `path` as of the end of revision `rev`?
    pub fn get_action_node(&self, rev: i64, path: &str) -> Option<NodeRef> {
        self.visible.get(&rev)?.get(path).copied()
    }

    pub fn visible_at(&self, rev: i64) -> Option<&PathMap<NodeRef>> {
        self.visible.get(&rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(rev: i64, index: usize) -> NodeRef {
        NodeRef {
            revision: rev,
            index,
        }
    }

    #[test]
    fn test_replaying_revisions_produces_expected_visibility() {
        let mut history = History::new();

        // r1: add trunk/README
        history.here_mut().set("trunk/README", node(1, 0));
        history.snapshot_revision(1);

        // r2: change trunk/README (new node, same path)
        history.here_mut().set("trunk/README", node(2, 0));
        history.snapshot_revision(2);

        // r3: copy trunk -> branches/f (graft)
        let trunk_snapshot = history.visible_at(2).unwrap().snapshot();
        history
            .here_mut()
            .copy_from("branches/f", &trunk_snapshot, "trunk");
        history.snapshot_revision(3);

        assert_eq!(history.get_action_node(1, "trunk/README"), Some(node(1, 0)));
        assert_eq!(history.get_action_node(2, "trunk/README"), Some(node(2, 0)));
        assert_eq!(
            history.get_action_node(3, "branches/f/README"),
            Some(node(2, 0))
        );
        // r1's snapshot is untouched by the later copy.
        assert_eq!(history.get_action_node(1, "branches/f/README"), None);
    }

    #[test]
    fn test_delete_removes_from_subsequent_visibility_only() {
        let mut history = History::new();
        history.here_mut().set("trunk/a", node(1, 0));
        history.snapshot_revision(1);

        history.here_mut().remove("trunk/a");
        history.snapshot_revision(2);

        assert_eq!(history.get_action_node(1, "trunk/a"), Some(node(1, 0)));
        assert_eq!(history.get_action_node(2, "trunk/a"), None);
    }
}
