//! Persistent, copy-on-write path-keyed associative container: spec.md §4.1.
//!
//! A radix trie keyed by `/`-delimited path segments with structural
//! sharing via `Rc`. Every mutation rebuilds only the spine of nodes on the
//! path being touched and shares every untouched subtree with the previous
//! version, so `snapshot()` is O(1) and independent of later mutations —
//! the History component (one snapshot per SVN revision, spec.md §4.4 phase
//! 3) depends on exactly this property.

use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug)]
struct Node<V> {
    value: Option<V>,
    children: BTreeMap<String, Rc<Node<V>>>,
}

impl<V: Clone> Clone for Node<V> {
    fn clone(&self) -> Self {
        Node {
            value: self.value.clone(),
            children: self.children.clone(),
        }
    }
}

impl<V> Node<V> {
    fn empty() -> Self {
        Node {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

/// A persistent, snapshot-able path-to-value map.
#[derive(Debug)]
pub struct PathMap<V> {
    root: Rc<Node<V>>,
}

impl<V> Clone for PathMap<V> {
    fn clone(&self) -> Self {
        PathMap {
            root: self.root.clone(),
        }
    }
}

impl<V> Default for PathMap<V> {
    fn default() -> Self {
        PathMap {
            root: Rc::new(Node::empty()),
        }
    }
}

/// Split a path into its non-empty `/`-delimited segments. The empty path
/// (addressing the root) yields no segments, matching spec.md's "the empty
/// path is permitted and addresses the root".
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl<V: Clone> PathMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&V> {
        let segs = segments(path);
        let mut node = &self.root;
        for seg in segs {
            node = node.children.get(seg)?;
        }
        node.value.as_ref()
    }

    pub fn set(&mut self, path: &str, value: V) {
        let segs = segments(path);
        self.root = Self::set_rec(&self.root, &segs, value);
    }

    fn set_rec(node: &Rc<Node<V>>, segs: &[&str], value: V) -> Rc<Node<V>> {
        if segs.is_empty() {
            let mut n = (**node).clone();
            n.value = Some(value);
            return Rc::new(n);
        }
        let (head, rest) = (segs[0], &segs[1..]);
        let mut children = node.children.clone();
        let child = children
            .get(head)
            .cloned()
            .unwrap_or_else(|| Rc::new(Node::empty()));
        children.insert(head.to_string(), Self::set_rec(&child, rest, value));
        Rc::new(Node {
            value: node.value.clone(),
            children,
        })
    }

    /// Remove `path` and every descendant. Idempotent on missing paths.
    pub fn remove(&mut self, path: &str) {
        let segs = segments(path);
        if segs.is_empty() {
            self.root = Rc::new(Node::empty());
            return;
        }
        self.root = Self::remove_rec(&self.root, &segs);
    }

    fn remove_rec(node: &Rc<Node<V>>, segs: &[&str]) -> Rc<Node<V>> {
        let (head, rest) = (segs[0], &segs[1..]);
        if !node.children.contains_key(head) {
            return node.clone();
        }
        let mut children = node.children.clone();
        if rest.is_empty() {
            children.remove(head);
        } else {
            let child = children.get(head).unwrap().clone();
            children.insert(head.to_string(), Self::remove_rec(&child, rest));
        }
        Rc::new(Node {
            value: node.value.clone(),
            children,
        })
    }

    /// Graft the entire subtree rooted at `src_path` in `src` under
    /// `dest_path` in `self`. No-op if `src_path` is absent in `src`.
    pub fn copy_from(&mut self, dest_path: &str, src: &PathMap<V>, src_path: &str) {
        let Some(subtree) = src.subtree_node(src_path) else {
            return;
        };
        let dest_segs = segments(dest_path);
        self.root = Self::graft_rec(&self.root, &dest_segs, subtree);
    }

    fn graft_rec(node: &Rc<Node<V>>, segs: &[&str], subtree: Rc<Node<V>>) -> Rc<Node<V>> {
        if segs.is_empty() {
            return subtree;
        }
        let (head, rest) = (segs[0], &segs[1..]);
        let mut children = node.children.clone();
        let child = children
            .get(head)
            .cloned()
            .unwrap_or_else(|| Rc::new(Node::empty()));
        children.insert(head.to_string(), Self::graft_rec(&child, rest, subtree));
        Rc::new(Node {
            value: node.value.clone(),
            children,
        })
    }

    fn subtree_node(&self, path: &str) -> Option<Rc<Node<V>>> {
        let segs = segments(path);
        let mut node = self.root.clone();
        for seg in segs {
            node = node.children.get(seg)?.clone();
        }
        Some(node)
    }

    /// An immutable handle sharing structure with `self`; later mutations
    /// of either side are independent.
    pub fn snapshot(&self) -> PathMap<V> {
        self.clone()
    }

    /// Enumerate every `(path, value)` pair. Order is deterministic
    /// (lexicographic by segment) within a single snapshot.
    pub fn iter<F: FnMut(&str, &V)>(&self, mut callback: F) {
        let mut buf = String::new();
        Self::iter_rec(&self.root, &mut buf, &mut callback);
    }

    fn iter_rec<F: FnMut(&str, &V)>(node: &Rc<Node<V>>, buf: &mut String, callback: &mut F) {
        if let Some(v) = &node.value {
            callback(buf, v);
        }
        for (seg, child) in &node.children {
            let prior_len = buf.len();
            if !buf.is_empty() {
                buf.push('/');
            }
            buf.push_str(seg);
            Self::iter_rec(child, buf, callback);
            buf.truncate(prior_len);
        }
    }

    /// Every `(path, value)` pair in the map.
    pub fn collect(&self) -> Vec<(String, V)> {
        let mut out = Vec::new();
        self.iter(|p, v| out.push((p.to_string(), v.clone())));
        out
    }

    /// Every `(path, value)` pair whose path lies under `prefix` (inclusive),
    /// with paths rendered relative to `prefix`. Empty if `prefix` is absent.
    pub fn collect_prefixed(&self, prefix: &str) -> Vec<(String, V)> {
        match self.subtree_node(prefix) {
            None => Vec::new(),
            Some(node) => PathMap { root: node }.collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn size(&self) -> usize {
        let mut count = 0usize;
        self.iter(|_, _| count += 1);
        count
    }
}
